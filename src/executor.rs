//! Dispatches one parsed action onto the browser and classifies the
//! outcome: Pending -> {Failed, ModifiedPage, NavigatedToNewPage}.

use std::sync::Arc;

use headless_chrome::Tab;
use tracing::{info, warn};

use crate::actions::{self, Action};
use crate::diff;
use crate::error::TurnError;
use crate::hands;
use crate::parser::ActionCall;
use crate::turn::{ExecutionReport, TurnFailure, TurnStatus};
use crate::types::{PageSnapshot, SETTLE_DELAY};

/// Run one call against the browser. Any failure is folded into the report
/// with the literal call text; nothing is retried.
pub fn run(call: &ActionCall, snapshot: &PageSnapshot, tab: &Arc<Tab>) -> ExecutionReport {
    match try_run(call, snapshot, tab) {
        Ok(report) => report,
        Err(error) => ExecutionReport {
            status: TurnStatus::Failed,
            failure: Some(TurnFailure {
                action_text: call.to_string(),
                error: error.to_string(),
            }),
            html_diff: None,
        },
    }
}

fn try_run(
    call: &ActionCall,
    snapshot: &PageSnapshot,
    tab: &Arc<Tab>,
) -> Result<ExecutionReport, TurnError> {
    let action = resolve(call)?;
    info!("executing {call}");
    invoke(&action, snapshot, tab)?;

    // Navigation and clicks may trigger async loads; give the page a fixed
    // pause before looking at it again. Fills and selects proceed
    // immediately.
    if action.kind().requires_settle() {
        std::thread::sleep(SETTLE_DELAY);
    }

    Ok(classify(snapshot, tab))
}

/// Look the call up in the catalog and bind its arguments. No browser
/// involvement; failures here never have side effects.
pub fn resolve(call: &ActionCall) -> Result<Action, TurnError> {
    let spec = actions::find(&call.name).ok_or_else(|| {
        TurnError::UnknownAction(if call.name.is_empty() {
            call.raw.clone()
        } else {
            call.name.clone()
        })
    })?;
    spec.bind(call)
}

/// Resolve a short element id against the current snapshot's index. Ids
/// from earlier snapshots are gone by design; the failure is loud.
pub fn lookup_xpath<'a>(snapshot: &'a PageSnapshot, id: &str) -> Result<&'a str, TurnError> {
    snapshot.xpath_for(id).ok_or_else(|| {
        TurnError::Execution(format!("no element with id {id:?} in the current page index"))
    })
}

fn invoke(action: &Action, snapshot: &PageSnapshot, tab: &Arc<Tab>) -> Result<(), TurnError> {
    let result = match action {
        Action::GoToUrl { url } => hands::navigate(tab, url),
        Action::Click { id } => hands::click(tab, lookup_xpath(snapshot, id)?),
        Action::Fill { id, text } => hands::fill(tab, lookup_xpath(snapshot, id)?, text),
        Action::SelectOptions { id, values } => {
            hands::select_options(tab, lookup_xpath(snapshot, id)?, values)
        }
    };
    result.map_err(|error| TurnError::Execution(format!("{error:#}")))
}

fn classify(snapshot: &PageSnapshot, tab: &Arc<Tab>) -> ExecutionReport {
    let current_url = hands::current_url(tab);
    match classify_outcome(snapshot.url.as_deref(), &current_url) {
        TurnStatus::NavigatedToNewPage => {
            info!("navigated to {current_url}");
            let html_diff = match navigation_diff(snapshot, tab) {
                Ok(diff) => diff,
                Err(error) => {
                    // Diffing is best-effort metadata; never fail the turn.
                    warn!("{error}");
                    None
                }
            };
            ExecutionReport {
                status: TurnStatus::NavigatedToNewPage,
                failure: None,
                html_diff,
            }
        }
        status => ExecutionReport {
            status,
            failure: None,
            html_diff: None,
        },
    }
}

/// A changed URL means navigation; an unchanged one means the action
/// mutated the page in place.
pub fn classify_outcome(pre_url: Option<&str>, post_url: &str) -> TurnStatus {
    if pre_url == Some(post_url) {
        TurnStatus::ModifiedPage
    } else {
        TurnStatus::NavigatedToNewPage
    }
}

fn navigation_diff(snapshot: &PageSnapshot, tab: &Arc<Tab>) -> Result<Option<String>, TurnError> {
    let Some(old_html) = &snapshot.raw_html else {
        return Ok(None);
    };
    let new_html =
        hands::content(tab).map_err(|error| TurnError::Diff(format!("{error:#}")))?;
    Ok(Some(diff::diff_pages(old_html, &new_html)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &str) -> ActionCall {
        ActionCall {
            name: name.to_string(),
            args: args.to_string(),
            raw: format!("{name}({args})"),
        }
    }

    #[test]
    fn unknown_action_name_fails_before_binding() {
        let err = resolve(&call("teleport", "url='x'")).unwrap_err();
        assert!(matches!(err, TurnError::UnknownAction(_)));
    }

    #[test]
    fn malformed_call_resolves_to_unknown_action_with_raw_text() {
        let broken = ActionCall {
            name: String::new(),
            args: String::new(),
            raw: "((broken)".to_string(),
        };
        match resolve(&broken).unwrap_err() {
            TurnError::UnknownAction(name) => assert_eq!(name, "((broken)"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn argument_mismatch_fails_before_the_browser_is_touched() {
        let err = resolve(&call("click_html_element", "")).unwrap_err();
        assert!(matches!(err, TurnError::BadArguments { .. }));
    }

    #[test]
    fn well_formed_call_resolves_to_a_bound_action() {
        let action = resolve(&call("go_to_url", "url='example.com'")).unwrap();
        assert_eq!(
            action,
            Action::GoToUrl {
                url: "example.com".to_string()
            }
        );
    }

    #[test]
    fn missing_element_id_is_a_loud_failure() {
        let snapshot = PageSnapshot::from_page(
            "https://example.com",
            "<html><body><button>Go</button></body></html>",
        );
        let err = lookup_xpath(&snapshot, "5").unwrap_err();
        assert!(matches!(err, TurnError::Execution(_)));
        assert!(err.to_string().contains("\"5\""));
    }

    #[test]
    fn url_comparison_classifies_the_outcome() {
        assert_eq!(
            classify_outcome(Some("https://a"), "https://a"),
            TurnStatus::ModifiedPage
        );
        assert_eq!(
            classify_outcome(Some("https://a"), "https://b"),
            TurnStatus::NavigatedToNewPage
        );
        // First navigation away from a blank browser.
        assert_eq!(
            classify_outcome(None, "https://a"),
            TurnStatus::NavigatedToNewPage
        );
    }
}
