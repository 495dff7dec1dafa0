//! One full cycle: prompt, model response, parsed action, executed action,
//! classified outcome.

use serde::Serialize;

use crate::error::{ParseError, TurnError};
use crate::parser::{self, ActionCall};

/// A turn starts Pending and moves to exactly one terminal state after
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnStatus {
    Pending,
    Failed,
    ModifiedPage,
    NavigatedToNewPage,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnFailure {
    /// The literal call text the model asked for.
    pub action_text: String,
    pub error: String,
}

/// What execution decided about a turn.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub status: TurnStatus,
    pub failure: Option<TurnFailure>,
    pub html_diff: Option<String>,
}

/// Immutable once finalized and appended to the history.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub prompt: String,
    pub llm_output: String,
    pub observations: String,
    pub reasoning: String,
    pub action_description: String,
    /// Every call-shaped substring found in the output, in discovery order.
    /// Only the first is ever executed; the rest are metadata.
    pub action_calls: Vec<ActionCall>,
    /// URL the page was on when the turn was decided.
    pub page_url: Option<String>,
    pub status: TurnStatus,
    pub failure: Option<TurnFailure>,
    pub html_diff: Option<String>,
}

impl Turn {
    /// Parse model output into a pending turn. Missing sections or a missing
    /// call are parse failures, never a partial turn.
    pub fn construct(
        prompt: &str,
        llm_output: &str,
        page_url: Option<&str>,
    ) -> Result<Self, ParseError> {
        let sections = parser::extract_sections(llm_output)?;
        let action_calls = parser::extract_action_calls(llm_output);
        if action_calls.is_empty() {
            return Err(ParseError::NoActionCall);
        }
        Ok(Self {
            prompt: prompt.to_string(),
            llm_output: llm_output.to_string(),
            observations: sections.observations,
            reasoning: sections.reasoning,
            action_description: sections.action_description,
            action_calls,
            page_url: page_url.map(str::to_string),
            status: TurnStatus::Pending,
            failure: None,
            html_diff: None,
        })
    }

    /// Record a turn whose model output could not be parsed. The failure
    /// detail feeds the next prompt's warning.
    pub fn failed_parse(
        prompt: &str,
        llm_output: &str,
        page_url: Option<&str>,
        error: &TurnError,
    ) -> Self {
        let action_calls = parser::extract_action_calls(llm_output);
        let action_text = action_calls
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(no action call found)".to_string());
        Self {
            prompt: prompt.to_string(),
            llm_output: llm_output.to_string(),
            observations: String::new(),
            reasoning: String::new(),
            action_description: String::new(),
            action_calls,
            page_url: page_url.map(str::to_string),
            status: TurnStatus::Failed,
            failure: Some(TurnFailure {
                action_text,
                error: error.to_string(),
            }),
            html_diff: None,
        }
    }

    /// Fold the executor's verdict into the turn.
    pub fn apply(&mut self, report: ExecutionReport) {
        self.status = report.status;
        self.failure = report.failure;
        self.html_diff = report.html_diff;
    }

    /// All captured calls, one per line.
    pub fn action_calls_text(&self) -> String {
        self.action_calls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "** Observations **\n\nA search page.\n\n\
        ** Reasoning **\n\nSearch for boots.\n\n\
        ** Action **\n\nFill in the query. `fill_text_in_input(id=\"q\", text=\"boots\")`";

    #[test]
    fn constructs_a_pending_turn_from_well_formed_output() {
        let turn = Turn::construct("the prompt", OUTPUT, Some("https://example.com")).unwrap();
        assert_eq!(turn.status, TurnStatus::Pending);
        assert_eq!(turn.action_calls.len(), 1);
        assert_eq!(turn.action_calls[0].name, "fill_text_in_input");
        assert!(turn.observations.contains("search page"));
        assert!(turn.failure.is_none());
    }

    #[test]
    fn output_without_sections_never_yields_a_partial_turn() {
        let err = Turn::construct("p", "just some text go_to_url(url='x')", None).unwrap_err();
        assert!(matches!(err, ParseError::MissingSection(_)));
    }

    #[test]
    fn output_without_a_call_is_a_parse_error() {
        let output = "Observations\nA page.\nReasoning\nThink.\nAction\nNothing to do.";
        let err = Turn::construct("p", output, None).unwrap_err();
        assert!(matches!(err, ParseError::NoActionCall));
    }

    #[test]
    fn failed_parse_records_the_failure_for_the_next_prompt() {
        let turn = Turn::failed_parse(
            "p",
            "no sections here",
            None,
            &TurnError::from(ParseError::MissingSection("Observations")),
        );
        assert_eq!(turn.status, TurnStatus::Failed);
        let failure = turn.failure.unwrap();
        assert!(failure.error.contains("Observations"));
        assert_eq!(failure.action_text, "(no action call found)");
    }

    #[test]
    fn apply_moves_a_pending_turn_to_a_terminal_state() {
        let mut turn = Turn::construct("p", OUTPUT, None).unwrap();
        turn.apply(ExecutionReport {
            status: TurnStatus::NavigatedToNewPage,
            failure: None,
            html_diff: Some("+ <p>".to_string()),
        });
        assert_eq!(turn.status, TurnStatus::NavigatedToNewPage);
        assert_eq!(turn.html_diff.as_deref(), Some("+ <p>"));
    }
}
