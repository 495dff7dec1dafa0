use std::collections::HashMap;
use std::time::Duration;

use crate::dom;

pub const MAX_TURNS_DEFAULT: usize = 50;

/// Fixed pause after actions presumed to trigger navigation or async
/// rendering, before the next snapshot is taken.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Default per-operation timeout for the browser driver.
pub const BROWSER_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Diffs at or above this many characters are left out of summary prompts.
pub const DIFF_SUMMARY_MAX_CHARS: usize = 19_000;

/// What the agent knows about the open page at the start of a turn.
///
/// Element ids are only valid for the snapshot they were computed from: the
/// index is rebuilt on every capture and any navigation or mutation
/// invalidates the previous one.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub url: Option<String>,
    pub raw_html: Option<String>,
    pub simplified_html: Option<String>,
    pub id_to_xpath: HashMap<String, String>,
}

impl PageSnapshot {
    /// Snapshot for a browser with nothing open yet.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn from_page(url: &str, raw_html: &str) -> Self {
        let (simplified_html, id_to_xpath) = dom::simplify_html(raw_html, true);
        Self {
            url: Some(url.to_string()),
            raw_html: Some(raw_html.to_string()),
            simplified_html: Some(simplified_html),
            id_to_xpath,
        }
    }

    pub fn xpath_for(&self, id: &str) -> Option<&str> {
        self.id_to_xpath.get(id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_snapshot_has_no_page() {
        let snapshot = PageSnapshot::blank();
        assert!(snapshot.url.is_none());
        assert!(snapshot.simplified_html.is_none());
        assert!(snapshot.id_to_xpath.is_empty());
    }

    #[test]
    fn from_page_simplifies_and_indexes() {
        let snapshot = PageSnapshot::from_page(
            "https://example.com",
            "<html><body><button>Go</button></body></html>",
        );
        assert!(snapshot.simplified_html.as_deref().unwrap().contains("<button"));
        assert_eq!(snapshot.xpath_for("1"), Some("/html/body/button"));
    }
}
