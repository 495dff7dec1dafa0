//! Structural page diffing: what changed between two snapshots of a page,
//! as a line-oriented `+`/`-` listing with unchanged lines dropped.

use similar::{ChangeTag, TextDiff};

use crate::dom::{self, PageElement, PageNode};

/// Diff two raw pages. Both are sanitized and pretty-printed first; the
/// result is empty when there is no structural difference.
pub fn diff_pages(raw_a: &str, raw_b: &str) -> String {
    html_diff(&sanitize_for_diff(raw_a), &sanitize_for_diff(raw_b))
}

/// Strip non-content containers, comments and tabindex attributes, then
/// pretty-print to stable line-oriented text.
pub fn sanitize_for_diff(raw_html: &str) -> String {
    let mut root = dom::parse(raw_html);
    dom::strip_containers(&mut root);
    strip_tabindex(&mut root);
    prettify(&root)
}

fn strip_tabindex(element: &mut PageElement) {
    element.attrs.retain(|(key, _)| key != "tabindex");
    for child in &mut element.children {
        if let PageNode::Element(child) = child {
            strip_tabindex(child);
        }
    }
}

fn prettify(root: &PageElement) -> String {
    let mut lines = Vec::new();
    write_pretty(root, 0, &mut lines);
    lines.join("\n")
}

fn write_pretty(element: &PageElement, depth: usize, lines: &mut Vec<String>) {
    let indent = " ".repeat(depth);
    let mut open = format!("{indent}<{}", element.tag);
    for (key, value) in &element.attrs {
        open.push(' ');
        open.push_str(key);
        open.push_str("=\"");
        open.push_str(&dom::escape_attr(value));
        open.push('"');
    }
    open.push('>');
    lines.push(open);

    for child in &element.children {
        match child {
            PageNode::Element(child) => write_pretty(child, depth + 1, lines),
            PageNode::Text(text) => {
                let collapsed = dom::collapse_whitespace(text);
                let trimmed = collapsed.trim();
                if !trimmed.is_empty() {
                    lines.push(format!("{indent} {}", dom::escape_text(trimmed)));
                }
            }
        }
    }

    lines.push(format!("{indent}</{}>", element.tag));
}

/// Line-level diff of two pretty-printed documents, keeping only added and
/// removed lines.
pub fn html_diff(text_a: &str, text_b: &str) -> String {
    let diff = TextDiff::from_lines(text_a.trim(), text_b.trim());
    let mut changed = Vec::new();
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => changed.push(format!("- {line}")),
            ChangeTag::Insert => changed.push(format!("+ {line}")),
            ChangeTag::Equal => {}
        }
    }
    changed.join("\n")
}
