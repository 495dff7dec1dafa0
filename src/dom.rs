//! HTML simplification: reduce raw page markup to a compact, stable,
//! element-addressable view the model can reason about.
//!
//! The raw page is parsed with `scraper` and mirrored into an owned tree so
//! the passes below can mutate it freely:
//!
//!   1. Assign ids to interactive elements that lack one.
//!   2. Build the id -> structural-path index over the full tree.
//!   3. Remove elements that are not visually rendered.
//!   4. Strip non-content containers (head, script, style, ...).
//!   5. Optionally unwrap presentational inline tags and collapse wrapper
//!      elements that add no information.
//!   6. Strip every attribute not on the allow-list.
//!   7. Serialize minified.
//!
//! The index is computed before any element is removed, so paths resolve
//! against the browser's real DOM even for elements pruned from the
//! simplified view.

use std::collections::HashMap;

use scraper::{Html, Node};

const INTERACTIVE_TAGS: [&str; 4] = ["a", "button", "input", "textarea"];

/// Tags the collapse pass never unwraps.
const PROTECTED_TAGS: [&str; 7] = ["body", "img", "a", "input", "textarea", "button", "iframe"];

/// Purely presentational inline tags, unwrapped before collapsing.
const INLINE_TAGS: [&str; 5] = ["span", "b", "i", "strong", "u"];

/// Non-content containers stripped entirely.
pub(crate) const STRIP_TAGS: [&str; 6] = ["head", "script", "style", "link", "template", "meta"];

/// Class/id substrings that commonly indicate hidden content.
const HIDDEN_MARKERS: [&str; 4] = ["hidden", "d-none", "invisible", "display-none"];

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Owned, mutable mirror of the parsed page.
#[derive(Debug, Clone)]
pub enum PageNode {
    Element(PageElement),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct PageElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<PageNode>,
}

impl PageElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn has_direct_text(&self) -> bool {
        self.children.iter().any(|child| match child {
            PageNode::Text(text) => !text.trim().is_empty(),
            PageNode::Element(_) => false,
        })
    }

    fn element_child_count(&self) -> usize {
        self.children
            .iter()
            .filter(|child| matches!(child, PageNode::Element(_)))
            .count()
    }
}

/// Parse raw markup into an owned tree rooted at the `<html>` element.
/// Comments, doctypes and processing instructions are dropped.
pub fn parse(raw_html: &str) -> PageElement {
    let document = Html::parse_document(raw_html);
    document
        .tree
        .root()
        .children()
        .find_map(convert)
        .and_then(|node| match node {
            PageNode::Element(element) => Some(element),
            PageNode::Text(_) => None,
        })
        .unwrap_or_else(|| PageElement {
            tag: "html".to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        })
}

fn convert(node: ego_tree::NodeRef<'_, Node>) -> Option<PageNode> {
    match node.value() {
        Node::Element(element) => Some(PageNode::Element(PageElement {
            tag: element.name().to_string(),
            attrs: element
                .attrs()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            children: node.children().filter_map(convert).collect(),
        })),
        Node::Text(text) => {
            let text: &str = &text.text;
            Some(PageNode::Text(text.to_string()))
        }
        _ => None,
    }
}

/// Simplify raw markup. Returns the minified simplified HTML and the
/// element index mapping short ids to absolute structural paths.
pub fn simplify_html(raw_html: &str, collapse_tags: bool) -> (String, HashMap<String, String>) {
    let mut root = parse(raw_html);

    assign_interactive_ids(&mut root);
    let id_to_xpath = build_element_index(&root);

    remove_hidden(&mut root);
    strip_containers(&mut root);

    if collapse_tags {
        unwrap_inline_tags(&mut root);
        if let Some(body) = find_child_mut(&mut root, "body") {
            collapse_children(body);
        }
    }

    strip_attributes(&mut root);

    (serialize_minified(&root), id_to_xpath)
}

/// Give every interactive element a non-empty id: an existing `name`
/// attribute wins, otherwise a counter value. The counter advances for every
/// interactive element seen, so assigned numeric ids reflect the element's
/// position in the interactive sequence.
fn assign_interactive_ids(root: &mut PageElement) {
    let mut next_id = 1usize;
    assign_ids_rec(root, &mut next_id);
}

fn assign_ids_rec(element: &mut PageElement, next_id: &mut usize) {
    if INTERACTIVE_TAGS.contains(&element.tag.as_str()) {
        if element.attr("id").is_none_or(str::is_empty) {
            let id = match element.attr("name") {
                Some(name) => name.to_string(),
                None => next_id.to_string(),
            };
            element.set_attr("id", &id);
        }
        *next_id += 1;
    }
    for child in &mut element.children {
        if let PageNode::Element(child) = child {
            assign_ids_rec(child, next_id);
        }
    }
}

/// One full traversal computing, for every element carrying an id, a
/// positional path unique among same-tag siblings at each level. The 1-based
/// index is only included when more than one same-named sibling exists.
fn build_element_index(root: &PageElement) -> HashMap<String, String> {
    let mut index = HashMap::new();
    let root_path = format!("/{}", root.tag);
    if let Some(id) = root.attr("id") {
        index.insert(id.to_string(), root_path.clone());
    }
    index_children(root, &root_path, &mut index);
    index
}

fn index_children(parent: &PageElement, parent_path: &str, index: &mut HashMap<String, String>) {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for child in &parent.children {
        if let PageNode::Element(child) = child {
            *totals.entry(child.tag.as_str()).or_default() += 1;
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for child in &parent.children {
        let PageNode::Element(child) = child else {
            continue;
        };
        let position = seen.entry(child.tag.as_str()).or_default();
        *position += 1;
        let segment = if totals[child.tag.as_str()] > 1 {
            format!("{}[{}]", child.tag, position)
        } else {
            child.tag.clone()
        };
        let path = format!("{parent_path}/{segment}");
        if let Some(id) = child.attr("id") {
            index.insert(id.to_string(), path.clone());
        }
        index_children(child, &path, index);
    }
}

fn style_without_whitespace(element: &PageElement) -> Option<String> {
    element
        .attr("style")
        .map(|style| style.chars().filter(|ch| !ch.is_whitespace()).collect())
}

fn is_hidden(element: &PageElement) -> bool {
    if element.tag == "input" && element.attr("type") == Some("hidden") {
        return true;
    }

    if let Some(style) = style_without_whitespace(element) {
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }

    if element.attr("aria-hidden") == Some("true") {
        return true;
    }

    let marked = [element.attr("class"), element.attr("id")]
        .iter()
        .flatten()
        .any(|value| {
            let value = value.to_lowercase();
            HIDDEN_MARKERS.iter().any(|marker| value.contains(marker))
        });
    if marked {
        // An inline display:block overrides the class/id heuristic.
        let overridden = style_without_whitespace(element)
            .is_some_and(|style| style.contains("display:block"));
        if !overridden {
            return true;
        }
    }

    false
}

fn remove_hidden(element: &mut PageElement) {
    element.children.retain(|child| match child {
        PageNode::Element(child) => !is_hidden(child),
        PageNode::Text(_) => true,
    });
    for child in &mut element.children {
        if let PageNode::Element(child) = child {
            remove_hidden(child);
        }
    }
}

pub(crate) fn strip_containers(element: &mut PageElement) {
    element.children.retain(|child| match child {
        PageNode::Element(child) => !STRIP_TAGS.contains(&child.tag.as_str()),
        PageNode::Text(_) => true,
    });
    for child in &mut element.children {
        if let PageNode::Element(child) = child {
            strip_containers(child);
        }
    }
}

/// Replace every presentational inline tag with its children, to a fixed
/// point (unwrapped content is re-examined in place).
fn unwrap_inline_tags(element: &mut PageElement) {
    let mut i = 0;
    while i < element.children.len() {
        let inline = matches!(
            &element.children[i],
            PageNode::Element(child) if INLINE_TAGS.contains(&child.tag.as_str())
        );
        if inline {
            if let PageNode::Element(child) = element.children.remove(i) {
                for (offset, grandchild) in child.children.into_iter().enumerate() {
                    element.children.insert(i + offset, grandchild);
                }
            }
            continue;
        }
        if let PageNode::Element(child) = &mut element.children[i] {
            unwrap_inline_tags(child);
        }
        i += 1;
    }
}

fn find_child_mut<'a>(element: &'a mut PageElement, tag: &str) -> Option<&'a mut PageElement> {
    element.children.iter_mut().find_map(|child| match child {
        PageNode::Element(child) if child.tag == tag => Some(child),
        _ => None,
    })
}

/// A wrapper collapses when it is unprotected, has no aria-label, contains
/// no direct non-whitespace text, and has at most one direct child element.
fn collapsible(element: &PageElement) -> bool {
    !PROTECTED_TAGS.contains(&element.tag.as_str())
        && element.attr("aria-label").is_none()
        && !element.has_direct_text()
        && element.element_child_count() <= 1
}

fn collapse_children(element: &mut PageElement) {
    let mut i = 0;
    while i < element.children.len() {
        let collapse = matches!(
            &element.children[i],
            PageNode::Element(child) if collapsible(child)
        );
        if collapse {
            if let PageNode::Element(child) = element.children.remove(i) {
                for (offset, grandchild) in child.children.into_iter().enumerate() {
                    element.children.insert(i + offset, grandchild);
                }
            }
            // Spliced children are re-examined at the same index.
            continue;
        }
        if let PageNode::Element(child) = &mut element.children[i] {
            collapse_children(child);
        }
        i += 1;
    }
}

fn is_allowed_attribute(tag: &str, attr: &str) -> bool {
    let per_tag: &[&str] = match tag {
        "a" => &["title", "name"],
        "img" => &["alt", "title"],
        "iframe" => &["title"],
        "link" => &["rel"],
        "input" => &[
            "type",
            "name",
            "placeholder",
            "value",
            "checked",
            "disabled",
            "readonly",
            "required",
            "autocomplete",
        ],
        "textarea" => &[
            "name",
            "placeholder",
            "rows",
            "cols",
            "disabled",
            "readonly",
            "required",
        ],
        _ => &[],
    };
    per_tag.contains(&attr) || ["id", "role", "title", "type", "name"].contains(&attr)
}

fn strip_attributes(element: &mut PageElement) {
    let tag = element.tag.clone();
    element
        .attrs
        .retain(|(key, _)| is_allowed_attribute(&tag, key));
    for child in &mut element.children {
        if let PageNode::Element(child) = child {
            strip_attributes(child);
        }
    }
}

pub fn serialize_minified(root: &PageElement) -> String {
    let mut out = String::new();
    write_element(root, &mut out);
    out
}

fn write_element(element: &PageElement, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&element.tag.as_str()) {
        return;
    }

    for child in &element.children {
        match child {
            PageNode::Element(child) => write_element(child, out),
            PageNode::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if !collapsed.trim().is_empty() {
                    out.push_str(&escape_text(collapsed.trim()));
                }
            }
        }
    }

    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !previous_was_space {
                out.push(' ');
            }
            previous_was_space = true;
        } else {
            out.push(ch);
            previous_was_space = false;
        }
    }
    out
}

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
