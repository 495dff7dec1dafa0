//! Parsing of free-text model output: the three labeled sections, the
//! call-shaped substrings, and a literal-only argument evaluator. Nothing
//! here ever executes model-provided text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::ParseError;

static OBSERVATIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Observations([\s\S]*)Reasoning").expect("valid regex"));
static REASONING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Reasoning([\s\S]*)Action").expect("valid regex"));
static CALL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+\(.*\)").expect("valid regex"));
static CALL_PARTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\((.*)\)").expect("valid regex"));
static ACTION_DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action \*\*([\s\S]*)`").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct Sections {
    pub observations: String,
    pub reasoning: String,
    pub action_description: String,
}

/// Extract the Observations / Reasoning / Action sections. The two capture
/// patterns jointly require the three markers to appear in order; a missing
/// marker is a parse failure, never a silent default.
pub fn extract_sections(output: &str) -> Result<Sections, ParseError> {
    let observations = capture(&OBSERVATIONS_RE, output)
        .ok_or(ParseError::MissingSection("Observations"))?;
    let reasoning =
        capture(&REASONING_RE, output).ok_or(ParseError::MissingSection("Reasoning"))?;

    // The description sits between `Action **` and a backtick; when that
    // shape is absent, reuse the reasoning text.
    let action_description = match ACTION_DESCRIPTION_RE.captures(output) {
        Some(captures) => captures[1].trim().replace('`', ""),
        None => reasoning.clone(),
    };

    Ok(Sections {
        observations,
        reasoning,
        action_description,
    })
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
}

/// One call-shaped substring found in model output. A malformed call keeps
/// its raw text with an empty name; it will fail catalog lookup if it is
/// ever the call selected for execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionCall {
    pub name: String,
    pub args: String,
    pub raw: String,
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.raw)
        } else {
            write!(f, "{}({})", self.name, self.args)
        }
    }
}

/// Find every call-shaped substring, in discovery order.
pub fn extract_action_calls(output: &str) -> Vec<ActionCall> {
    CALL_RE
        .find_iter(output)
        .map(|found| {
            let raw = found.as_str().to_string();
            match CALL_PARTS_RE.captures(&raw) {
                Some(captures) => ActionCall {
                    name: captures[1].to_string(),
                    args: captures[2].to_string(),
                    raw,
                },
                None => ActionCall {
                    name: String::new(),
                    args: String::new(),
                    raw,
                },
            }
        })
        .collect()
}

/// A decoded literal value. The evaluator understands strings, numbers,
/// booleans and lists of those, and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Literal>),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Str(_) => "str",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "bool",
            Literal::List(_) => "list",
        }
    }
}

/// One argument of a call: positional, or keyword when the part carried an
/// unquoted `=`.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Literal,
}

/// Parse a call's argument text into positional and keyword arguments.
pub fn parse_arguments(args: &str) -> Result<Vec<Argument>, String> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    split_arguments(trimmed)
        .into_iter()
        .map(|part| match split_keyword(&part) {
            Some((name, value)) => Ok(Argument {
                name: Some(name),
                value: parse_literal(&value)?,
            }),
            None => Ok(Argument {
                name: None,
                value: parse_literal(&part)?,
            }),
        })
        .collect()
}

/// Split on commas that are not inside a quoted string: a single pass
/// tracking quote-toggle state.
fn split_arguments(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buffer = String::new();
    let mut inside_quotes = false;
    for ch in args.chars() {
        match ch {
            '\'' | '"' => {
                inside_quotes = !inside_quotes;
                buffer.push(ch);
            }
            ',' if !inside_quotes => {
                parts.push(buffer.trim().to_string());
                buffer.clear();
            }
            _ => buffer.push(ch),
        }
    }
    parts.push(buffer.trim().to_string());
    parts
}

/// Split `name=value` at the first `=` outside quotes, if any.
fn split_keyword(part: &str) -> Option<(String, String)> {
    let mut inside_quotes = false;
    for (i, ch) in part.char_indices() {
        match ch {
            '\'' | '"' => inside_quotes = !inside_quotes,
            '=' if !inside_quotes => {
                return Some((
                    part[..i].trim().to_string(),
                    part[i + 1..].trim().to_string(),
                ));
            }
            _ => {}
        }
    }
    None
}

/// Decode a single literal. Fails on anything that is not a plain string,
/// number, boolean or list literal.
pub fn parse_literal(text: &str) -> Result<Literal, String> {
    let (value, rest) = lex_literal(text.trim())?;
    if !rest.trim().is_empty() {
        return Err(format!("trailing input after literal: {rest:?}"));
    }
    Ok(value)
}

fn lex_literal(text: &str) -> Result<(Literal, &str), String> {
    let text = text.trim_start();
    match text.chars().next() {
        Some('\'') | Some('"') => lex_string(text),
        Some('[') => lex_list(text),
        Some(ch) if ch.is_ascii_digit() || ch == '-' || ch == '+' => lex_number(text),
        _ => {
            for (word, value) in [("True", true), ("true", true), ("False", false), ("false", false)]
            {
                if let Some(rest) = text.strip_prefix(word) {
                    return Ok((Literal::Bool(value), rest));
                }
            }
            Err(format!("not a literal: {text:?}"))
        }
    }
}

fn lex_string(text: &str) -> Result<(Literal, &str), String> {
    let Some(quote) = text.chars().next() else {
        return Err("empty string literal".to_string());
    };
    let mut value = String::new();
    let mut escaped = false;
    for (i, ch) in text.char_indices().skip(1) {
        if escaped {
            match ch {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                '\\' | '\'' | '"' => value.push(ch),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((Literal::Str(value), &text[i + ch.len_utf8()..]));
        } else {
            value.push(ch);
        }
    }
    Err("unterminated string literal".to_string())
}

fn lex_list(text: &str) -> Result<(Literal, &str), String> {
    let mut rest = &text[1..];
    let mut items = Vec::new();
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix(']') {
            return Ok((Literal::List(items), after));
        }
        if rest.is_empty() {
            return Err("unterminated list literal".to_string());
        }
        let (item, remainder) = lex_literal(rest)?;
        items.push(item);
        rest = remainder.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
        } else if !rest.starts_with(']') {
            return Err(format!("expected ',' or ']' in list, found {rest:?}"));
        }
    }
}

fn lex_number(text: &str) -> Result<(Literal, &str), String> {
    let end = text
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit() && !matches!(ch, '+' | '-' | '.' | 'e' | 'E'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (digits, rest) = text.split_at(end);
    if let Ok(value) = digits.parse::<i64>() {
        return Ok((Literal::Int(value), rest));
    }
    if let Ok(value) = digits.parse::<f64>() {
        return Ok((Literal::Float(value), rest));
    }
    Err(format!("not a number: {digits:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "** Observations **\n\nThe page shows a search box.\n\n\
        ** Reasoning **\n\nI should search for the product.\n\n\
        ** Action **\n\nI will type the query. `fill_text_in_input(id=\"q\", text=\"rust\")`";

    #[test]
    fn extracts_all_three_sections() {
        let sections = extract_sections(OUTPUT).unwrap();
        assert!(sections.observations.contains("search box"));
        assert!(sections.reasoning.contains("search for the product"));
        assert!(sections.action_description.contains("I will type the query."));
        assert!(!sections.action_description.contains('`'));
    }

    #[test]
    fn missing_observations_is_a_parse_error() {
        let err = extract_sections("** Reasoning **\nx\n** Action **\ny").unwrap_err();
        assert!(matches!(err, ParseError::MissingSection("Observations")));
    }

    #[test]
    fn missing_action_marker_is_a_parse_error() {
        let err = extract_sections("** Observations **\nx\n** Reasoning **\ny").unwrap_err();
        assert!(matches!(err, ParseError::MissingSection(_)));
    }

    #[test]
    fn action_description_falls_back_to_reasoning() {
        let output = "Observations\nA page.\nReasoning\nClick the link.\nAction\nclick_html_element(id='3')";
        let sections = extract_sections(output).unwrap();
        assert_eq!(sections.action_description, sections.reasoning);
    }

    #[test]
    fn finds_the_action_call() {
        let calls = extract_action_calls(OUTPUT);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "fill_text_in_input");
        assert_eq!(calls[0].args, "id=\"q\", text=\"rust\"");
    }

    #[test]
    fn captures_multiple_calls_in_discovery_order() {
        let output = "go_to_url(url='https://a.example')\nclick_html_element(id='2')";
        let calls = extract_action_calls(output);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "go_to_url");
        assert_eq!(calls[1].name, "click_html_element");
    }

    #[test]
    fn malformed_second_call_is_kept_without_crashing() {
        let output = "click_html_element(id='1')\n((broken)";
        let calls = extract_action_calls(output);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "click_html_element");
        assert!(calls[1].name.is_empty());
        assert_eq!(calls[1].raw, "((broken)");
    }

    #[test]
    fn splits_keyword_and_positional_arguments() {
        let args = parse_arguments("'5', text='hello'").unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].name, None);
        assert_eq!(args[0].value, Literal::Str("5".to_string()));
        assert_eq!(args[1].name.as_deref(), Some("text"));
        assert_eq!(args[1].value, Literal::Str("hello".to_string()));
    }

    #[test]
    fn commas_inside_quotes_do_not_split() {
        let args = parse_arguments("id='3', text='a, b'").unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].value, Literal::Str("a, b".to_string()));
    }

    #[test]
    fn equals_inside_quotes_stays_positional() {
        let args = parse_arguments("'a=b'").unwrap();
        assert_eq!(args[0].name, None);
        assert_eq!(args[0].value, Literal::Str("a=b".to_string()));
    }

    #[test]
    fn decodes_the_literal_grammar() {
        assert_eq!(parse_literal("'x'").unwrap(), Literal::Str("x".to_string()));
        assert_eq!(parse_literal("\"x\"").unwrap(), Literal::Str("x".to_string()));
        assert_eq!(parse_literal("7").unwrap(), Literal::Int(7));
        assert_eq!(parse_literal("-3").unwrap(), Literal::Int(-3));
        assert_eq!(parse_literal("2.5").unwrap(), Literal::Float(2.5));
        assert_eq!(parse_literal("True").unwrap(), Literal::Bool(true));
        assert_eq!(parse_literal("false").unwrap(), Literal::Bool(false));
        assert_eq!(
            parse_literal("['a']").unwrap(),
            Literal::List(vec![Literal::Str("a".to_string())])
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            parse_literal(r"'it\'s'").unwrap(),
            Literal::Str("it's".to_string())
        );
        assert_eq!(
            parse_literal(r"'a\nb'").unwrap(),
            Literal::Str("a\nb".to_string())
        );
    }

    #[test]
    fn rejects_non_literals() {
        assert!(parse_literal("__import__('os')").is_err());
        assert!(parse_literal("'unterminated").is_err());
        assert!(parse_literal("'x' extra").is_err());
        assert!(parse_literal("[1,").is_err());
    }
}
