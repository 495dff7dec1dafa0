//! The fixed catalog of browser actions the model may call.
//!
//! The catalog is the single source of truth for both the prompt-facing
//! action documentation and argument validation: adding an action means
//! adding one entry here. The page handle and element index are execution
//! context injected by the executor, never part of the prompt-facing
//! signature.

use crate::error::TurnError;
use crate::parser::{self, ActionCall, Literal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    GoToUrl,
    ClickElementById,
    FillTextById,
    SelectOptionsById,
}

impl ActionKind {
    /// Actions assumed to trigger navigation or async UI updates; the
    /// executor settles after these even when the URL did not change.
    pub fn requires_settle(self) -> bool {
        matches!(self, ActionKind::GoToUrl | ActionKind::ClickElementById)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    StrList,
}

impl ParamType {
    /// Type name as shown to the model, which replies with quoted
    /// Python-style literals.
    fn prompt_name(self) -> &'static str {
        match self {
            ParamType::Str => "str",
            ParamType::StrList => "list[str]",
        }
    }
}

pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
}

pub struct ActionSpec {
    pub kind: ActionKind,
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

pub static CATALOG: [ActionSpec; 4] = [
    ActionSpec {
        kind: ActionKind::GoToUrl,
        name: "go_to_url",
        description: "Open a webpage by URL",
        params: &[ParamSpec {
            name: "url",
            ty: ParamType::Str,
        }],
    },
    ActionSpec {
        kind: ActionKind::ClickElementById,
        name: "click_html_element",
        description: "Click an HTML <a> tag or <button> identified by its ID",
        params: &[ParamSpec {
            name: "id",
            ty: ParamType::Str,
        }],
    },
    ActionSpec {
        kind: ActionKind::FillTextById,
        name: "fill_text_in_input",
        description: "Type text into an input or textarea identified by its ID. Important: This function can ONLY be called with an ID that belongs directly to an <input> or <textarea> tag.",
        params: &[
            ParamSpec {
                name: "id",
                ty: ParamType::Str,
            },
            ParamSpec {
                name: "text",
                ty: ParamType::Str,
            },
        ],
    },
    ActionSpec {
        kind: ActionKind::SelectOptionsById,
        name: "choose_dropdown_values",
        description: "Select value(s) for a <select> tag identified by its ID. The `values` list must contain at least one string option to select. Important: This function can ONLY be called with an ID that belongs directly to a <select> tag.",
        params: &[
            ParamSpec {
                name: "id",
                ty: ParamType::Str,
            },
            ParamSpec {
                name: "values",
                ty: ParamType::StrList,
            },
        ],
    },
];

pub fn find(name: &str) -> Option<&'static ActionSpec> {
    CATALOG.iter().find(|action| action.name == name)
}

/// One line per action, embedded verbatim in every prompt.
pub fn format_for_prompt() -> String {
    CATALOG
        .iter()
        .map(|action| {
            let params = action
                .params
                .iter()
                .map(|param| format!("{}: {}", param.name, param.ty.prompt_name()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({}): {}", action.name, params, action.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A fully bound, executable action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    GoToUrl { url: String },
    Click { id: String },
    Fill { id: String, text: String },
    SelectOptions { id: String, values: Vec<String> },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::GoToUrl { .. } => ActionKind::GoToUrl,
            Action::Click { .. } => ActionKind::ClickElementById,
            Action::Fill { .. } => ActionKind::FillTextById,
            Action::SelectOptions { .. } => ActionKind::SelectOptionsById,
        }
    }
}

impl ActionSpec {
    /// Validate a parsed call against this action's schema and bind its
    /// arguments. Nothing touches the browser until this succeeds.
    pub fn bind(&'static self, call: &ActionCall) -> Result<Action, TurnError> {
        let arguments = parser::parse_arguments(&call.args).map_err(|detail| {
            TurnError::BadArguments {
                action: self.name.to_string(),
                detail,
            }
        })?;
        let mut slots: Vec<Option<Literal>> = self.params.iter().map(|_| None).collect();

        let mut next_positional = 0;
        for argument in arguments {
            let index = match &argument.name {
                Some(name) => self
                    .params
                    .iter()
                    .position(|param| param.name == name)
                    .ok_or_else(|| self.bad_args(format!("unknown parameter {name:?}")))?,
                None => {
                    let index = next_positional;
                    next_positional += 1;
                    index
                }
            };
            if index >= slots.len() {
                return Err(self.bad_args(format!(
                    "expected at most {} arguments",
                    self.params.len()
                )));
            }
            if slots[index].is_some() {
                return Err(self.bad_args(format!(
                    "parameter {:?} given more than once",
                    self.params[index].name
                )));
            }
            slots[index] = Some(argument.value);
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = slot
                .ok_or_else(|| self.bad_args(format!("missing parameter {:?}", param.name)))?;
            values.push(self.check_type(param, value)?);
        }

        Ok(self.construct(values))
    }

    fn check_type(&'static self, param: &ParamSpec, value: Literal) -> Result<Literal, TurnError> {
        let ok = match param.ty {
            ParamType::Str => matches!(value, Literal::Str(_)),
            ParamType::StrList => match &value {
                Literal::List(items) => items.iter().all(|item| matches!(item, Literal::Str(_))),
                _ => false,
            },
        };
        if ok {
            Ok(value)
        } else {
            Err(self.bad_args(format!(
                "parameter {:?} expects {}, got {}",
                param.name,
                param.ty.prompt_name(),
                value.type_name()
            )))
        }
    }

    fn construct(&'static self, values: Vec<Literal>) -> Action {
        let mut values = values.into_iter();
        match self.kind {
            ActionKind::GoToUrl => Action::GoToUrl {
                url: take_string(values.next()),
            },
            ActionKind::ClickElementById => Action::Click {
                id: take_string(values.next()),
            },
            ActionKind::FillTextById => Action::Fill {
                id: take_string(values.next()),
                text: take_string(values.next()),
            },
            ActionKind::SelectOptionsById => Action::SelectOptions {
                id: take_string(values.next()),
                values: take_string_list(values.next()),
            },
        }
    }

    fn bad_args(&'static self, detail: String) -> TurnError {
        TurnError::BadArguments {
            action: self.name.to_string(),
            detail,
        }
    }
}

fn take_string(value: Option<Literal>) -> String {
    match value {
        Some(Literal::Str(text)) => text,
        _ => String::new(),
    }
}

fn take_string_list(value: Option<Literal>) -> Vec<String> {
    match value {
        Some(Literal::List(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Literal::Str(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
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

    fn spec(name: &str) -> &'static ActionSpec {
        find(name).unwrap()
    }

    #[test]
    fn catalog_lookup_is_by_exact_name() {
        assert!(find("go_to_url").is_some());
        assert!(find("goto_url").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn only_navigation_and_clicks_settle() {
        let settling: Vec<ActionKind> = CATALOG
            .iter()
            .filter(|action| action.kind.requires_settle())
            .map(|action| action.kind)
            .collect();
        assert_eq!(
            settling,
            vec![ActionKind::GoToUrl, ActionKind::ClickElementById]
        );
    }

    #[test]
    fn prompt_docs_cover_every_action() {
        let docs = format_for_prompt();
        assert!(docs.contains("go_to_url(url: str): Open a webpage by URL"));
        assert!(docs.contains("fill_text_in_input(id: str, text: str)"));
        assert!(docs.contains("choose_dropdown_values(id: str, values: list[str])"));
        assert_eq!(docs.lines().count(), CATALOG.len());
    }

    #[test]
    fn binds_keyword_arguments_in_any_order() {
        let action = spec("fill_text_in_input")
            .bind(&call("fill_text_in_input", "text='hello', id='q'"))
            .unwrap();
        assert_eq!(
            action,
            Action::Fill {
                id: "q".to_string(),
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn binds_positional_arguments() {
        let action = spec("go_to_url")
            .bind(&call("go_to_url", "'https://example.com'"))
            .unwrap();
        assert_eq!(
            action,
            Action::GoToUrl {
                url: "https://example.com".to_string()
            }
        );
    }

    #[test]
    fn binds_a_string_list() {
        let action = spec("choose_dropdown_values")
            .bind(&call("choose_dropdown_values", "id='size', values=['L']"))
            .unwrap();
        assert_eq!(
            action,
            Action::SelectOptions {
                id: "size".to_string(),
                values: vec!["L".to_string()]
            }
        );
    }

    #[test]
    fn missing_parameter_is_a_bad_arguments_error() {
        let err = spec("fill_text_in_input")
            .bind(&call("fill_text_in_input", "id='q'"))
            .unwrap_err();
        assert!(matches!(err, TurnError::BadArguments { .. }));
    }

    #[test]
    fn unknown_parameter_is_a_bad_arguments_error() {
        let err = spec("click_html_element")
            .bind(&call("click_html_element", "selector='a'"))
            .unwrap_err();
        assert!(matches!(err, TurnError::BadArguments { .. }));
    }

    #[test]
    fn too_many_arguments_is_a_bad_arguments_error() {
        let err = spec("click_html_element")
            .bind(&call("click_html_element", "'1', '2'"))
            .unwrap_err();
        assert!(matches!(err, TurnError::BadArguments { .. }));
    }

    #[test]
    fn unquoted_id_is_a_type_error() {
        // The element index is keyed by strings; a bare number never
        // resolves, so it is rejected before the browser is touched.
        let err = spec("click_html_element")
            .bind(&call("click_html_element", "id=5"))
            .unwrap_err();
        assert!(matches!(err, TurnError::BadArguments { .. }));
    }

    #[test]
    fn non_literal_arguments_are_rejected() {
        let err = spec("go_to_url")
            .bind(&call("go_to_url", "url=open('x')"))
            .unwrap_err();
        assert!(matches!(err, TurnError::BadArguments { .. }));
    }
}
