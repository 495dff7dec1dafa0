//! Prompt assembly. The block order is load-bearing: the failure warning
//! sits directly before the next-action instruction so the model weighs it
//! before deciding again.

use crate::actions;
use crate::history::TurnHistory;
use crate::types::PageSnapshot;

pub fn build(
    task: &str,
    history: &TurnHistory,
    page: &PageSnapshot,
    progress_summary: Option<&str>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "You are a helpful assistant who is interacting with a browser on behalf of the user. \
         Your purpose is to help a user complete the following task:\n{task}\n\n\
         You are a skilled web surfer who is able to perform the following actions to interact \
         with the browser:\n{}",
        actions::format_for_prompt()
    ));

    if let Some(summary) = progress_summary {
        sections.push(format!(
            "Previously, you have already performed the following actions: {summary}"
        ));
    }

    if let Some(failure) = history.last_failure() {
        sections.push(format!(
            "Important: In the previous turn, you tried to perform the following action and it \
             failed:\n{}\nThe exception was: {}\nImportant: This action didn't work, so DO NOT \
             perform it again.",
            failure.action_text, failure.error
        ));
    }

    sections.push(format!(
        "You must carefully read over the current webpage's HTML, and based on the current state \
         of the webpage and the progress that has already been made, decide the single most \
         logical next action to take to help advance in achieving the task: {task}.\n\n\
         Your response must be in the following format with sections named Observations, \
         Reasoning, and Action:\n\
         ```\n\
         ** Observations **\n\n\
         Carefully read the HTML of the current webpage. Based on the HTML, explain the purpose \
         of the webpage and identify the important HTML elements.\n\n\
         ** Reasoning **\n\n\
         Think critically about what action you can perform on the HTML to help advance in the \
         user task. In your reasoning process, it is critical to take into account BOTH the HTML \
         contents and the progress you have already made in completing the task. You MUST explain \
         why the action you choose makes sense given the previous actions that have already been \
         performed. If the current webpage will not help you advance in the task, feel free to go \
         to a different URL. Important: You may only select a single action to take, and you must \
         not call multiple actions.\n\n\
         ** Action **\n\n\
         Describe the action you will perform to the user. Then, in a new line, call the action \
         in the following format: action_name(param_name=\"argument\")\n\
         ```"
    ));

    match (&page.url, &page.simplified_html) {
        (Some(url), Some(html)) => sections.push(format!(
            "The webpage {url} is open. Carefully analyze the HTML, and based on the HTML \
             contents, determine the next action to take to help the user get closer to \
             achieving their task. The HTML of the current webpage is:\n```\n{html}\n```"
        )),
        _ => sections.push(
            "Currently, the browser is empty. You must begin by navigating to a url. Think about \
             how a real human would start to perform the task."
                .to_string(),
        ),
    }

    sections.push("Analyze the HTML and return your Observations, Reasoning, and Action.".to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ActionCall;
    use crate::turn::{Turn, TurnFailure, TurnStatus};

    fn failed_turn() -> Turn {
        Turn {
            prompt: String::new(),
            llm_output: String::new(),
            observations: String::new(),
            reasoning: String::new(),
            action_description: String::new(),
            action_calls: vec![ActionCall {
                name: "click_html_element".to_string(),
                args: "id='9'".to_string(),
                raw: "click_html_element(id='9')".to_string(),
            }],
            page_url: None,
            status: TurnStatus::Failed,
            failure: Some(TurnFailure {
                action_text: "click_html_element(id='9')".to_string(),
                error: "no element with id \"9\"".to_string(),
            }),
            html_diff: None,
        }
    }

    fn success_turn() -> Turn {
        Turn {
            action_description: "Filled the search box".to_string(),
            status: TurnStatus::ModifiedPage,
            failure: None,
            ..failed_turn()
        }
    }

    #[test]
    fn blank_browser_asks_for_a_starting_url() {
        let prompt = build("buy socks", &TurnHistory::default(), &PageSnapshot::blank(), None);
        assert!(prompt.contains("the browser is empty"));
        assert!(prompt.contains("buy socks"));
        assert!(prompt.contains("go_to_url(url: str)"));
        assert!(!prompt.contains("Previously, you have already performed"));
    }

    #[test]
    fn open_page_embeds_the_simplified_html() {
        let page = PageSnapshot::from_page(
            "https://example.com",
            "<html><body><button>Go</button></body></html>",
        );
        let prompt = build("buy socks", &TurnHistory::default(), &page, None);
        assert!(prompt.contains("The webpage https://example.com is open"));
        assert!(prompt.contains("<button id=\"1\">Go</button>"));
    }

    #[test]
    fn failure_warning_appears_right_before_the_instruction() {
        let mut history = TurnHistory::default();
        history.save_turn(failed_turn());

        let prompt = build("buy socks", &history, &PageSnapshot::blank(), None);
        let warning = prompt.find("DO NOT perform it again").unwrap();
        let instruction = prompt.find("decide the single most logical next action").unwrap();
        assert!(prompt.contains("click_html_element(id='9')"));
        assert!(warning < instruction);
    }

    #[test]
    fn no_stale_warning_after_a_successful_turn() {
        let mut history = TurnHistory::default();
        history.save_turn(failed_turn());
        history.save_turn(success_turn());

        let prompt = build("buy socks", &history, &PageSnapshot::blank(), None);
        assert!(!prompt.contains("DO NOT perform it again"));
    }

    #[test]
    fn progress_summary_is_embedded_when_present() {
        let prompt = build(
            "buy socks",
            &TurnHistory::default(),
            &PageSnapshot::blank(),
            Some("You opened the store and searched for socks."),
        );
        assert!(prompt.contains("Previously, you have already performed the following actions: You opened the store"));
    }
}
