//! Append-only record of executed turns, plus the two views of it that feed
//! prompts: the current-page action digest and the model-written progress
//! summary.

use std::time::Duration;

use anyhow::Result;

use crate::brain::Brain;
use crate::turn::{Turn, TurnFailure, TurnStatus};
use crate::types::DIFF_SUMMARY_MAX_CHARS;

#[derive(Debug, Default)]
pub struct TurnHistory {
    turns: Vec<Turn>,
}

impl TurnHistory {
    /// Turns are appended in execution order and never mutated afterwards.
    pub fn save_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn's failure, if it failed. Anything older is
    /// stale and must not warn the model again.
    pub fn last_failure(&self) -> Option<&TurnFailure> {
        self.turns
            .last()
            .filter(|turn| turn.status == TurnStatus::Failed)
            .and_then(|turn| turn.failure.as_ref())
    }

    /// Everything done on the current page: walks backward from the most
    /// recent non-failed turn while turns only modified the page, stopping
    /// at the first navigation or failure. Returns (action call text, action
    /// descriptions), or None if the walk collects nothing.
    pub fn current_page_actions(&self) -> Option<(String, String)> {
        let mut calls = Vec::new();
        let mut descriptions = Vec::new();
        for turn in self
            .turns
            .iter()
            .rev()
            .skip_while(|turn| turn.status == TurnStatus::Failed)
        {
            if turn.status != TurnStatus::ModifiedPage {
                break;
            }
            calls.push(turn.action_calls_text());
            descriptions.push(turn.action_description.clone());
        }
        if calls.is_empty() {
            None
        } else {
            Some((calls.join("\n"), descriptions.join("\n")))
        }
    }

    /// The instruction asking the model to narrate progress so far; None
    /// when there is nothing to narrate. When the most recent turn carries a
    /// small enough diff, the last sentence must describe its outcome.
    pub fn summary_request(&self) -> Option<String> {
        let numbered: Vec<String> = self
            .turns
            .iter()
            .filter(|turn| turn.status != TurnStatus::Failed)
            .enumerate()
            .map(|(i, turn)| format!("{}. {}", i + 1, turn.action_description))
            .collect();
        if numbered.is_empty() {
            return None;
        }
        let turn_history = numbered.join("\n");

        let recent_diff = self.turns.last().and_then(|turn| {
            if turn.status == TurnStatus::Failed {
                return None;
            }
            turn.html_diff
                .as_deref()
                .filter(|diff| !diff.is_empty() && diff.len() < DIFF_SUMMARY_MAX_CHARS)
        });

        Some(match recent_diff {
            Some(diff) => format!(
                "In a paragraph, concisely summarize the following actions taken by the user on a web browser. Address the user as 'you'. The user performed the following actions:\n{turn_history}\n\n Important: in your last sentence, you must describe the outcome of the most recent action based on webpage diff:\n{diff}"
            ),
            None => format!(
                "In a paragraph, concisely summarize the following actions taken by the user on a web browser. Address the user as 'you'. In your last sentence, you must describe the outcome of the action.\n{turn_history}"
            ),
        })
    }

    /// Ask the model for the narrative summary used in the next prompt.
    pub async fn summarize(&self, brain: &mut Brain) -> Result<Option<String>> {
        let Some(request) = self.summary_request() else {
            return Ok(None);
        };
        // Pacing between back-to-back model calls.
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Some(brain.complete(&request).await?))
    }
}
