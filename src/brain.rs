//! Model boundary: one prompt in, one completion out, with usage and cost
//! accounted per call.

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

const MODEL: &str = "gemini-pro";
const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f64 = 0.3;
const MAX_OUTPUT_TOKENS: u32 = 2048;

const INPUT_COST_PER_1K_CHARS: f64 = 0.00025;
const OUTPUT_COST_PER_1K_CHARS: f64 = 0.0005;

/// Character-counted usage for the run, with a linear cost model.
#[derive(Debug, Default, Clone, Copy)]
pub struct Usage {
    pub input_char_count: usize,
    pub output_char_count: usize,
}

impl Usage {
    /// Account one call; returns its cost.
    pub fn increment(&mut self, prompt: &str, llm_output: &str) -> f64 {
        let input_chars = prompt.chars().count();
        let output_chars = llm_output.chars().count();
        self.input_char_count += input_chars;
        self.output_char_count += output_chars;

        let turn_cost = cost(input_chars, output_chars);
        info!(
            "turn cost: ${turn_cost:.6}, total cost: ${:.6}",
            self.total_cost()
        );
        turn_cost
    }

    pub fn total_cost(&self) -> f64 {
        cost(self.input_char_count, self.output_char_count)
    }
}

fn cost(input_chars: usize, output_chars: usize) -> f64 {
    input_chars as f64 * INPUT_COST_PER_1K_CHARS / 1000.0
        + output_chars as f64 * OUTPUT_COST_PER_1K_CHARS / 1000.0
}

pub struct Brain {
    client: Client,
    api_key: String,
    usage: Usage,
}

impl Brain {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("GEMINI_PRO_API_KEY")
            .map_err(|_| anyhow!("GEMINI_PRO_API_KEY not set in environment"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            usage: Usage::default(),
        })
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// One-shot completion. Usage is accounted on success.
    pub async fn complete(&mut self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{ENDPOINT}/{MODEL}:generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "topP": 1,
                    "topK": 1,
                    "maxOutputTokens": MAX_OUTPUT_TOKENS,
                },
            }))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error");
            return Err(anyhow!("Gemini API error ({status}): {message}"));
        }

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("no text in model response: {body}"))?;
        debug!("model output:\n{text}");

        self.usage.increment(prompt, text);
        Ok(text.to_string())
    }
}
