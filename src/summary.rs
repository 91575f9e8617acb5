//! Weekly summarization boundary.
//!
//! The weekly issuer hands a week of entries to a `WeeklySummarizer` and
//! gets back a paragraph plus bullet highlights. The production
//! implementation calls the Anthropic Messages API; tests use the canned
//! one.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::SummaryError;
use crate::journal::JournalEntry;

/// Summarizer output, ready to persist and render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutput {
    pub paragraph: String,
    pub bullet_points: Vec<String>,
    pub model: String,
    /// Rough cost estimate in cents, from token counts.
    pub cost_cents: i64,
}

#[async_trait]
pub trait WeeklySummarizer: Send + Sync {
    async fn summarize(&self, entries: &[JournalEntry]) -> Result<SummaryOutput, SummaryError>;
}

// ── Anthropic implementation ────────────────────────────────────────

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

pub struct AnthropicSummarizer {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicSummarizer {
    pub fn new(api_key: SecretString, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn build_prompt(entries: &[JournalEntry]) -> String {
        let mut prompt = String::from(
            "Below are one person's daily work journal entries for this week. \
             Write a warm second-person recap.\n\
             Respond in exactly this format:\n\
             SUMMARY: <one paragraph>\n\
             BULLETS:\n\
             - <highlight>\n\
             - <highlight>\n\n",
        );
        for entry in entries {
            prompt.push_str(&format!("{}:\n{}\n\n", entry.entry_date, entry.parsed_content));
        }
        prompt
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}

#[async_trait]
impl WeeklySummarizer for AnthropicSummarizer {
    async fn summarize(&self, entries: &[JournalEntry]) -> Result<SummaryOutput, SummaryError> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [{ "role": "user", "content": Self::build_prompt(entries) }],
        });

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| SummaryError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SummaryError::RequestFailed(format!("HTTP {status}: {text}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .content
            .first()
            .map(|b| b.text.clone())
            .ok_or_else(|| SummaryError::InvalidResponse("Empty content".into()))?;

        let (paragraph, bullet_points) = parse_summary_text(&text);
        Ok(SummaryOutput {
            paragraph,
            bullet_points,
            model: parsed.model,
            cost_cents: estimate_cost_cents(parsed.usage.input_tokens, parsed.usage.output_tokens),
        })
    }
}

/// Split a `SUMMARY:`/`BULLETS:` response. Responses that ignore the
/// format fall back to the whole text as the paragraph.
fn parse_summary_text(text: &str) -> (String, Vec<String>) {
    let mut paragraph = String::new();
    let mut bullets = Vec::new();
    let mut in_bullets = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SUMMARY:") {
            paragraph = rest.trim().to_string();
        } else if trimmed.starts_with("BULLETS:") {
            in_bullets = true;
        } else if in_bullets && let Some(rest) = trimmed.strip_prefix('-') {
            let point = rest.trim();
            if !point.is_empty() {
                bullets.push(point.to_string());
            }
        } else if !in_bullets && !paragraph.is_empty() && !trimmed.is_empty() {
            paragraph.push(' ');
            paragraph.push_str(trimmed);
        }
    }

    if paragraph.is_empty() {
        paragraph = text.trim().to_string();
    }
    (paragraph, bullets)
}

/// Haiku-class pricing, rounded up so costs never read as zero.
fn estimate_cost_cents(input_tokens: i64, output_tokens: i64) -> i64 {
    // $1.00 / MTok in, $5.00 / MTok out.
    let cents = input_tokens * 100 / 1_000_000 + output_tokens * 500 / 1_000_000;
    cents.max(1)
}

// ── Canned implementation (tests, offline runs) ─────────────────────

/// Deterministic summarizer for tests and runs without an API key.
pub struct CannedSummarizer;

#[async_trait]
impl WeeklySummarizer for CannedSummarizer {
    async fn summarize(&self, entries: &[JournalEntry]) -> Result<SummaryOutput, SummaryError> {
        let paragraph = format!(
            "You logged {} day{} of progress this week.",
            entries.len(),
            if entries.len() == 1 { "" } else { "s" }
        );
        let bullet_points = entries
            .iter()
            .map(|e| {
                let first_line = e.parsed_content.lines().next().unwrap_or("");
                format!("{}: {}", e.entry_date, first_line)
            })
            .collect();
        Ok(SummaryOutput {
            paragraph,
            bullet_points,
            model: "canned".into(),
            cost_cents: 0,
        })
    }
}
