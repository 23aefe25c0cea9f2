use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::ClaudeClient;

const MAX_REVIEWS: usize = 50;

#[async_trait]
pub trait ReviewSummarizer: Send + Sync {
    /// Summarize a store's reviews. An empty string means no summary could be
    /// produced.
    async fn summarize(&self, review_texts: &[String], store_name: &str) -> Result<String>;
}

pub struct ClaudeSummarizer {
    client: Arc<ClaudeClient>,
    language: String,
}

impl ClaudeSummarizer {
    pub fn new(client: Arc<ClaudeClient>, language: impl Into<String>) -> Self {
        Self {
            client,
            language: language.into(),
        }
    }
}

fn system_prompt(language: &str) -> String {
    format!(
        r#"You analyse Google reviews of restaurants for a food ordering app.
Write in {language}. Output only the report itself, with no preamble or closing remarks.
Keep the tone friendly, highlight what makes the restaurant special, and leave out
negative emotion and unrelated content."#
    )
}

fn user_prompt(review_texts: &[String], store_name: &str) -> String {
    let reviews = review_texts
        .iter()
        .take(MAX_REVIEWS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyse these Google reviews of the restaurant "{store_name}".

Reviews:
{reviews}

Use exactly this format:

[Up to 100 words on the cuisine, signature dishes and average price]

## Top5 dishes praised by reviewers
1. [dish] - mentions: [count] - [short summary of what reviewers say]
2. [dish] - mentions: [count] - [short summary of what reviewers say]
3. [dish] - mentions: [count] - [short summary of what reviewers say]
4. [dish] - mentions: [count] - [short summary of what reviewers say]
5. [dish] - mentions: [count] - [short summary of what reviewers say]

If the reviews do not name enough dishes, work with what is there."#
    )
}

#[async_trait]
impl ReviewSummarizer for ClaudeSummarizer {
    async fn summarize(&self, review_texts: &[String], store_name: &str) -> Result<String> {
        if review_texts.is_empty() {
            tracing::warn!("No review text to analyse for {}", store_name);
            return Ok(String::new());
        }

        tracing::info!(
            "Summarizing {} reviews for {}",
            review_texts.len().min(MAX_REVIEWS),
            store_name
        );
        self.client
            .complete(
                &system_prompt(&self.language),
                &user_prompt(review_texts, store_name),
                2048,
            )
            .await
    }
}
