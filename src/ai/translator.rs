use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::ClaudeClient;

#[async_trait]
pub trait SummaryTranslator: Send + Sync {
    /// Translate `text` into the named language. An empty string means the
    /// translation failed.
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

pub struct ClaudeTranslator {
    client: Arc<ClaudeClient>,
    source_language: String,
}

impl ClaudeTranslator {
    pub fn new(client: Arc<ClaudeClient>, source_language: impl Into<String>) -> Self {
        Self {
            client,
            source_language: source_language.into(),
        }
    }
}

fn translation_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        r#"Translate the following {source_language} restaurant review summary into {target_language}.

{text}

Requirements:
1. Keep the heading format (## heading).
2. Keep the numbered Top5 dish list.
3. Read naturally for a {target_language} speaker.
4. Dish names may keep the original name followed by a {target_language} translation.
5. Leave numbers and counts unchanged.
6. Output only the translation, with no preamble."#
    )
}

#[async_trait]
impl SummaryTranslator for ClaudeTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        tracing::info!("Translating summary into {}", target_language);
        let translated = self
            .client
            .complete(
                "You are a professional translator for restaurant content.",
                &translation_prompt(text, &self.source_language, target_language),
                2048,
            )
            .await?;
        tracing::debug!("Translation into {} is {} chars", target_language, translated.chars().count());
        Ok(translated)
    }
}
