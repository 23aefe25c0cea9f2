use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ai::SummaryTranslator;
use crate::db::Repository;
use crate::error::Result;

use super::Pacer;

const MIN_TRANSLATION_CHARS: usize = 10;

/// Translates a store summary into every known language and stores each
/// result, plus the untranslated summary under the source language code.
pub struct TranslationService {
    translator: Arc<dyn SummaryTranslator>,
    pacer: Arc<dyn Pacer>,
    source_language: String,
}

/// Reject translations that are obviously broken: too short, or missing the
/// heading and numbered-list structure of the summary.
fn validate_translation(original: &str, translated: &str) -> std::result::Result<(), &'static str> {
    if translated.trim().chars().count() < MIN_TRANSLATION_CHARS {
        return Err("translation is too short");
    }
    if original.contains("##") && !translated.contains("##") {
        return Err("translation lost the heading markers");
    }
    if original.to_lowercase().contains("top5") && !translated.chars().any(|c| c.is_ascii_digit()) {
        return Err("translation lost the numbered list");
    }
    Ok(())
}

impl TranslationService {
    pub fn new(
        translator: Arc<dyn SummaryTranslator>,
        pacer: Arc<dyn Pacer>,
        source_language: impl Into<String>,
    ) -> Self {
        Self {
            translator,
            pacer,
            source_language: source_language.into(),
        }
    }

    /// Returns the languages that were stored, keyed by code. A failure for one
    /// language only skips that language.
    pub async fn batch_translate_and_save(
        &self,
        repo: &Repository,
        store_id: i64,
        summary: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut saved = BTreeMap::new();
        if summary.trim().is_empty() {
            tracing::warn!("Summary for store {} is empty, nothing to translate", store_id);
            return Ok(saved);
        }

        let languages = repo.get_languages().await?;
        if languages.is_empty() {
            tracing::warn!("No languages configured, skipping translation");
            return Ok(saved);
        }

        let targets: Vec<_> = languages
            .iter()
            .filter(|l| l.lang_code != self.source_language)
            .collect();
        tracing::info!("Translating store {} into {} languages", store_id, targets.len());

        for (i, language) in targets.iter().enumerate() {
            if i > 0 {
                self.pacer.pause().await;
            }

            let translated = match self.translator.translate(summary, language.prompt_name()).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Translation into {} failed: {}", language.lang_code, e);
                    continue;
                }
            };

            if let Err(reason) = validate_translation(summary, &translated) {
                tracing::warn!("Discarding {} translation: {}", language.lang_code, reason);
                continue;
            }

            match repo.upsert_translation(store_id, &language.lang_code, &translated).await {
                Ok(()) => {
                    tracing::info!("Stored {} translation for store {}", language.lang_code, store_id);
                    saved.insert(language.lang_code.clone(), translated);
                }
                Err(e) => tracing::warn!("Storing {} translation failed: {}", language.lang_code, e),
            }
        }

        match repo.upsert_translation(store_id, &self.source_language, summary).await {
            Ok(()) => {
                saved.insert(self.source_language.clone(), summary.to_string());
            }
            Err(e) => tracing::warn!("Storing source summary failed: {}", e),
        }

        tracing::info!("Stored {} language versions for store {}", saved.len(), store_id);
        Ok(saved)
    }
}
