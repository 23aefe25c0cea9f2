use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

const DEFAULT_SERPAPI_URL: &str = "https://serpapi.com/search.json";
const DEFAULT_LLM_MODEL: &str = "claude-3-5-haiku-20241022";

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub source_language: String,
    pub source_language_name: String,
    pub request_delay_ms: u64,
    pub translation_delay_ms: u64,
    pub seed_languages: bool,
    pub serpapi: SerpApiConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct SerpApiConfig {
    pub api_key: String,
    pub engine: String,
    pub hl: String,
    pub sort_by: String,
    pub review_limit: u32,
    pub base_url: Url,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
}

// On-disk shape. Everything is optional so that validation can report all
// missing fields in one go.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    db_path: Option<String>,
    source_language: Option<String>,
    source_language_name: Option<String>,
    request_delay_ms: Option<u64>,
    translation_delay_ms: Option<u64>,
    seed_languages: Option<bool>,
    #[serde(default)]
    serpapi: RawSerpApi,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Debug, Default, Deserialize)]
struct RawSerpApi {
    api_key: Option<String>,
    engine: Option<String>,
    hl: Option<String>,
    sort_by: Option<String>,
    review_limit: Option<u32>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLlm {
    api_key: Option<String>,
    model: Option<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("place-review-digest");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("reviews.db").to_string_lossy().to_string()
}

fn required(value: Option<String>, name: &str, missing: &mut Vec<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    }
}

impl Config {
    /// Load and validate the config file. A missing file is an error: there is
    /// no usable default for the API keys.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        let mut missing = Vec::new();
        let serpapi_key = required(raw.serpapi.api_key, "serpapi.api_key", &mut missing);
        let llm_key = required(raw.llm.api_key, "llm.api_key", &mut missing);
        if !missing.is_empty() {
            return Err(AppError::MissingSettings(missing));
        }

        let base_url = raw
            .serpapi
            .base_url
            .unwrap_or_else(|| DEFAULT_SERPAPI_URL.to_string());
        let base_url = Url::parse(&base_url)
            .map_err(|e| AppError::Config(format!("serpapi.base_url {base_url:?}: {e}")))?;

        let source_language = raw.source_language.unwrap_or_else(|| "zh-TW".to_string());
        let source_language_name = raw
            .source_language_name
            .unwrap_or_else(|| "Traditional Chinese (Taiwan)".to_string());

        Ok(Self {
            db_path: raw.db_path.unwrap_or_else(default_db_path),
            serpapi: SerpApiConfig {
                api_key: serpapi_key,
                engine: raw
                    .serpapi
                    .engine
                    .unwrap_or_else(|| "google_maps_reviews".to_string()),
                hl: raw.serpapi.hl.unwrap_or_else(|| source_language.clone()),
                sort_by: raw.serpapi.sort_by.unwrap_or_else(|| "newestFirst".to_string()),
                review_limit: raw.serpapi.review_limit.unwrap_or(20),
                base_url,
            },
            llm: LlmConfig {
                api_key: llm_key,
                model: raw.llm.model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            },
            source_language,
            source_language_name,
            request_delay_ms: raw.request_delay_ms.unwrap_or(2000),
            translation_delay_ms: raw.translation_delay_ms.unwrap_or(1000),
            seed_languages: raw.seed_languages.unwrap_or(true),
        })
    }

    pub fn sample() -> &'static str {
        r#"db_path = "reviews.db"
source_language = "zh-TW"

[serpapi]
api_key = "your_serpapi_key"
engine = "google_maps_reviews"
sort_by = "newestFirst"
review_limit = 20

[llm]
api_key = "your_anthropic_key"
"#
    }
}
