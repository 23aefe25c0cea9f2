use serde::{Deserialize, Serialize};

/// Languages inserted when `seed_languages` is enabled and the code is absent.
pub const DEFAULT_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ja", "日本語"),
    ("ko", "한국어"),
    ("zh-TW", "繁體中文"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub lang_code: String,
    pub lang_name: String,
}

impl Language {
    pub fn new(lang_code: impl Into<String>, lang_name: impl Into<String>) -> Self {
        Self {
            lang_code: lang_code.into(),
            lang_name: lang_name.into(),
        }
    }

    /// Name used when asking the LLM for a translation. The stored name is
    /// usually the native one, so common codes get an English name instead.
    pub fn prompt_name(&self) -> &str {
        match self.lang_code.as_str() {
            "en" => "English",
            "ja" => "Japanese",
            "ko" => "Korean",
            "zh-TW" => "Traditional Chinese (Taiwan)",
            "zh-CN" => "Simplified Chinese",
            _ => &self.lang_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTranslation {
    pub text: String,
    pub lang_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_name_prefers_english_for_known_codes() {
        assert_eq!(Language::new("ja", "日本語").prompt_name(), "Japanese");
        assert_eq!(Language::new("th", "Thai").prompt_name(), "Thai");
    }
}
