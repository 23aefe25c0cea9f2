use thiserror::Error;

/// Broad class of an [`AppError`], used by the pipeline to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid settings. Fatal at startup.
    Config,
    /// Crawl, LLM or HTTP failure. Treated as an empty result.
    Connectivity,
    /// Unparseable date or malformed payload. Fail-open.
    Parse,
    /// Database failure. Rolls back the current batch.
    Persistence,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required settings: {}", .0.join(", "))]
    MissingSettings(Vec<String>),

    #[error("Invalid config file: {0}")]
    ConfigDecode(#[from] toml::de::Error),

    #[error("Authentication rejected by {0}")]
    Auth(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::MissingSettings(_) | Self::ConfigDecode(_) => ErrorKind::Config,
            Self::Auth(_) | Self::RateLimited(_) | Self::Unavailable { .. } | Self::Http(_) => {
                ErrorKind::Connectivity
            }
            Self::Parse(_) | Self::Json(_) => ErrorKind::Parse,
            Self::Database(_) | Self::Connection(_) | Self::Io(_) => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_lists_every_field() {
        let err = AppError::MissingSettings(vec![
            "serpapi.api_key".to_string(),
            "llm.api_key".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required settings: serpapi.api_key, llm.api_key"
        );
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn crawl_failures_are_connectivity_errors() {
        assert_eq!(AppError::Auth("SerpApi".into()).kind(), ErrorKind::Connectivity);
        assert_eq!(AppError::RateLimited("SerpApi".into()).kind(), ErrorKind::Connectivity);
        assert_eq!(
            AppError::unavailable("SerpApi", "HTTP 503").kind(),
            ErrorKind::Connectivity
        );
    }

    #[test]
    fn database_errors_are_persistence_errors() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }
}
