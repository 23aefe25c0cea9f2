use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// A review exactly as returned by the crawl source. The object is kept
/// untouched so the stored payload matches what the API sent; typed fields
/// are read on demand and a field of the wrong type reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawReview(Map<String, Value>);

impl RawReview {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn date(&self) -> Option<&str> {
        self.0.get("date").and_then(Value::as_str)
    }

    pub fn snippet_text(&self) -> &str {
        self.0.get("snippet").and_then(Value::as_str).unwrap_or("")
    }

    pub fn rating(&self) -> Option<f64> {
        self.0.get("rating").and_then(Value::as_f64)
    }

    pub fn likes(&self) -> Option<i64> {
        self.0.get("likes").and_then(Value::as_i64)
    }

    pub fn author_name(&self) -> &str {
        self.0
            .get("user")
            .and_then(|u| u.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("Anonymous")
    }
}

/// A persisted review with the payload fields projected out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReview {
    pub review_id: i64,
    pub author_name: String,
    pub rating: f64,
    pub review_text: String,
    pub review_time: DateTime<Utc>,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CrawlStatus {
    #[default]
    Success,
    NoMatchingReviews,
    Other(String),
}

impl CrawlStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::NoMatchingReviews => "no_matching_reviews",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for CrawlStatus {
    fn from(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "no_matching_reviews" => Self::NoMatchingReviews,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for CrawlStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlLog {
    pub store_id: i64,
    pub last_crawl_time: DateTime<Utc>,
    pub reviews_count: i64,
    pub status: CrawlStatus,
}
