use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub store_id: i64,
    pub store_name: String,
    pub place_id: String,
    pub is_partner: bool,
    /// Time of the last recorded crawl, from `crawl_logs`.
    pub last_crawl_time: Option<DateTime<Utc>>,
    pub review_summary: Option<String>,
}
