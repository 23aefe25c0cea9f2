mod date;
mod filter;
mod serpapi;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::RawReview;

pub use date::normalize;
pub use filter::filter_reviews;
pub use serpapi::SerpApiClient;

/// Where reviews come from.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_reviews(&self, place_id: &str) -> Result<Vec<RawReview>>;

    /// Cheap request proving the credentials work.
    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }
}
