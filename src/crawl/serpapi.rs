use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::SerpApiConfig;
use crate::error::{AppError, Result};
use crate::models::RawReview;

use super::ReviewSource;

const SERVICE: &str = "SerpApi";
const CHECK_URL: &str = "https://serpapi.com/search";

pub struct SerpApiClient {
    client: Client,
    config: SerpApiConfig,
}

impl SerpApiClient {
    pub fn new(config: SerpApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    fn reviews_url(&self, place_id: &str) -> Result<Url> {
        let limit = self.config.review_limit.to_string();
        Url::parse_with_params(
            self.config.base_url.as_str(),
            &[
                ("engine", self.config.engine.as_str()),
                ("place_id", place_id),
                ("api_key", self.config.api_key.as_str()),
                ("hl", self.config.hl.as_str()),
                ("sort_by", self.config.sort_by.as_str()),
                ("num", limit.as_str()),
            ],
        )
        .map_err(|e| AppError::Config(format!("cannot build SerpApi URL: {e}")))
    }
}

fn status_error(status: StatusCode, body: &str) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(SERVICE.to_string()),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(SERVICE.to_string()),
        _ => {
            let excerpt: String = body.chars().take(500).collect();
            AppError::unavailable(SERVICE, format!("HTTP {status}: {excerpt}"))
        }
    }
}

/// Pull the `reviews` array out of a SerpApi response body. Entries that are
/// not JSON objects are skipped with a warning; anything inside an object is
/// kept as sent.
fn parse_reviews(data: Value, place_id: &str) -> Result<Vec<RawReview>> {
    if let Some(err) = data.get("error") {
        return Err(AppError::unavailable(SERVICE, err.to_string()));
    }

    let Some(Value::Array(entries)) = data.get("reviews") else {
        let keys: Vec<&String> = data.as_object().map(|o| o.keys().collect()).unwrap_or_default();
        tracing::warn!("No reviews in response for place {} (keys: {:?})", place_id, keys);
        return Ok(Vec::new());
    };

    let reviews = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let review = RawReview::from_value(entry.clone());
            if review.is_none() {
                tracing::warn!("Skipping review {} for place {}: not an object", i + 1, place_id);
            }
            review
        })
        .collect();

    Ok(reviews)
}

#[async_trait]
impl ReviewSource for SerpApiClient {
    async fn fetch_reviews(&self, place_id: &str) -> Result<Vec<RawReview>> {
        tracing::info!(
            "Fetching reviews for place {} (engine={}, hl={}, sort_by={}, num={})",
            place_id,
            self.config.engine,
            self.config.hl,
            self.config.sort_by,
            self.config.review_limit
        );

        let response = self.client.get(self.reviews_url(place_id)?).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("SerpApi returned invalid JSON: {e}")))?;
        let reviews = parse_reviews(data, place_id)?;
        tracing::info!("SerpApi returned {} reviews", reviews.len());
        Ok(reviews)
    }

    async fn check_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(CHECK_URL)
            .query(&[
                ("engine", "google"),
                ("q", "test"),
                ("api_key", self.config.api_key.as_str()),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        tracing::info!("SerpApi check returned HTTP {}", status);
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, &body))
        }
    }
}
