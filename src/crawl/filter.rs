use chrono::{DateTime, Utc};

use crate::models::RawReview;

use super::date::normalize;

/// Keep the reviews newer than `cutoff`, in input order. A review whose date is
/// missing or cannot be parsed is kept.
pub fn filter_reviews(
    reviews: Vec<RawReview>,
    cutoff: DateTime<Utc>,
    reference: DateTime<Utc>,
) -> Vec<RawReview> {
    reviews
        .into_iter()
        .enumerate()
        .filter(|(i, review)| {
            let date = review.date().map(str::trim).unwrap_or("");
            if date.is_empty() {
                tracing::warn!("Review {} has no date, keeping it", i + 1);
                return true;
            }
            match normalize(date, reference) {
                Some(ts) if ts > cutoff => {
                    tracing::debug!("Review {}: {:?} is new", i + 1, date);
                    true
                }
                Some(_) => {
                    tracing::debug!("Review {}: {:?} is older than cutoff", i + 1, date);
                    false
                }
                None => {
                    tracing::warn!("Review {}: cannot parse date {:?}, keeping it", i + 1, date);
                    true
                }
            }
        })
        .map(|(_, review)| review)
        .collect()
}
