use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::crawl::normalize;
use crate::error::Result;
use crate::models::{CrawlLog, CrawlStatus, Language, RawReview, Store, StoredReview};

use super::schema::SCHEMA;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct Repository {
    pub(super) conn: Connection,
}

// A review ready for insertion, with every fallible conversion already done.
struct PendingReview {
    review_time: String,
    snippet: String,
    author: String,
    payload: String,
    rating: f64,
}

impl Repository {
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Close the underlying connection, surfacing any error SQLite reports.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    // Store operations

    /// Partner stores with a place id, in id order. `only` restricts the list
    /// to a single store.
    pub async fn get_stores(&self, only: Option<i64>) -> Result<Vec<Store>> {
        let stores = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT s.store_id, s.store_name, s.place_id, s.is_partner,
                              s.review_summary, cl.last_crawl_time
                       FROM stores s
                       LEFT JOIN crawl_logs cl ON s.store_id = cl.store_id
                       WHERE s.is_partner = 1
                         AND s.place_id IS NOT NULL AND s.place_id != ''
                         AND (?1 IS NULL OR s.store_id = ?1)
                       ORDER BY s.store_id"#,
                )?;
                let stores = stmt
                    .query_map(params![only], store_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stores)
            })
            .await?;
        tracing::info!("Loaded {} stores", stores.len());
        Ok(stores)
    }

    pub async fn update_store_summary(&self, store_id: i64, summary: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE stores SET review_summary = ?1 WHERE store_id = ?2",
                    params![summary, store_id],
                )?;
                Ok(())
            })
            .await?;
        tracing::info!("Updated review summary for store {}", store_id);
        Ok(())
    }

    // Review operations

    /// Lookup by the dedup key, for inspecting a database from outside a run.
    /// `save_reviews` runs the same check inside its own transaction.
    #[allow(dead_code)]
    pub async fn review_exists(
        &self,
        store_id: i64,
        place_id: &str,
        review_time: DateTime<Utc>,
        snippet: &str,
    ) -> Result<bool> {
        let place_id = place_id.to_string();
        let review_time = format_timestamp(review_time);
        let snippet = snippet.to_string();
        let exists = self
            .conn
            .call(move |conn| Ok(review_exists_in(conn, store_id, &place_id, &review_time, &snippet)?))
            .await?;
        Ok(exists)
    }

    /// Insert the reviews not already stored, in one transaction. Returns the
    /// number of new rows; a failure of the transaction itself rolls back the
    /// whole batch and yields 0.
    pub async fn save_reviews(
        &self,
        store_id: i64,
        place_id: &str,
        reviews: &[RawReview],
        reference: DateTime<Utc>,
    ) -> usize {
        let pending: Vec<PendingReview> = reviews
            .iter()
            .filter_map(|review| {
                let review_time = review
                    .date()
                    .and_then(|d| normalize(d, reference))
                    .unwrap_or(reference);
                match serde_json::to_string(review.as_json()) {
                    Ok(payload) => Some(PendingReview {
                        review_time: format_timestamp(review_time),
                        snippet: review.snippet_text().to_string(),
                        author: review.author_name().to_string(),
                        payload,
                        rating: review.rating().unwrap_or(0.0),
                    }),
                    Err(e) => {
                        tracing::warn!("Cannot encode review payload, skipping: {}", e);
                        None
                    }
                }
            })
            .collect();

        let place_id = place_id.to_string();
        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut saved = 0usize;

                for review in &pending {
                    match review_exists_in(&tx, store_id, &place_id, &review.review_time, &review.snippet) {
                        Ok(true) => {
                            tracing::debug!("Review by {} already stored, skipping", review.author);
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!("Duplicate check failed for review by {}: {}", review.author, e);
                            continue;
                        }
                    }

                    let inserted = tx.execute(
                        r#"INSERT INTO reviews (store_id, place_id, review_data, review_time, rating)
                           VALUES (?1, ?2, ?3, ?4, ?5)"#,
                        params![store_id, place_id, review.payload, review.review_time, review.rating],
                    );
                    match inserted {
                        Ok(_) => saved += 1,
                        Err(e) => tracing::warn!("Failed to store review by {}: {}", review.author, e),
                    }
                }

                tx.commit()?;
                Ok(saved)
            })
            .await;

        match result {
            Ok(saved) => {
                tracing::info!("Saved {} new reviews for store {}", saved, store_id);
                saved
            }
            Err(e) => {
                tracing::error!("Saving reviews for store {} failed, batch rolled back: {}", store_id, e);
                0
            }
        }
    }

    /// All stored reviews of a store, newest first.
    pub async fn get_reviews(&self, store_id: i64) -> Result<Vec<StoredReview>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT review_id, review_data, review_time, rating, created_at
                       FROM reviews
                       WHERE store_id = ?1
                       ORDER BY review_time DESC, review_id DESC"#,
                )?;
                let rows = stmt
                    .query_map(params![store_id], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let reviews: Vec<StoredReview> = rows
            .into_iter()
            .filter_map(|(review_id, data, review_time, rating, created_at)| {
                let raw: RawReview = match serde_json::from_str(&data) {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!("Review {} has an unreadable payload: {}", review_id, e);
                        return None;
                    }
                };
                Some(StoredReview {
                    review_id,
                    author_name: raw.author_name().to_string(),
                    rating,
                    review_text: raw.snippet_text().to_string(),
                    review_time: parse_datetime(&review_time).unwrap_or_else(Utc::now),
                    likes_count: raw.likes().unwrap_or(0),
                    created_at: parse_datetime(&created_at).unwrap_or_else(Utc::now),
                })
            })
            .collect();

        tracing::info!("Loaded {} reviews for store {}", reviews.len(), store_id);
        Ok(reviews)
    }

    // Crawl log operations

    pub async fn update_crawl_log(
        &self,
        store_id: i64,
        reviews_count: usize,
        status: &CrawlStatus,
        crawled_at: DateTime<Utc>,
    ) -> Result<()> {
        let status = status.as_str().to_string();
        let crawled_at = format_timestamp(crawled_at);
        let count = i64::try_from(reviews_count).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO crawl_logs (store_id, last_crawl_time, reviews_count, status)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(store_id) DO UPDATE SET
                           last_crawl_time = excluded.last_crawl_time,
                           reviews_count = excluded.reviews_count,
                           status = excluded.status"#,
                    params![store_id, crawled_at, count, status],
                )?;
                Ok(())
            })
            .await?;
        tracing::info!("Updated crawl log for store {}", store_id);
        Ok(())
    }

    pub async fn get_crawl_log(&self, store_id: i64) -> Result<Option<CrawlLog>> {
        let log = self
            .conn
            .call(move |conn| {
                let log = conn
                    .query_row(
                        "SELECT store_id, last_crawl_time, reviews_count, status FROM crawl_logs WHERE store_id = ?1",
                        params![store_id],
                        |row| {
                            Ok(CrawlLog {
                                store_id: row.get(0)?,
                                last_crawl_time: row
                                    .get::<_, String>(1)
                                    .ok()
                                    .and_then(|s| parse_datetime(&s))
                                    .unwrap_or_else(Utc::now),
                                reviews_count: row.get(2)?,
                                status: CrawlStatus::from(row.get::<_, String>(3)?.as_str()),
                            })
                        },
                    )
                    .optional()?;
                Ok(log)
            })
            .await?;
        Ok(log)
    }

    // Language operations

    pub async fn get_languages(&self) -> Result<Vec<Language>> {
        let languages = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT lang_code, lang_name FROM languages ORDER BY rowid")?;
                let languages = stmt
                    .query_map([], |row| Ok(Language::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(languages)
            })
            .await?;
        tracing::debug!("Loaded {} languages", languages.len());
        Ok(languages)
    }

    /// Insert the given languages, leaving existing codes untouched.
    pub async fn seed_languages(&self, languages: &[(&str, &str)]) -> Result<usize> {
        let languages: Vec<(String, String)> = languages
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                for (code, name) in &languages {
                    inserted += tx.execute(
                        "INSERT OR IGNORE INTO languages (lang_code, lang_name) VALUES (?1, ?2)",
                        params![code, name],
                    )?;
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        if inserted > 0 {
            tracing::info!("Seeded {} languages", inserted);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
impl Repository {
    pub async fn insert_store(&self, name: &str, place_id: &str, is_partner: bool) -> Result<i64> {
        let name = name.to_string();
        let place_id = place_id.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO stores (store_name, place_id, is_partner) VALUES (?1, ?2, ?3)",
                    params![name, place_id, is_partner],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn count_rows(&self, table: &'static str) -> Result<i64> {
        let count: i64 = self
            .conn
            .call(move |conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
            })
            .await?;
        Ok(count)
    }

    pub async fn execute_sql(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn review_exists_in(
    conn: &rusqlite::Connection,
    store_id: i64,
    place_id: &str,
    review_time: &str,
    snippet: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        r#"SELECT EXISTS(
               SELECT 1 FROM reviews
               WHERE store_id = ?1 AND place_id = ?2 AND review_time = ?3
                 AND COALESCE(json_extract(review_data, '$.snippet'), '') = ?4
           )"#,
        params![store_id, place_id, review_time, snippet],
        |row| row.get(0),
    )
}

pub(super) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    None
}

fn store_from_row(row: &Row) -> rusqlite::Result<Store> {
    Ok(Store {
        store_id: row.get(0)?,
        store_name: row.get(1)?,
        place_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        is_partner: row.get::<_, i64>(3)? != 0,
        review_summary: row.get(4)?,
        last_crawl_time: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    fn review(date: &str, snippet: &str) -> RawReview {
        serde_json::from_value(json!({
            "date": date,
            "snippet": snippet,
            "rating": 4,
            "user": {"name": "Lin"},
            "likes": 3
        }))
        .unwrap()
    }

    async fn repo_with_store() -> (Repository, i64) {
        let repo = Repository::open_in_memory().await.unwrap();
        let id = repo.insert_store("Noodle House", "place-1", true).await.unwrap();
        (repo, id)
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let (repo, id) = repo_with_store().await;
        let reviews = vec![review("2 days ago", "tasty"), review("1 week ago", "slow service")];

        assert_eq!(repo.save_reviews(id, "place-1", &reviews, now()).await, 2);
        assert_eq!(repo.save_reviews(id, "place-1", &reviews, now()).await, 0);
        assert_eq!(repo.count_rows("reviews").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicates_within_one_batch_are_saved_once() {
        let (repo, id) = repo_with_store().await;
        let reviews = vec![review("3 hours ago", "same"), review("3 hours ago", "same")];
        assert_eq!(repo.save_reviews(id, "place-1", &reviews, now()).await, 1);
    }

    #[tokio::test]
    async fn different_snippets_at_same_time_are_distinct() {
        let (repo, id) = repo_with_store().await;
        let reviews = vec![review("3 hours ago", "one"), review("3 hours ago", "two")];
        assert_eq!(repo.save_reviews(id, "place-1", &reviews, now()).await, 2);
    }

    #[tokio::test]
    async fn missing_snippet_still_dedups() {
        let (repo, id) = repo_with_store().await;
        let bare: RawReview = serde_json::from_value(json!({"date": "1 day ago"})).unwrap();
        assert_eq!(repo.save_reviews(id, "place-1", &[bare.clone()], now()).await, 1);
        assert_eq!(repo.save_reviews(id, "place-1", &[bare], now()).await, 0);
    }

    #[tokio::test]
    async fn stored_payload_matches_api_json() {
        let (repo, id) = repo_with_store().await;
        let value = json!({
            "date": "2 days ago",
            "snippet": "crispy",
            "rating": 5,
            "likes": 0,
            "user": {"name": "Kai", "thumbnail": "k.png"},
            "review_id": "r-1"
        });
        let review = RawReview::from_value(value.clone()).unwrap();
        repo.save_reviews(id, "place-1", &[review], now()).await;

        let stored: String = repo
            .conn
            .call(|conn| Ok(conn.query_row("SELECT review_data FROM reviews", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&stored).unwrap(), value);
    }

    #[tokio::test]
    async fn wrongly_typed_fields_are_stored_with_defaults() {
        let (repo, id) = repo_with_store().await;
        let review = RawReview::from_value(json!({
            "date": "1 day ago",
            "snippet": "fine",
            "rating": "4.5",
            "likes": "12"
        }))
        .unwrap();
        assert_eq!(repo.save_reviews(id, "place-1", &[review], now()).await, 1);

        let stored = repo.get_reviews(id).await.unwrap();
        assert_eq!(stored[0].rating, 0.0);
        assert_eq!(stored[0].likes_count, 0);
        assert_eq!(stored[0].review_time, now() - TimeDelta::days(1));
    }

    #[tokio::test]
    async fn rejected_review_is_skipped_and_the_rest_saved() {
        let (repo, id) = repo_with_store().await;
        repo.execute_sql(
            "CREATE TRIGGER reject_review BEFORE INSERT ON reviews
             WHEN json_extract(NEW.review_data, '$.snippet') = 'spam'
             BEGIN SELECT RAISE(ABORT, 'review rejected'); END;",
        )
        .await
        .unwrap();

        let reviews = vec![review("1 day ago", "good"), review("2 days ago", "spam"), review("3 days ago", "ok")];
        assert_eq!(repo.save_reviews(id, "place-1", &reviews, now()).await, 2);

        let texts: Vec<String> = repo.get_reviews(id).await.unwrap().into_iter().map(|r| r.review_text).collect();
        assert_eq!(texts, vec!["good", "ok"]);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_the_whole_batch() {
        let (repo, id) = repo_with_store().await;
        // Every insert leaves a dangling deferred foreign key, so COMMIT fails.
        repo.execute_sql(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE review_owners (id INTEGER PRIMARY KEY);
             CREATE TABLE review_claims (
                 owner_id INTEGER REFERENCES review_owners(id) DEFERRABLE INITIALLY DEFERRED
             );
             CREATE TRIGGER claim_review AFTER INSERT ON reviews
             BEGIN INSERT INTO review_claims (owner_id) VALUES (999); END;",
        )
        .await
        .unwrap();

        let reviews = vec![review("1 day ago", "a"), review("2 days ago", "b")];
        assert_eq!(repo.save_reviews(id, "place-1", &reviews, now()).await, 0);
        assert_eq!(repo.count_rows("reviews").await.unwrap(), 0);
        assert_eq!(repo.count_rows("review_claims").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn review_exists_by_dedup_key() {
        let (repo, id) = repo_with_store().await;
        repo.save_reviews(id, "place-1", &[review("2 hours ago", "hot pot")], now())
            .await;
        let ts = now() - TimeDelta::hours(2);
        assert!(repo.review_exists(id, "place-1", ts, "hot pot").await.unwrap());
        assert!(!repo.review_exists(id, "place-1", ts, "other").await.unwrap());
        assert!(!repo.review_exists(id, "place-2", ts, "hot pot").await.unwrap());
    }

    #[tokio::test]
    async fn unparsable_date_is_stored_at_reference_time() {
        let (repo, id) = repo_with_store().await;
        repo.save_reviews(id, "place-1", &[review("invalid", "x")], now()).await;
        let stored = repo.get_reviews(id).await.unwrap();
        assert_eq!(stored[0].review_time, now());
    }

    #[tokio::test]
    async fn get_reviews_projects_payload_newest_first() {
        let (repo, id) = repo_with_store().await;
        let anonymous: RawReview =
            serde_json::from_value(json!({"date": "1 hour ago", "snippet": "fresh"})).unwrap();
        repo.save_reviews(
            id,
            "place-1",
            &[review("1 month ago", "old"), anonymous, review("2 days ago", "mid")],
            now(),
        )
        .await;

        let stored = repo.get_reviews(id).await.unwrap();
        let texts: Vec<&str> = stored.iter().map(|r| r.review_text.as_str()).collect();
        assert_eq!(texts, vec!["fresh", "mid", "old"]);
        assert_eq!(stored[0].author_name, "Anonymous");
        assert_eq!(stored[0].likes_count, 0);
        assert_eq!(stored[0].rating, 0.0);
        assert_eq!(stored[1].author_name, "Lin");
        assert_eq!(stored[1].likes_count, 3);
        assert_eq!(stored[1].rating, 4.0);
    }

    #[tokio::test]
    async fn unreadable_payload_rows_are_skipped() {
        let (repo, id) = repo_with_store().await;
        repo.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO reviews (store_id, place_id, review_data, review_time) VALUES (?1, 'place-1', 'not json', '2025-01-01 00:00:00')",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        repo.save_reviews(id, "place-1", &[review("1 day ago", "good")], now()).await;
        let stored = repo.get_reviews(id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].review_text, "good");
    }

    #[tokio::test]
    async fn crawl_log_upserts_one_row_per_store() {
        let (repo, id) = repo_with_store().await;
        repo.update_crawl_log(id, 5, &CrawlStatus::default(), now()).await.unwrap();
        let later = now() + TimeDelta::days(1);
        repo.update_crawl_log(id, 0, &CrawlStatus::NoMatchingReviews, later)
            .await
            .unwrap();

        assert_eq!(repo.count_rows("crawl_logs").await.unwrap(), 1);
        let log = repo.get_crawl_log(id).await.unwrap().unwrap();
        assert_eq!(log.reviews_count, 0);
        assert_eq!(log.status, CrawlStatus::NoMatchingReviews);
        assert_eq!(log.last_crawl_time, later);
    }

    #[tokio::test]
    async fn get_stores_joins_last_crawl_and_skips_non_partners() {
        let (repo, id) = repo_with_store().await;
        repo.insert_store("Not a partner", "place-2", false).await.unwrap();
        repo.insert_store("No place", "", true).await.unwrap();
        let other = repo.insert_store("Dumplings", "place-3", true).await.unwrap();
        repo.update_crawl_log(id, 1, &CrawlStatus::Success, now()).await.unwrap();

        let stores = repo.get_stores(None).await.unwrap();
        let ids: Vec<i64> = stores.iter().map(|s| s.store_id).collect();
        assert_eq!(ids, vec![id, other]);
        assert_eq!(stores[0].last_crawl_time, Some(now()));
        assert_eq!(stores[1].last_crawl_time, None);

        let only = repo.get_stores(Some(other)).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].store_name, "Dumplings");
    }

    #[tokio::test]
    async fn seeding_languages_is_repeatable() {
        let repo = Repository::open_in_memory().await.unwrap();
        let langs = [("en", "English"), ("ja", "日本語")];
        assert_eq!(repo.seed_languages(&langs).await.unwrap(), 2);
        assert_eq!(repo.seed_languages(&langs).await.unwrap(), 0);
        let codes: Vec<String> = repo
            .get_languages()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.lang_code)
            .collect();
        assert_eq!(codes, vec!["en", "ja"]);
    }

    #[tokio::test]
    async fn store_summary_update() {
        let (repo, id) = repo_with_store().await;
        repo.update_store_summary(id, "## Summary".into()).await.unwrap();
        let stores = repo.get_stores(Some(id)).await.unwrap();
        assert_eq!(stores[0].review_summary.as_deref(), Some("## Summary"));
    }
}
