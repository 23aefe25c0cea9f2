use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::Instrument;

use crate::ai::{ClaudeClient, ClaudeSummarizer, ClaudeTranslator, ReviewSummarizer};
use crate::config::Config;
use crate::crawl::{filter_reviews, ReviewSource, SerpApiClient};
use crate::db::Repository;
use crate::error::Result;
use crate::models::{CrawlLog, CrawlStatus, Store, StoredReview, StoredTranslation, DEFAULT_LANGUAGES};
use crate::services::{FixedDelay, Pacer, TranslationService};

/// How far back a first or forced crawl looks.
const FULL_HISTORY_DAYS: i64 = 365;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub force: bool,
    pub only_store: Option<i64>,
}

/// Progress of one store through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    CutoffDecided,
    Crawled,
    Filtered,
    Persisted,
    Summarized,
    Translated,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::CutoffDecided => "cutoff decided",
            Self::Crawled => "crawled",
            Self::Filtered => "filtered",
            Self::Persisted => "persisted",
            Self::Summarized => "summarized",
            Self::Translated => "translated",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// First crawl or forced re-crawl.
    FullHistory(DateTime<Utc>),
    /// Everything after the previous crawl.
    Incremental(DateTime<Utc>),
}

impl Cutoff {
    pub fn at(self) -> DateTime<Utc> {
        match self {
            Self::FullHistory(t) | Self::Incremental(t) => t,
        }
    }
}

pub fn decide_cutoff(force: bool, last_crawl: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Cutoff {
    let full = || Cutoff::FullHistory(now - TimeDelta::days(FULL_HISTORY_DAYS));
    match last_crawl {
        _ if force => full(),
        None => full(),
        Some(last) => Cutoff::Incremental(last),
    }
}

#[derive(Debug, Clone)]
pub struct StoreReport {
    pub store_id: i64,
    pub store_name: String,
    pub stage: Stage,
    pub fetched: usize,
    pub kept: usize,
    pub saved: usize,
    pub summarized: bool,
    pub translations: usize,
    /// Stage in progress and message, when processing failed.
    pub error: Option<(Stage, String)>,
}

impl StoreReport {
    fn new(store: &Store) -> Self {
        Self {
            store_id: store.store_id,
            store_name: store.store_name.clone(),
            stage: Stage::Init,
            fetched: 0,
            kept: 0,
            saved: 0,
            summarized: false,
            translations: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stores: Vec<StoreReport>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.stores.iter().filter(|s| s.stage == Stage::Error).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreInspection {
    pub store_id: i64,
    pub crawl_log: Option<CrawlLog>,
    pub translations: BTreeMap<String, StoredTranslation>,
}

async fn close_quietly(repo: Repository) {
    if let Err(e) = repo.close().await {
        tracing::warn!("Closing database failed: {}", e);
    }
}

pub struct App {
    source: Arc<dyn ReviewSource>,
    summarizer: Arc<dyn ReviewSummarizer>,
    translations: TranslationService,
    pacer: Arc<dyn Pacer>,
    db_path: String,
    seed_languages: bool,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let claude = Arc::new(ClaudeClient::new(&config.llm)?);
        let source = Arc::new(SerpApiClient::new(config.serpapi.clone())?);
        let summarizer = Arc::new(ClaudeSummarizer::new(
            claude.clone(),
            config.source_language_name.clone(),
        ));
        let translator = Arc::new(ClaudeTranslator::new(claude, config.source_language_name.clone()));
        let translations = TranslationService::new(
            translator,
            Arc::new(FixedDelay::from_millis(config.translation_delay_ms)),
            config.source_language.clone(),
        );

        let mut app = Self::with_parts(
            source,
            summarizer,
            translations,
            Arc::new(FixedDelay::from_millis(config.request_delay_ms)),
        );
        app.db_path = config.db_path.clone();
        app.seed_languages = config.seed_languages;
        Ok(app)
    }

    pub fn with_parts(
        source: Arc<dyn ReviewSource>,
        summarizer: Arc<dyn ReviewSummarizer>,
        translations: TranslationService,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            source,
            summarizer,
            translations,
            pacer,
            db_path: String::new(),
            seed_languages: false,
        }
    }

    pub async fn check_connection(&self) -> Result<()> {
        self.source.check_connection().await
    }

    /// Check the review API, then open the database, process every store, and
    /// close the database again whatever the outcome. An unreachable review API
    /// aborts the run before any store is touched.
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        if let Err(e) = self.check_connection().await {
            tracing::error!("Review API check failed ({:?}), aborting run", e.kind());
            return Err(e);
        }

        let repo = Repository::open(&self.db_path).await?;
        let result = self.run_with(&repo, options, Utc::now()).await;
        close_quietly(repo).await;
        result
    }

    /// Last crawl and stored translations of one store.
    pub async fn inspect_store(&self, store_id: i64) -> Result<StoreInspection> {
        let repo = Repository::open(&self.db_path).await?;
        let result: Result<StoreInspection> = async {
            Ok(StoreInspection {
                store_id,
                crawl_log: repo.get_crawl_log(store_id).await?,
                translations: repo.get_all_translations(store_id).await?,
            })
        }
        .await;
        close_quietly(repo).await;
        result
    }

    pub async fn stored_translation(&self, store_id: i64, lang_code: &str) -> Result<Option<String>> {
        let repo = Repository::open(&self.db_path).await?;
        let result = repo.get_translation(store_id, lang_code).await;
        close_quietly(repo).await;
        result
    }

    pub async fn run_with(&self, repo: &Repository, options: &RunOptions, now: DateTime<Utc>) -> Result<RunReport> {
        tracing::info!("Starting review run (force={})", options.force);

        if self.seed_languages {
            if let Err(e) = repo.seed_languages(DEFAULT_LANGUAGES).await {
                tracing::warn!("Seeding languages failed: {}", e);
            }
        }

        let stores = repo.get_stores(options.only_store).await?;
        if stores.is_empty() {
            tracing::warn!("No stores to process");
        }

        let mut report = RunReport::default();
        for (i, store) in stores.iter().enumerate() {
            if i > 0 {
                self.pacer.pause().await;
            }
            let span = tracing::info_span!("store", id = store.store_id, name = %store.store_name);
            let store_report = self
                .process_store(repo, store, options.force, now)
                .instrument(span)
                .await;
            report.stores.push(store_report);
        }

        tracing::info!(
            "Finished {} stores ({} failed)",
            report.stores.len(),
            report.failed()
        );
        Ok(report)
    }

    async fn process_store(&self, repo: &Repository, store: &Store, force: bool, now: DateTime<Utc>) -> StoreReport {
        let mut report = StoreReport::new(store);
        tracing::info!("Processing store {} ({})", store.store_name, store.store_id);

        match self.advance(repo, store, force, now, &mut report).await {
            Ok(()) => {
                report.stage = Stage::Done;
                tracing::info!("Store {} done", store.store_name);
            }
            Err(e) => {
                tracing::error!("Store {} failed after stage {}: {}", store.store_name, report.stage, e);
                report.error = Some((report.stage, e.to_string()));
                report.stage = Stage::Error;
            }
        }
        report
    }

    async fn advance(
        &self,
        repo: &Repository,
        store: &Store,
        force: bool,
        now: DateTime<Utc>,
        report: &mut StoreReport,
    ) -> Result<()> {
        let cutoff = decide_cutoff(force, store.last_crawl_time, now);
        match cutoff {
            Cutoff::FullHistory(t) if force => tracing::info!("Forced crawl, taking reviews after {}", t),
            Cutoff::FullHistory(t) => tracing::info!("First crawl, taking reviews after {}", t),
            Cutoff::Incremental(t) => tracing::info!("Taking reviews after last crawl at {}", t),
        }
        report.stage = Stage::CutoffDecided;

        let fetched = match self.source.fetch_reviews(&store.place_id).await {
            Ok(reviews) => reviews,
            Err(e) => {
                tracing::warn!("Crawl failed ({:?}), treating as no reviews: {}", e.kind(), e);
                Vec::new()
            }
        };
        report.fetched = fetched.len();
        report.stage = Stage::Crawled;

        let kept = filter_reviews(fetched, cutoff.at(), now);
        report.kept = kept.len();
        report.stage = Stage::Filtered;
        tracing::info!("{} of {} reviews are new", report.kept, report.fetched);

        if kept.is_empty() {
            repo.update_crawl_log(store.store_id, 0, &CrawlStatus::NoMatchingReviews, now)
                .await?;
            report.stage = Stage::Persisted;

            let existing = repo.get_reviews(store.store_id).await?;
            if !existing.is_empty() {
                tracing::info!("No new reviews, re-summarizing {} stored ones", existing.len());
                self.summarize_and_translate(repo, store, &existing, report).await?;
            }
            return Ok(());
        }

        report.saved = repo
            .save_reviews(store.store_id, &store.place_id, &kept, now)
            .await;
        repo.update_crawl_log(store.store_id, report.saved, &CrawlStatus::Success, now)
            .await?;
        report.stage = Stage::Persisted;

        let all = repo.get_reviews(store.store_id).await?;
        if all.is_empty() {
            tracing::warn!("Store {} has no reviews to analyse", store.store_name);
            return Ok(());
        }
        self.summarize_and_translate(repo, store, &all, report).await
    }

    async fn summarize_and_translate(
        &self,
        repo: &Repository,
        store: &Store,
        reviews: &[StoredReview],
        report: &mut StoreReport,
    ) -> Result<()> {
        let texts: Vec<String> = reviews
            .iter()
            .map(|r| r.review_text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let summary = match self.summarizer.summarize(&texts, &store.store_name).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => {
                tracing::warn!("Summarizer returned nothing for {}", store.store_name);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Summarizing {} failed ({:?}): {}", store.store_name, e.kind(), e);
                return Ok(());
            }
        };

        repo.update_store_summary(store.store_id, summary.clone()).await?;
        report.summarized = true;
        report.stage = Stage::Summarized;

        let translated = self
            .translations
            .batch_translate_and_save(repo, store.store_id, &summary)
            .await?;
        report.translations = translated.len();
        report.stage = Stage::Translated;
        Ok(())
    }
}
