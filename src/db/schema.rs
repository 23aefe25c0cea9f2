pub const SCHEMA: &str = r#"
-- stores table (normally pre-populated by the ordering backend)
CREATE TABLE IF NOT EXISTS stores (
    store_id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_name TEXT NOT NULL,
    place_id TEXT,
    is_partner INTEGER NOT NULL DEFAULT 1,
    review_summary TEXT
);

-- crawl_logs table (one row per store)
CREATE TABLE IF NOT EXISTS crawl_logs (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL UNIQUE REFERENCES stores(store_id),
    last_crawl_time TEXT NOT NULL,
    reviews_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'success',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- reviews table (review_data holds the raw API payload)
CREATE TABLE IF NOT EXISTS reviews (
    review_id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL REFERENCES stores(store_id),
    place_id TEXT NOT NULL,
    review_data TEXT NOT NULL,
    review_time TEXT NOT NULL,
    rating REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_reviews_dedup ON reviews(store_id, place_id, review_time);

-- languages table (reference data)
CREATE TABLE IF NOT EXISTS languages (
    lang_code TEXT NOT NULL UNIQUE,
    lang_name TEXT NOT NULL
);

-- store_translations table
CREATE TABLE IF NOT EXISTS store_translations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL REFERENCES stores(store_id),
    language_code TEXT NOT NULL,
    translated_summary TEXT,
    UNIQUE(store_id, language_code)
);
"#;
