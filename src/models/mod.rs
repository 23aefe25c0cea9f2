mod review;
mod store;
mod translation;

pub use review::{CrawlLog, CrawlStatus, RawReview, StoredReview};
pub use store::Store;
pub use translation::{Language, StoredTranslation, DEFAULT_LANGUAGES};
