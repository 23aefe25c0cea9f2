mod pacer;
mod translation;

pub use pacer::{FixedDelay, Pacer};
pub use translation::TranslationService;
