mod client;
mod summarizer;
mod translator;

pub use client::ClaudeClient;
pub use summarizer::{ClaudeSummarizer, ReviewSummarizer};
pub use translator::{ClaudeTranslator, SummaryTranslator};
