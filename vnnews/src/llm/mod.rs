use anyhow::Result;

/// Upper bound, in words, asked of the summarizer. The bound lives in the
/// prompt itself; whatever comes back is stored as-is.
pub const MAX_SUMMARY_WORDS: usize = 40;

/// Seam between the poll cycle and whichever model backs summarization.
#[async_trait::async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Condense article text into a short Vietnamese summary.
    async fn summarize(&self, content: &str) -> Result<String>;
}

pub mod gemini;
pub mod summarizer;
