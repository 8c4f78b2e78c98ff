// Summarization with graceful degradation
use tracing::{debug, warn};

use super::SummaryProvider;

/// Prefix of the summary stored when the provider call fails.
pub const SUMMARY_ERROR_PREFIX: &str = "Lỗi khi gọi Gemini API";

/// Summarizes article content, degrading to an inline error string on
/// failure so the pipeline always has something to store. The next poll
/// cycle never re-summarizes, so the string is what the reader sees.
pub async fn summarize_or_error<P: SummaryProvider + ?Sized>(
    provider: &P,
    content: &str,
) -> String {
    match provider.summarize(content).await {
        Ok(summary) => {
            debug!(
                words = summary.split_whitespace().count(),
                "summarization succeeded"
            );
            summary
        }
        Err(e) => {
            warn!("summarization failed: {:#}", e);
            format!("{}: {:#}", SUMMARY_ERROR_PREFIX, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct OkProvider;

    #[async_trait::async_trait]
    impl SummaryProvider for OkProvider {
        async fn summarize(&self, _content: &str) -> Result<String> {
            Ok("Tóm tắt ngắn gọn.".to_string())
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl SummaryProvider for FailingProvider {
        async fn summarize(&self, _content: &str) -> Result<String> {
            anyhow::bail!("Gemini API error 401 Unauthorized: bad key")
        }
    }

    #[tokio::test]
    async fn passes_through_successful_summary() {
        let summary = summarize_or_error(&OkProvider, "nội dung dài").await;
        assert_eq!(summary, "Tóm tắt ngắn gọn.");
    }

    #[tokio::test]
    async fn degrades_to_error_string() {
        let summary = summarize_or_error(&FailingProvider, "nội dung dài").await;
        assert!(summary.starts_with("Lỗi khi gọi Gemini API:"));
        assert!(summary.contains("401"));
    }
}
