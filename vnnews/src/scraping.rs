use chrono::{DateTime, Utc};
use common::{format_stored_time, NewsSource};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Sentinel title of an article whose fetch failed. Records bearing it are
/// never persisted; the cycle filters them out.
pub const ERROR_TITLE: &str = "Lỗi";

/// Placeholder title when the page has no recognizable headline element.
pub const MISSING_TITLE: &str = "Không tìm thấy tiêu đề";

/// Placeholder body when no content container matches.
pub const MISSING_CONTENT: &str = "Không tìm thấy nội dung";

/// Some sites answer bare clients with interstitial pages; a browser-looking
/// user agent keeps the article HTML coming.
const USER_AGENT: &str = "Mozilla/5.0";

/// A scraped article ready for summarization and persistence. `time` is
/// already in the stored-text format: the feed publish time when known,
/// otherwise the fetch time.
#[derive(Debug, Clone)]
pub struct FullArticle {
    pub title: String,
    pub time: String,
    pub content: String,
    pub link: String,
}

impl FullArticle {
    /// True when this record is the failure placeholder rather than a real
    /// article.
    pub fn is_error(&self) -> bool {
        self.title == ERROR_TITLE
    }
}

/// Fetches an article page and extracts title and body text with the
/// source's selector set. Never fails: any error (bad URL, timeout,
/// non-success status) yields the sentinel record instead.
pub async fn fetch_full_article(
    url: &str,
    published: Option<DateTime<Utc>>,
    timeout_secs: u64,
    source: NewsSource,
) -> FullArticle {
    debug!(%url, source = %source, "fetching full article");
    match try_fetch(url, timeout_secs).await {
        Ok(html) => {
            let document = Html::parse_document(&html);
            let (title, content) = match source {
                NewsSource::VnExpress => extract_vnexpress(&document),
                NewsSource::Hour24 => extract_24h(&document),
            };
            let time = format_stored_time(published.unwrap_or_else(Utc::now));
            debug!(%title, "article fetched");
            FullArticle {
                title,
                time,
                content,
                link: url.to_string(),
            }
        }
        Err(e) => {
            warn!(%url, error = %format!("{:#}", e), "article fetch failed");
            FullArticle {
                title: ERROR_TITLE.to_string(),
                time: format_stored_time(Utc::now()),
                content: format!("Không thể lấy nội dung: {:#}", e),
                link: url.to_string(),
            }
        }
    }
}

async fn try_fetch(url: &str, timeout_secs: u64) -> anyhow::Result<String> {
    use anyhow::Context;

    let parsed = Url::parse(url).context("invalid article URL")?;
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build reqwest client")?;

    let response = client
        .get(parsed)
        .send()
        .await
        .context("failed to fetch article page")?
        .error_for_status()
        .context("article fetch returned error status")?;

    response.text().await.context("failed to read article body")
}

/// VNExpress layout: headline variants differ per section, the body lives in
/// `article.fck_detail` (or the podcast container). Everything from the
/// contact footer on is boilerplate.
fn extract_vnexpress(document: &Html) -> (String, String) {
    let title = first_match(
        document,
        &[
            "h1.title-detail",
            "h1.title-news",
            "h1.title-page.detail",
            "title",
        ],
    )
    .map(|el| element_text(&el))
    .unwrap_or_else(|| MISSING_TITLE.to_string());

    let content = match first_match(document, &["article.fck_detail", "div.podcast-content"]) {
        Some(container) => {
            let mut text = join_paragraphs(&container, |p| !element_text(p).is_empty());
            if let Some(idx) = text.find("Liên hệ:") {
                text = text[..idx].trim().to_string();
            }
            text
        }
        None => MISSING_CONTENT.to_string(),
    };

    (title, content)
}

/// 24h layout: a single article container; caption paragraphs are tagged
/// with the `img_chu_thich_0407` class and skipped.
fn extract_24h(document: &Html) -> (String, String) {
    let title = first_match(document, &["h1", "title"])
        .map(|el| element_text(&el))
        .unwrap_or_else(|| MISSING_TITLE.to_string());

    let content = match first_match(document, &["article.cate-24h-foot-arti-deta-info"]) {
        Some(container) => join_paragraphs(&container, |p| {
            !p.value().classes().any(|c| c == "img_chu_thich_0407")
        }),
        None => MISSING_CONTENT.to_string(),
    };

    (title, content)
}

/// First element matching any selector in the chain, in chain order.
fn first_match<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    for raw in selectors {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(element) = document.select(&selector).next() {
                return Some(element);
            }
        }
    }
    None
}

/// Text of the element with every fragment trimmed and concatenated, the way
/// the stored articles are compared and displayed.
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .concat()
}

/// Joins the texts of the container's `<p>` descendants that pass the filter.
fn join_paragraphs<F>(container: &ElementRef, keep: F) -> String
where
    F: Fn(&ElementRef) -> bool,
{
    match Selector::parse("p") {
        Ok(p_selector) => container
            .select(&p_selector)
            .filter(|p| keep(p))
            .map(|p| element_text(&p))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnexpress_title_chain_falls_back() {
        let detail = Html::parse_document(
            r#"<html><head><title>trang</title></head>
               <body><h1 class="title-detail">Tiêu đề chi tiết</h1></body></html>"#,
        );
        let (title, _) = extract_vnexpress(&detail);
        assert_eq!(title, "Tiêu đề chi tiết");

        let page_title_only = Html::parse_document(
            r#"<html><head><title>Chỉ có title</title></head><body></body></html>"#,
        );
        let (title, content) = extract_vnexpress(&page_title_only);
        assert_eq!(title, "Chỉ có title");
        assert_eq!(content, MISSING_CONTENT);
    }

    #[test]
    fn vnexpress_body_joins_paragraphs_and_cuts_contact_footer() {
        let document = Html::parse_document(
            r#"<html><body>
               <h1 class="title-news">Tin</h1>
               <article class="fck_detail">
                 <p>Đoạn một.</p>
                 <p>   </p>
                 <p>Đoạn hai.</p>
                 <p>Liên hệ: toasoan@example.test</p>
               </article>
               </body></html>"#,
        );
        let (_, content) = extract_vnexpress(&document);
        assert_eq!(content, "Đoạn một.\nĐoạn hai.");
    }

    #[test]
    fn hour24_skips_caption_paragraphs() {
        let document = Html::parse_document(
            r#"<html><body>
               <h1>Tin trong ngày</h1>
               <article class="cate-24h-foot-arti-deta-info">
                 <p>Nội dung chính.</p>
                 <p class="img_chu_thich_0407">Ảnh minh họa</p>
                 <p>Phần tiếp theo.</p>
               </article>
               </body></html>"#,
        );
        let (title, content) = extract_24h(&document);
        assert_eq!(title, "Tin trong ngày");
        assert_eq!(content, "Nội dung chính.\nPhần tiếp theo.");
    }

    #[tokio::test]
    async fn bad_url_yields_error_sentinel() {
        let article =
            fetch_full_article("not a url", None, 1, NewsSource::VnExpress).await;
        assert!(article.is_error());
        assert_eq!(article.title, ERROR_TITLE);
        assert!(article.content.starts_with("Không thể lấy nội dung:"));
        assert_eq!(article.link, "not a url");
    }
}
