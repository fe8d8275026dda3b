//! One chapter fetch: round trip, extraction and cleaning
//!
//! A fetch never fails outright. Any transport error, or a page whose
//! cleaned content comes back empty, yields a degraded record so the pool
//! still emits exactly one record per dispatched reference.

use crate::content::{ContentCleaner, Extractor};
use crate::crawler::transport::Transport;
use crate::state::{ChapterRecord, ChapterReference, Endpoint};
use std::sync::Arc;

/// Shared, stateless chapter fetcher
pub struct ChapterFetcher {
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn Extractor>,
    cleaner: ContentCleaner,
}

impl ChapterFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn Extractor>,
        cleaner: ContentCleaner,
    ) -> Self {
        Self {
            transport,
            extractor,
            cleaner,
        }
    }

    /// Fetches one chapter from its assigned endpoint
    ///
    /// # Arguments
    ///
    /// * `reference` - The chapter to fetch
    /// * `endpoint` - The mirror assigned by the pool
    ///
    /// # Returns
    ///
    /// A record with cleaned content, or a degraded record with empty content
    pub async fn fetch(&self, reference: &ChapterReference, endpoint: &Endpoint) -> ChapterRecord {
        let target = endpoint.resolve(&reference.relative_path);
        let url = match &target {
            Ok(target) => target.to_string(),
            Err(_) => format!("{}{}", endpoint, reference.relative_path),
        };

        let degraded = |reason: &str| {
            tracing::warn!(
                index = reference.index,
                endpoint = %endpoint,
                "Chapter '{}' degraded: {}",
                reference.title,
                reason
            );
            ChapterRecord {
                index: reference.index,
                title: reference.title.clone(),
                cleaned_content: String::new(),
                source_endpoint: endpoint.host(),
                url: url.clone(),
            }
        };

        let target = match target {
            Ok(target) => target,
            Err(e) => return degraded(&format!("bad chapter path: {}", e)),
        };

        let body = match self.transport.fetch(&target, &[]).await {
            Ok(body) => body,
            Err(e) => return degraded(&e.to_string()),
        };

        let page = self.extractor.extract_chapter(&body);
        let cleaned_content = self.cleaner.clean(&page.raw_text);
        if cleaned_content.is_empty() {
            return degraded("no content after cleaning");
        }

        tracing::debug!(
            index = reference.index,
            endpoint = %endpoint,
            "Fetched chapter '{}' ({} chars)",
            reference.title,
            cleaned_content.chars().count()
        );

        ChapterRecord {
            index: reference.index,
            title: page
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| reference.title.clone()),
            cleaned_content,
            source_endpoint: endpoint.host(),
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::content::{HtmlExtractor, TitleFilter};
    use crate::FetchError;
    use async_trait::async_trait;
    use url::Url;

    struct CannedTransport {
        body: Option<String>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn fetch(&self, url: &Url, _headers: &[(String, String)]) -> Result<String, FetchError> {
            self.body.clone().ok_or_else(|| FetchError::Transport {
                url: url.to_string(),
                message: "connection reset".to_string(),
            })
        }
    }

    fn fetcher(body: Option<&str>) -> ChapterFetcher {
        ChapterFetcher::new(
            Arc::new(CannedTransport {
                body: body.map(str::to_string),
            }),
            Arc::new(HtmlExtractor::new(&SelectorConfig::default(), TitleFilter::default()).unwrap()),
            ContentCleaner::default(),
        )
    }

    fn reference() -> ChapterReference {
        ChapterReference {
            index: 4,
            title: "第四章 目录标题".to_string(),
            relative_path: "/book/1/4.html".to_string(),
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::parse("https://www.mirror.cfd").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_cleans_content() {
        let html = r#"<html><body><h1>第四章 页面标题</h1>
            <div id="chaptercontent">第一段<br/>返回目录<br/>第二段</div></body></html>"#;
        let record = fetcher(Some(html)).fetch(&reference(), &endpoint()).await;

        assert_eq!(record.index, 4);
        assert_eq!(record.title, "第四章 页面标题");
        assert_eq!(record.cleaned_content, "\u{3000}\u{3000}第一段\n\u{3000}\u{3000}第二段");
        assert_eq!(record.source_endpoint, "www.mirror.cfd");
        assert_eq!(record.url, "https://www.mirror.cfd/book/1/4.html");
        assert!(!record.is_degraded());
    }

    #[tokio::test]
    async fn test_transport_error_degrades() {
        let record = fetcher(None).fetch(&reference(), &endpoint()).await;

        assert!(record.is_degraded());
        assert_eq!(record.title, "第四章 目录标题");
        assert_eq!(record.url, "https://www.mirror.cfd/book/1/4.html");
    }

    #[tokio::test]
    async fn test_empty_page_degrades() {
        let record = fetcher(Some("<html><body><h1>标题</h1></body></html>"))
            .fetch(&reference(), &endpoint())
            .await;
        assert!(record.is_degraded());
    }
}
