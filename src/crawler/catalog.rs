//! Catalog lookup
//!
//! Fetches a novel's catalog page, keeps only links the title classifier
//! accepts, and persists the result as the catalog document that download
//! jobs read. Goes through the same failover and cache-first path as search.
//!
//! The cache is keyed by novel page, so two hits of one search never share
//! a catalog. The book name a download asks for points at whichever catalog
//! was fetched under that name last.

use crate::content::Extractor;
use crate::crawler::search::{SearchHit, SearchLookup};
use crate::crawler::single::{Lookup, LookupRequest, SingleResultAcquisition};
use crate::state::{CatalogDocument, Endpoint, NovelInfo};
use crate::storage::{catalog_key, novel_key, StoreExt};
use crate::{FetchError, HarvestError};
use std::sync::Arc;
use url::Url;

const UNKNOWN_TITLE: &str = "未知标题";

/// Catalog lookup for one novel page
pub struct CatalogLookup {
    book: String,
    novel_path: String,
    extractor: Arc<dyn Extractor>,
}

impl CatalogLookup {
    /// # Arguments
    ///
    /// * `book` - Book name the catalog is logged under
    /// * `novel_path` - Path (or URL) of the novel's catalog page
    /// * `extractor` - HTML extraction collaborator
    pub fn new(
        book: impl Into<String>,
        novel_path: impl Into<String>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            book: book.into().trim().to_string(),
            novel_path: novel_path.into(),
            extractor,
        }
    }
}

impl Lookup for CatalogLookup {
    type Output = CatalogDocument;

    fn cache_key(&self) -> String {
        novel_key(&self.novel_path)
    }

    fn request(&self, endpoint: &Endpoint) -> Result<LookupRequest, FetchError> {
        let url = endpoint
            .resolve(&self.novel_path)
            .map_err(|e| FetchError::Transport {
                url: format!("{}{}", endpoint, self.novel_path),
                message: e.to_string(),
            })?;
        Ok(LookupRequest {
            url,
            headers: Vec::new(),
        })
    }

    fn decode(&self, body: &str, url: &Url, endpoint: &Endpoint) -> Result<CatalogDocument, FetchError> {
        let page = self
            .extractor
            .extract_catalog(body, url.as_str())
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(
            endpoint = %endpoint,
            "Catalog of '{}' ({}) lists {} chapters",
            page.novel_title.as_deref().unwrap_or(UNKNOWN_TITLE),
            self.book,
            page.chapters.len()
        );

        Ok(CatalogDocument {
            novel_info: NovelInfo {
                novel_id: self.novel_path.clone(),
                novel_title: page.novel_title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                author: page.author,
                total_chapters: page.chapters.len(),
                domain: endpoint.host(),
                detail_url: url.to_string(),
            },
            chapters: page.chapters,
        })
    }
}

/// Searches for `keyword` and returns its hit list (cached or fresh)
pub async fn search(
    acquisition: &SingleResultAcquisition,
    keyword: &str,
) -> Result<Vec<SearchHit>, HarvestError> {
    acquisition.acquire(&SearchLookup::new(keyword)).await
}

/// Resolves search hit `hit` (1-based) of `keyword` and stores its catalog under the keyword
///
/// # Returns
///
/// * `Ok(CatalogDocument)` - Cached or freshly extracted catalog
/// * `Err(HarvestError::NoSearchHit)` - The search has fewer than `hit` results
/// * `Err(HarvestError::Exhausted)` - Search or catalog page failed on every endpoint
pub async fn fetch_catalog(
    acquisition: &SingleResultAcquisition,
    extractor: Arc<dyn Extractor>,
    keyword: &str,
    hit: usize,
) -> Result<CatalogDocument, HarvestError> {
    let hits = search(acquisition, keyword).await?;

    let chosen = hit
        .checked_sub(1)
        .and_then(|i| hits.get(i))
        .ok_or_else(|| HarvestError::NoSearchHit {
            keyword: keyword.to_string(),
            hit,
        })?;

    tracing::info!(
        "Fetching catalog of '{}' by {} ({})",
        chosen.articlename,
        chosen.author,
        chosen.url_list
    );

    let catalog = acquisition
        .acquire(&CatalogLookup::new(keyword, chosen.url_list.clone(), extractor))
        .await?;

    acquisition
        .store()
        .put_json(&catalog_key(keyword), &catalog)?;
    tracing::info!("Stored catalog of {} as '{}'", chosen.url_list, keyword.trim());

    Ok(catalog)
}
