//! HTML extraction for catalog and chapter pages
//!
//! This module handles parsing mirror pages to extract:
//! - Novel title, author and the chapter link list (catalog page)
//! - Chapter title and raw body text (chapter page)
//!
//! The extractor is a collaborator of the acquisition engine. The engine only
//! sees the [`Extractor`] trait so tests can swap in canned pages.

use crate::config::{parse_selector, SelectorConfig};
use crate::content::TitleFilter;
use crate::state::CatalogEntry;
use crate::{ConfigError, ExtractError};
use scraper::{ElementRef, Html, Selector};

/// Information extracted from a catalog page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub novel_title: Option<String>,
    pub author: Option<String>,
    /// Chapter links that passed the title classifier, in page order
    pub chapters: Vec<CatalogEntry>,
}

/// Information extracted from a chapter page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChapterPage {
    pub title: Option<String>,
    /// Text nodes of the content container joined by newlines
    pub raw_text: String,
}

/// Page extraction capability consumed by the acquisition engine
pub trait Extractor: Send + Sync {
    /// Extracts novel metadata and the filtered chapter list
    fn extract_catalog(&self, html: &str, page_url: &str) -> Result<CatalogPage, ExtractError>;

    /// Extracts the chapter title and raw body text
    fn extract_chapter(&self, html: &str) -> ChapterPage;
}

/// CSS-selector based extractor
pub struct HtmlExtractor {
    catalog_title: Selector,
    catalog_title_fallback: Selector,
    author_spans: Selector,
    author_marker: String,
    chapter_links: Selector,
    chapter_title: Selector,
    chapter_content: Vec<Selector>,
    title_filter: TitleFilter,
}

impl HtmlExtractor {
    /// Builds an extractor, parsing every selector up front
    pub fn new(config: &SelectorConfig, title_filter: TitleFilter) -> Result<Self, ConfigError> {
        Ok(Self {
            catalog_title: parse_selector(&config.catalog_title)?,
            catalog_title_fallback: parse_selector(&config.catalog_title_fallback)?,
            author_spans: parse_selector(&config.author_spans)?,
            author_marker: config.author_marker.clone(),
            chapter_links: parse_selector(&config.chapter_links)?,
            chapter_title: parse_selector(&config.chapter_title)?,
            chapter_content: config
                .chapter_content
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_, _>>()?,
            title_filter,
        })
    }

    fn extract_author(&self, document: &Html) -> Option<String> {
        document
            .select(&self.author_spans)
            .map(|span| span.text().collect::<String>())
            .find(|text| text.contains(self.author_marker.as_str()))
            .map(|text| text.replace(self.author_marker.as_str(), "").trim().to_string())
            .filter(|author| !author.is_empty())
    }

    fn extract_links(&self, document: &Html) -> Vec<CatalogEntry> {
        document
            .select(&self.chapter_links)
            .filter_map(|link| {
                let title = text_of(link);
                let url = link.value().attr("href")?.trim().to_string();
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                Some(CatalogEntry { title, url })
            })
            .filter(|entry| {
                let keep = self.title_filter.is_valid(&entry.title);
                if !keep {
                    tracing::trace!("Dropping non-chapter link '{}'", entry.title);
                }
                keep
            })
            .collect()
    }
}

impl Extractor for HtmlExtractor {
    fn extract_catalog(&self, html: &str, page_url: &str) -> Result<CatalogPage, ExtractError> {
        let document = Html::parse_document(html);

        let novel_title = first_text(&document, &self.catalog_title)
            .or_else(|| first_text(&document, &self.catalog_title_fallback));
        let author = self.extract_author(&document);
        let chapters = self.extract_links(&document);

        if chapters.is_empty() {
            return Err(ExtractError::NoChapters {
                url: page_url.to_string(),
            });
        }

        Ok(CatalogPage {
            novel_title,
            author,
            chapters,
        })
    }

    fn extract_chapter(&self, html: &str) -> ChapterPage {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.chapter_title);

        let raw_text = self
            .chapter_content
            .iter()
            .filter_map(|selector| document.select(selector).next())
            .map(|container| container.text().collect::<Vec<_>>().join("\n"))
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default();

        ChapterPage {
            title,
            raw_text: raw_text.trim().to_string(),
        }
    }
}

/// Trimmed text content of an element
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first non-empty match
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(text_of)
        .find(|text| !text.is_empty())
}
