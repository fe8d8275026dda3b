//! Content module for page extraction and text cleanup
//!
//! - `TitleFilter`: decides which catalog links are real chapters
//! - `ContentCleaner`: turns raw chapter text into indented paragraphs
//! - `Extractor`: pulls catalog and chapter data out of mirror HTML

mod classifier;
mod cleaner;
mod extract;

pub use classifier::{is_valid_chapter_title, TitleFilter};
pub use cleaner::ContentCleaner;
pub use extract::{CatalogPage, ChapterPage, Extractor, HtmlExtractor};
