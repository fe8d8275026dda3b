//! Chapter title classifier
//!
//! Catalog pages mix real chapter links with navigation widgets ("expand all
//! chapters", paging arrows) and author notes. The classifier decides which
//! link titles become chapter references. It is a pure predicate: the same
//! title always gets the same answer, whatever order links are checked in.

use crate::config::{
    FilterConfig, DEFAULT_INVALID_KEYWORDS, DEFAULT_INVALID_PREFIXES, DEFAULT_META_NOTES,
};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Symbols stripped before the short-title check
const SHORT_TITLE_SYMBOLS: &[char] = &['-', '=', '*'];

/// A title made only of these characters is never a chapter
const PUNCTUATION: &str = "=-*~`!@#$%^&()[]{}|\\:\";'<>?,./";

/// Chapter title classifier built from configured keyword lists
#[derive(Debug, Clone)]
pub struct TitleFilter {
    invalid_keywords: HashSet<String>,
    invalid_prefixes: Vec<String>,
    meta_notes: HashSet<String>,
}

impl TitleFilter {
    /// Creates a classifier from explicit keyword lists
    pub fn new<I, P, M>(invalid_keywords: I, invalid_prefixes: P, meta_notes: M) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            invalid_keywords: invalid_keywords.into_iter().map(Into::into).collect(),
            invalid_prefixes: invalid_prefixes.into_iter().map(Into::into).collect(),
            meta_notes: meta_notes.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a classifier from the `[filters]` config section
    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.invalid_chapter_keywords.iter().cloned(),
            config.invalid_chapter_prefixes.iter().cloned(),
            config.meta_note_keywords.iter().cloned(),
        )
    }

    /// Returns true if `title` names a real chapter
    ///
    /// Rules are applied in order and the first match rejects the title:
    ///
    /// 1. empty or whitespace only
    /// 2. exact navigation phrase
    /// 3. navigation prefix
    /// 4. at most two characters that are all `-`, `=` or `*`
    /// 5. exact author-note keyword
    /// 6. nothing but punctuation
    pub fn is_valid(&self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }

        if self.invalid_keywords.contains(title) {
            return false;
        }

        if self
            .invalid_prefixes
            .iter()
            .any(|prefix| title.starts_with(prefix.as_str()))
        {
            return false;
        }

        if title.chars().count() <= 2 && title.chars().all(|c| SHORT_TITLE_SYMBOLS.contains(&c)) {
            return false;
        }

        if self.meta_notes.contains(title) {
            return false;
        }

        if title.chars().all(|c| PUNCTUATION.contains(c)) {
            return false;
        }

        true
    }
}

impl Default for TitleFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_INVALID_KEYWORDS.iter().copied(),
            DEFAULT_INVALID_PREFIXES.iter().copied(),
            DEFAULT_META_NOTES.iter().copied(),
        )
    }
}

/// Classifies a title with the default keyword lists
///
/// # Example
///
/// ```
/// use novel_harvest::is_valid_chapter_title;
///
/// assert!(is_valid_chapter_title("第一章 山雨欲来"));
/// assert!(!is_valid_chapter_title("展开全部章节"));
/// ```
pub fn is_valid_chapter_title(title: &str) -> bool {
    static DEFAULT_FILTER: OnceLock<TitleFilter> = OnceLock::new();
    DEFAULT_FILTER.get_or_init(TitleFilter::default).is_valid(title)
}
