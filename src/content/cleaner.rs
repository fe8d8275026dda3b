//! Chapter content cleaning

use crate::config::{FilterConfig, FormatConfig};

/// Turns raw extracted chapter text into indented paragraphs
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    junk_keywords: Vec<String>,
    paragraph_indent: String,
}

impl ContentCleaner {
    pub fn new(junk_keywords: Vec<String>, paragraph_indent: impl Into<String>) -> Self {
        Self {
            junk_keywords,
            paragraph_indent: paragraph_indent.into(),
        }
    }

    pub fn from_config(filters: &FilterConfig, format: &FormatConfig) -> Self {
        Self::new(
            filters.content_junk_keywords.clone(),
            format.paragraph_indent.clone(),
        )
    }

    /// Cleans raw chapter text
    ///
    /// Lines are trimmed, blank lines and lines containing a junk keyword
    /// are dropped, survivors get the paragraph indent and are joined with
    /// newlines. An empty result marks the chapter as degraded.
    pub fn clean(&self, raw: &str) -> String {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| {
                !self
                    .junk_keywords
                    .iter()
                    .any(|keyword| line.contains(keyword.as_str()))
            })
            .map(|line| format!("{}{}", self.paragraph_indent, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ContentCleaner {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default(), &FormatConfig::default())
    }
}
