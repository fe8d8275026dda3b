//! Catalog document, chapter references and chapter records
//!
//! The catalog is the persisted input of a download job. Its `chapters`
//! array position defines the canonical 1-based chapter index.

use crate::HarvestError;
use serde::{Deserialize, Serialize};

/// Novel metadata stored with a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelInfo {
    pub novel_id: String,
    pub novel_title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub total_chapters: usize,
    /// Host of the mirror the catalog was read from
    pub domain: String,
    pub detail_url: String,
}

/// One raw `{ title, url }` entry of the chapter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub url: String,
}

/// Catalog document: `{ novel_info, chapters }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub novel_info: NovelInfo,
    pub chapters: Vec<CatalogEntry>,
}

impl CatalogDocument {
    /// Number of chapters in the catalog
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// All chapters as references, indexed from 1
    pub fn references(&self) -> Vec<ChapterReference> {
        self.chapters
            .iter()
            .enumerate()
            .map(|(i, entry)| ChapterReference {
                index: i + 1,
                title: entry.title.clone(),
                relative_path: entry.url.clone(),
            })
            .collect()
    }

    /// Resolves a 1-based inclusive sub-range into chapter references
    ///
    /// # Arguments
    ///
    /// * `start` - First chapter, at least 1
    /// * `end` - Last chapter, or -1 for "through the last chapter"
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ChapterReference>)` - References in catalog order
    /// * `Err(HarvestError::InvalidRange)` - Range does not fit the catalog
    pub fn select_range(&self, start: i64, end: i64) -> Result<Vec<ChapterReference>, HarvestError> {
        let total = self.len();
        let invalid = || HarvestError::InvalidRange { start, end, total };

        if total == 0 || start < 1 || start as usize > total {
            return Err(invalid());
        }

        let last = if end == -1 {
            total
        } else if end < start || end as usize > total {
            return Err(invalid());
        } else {
            end as usize
        };

        let first = start as usize;
        Ok(self
            .references()
            .into_iter()
            .skip(first - 1)
            .take(last - first + 1)
            .collect())
    }
}

/// A chapter to fetch, prior to fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterReference {
    /// 1-based position in the catalog
    pub index: usize,
    pub title: String,
    /// Site path (or absolute URL) of the chapter page
    pub relative_path: String,
}

/// The outcome of exactly one dispatched chapter reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    pub index: usize,
    pub title: String,
    /// Cleaned paragraphs, empty for a degraded record
    pub cleaned_content: String,
    /// Host of the endpoint the chapter was fetched from
    pub source_endpoint: String,
    /// Full URL that was requested
    pub url: String,
}

impl ChapterRecord {
    /// A degraded record carries no content and is listed as failed
    pub fn is_degraded(&self) -> bool {
        self.cleaned_content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(n: usize) -> CatalogDocument {
        CatalogDocument {
            novel_info: NovelInfo {
                novel_id: "1".to_string(),
                novel_title: "剑来".to_string(),
                author: Some("烽火戏诸侯".to_string()),
                total_chapters: n,
                domain: "www.mirror.cfd".to_string(),
                detail_url: "https://www.mirror.cfd/book/1/".to_string(),
            },
            chapters: (1..=n)
                .map(|i| CatalogEntry {
                    title: format!("第{}章", i),
                    url: format!("/book/1/{}.html", i),
                })
                .collect(),
        }
    }

    fn indices(refs: &[ChapterReference]) -> Vec<usize> {
        refs.iter().map(|r| r.index).collect()
    }

    #[test]
    fn test_references_are_one_based() {
        let refs = catalog(3).references();
        assert_eq!(indices(&refs), vec![1, 2, 3]);
        assert_eq!(refs[0].relative_path, "/book/1/1.html");
        assert_eq!(refs[2].title, "第3章");
    }

    #[test]
    fn test_select_full_range() {
        let refs = catalog(5).select_range(1, -1).unwrap();
        assert_eq!(indices(&refs), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_select_sub_range() {
        let refs = catalog(10).select_range(3, 6).unwrap();
        assert_eq!(indices(&refs), vec![3, 4, 5, 6]);

        let refs = catalog(10).select_range(10, 10).unwrap();
        assert_eq!(indices(&refs), vec![10]);

        let refs = catalog(10).select_range(8, -1).unwrap();
        assert_eq!(indices(&refs), vec![8, 9, 10]);
    }

    #[test]
    fn test_select_invalid_ranges() {
        let doc = catalog(5);
        for (start, end) in [(0, -1), (6, -1), (3, 2), (1, 6), (2, 0), (-1, 3)] {
            let result = doc.select_range(start, end);
            assert!(
                matches!(result, Err(HarvestError::InvalidRange { total: 5, .. })),
                "range {}..{} should be rejected",
                start,
                end
            );
        }
        assert!(catalog(0).select_range(1, -1).is_err());
    }

    #[test]
    fn test_catalog_document_shape() {
        let json = serde_json::to_value(catalog(1)).unwrap();
        assert_eq!(json["novel_info"]["novel_title"], "剑来");
        assert_eq!(json["novel_info"]["total_chapters"], 1);
        assert_eq!(json["chapters"][0]["url"], "/book/1/1.html");
    }

    #[test]
    fn test_degraded_record() {
        let mut record = ChapterRecord {
            index: 1,
            title: "第1章".to_string(),
            cleaned_content: String::new(),
            source_endpoint: "www.mirror.cfd".to_string(),
            url: "https://www.mirror.cfd/book/1/1.html".to_string(),
        };
        assert!(record.is_degraded());
        record.cleaned_content = "\u{3000}\u{3000}正文".to_string();
        assert!(!record.is_degraded());
    }
}
