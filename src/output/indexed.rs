//! Index-keyed record buffer
//!
//! Holds records in a map keyed by chapter index so they can be emitted in
//! ascending index order however they arrived.

use crate::state::ChapterRecord;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct IndexedBuffer {
    records: BTreeMap<usize, ChapterRecord>,
}

impl IndexedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a record
    ///
    /// Returns false if a record with the same index was already buffered;
    /// the first one is kept.
    pub fn insert(&mut self, record: ChapterRecord) -> bool {
        if self.records.contains_key(&record.index) {
            tracing::warn!("Duplicate record for chapter {}, keeping the first", record.index);
            return false;
        }
        self.records.insert(record.index, record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drains the buffer in ascending index order
    pub fn into_ordered(self) -> Vec<ChapterRecord> {
        self.records.into_values().collect()
    }
}
