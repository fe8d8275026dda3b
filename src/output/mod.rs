//! Output module for assembling fetched chapters into a book
//!
//! This module handles:
//! - Plain text books written as chapters arrive (`TextAssembler`)
//! - EPUB books written in chapter order at finalize (`EpubAssembler`)

mod epub;
mod indexed;
mod text;
mod traits;

pub use epub::{escape_xml, write_epub, EpubAssembler};
pub use indexed::IndexedBuffer;
pub use text::TextAssembler;
pub use traits::{
    Assembler, AssemblySummary, BookMeta, OutputError, OutputFormat, OutputResult,
};

use crate::config::FormatConfig;
use std::path::Path;

/// Creates the assembler for a format
///
/// # Arguments
///
/// * `format` - Container format
/// * `path` - Destination file
/// * `meta` - Book metadata
/// * `format_config` - Separator and language settings
/// * `write_queue` - Queue capacity for formats that write while fetching
///
/// # Returns
///
/// * `Ok(Box<dyn Assembler>)` - Ready to accept records
/// * `Err(OutputError)` - Failed to create the output file
pub fn create_assembler(
    format: OutputFormat,
    path: &Path,
    meta: BookMeta,
    format_config: &FormatConfig,
    write_queue: usize,
) -> OutputResult<Box<dyn Assembler>> {
    match format {
        OutputFormat::Txt => Ok(Box::new(TextAssembler::create(
            path,
            &meta,
            &format_config.chapter_separator,
            write_queue,
        )?)),
        OutputFormat::Epub => Ok(Box::new(EpubAssembler::new(path, meta))),
    }
}
