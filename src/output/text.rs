//! Plain text book, streaming discipline
//!
//! Records are appended in the order they arrive, with no reordering. With
//! more than one fetch in flight a slow chapter can land after a later one;
//! use the EPUB container when order matters.
//!
//! Writes happen on a dedicated blocking thread fed through a bounded
//! queue, so file I/O never borrows from the fetch concurrency budget.
//! A full queue pauses the job's record loop only. Fetch permits are
//! already returned by then, and the pool keeps fetching.

use crate::output::traits::{Assembler, AssemblySummary, BookMeta, OutputError, OutputResult};
use crate::state::ChapterRecord;
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const HEADER_RULE_WIDTH: usize = 40;

/// Streaming text assembler
pub struct TextAssembler {
    path: PathBuf,
    sender: mpsc::Sender<ChapterRecord>,
    writer: JoinHandle<OutputResult<usize>>,
}

impl TextAssembler {
    /// Creates the output file, writes the book header and starts the writer
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file, parent directories are created
    /// * `meta` - Book metadata for the header
    /// * `separator` - Literal placed between chapters
    /// * `queue_capacity` - Records buffered ahead of the writer
    pub fn create(
        path: &Path,
        meta: &BookMeta,
        separator: &str,
        queue_capacity: usize,
    ) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(format_header(meta).as_bytes())?;

        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let separator = separator.to_string();
        let writer = tokio::task::spawn_blocking(move || write_loop(out, receiver, &separator));

        tracing::debug!("Writing text book to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            sender,
            writer,
        })
    }
}

fn format_header(meta: &BookMeta) -> String {
    let mut header = format!("{}\n", meta.title);
    if let Some(author) = &meta.author {
        header.push_str(&format!("作者：{}\n", author));
    }
    header.push_str(&format!("来源：{}\n", meta.source));
    header.push_str(&"=".repeat(HEADER_RULE_WIDTH));
    header.push_str("\n\n");
    header
}

fn write_loop(
    mut out: BufWriter<File>,
    mut receiver: mpsc::Receiver<ChapterRecord>,
    separator: &str,
) -> OutputResult<usize> {
    let mut written = 0;

    while let Some(record) = receiver.blocking_recv() {
        if written > 0 {
            out.write_all(separator.as_bytes())?;
        }
        write!(out, "{}\n\n{}", record.title, record.cleaned_content)?;
        written += 1;
        tracing::trace!("Appended chapter {} ({})", record.index, record.title);
    }

    out.write_all(b"\n")?;
    out.flush()?;
    Ok(written)
}

#[async_trait]
impl Assembler for TextAssembler {
    async fn accept(&mut self, record: ChapterRecord) -> OutputResult<()> {
        self.sender
            .send(record)
            .await
            .map_err(|_| OutputError::Write("text writer stopped".to_string()))
    }

    async fn finalize(self: Box<Self>) -> OutputResult<AssemblySummary> {
        let Self {
            path,
            sender,
            writer,
        } = *self;

        // Closing the queue lets the writer drain and exit
        drop(sender);
        let chapters_written = writer
            .await
            .map_err(|e| OutputError::Write(format!("text writer panicked: {}", e)))??;

        tracing::info!(
            "Wrote {} chapters to {}",
            chapters_written,
            path.display()
        );

        Ok(AssemblySummary {
            chapters_written,
            path,
        })
    }
}
