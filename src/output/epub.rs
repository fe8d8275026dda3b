//! EPUB 3 book, indexed discipline
//!
//! Records are buffered by chapter index and the whole archive is written
//! in one pass at finalize, so chapter order never depends on which fetch
//! finished first.

use crate::output::indexed::IndexedBuffer;
use crate::output::traits::{Assembler, AssemblySummary, BookMeta, OutputError, OutputResult};
use crate::state::ChapterRecord;
use crate::storage::short_digest;
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// EPUB assembler
pub struct EpubAssembler {
    path: PathBuf,
    meta: BookMeta,
    buffer: IndexedBuffer,
}

impl EpubAssembler {
    pub fn new(path: &Path, meta: BookMeta) -> Self {
        Self {
            path: path.to_path_buf(),
            meta,
            buffer: IndexedBuffer::new(),
        }
    }
}

#[async_trait]
impl Assembler for EpubAssembler {
    async fn accept(&mut self, record: ChapterRecord) -> OutputResult<()> {
        self.buffer.insert(record);
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> OutputResult<AssemblySummary> {
        let Self { path, meta, buffer } = *self;
        let records = buffer.into_ordered();
        let chapters_written = records.len();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_epub(&target, &meta, &records))
            .await
            .map_err(|e| OutputError::Write(format!("epub writer panicked: {}", e)))??;

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

/// Writes a complete EPUB archive
///
/// # Arguments
///
/// * `path` - Destination file, parent directories are created
/// * `meta` - Book metadata
/// * `records` - Chapters, already in ascending index order
pub fn write_epub(path: &Path, meta: &BookMeta, records: &[ChapterRecord]) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut zip = ZipWriter::new(File::create(path)?);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // mimetype must be the first entry and uncompressed
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(content_opf(meta, records).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(nav_xhtml(meta, records).as_bytes())?;

    for record in records {
        zip.start_file(format!("OEBPS/{}", chapter_file(record.index)), deflated)?;
        zip.write_all(chapter_xhtml(meta, record).as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn chapter_file(index: usize) -> String {
    format!("chapter_{:05}.xhtml", index)
}

fn content_opf(meta: &BookMeta, records: &[ChapterRecord]) -> String {
    let identifier = format!(
        "urn:novel-harvest:{}",
        short_digest(&format!("{}|{}", meta.title, meta.source))
    );
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    let mut manifest = String::from(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    let mut spine = String::new();
    for record in records {
        manifest.push_str(&format!(
            "    <item id=\"ch{0}\" href=\"{1}\" media-type=\"application/xhtml+xml\"/>\n",
            record.index,
            chapter_file(record.index)
        ));
        spine.push_str(&format!("    <itemref idref=\"ch{}\"/>\n", record.index));
    }

    let creator = meta
        .author
        .as_ref()
        .map(|a| format!("    <dc:creator>{}</dc:creator>\n", escape_xml(a)))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
{creator}    <dc:language>{language}</dc:language>
    <dc:source>{source}</dc:source>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>
"#,
        identifier = identifier,
        title = escape_xml(&meta.title),
        creator = creator,
        language = escape_xml(&meta.language),
        source = escape_xml(&meta.source),
        modified = modified,
        manifest = manifest,
        spine = spine,
    )
}

fn nav_xhtml(meta: &BookMeta, records: &[ChapterRecord]) -> String {
    let items: String = records
        .iter()
        .map(|record| {
            format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                chapter_file(record.index),
                escape_xml(&record.title)
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{language}">
<head><title>{title}</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{items}    </ol>
  </nav>
</body>
</html>
"#,
        language = escape_xml(&meta.language),
        title = escape_xml(&meta.title),
        items = items,
    )
}

fn chapter_xhtml(meta: &BookMeta, record: &ChapterRecord) -> String {
    let paragraphs: String = record
        .cleaned_content
        .lines()
        .map(|line| format!("  <p>{}</p>\n", escape_xml(line)))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{language}">
<head><title>{title}</title></head>
<body>
  <h2>{title}</h2>
{paragraphs}</body>
</html>
"#,
        language = escape_xml(&meta.language),
        title = escape_xml(&record.title),
        paragraphs = paragraphs,
    )
}

/// Escapes the five XML special characters
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
