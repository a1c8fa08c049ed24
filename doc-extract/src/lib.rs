//! Plain-text extraction for uploaded documents.
//!
//! Dispatch is by file extension (`.pdf`, `.docx`, `.txt`, case-insensitive,
//! leading dot optional). Extraction is synchronous; async callers should
//! run it on a blocking thread.

use std::io::{Cursor, Read};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;
use tracing::debug;

/// Extensions accepted by [`extract`], with leading dot.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".pdf", ".docx", ".txt"];

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_DOCX_XML_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Error extracting text from PDF: {0}")]
    Pdf(String),

    #[error("Error extracting text from DOCX: {0}")]
    Docx(String),

    #[error("Error extracting text from TXT: {0}")]
    Txt(String),

    #[error("Error reading file: {0}")]
    Io(#[from] std::io::Error),
}

/// Document kinds the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Resolves `".PDF"`, `"pdf"`, `".docx"` etc.
    pub fn from_extension(extension: &str) -> Result<Self, ExtractError> {
        let ext = normalize_extension(extension);
        match ext.as_str() {
            ".pdf" => Ok(DocumentKind::Pdf),
            ".docx" => Ok(DocumentKind::Docx),
            ".txt" => Ok(DocumentKind::Txt),
            _ => Err(ExtractError::UnsupportedFormat(ext)),
        }
    }
}

/// Lowercased extension with a leading dot, or an empty string.
pub fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Extension of `path` in normalized form (`".pdf"`), empty if none.
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// Reads `file_path` and returns its plain text according to `extension`.
pub fn extract(file_path: impl AsRef<Path>, extension: &str) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_extension(extension)?;
    let bytes = std::fs::read(file_path.as_ref())?;
    debug!(
        path = %file_path.as_ref().display(),
        ?kind,
        bytes = bytes.len(),
        "extracting document text"
    );
    extract_bytes(&bytes, kind)
}

/// Extracts text from in-memory content.
pub fn extract_bytes(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Txt => extract_txt(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed font tables.
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser aborted on malformed input".into())),
    }
}

fn extract_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Txt(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(format!("word/document.xml: {e}")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCX_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_DOCX_XML_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".into(),
        ));
    }

    docx_paragraphs(&xml)
}

/// Collects `w:t` runs, one output line per `w:p` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n"))
}
