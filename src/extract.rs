#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Turns uploaded documents into plain text.
//!
//! Only the byte buffer is read here. Where those bytes are staged on disk is
//! the caller's business (see [`crate::upload`]).

use std::io::{Cursor, Read};

use encoding_rs::Encoding;
use itertools::Itertools;
use quick_xml::{Reader as XmlReader, events::Event};
use zip::ZipArchive;

use crate::{
    error::EvaluationError,
    types::{DocumentKind, MIN_TEXT_CHARS, file_extension},
};

/// Encoding labels tried, in order, when decoding plain-text uploads.
pub const TEXT_ENCODINGS: [&str; 4] = ["utf-8", "latin1", "iso-8859-1", "windows-1252"];

/// Separator placed between pages, paragraphs, and table cells.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Archive entry holding the main body of a DOCX package.
const DOCX_BODY: &str = "word/document.xml";

/// Text pulled out of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Trimmed text content.
    pub text: String,
    /// Detected document kind.
    pub kind: DocumentKind,
}

/// Extracts the text of `bytes`, choosing the parser from the suffix of
/// `file_name`.
///
/// Unsupported extensions are rejected before any parsing happens. The
/// extracted text must hold at least [`MIN_TEXT_CHARS`] characters after
/// trimming.
pub fn extract(bytes: &[u8], file_name: &str) -> Result<Extracted, EvaluationError> {
    let kind = DocumentKind::from_filename(file_name).ok_or_else(|| {
        EvaluationError::UnsupportedType {
            extension: file_extension(file_name).unwrap_or_default(),
            accepted:  DocumentKind::ALL.iter().map(|k| k.extension()).join(", "),
        }
    })?;

    let text = match kind {
        DocumentKind::Pdf => pdf_text(bytes)?,
        DocumentKind::Docx => docx_text(bytes)?,
        DocumentKind::Txt => decode_text(bytes)?,
    };

    let text = text.trim();
    let found = text.chars().count();
    if found < MIN_TEXT_CHARS {
        return Err(EvaluationError::InsufficientContent {
            found,
            required: MIN_TEXT_CHARS,
        });
    }

    tracing::debug!(%kind, chars = found, "extracted document text");
    Ok(Extracted {
        text: text.to_string(),
        kind,
    })
}

/// Extracts text page by page. Pages that fail are skipped with a warning.
pub fn pdf_text(bytes: &[u8]) -> Result<String, EvaluationError> {
    let empty = || EvaluationError::extraction(DocumentKind::Pdf, "empty or protected document");

    let document = lopdf::Document::load_mem(bytes).map_err(|err| {
        tracing::warn!("Could not open PDF: {err}");
        empty()
    })?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text.trim().to_string()),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("Skipping PDF page {page_number}: {err}");
            }
        }
    }

    if pages.is_empty() {
        return Err(empty());
    }
    Ok(pages.join(BLOCK_SEPARATOR))
}

/// Where the DOCX walker currently is.
#[derive(Default)]
struct DocxWalker {
    /// Paragraphs outside tables, in document order.
    paragraphs:    Vec<String>,
    /// Table cells, row-major then cell-major, in document order.
    cells:         Vec<String>,
    /// Nesting depth of `w:tbl` elements.
    table_depth:   usize,
    /// Paragraph currently being collected.
    paragraph:     Option<String>,
    /// Paragraphs of the table cell currently being collected.
    cell:          Option<Vec<String>>,
    /// Whether we are inside a `w:t` run.
    in_text:       bool,
    /// Nesting depth of `w:txbxContent`; text boxes are not body text.
    textbox_depth: usize,
}

impl DocxWalker {
    /// Appends `text` to the open paragraph, if any.
    fn push(&mut self, text: &str) {
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.push_str(text);
        }
    }

    /// Handles an opening (or self-closing) element.
    fn open(&mut self, name: &[u8], self_closing: bool) {
        if name == b"w:txbxContent" {
            if !self_closing {
                self.textbox_depth += 1;
            }
            return;
        }
        if self.textbox_depth > 0 {
            return;
        }
        match name {
            b"w:tbl" if !self_closing => self.table_depth += 1,
            b"w:tc" if !self_closing && self.table_depth == 1 => self.cell = Some(Vec::new()),
            b"w:p" if !self_closing => self.paragraph = Some(String::new()),
            b"w:t" if !self_closing => self.in_text = true,
            b"w:tab" => self.push("\t"),
            b"w:br" | b"w:cr" => self.push("\n"),
            _ => {}
        }
    }

    /// Handles a closing element.
    fn close(&mut self, name: &[u8]) {
        if name == b"w:txbxContent" {
            self.textbox_depth = self.textbox_depth.saturating_sub(1);
            return;
        }
        if self.textbox_depth > 0 {
            return;
        }
        match name {
            b"w:t" => self.in_text = false,
            b"w:p" => {
                let Some(paragraph) = self.paragraph.take() else {
                    return;
                };
                match self.cell.as_mut() {
                    Some(cell) => cell.push(paragraph),
                    None if self.table_depth == 0 => self.paragraphs.push(paragraph),
                    None => {}
                }
            }
            b"w:tc" if self.table_depth == 1 => {
                if let Some(cell) = self.cell.take() {
                    self.cells.push(cell.join("\n"));
                }
            }
            b"w:tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            _ => {}
        }
    }

    /// Joins paragraphs and then table cells, dropping blank entries.
    fn finish(self) -> String {
        self.paragraphs
            .into_iter()
            .chain(self.cells)
            .filter(|block| !block.trim().is_empty())
            .join(BLOCK_SEPARATOR)
    }
}

/// Extracts paragraph text in document order followed by all table cells.
pub fn docx_text(bytes: &[u8]) -> Result<String, EvaluationError> {
    let fail = |reason: String| EvaluationError::extraction(DocumentKind::Docx, reason);

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| fail(format!("not a DOCX package: {err}")))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|err| fail(format!("missing {DOCX_BODY}: {err}")))?
        .read_to_string(&mut xml)
        .map_err(|err| fail(format!("could not read {DOCX_BODY}: {err}")))?;

    let mut reader = XmlReader::from_str(&xml);
    let mut walker = DocxWalker::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => walker.open(e.name().as_ref(), false),
            Ok(Event::Empty(e)) => walker.open(e.name().as_ref(), true),
            Ok(Event::End(e)) => walker.close(e.name().as_ref()),
            Ok(Event::Text(e)) if walker.in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| fail(format!("malformed text run: {err}")))?;
                walker.push(&text);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(fail(format!("malformed document XML: {err}"))),
            _ => {}
        }
    }

    Ok(walker.finish())
}

/// Decodes plain text with the first encoding in [`TEXT_ENCODINGS`] that
/// accepts the bytes without replacement characters.
pub fn decode_text(bytes: &[u8]) -> Result<String, EvaluationError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    for label in TEXT_ENCODINGS {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            if label != TEXT_ENCODINGS[0] {
                tracing::debug!("Decoded text upload as {}", encoding.name());
            }
            return Ok(text.into_owned());
        }
    }

    Err(EvaluationError::Decode {
        tried: TEXT_ENCODINGS.join(", "),
    })
}
