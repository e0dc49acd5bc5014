//! Text extraction from uploaded requirement documents.

use crate::error::{Result, ToolError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::Deserialize;
use std::io::{Cursor, Read};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Csv,
    Docx,
    Xlsx,
    Pdf,
}

impl DocumentFormat {
    /// Resolve a format from the declared MIME type, falling back to the
    /// file extension when the type is missing or generic.
    pub fn detect(mime_type: &str, file_name: &str) -> Result<Self> {
        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/plain" | "text/markdown" => Ok(Self::Text),
            "text/csv" => Ok(Self::Csv),
            DOCX_MIME => Ok(Self::Docx),
            XLSX_MIME => Ok(Self::Xlsx),
            "application/pdf" => Ok(Self::Pdf),
            "application/octet-stream" => Ok(Self::from_extension(file_name).unwrap_or(Self::Text)),
            m if m.starts_with("text/") => Ok(Self::Text),
            "" => Self::from_extension(file_name).ok_or_else(|| {
                ToolError::UnsupportedFormat(format!("{file_name}: unknown document type"))
            }),
            other => Self::from_extension(file_name).ok_or_else(|| {
                ToolError::UnsupportedFormat(format!("{file_name}: {other}"))
            }),
        }
    }

    fn from_extension(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Turns raw document bytes into prompt-ready text.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<String>;
}

/// Built-in extractor for text, CSV, DOCX, XLSX and PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatExtractor;

impl DocumentExtractor for FormatExtractor {
    #[tracing::instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
    fn extract(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<String> {
        match DocumentFormat::detect(mime_type, file_name)? {
            DocumentFormat::Text => utf8(file_name, bytes),
            DocumentFormat::Csv => {
                let text = utf8(file_name, bytes)?;
                Ok(markdown_table(&parse_csv(&text)))
            }
            DocumentFormat::Docx => docx_text(bytes),
            DocumentFormat::Xlsx => xlsx_table(bytes),
            DocumentFormat::Pdf => pdf_text(file_name, bytes),
        }
    }
}

fn pdf_text(file_name: &str, bytes: &[u8]) -> Result<String> {
    // pdf-extract panics on some malformed files instead of returning an error.
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ToolError::Parse(format!("{file_name}: unreadable PDF")))?;
    let text = extracted.map_err(|e| ToolError::Parse(format!("{file_name}: {e}")))?;
    Ok(text.trim().to_string())
}

fn utf8(file_name: &str, bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ToolError::Parse(format!("{file_name} is not valid UTF-8: {e}")))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// A file as uploaded through the API.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedDocument {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    pub content_base64: String,
}

impl UploadedDocument {
    pub fn bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.content_base64.trim())
            .map_err(|e| ToolError::InvalidArguments(format!("{}: invalid base64: {e}", self.file_name)))
    }

    pub fn extract_with(&self, extractor: &dyn DocumentExtractor) -> Result<String> {
        let bytes = self.bytes()?;
        extractor.extract(&self.file_name, &self.mime_type, &bytes)
    }
}

/// Merge typed requirements with the text of each uploaded document.
///
/// Documents that cannot be read are skipped and their names returned.
pub fn combine_requirements(
    typed: &str,
    documents: &[UploadedDocument],
    extractor: &dyn DocumentExtractor,
) -> (String, Vec<String>) {
    let mut extracted = String::new();
    let mut skipped = Vec::new();
    for doc in documents {
        match doc.extract_with(extractor) {
            Ok(content) => {
                extracted.push_str(&format!(
                    "\n\n--- Content from {} ---\n{}",
                    doc.file_name, content
                ));
            }
            Err(e) => {
                tracing::warn!(file = %doc.file_name, error = %e, "skipping unreadable document");
                skipped.push(doc.file_name.clone());
            }
        }
    }

    let typed = typed.trim();
    let combined = match (typed.is_empty(), extracted.is_empty()) {
        (_, true) => typed.to_string(),
        (true, false) => extracted.trim_start().to_string(),
        (false, false) => format!("{typed}{extracted}"),
    };
    (combined, skipped)
}

/// RFC 4180-style records: quoted fields, doubled quotes, CRLF or LF.
pub(crate) fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows.retain(|r| r.iter().any(|f| !f.trim().is_empty()));
    rows
}

/// First row becomes the header; short rows are padded.
pub(crate) fn markdown_table(rows: &[Vec<String>]) -> String {
    let Some(width) = rows.iter().map(Vec::len).max() else {
        return String::new();
    };
    let cell = |s: &str| s.replace('|', "\\|").replace(['\r', '\n'], " ");
    let line = |row: &[String]| {
        let cells: Vec<String> = (0..width)
            .map(|i| cell(row.get(i).map(String::as_str).unwrap_or_default()))
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(line(&rows[0]));
    out.push(format!("|{}", "---|".repeat(width)));
    out.extend(rows[1..].iter().map(|r| line(r)));
    out.join("\n")
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ToolError::Parse(format!("regex: {e}")))
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

pub(crate) fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let xml = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| ToolError::Parse("docx has no word/document.xml".to_string()))?;

    let run = regex(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br/>")?;
    let paragraphs: Vec<String> = xml
        .split("</w:p>")
        .filter(|chunk| chunk.contains("<w:p>") || chunk.contains("<w:p "))
        .map(|chunk| {
            run.captures_iter(chunk)
                .map(|c| match c.get(1) {
                    Some(text) => xml_unescape(text.as_str()),
                    None if c[0].starts_with("<w:tab") => "\t".to_string(),
                    None => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

fn xlsx_table(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let text_run = regex(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>")?;
    let shared: Vec<String> = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => regex(r"(?s)<si>(.*?)</si>")?
            .captures_iter(&xml)
            .map(|si| {
                text_run
                    .captures_iter(&si[1])
                    .map(|t| xml_unescape(&t[1]))
                    .collect::<String>()
            })
            .collect(),
        None => Vec::new(),
    };

    let sheet_name = first_sheet(&archive)
        .ok_or_else(|| ToolError::Parse("xlsx has no worksheets".to_string()))?;
    let xml = read_entry(&mut archive, &sheet_name)?
        .ok_or_else(|| ToolError::Parse(format!("missing {sheet_name}")))?;

    let row_re = regex(r"(?s)<row\b[^>]*>(.*?)</row>")?;
    let cell_re = regex(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)")?;
    let ref_re = regex(r#"\br="([A-Z]+)\d+""#)?;
    let type_re = regex(r#"\bt="(\w+)""#)?;
    let value_re = regex(r"(?s)<v>(.*?)</v>")?;

    let mut rows = Vec::new();
    for row in row_re.captures_iter(&xml) {
        let mut cells: Vec<String> = Vec::new();
        for cell in cell_re.captures_iter(&row[1]) {
            let attrs = &cell[1];
            let body = cell.get(2).map(|m| m.as_str()).unwrap_or_default();
            let col = match ref_re.captures(attrs) {
                Some(c) => column_index(&c[1])?,
                None => cells.len(),
            };
            if col > MAX_COLUMN {
                return Err(ToolError::Parse(format!("{sheet_name}: too many cells in a row")));
            }
            let kind = type_re.captures(attrs).map(|c| c[1].to_string());
            let raw = value_re
                .captures(body)
                .map(|v| xml_unescape(&v[1]))
                .unwrap_or_default();
            let value = match kind.as_deref() {
                Some("s") => raw
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                Some("inlineStr") => text_run
                    .captures_iter(body)
                    .map(|t| xml_unescape(&t[1]))
                    .collect(),
                _ => raw,
            };
            if cells.len() <= col {
                cells.resize(col + 1, String::new());
            }
            cells[col] = value;
        }
        rows.push(cells);
    }
    rows.retain(|r| r.iter().any(|c| !c.trim().is_empty()));
    Ok(markdown_table(&rows))
}

/// Lowest-numbered `xl/worksheets/sheetN.xml`.
fn first_sheet(archive: &zip::ZipArchive<Cursor<&[u8]>>) -> Option<String> {
    archive
        .file_names()
        .filter_map(|name| {
            let n = name
                .strip_prefix("xl/worksheets/sheet")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((n, name.to_string()))
        })
        .min_by_key(|(n, _)| *n)
        .map(|(_, name)| name)
}

/// Last worksheet column, `XFD`.
const MAX_COLUMN: usize = 16_383;

/// `A` -> 0, `Z` -> 25, `AA` -> 26; anything past `XFD` is rejected.
fn column_index(letters: &str) -> Result<usize> {
    let out_of_range = || ToolError::Parse(format!("cell column {letters:?} is out of range"));
    if letters.is_empty() || letters.len() > 3 {
        return Err(out_of_range());
    }
    let n = letters.bytes().try_fold(0usize, |acc, b| {
        if !b.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(usize::from(b - b'A') + 1)
    });
    match n {
        Some(n) if (1..=MAX_COLUMN + 1).contains(&n) => Ok(n - 1),
        _ => Err(out_of_range()),
    }
}
