//! Downloadable artifacts: spreadsheets, CSV, plain text and code bundles.

use crate::error::Result;
use crate::parse::GeneratedFile;
use crate::test_case::TestCase;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

const COLUMNS: [&str; 7] = [
    "ID",
    "Title",
    "Priority",
    "Preconditions",
    "Test Data",
    "Test Steps",
    "Expected Results",
];

const SHEET_NAME: &str = "Test Cases";

fn row(tc: &TestCase) -> [String; 7] {
    [
        tc.id.clone(),
        tc.title.clone(),
        tc.priority.as_str().to_string(),
        tc.preconditions.join("\n"),
        tc.test_data.join("\n"),
        tc.test_steps.join("\n"),
        tc.expected_results.join("\n"),
    ]
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are invalid in XML 1.0.
            c if c.is_control() && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn column_letter(idx: usize) -> char {
    char::from(b'A' + idx as u8)
}

fn sheet_xml(cases: &[TestCase]) -> String {
    let mut rows = Vec::with_capacity(cases.len() + 1);
    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    rows.push(header);
    rows.extend(cases.iter().map(|tc| row(tc).to_vec()));

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, cells) in rows.iter().enumerate() {
        let r = r + 1;
        xml.push_str(&format!(r#"<row r="{r}">"#));
        for (c, value) in cells.iter().enumerate() {
            let style = if r == 1 { r#" s="1""# } else { r#" s="2""# };
            xml.push_str(&format!(
                r#"<c r="{col}{r}"{style} t="inlineStr"><is><t xml:space="preserve">{text}</t></is></c>"#,
                col = column_letter(c),
                text = xml_escape(value),
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// 0 = default, 1 = bold header, 2 = wrapped body text.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment wrapText="1" vertical="top"/></xf></cellXfs></styleSheet>"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    )
}

/// Single-sheet workbook with one row per test case.
pub fn test_cases_xlsx(cases: &[TestCase]) -> Result<Vec<u8>> {
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(cases)),
    ];
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(name, deflated())?;
        zip.write_all(body.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn test_cases_csv(cases: &[TestCase]) -> String {
    let mut out = COLUMNS.map(csv_field).join(",");
    out.push_str("\r\n");
    for tc in cases {
        out.push_str(&row(tc).iter().map(|v| csv_field(v)).collect::<Vec<_>>().join(","));
        out.push_str("\r\n");
    }
    out
}

/// Plain-text listing for pasting into trackers or chat.
pub fn render_test_cases_text(cases: &[TestCase]) -> String {
    cases
        .iter()
        .map(|tc| {
            let bullets = |items: &[String]| {
                items
                    .iter()
                    .map(|i| format!("- {i}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            format!(
                "ID: {}\nTitle: {}\nPriority: {}\nSeverity: {}\n\nSteps:\n{}\n\nExpected Results:\n{}",
                tc.id,
                tc.title,
                tc.priority.as_str(),
                tc.severity.as_str(),
                bullets(&tc.test_steps),
                bullets(&tc.expected_results),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Deflated archive with one entry per generated source file.
pub fn code_bundle_zip(files: &[GeneratedFile]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let mut written = HashSet::new();
    for file in files {
        let Some(path) = bundle_path(&file.path) else {
            tracing::warn!(path = %file.path, "skipping generated file with an unsafe path");
            continue;
        };
        if !written.insert(path.clone()) {
            tracing::warn!(path = %path, "skipping duplicate generated file");
            continue;
        }
        zip.start_file(path, deflated())?;
        zip.write_all(file.content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Relative archive path from model-supplied text; `None` if it would
/// climb out of the bundle root or names no file.
fn bundle_path(raw: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in raw.trim().split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return None,
            p if p.ends_with(':') => return None,
            p => parts.push(p),
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}
