//! Turning free-form LLM replies into structured data.

use crate::error::{Result, ToolError};
use crate::test_case::{Attachment, Priority, Severity, TestCase, split_lines};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

static JSON_OBJECT: LazyLock<Result<Regex>> = LazyLock::new(|| {
    Regex::new(r"\{[\s\S]*\}").map_err(|e| ToolError::Parse(format!("regex: {e}")))
});

const FILE_MARKER: &str = "// FILE: ";

/// Span from the first `{` to the last `}`; `None` when the text has no object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    match JSON_OBJECT.as_ref() {
        Ok(re) => re.find(text).map(|m| m.as_str()),
        Err(_) => None,
    }
}

/// Decode the `test_cases` array of a generation reply.
///
/// Replies without any JSON object yield no cases. List fields may come
/// back as arrays or as newline-separated strings; unknown priority or
/// severity labels fall back to the given defaults.
pub fn parse_generated_test_cases(
    text: &str,
    default_priority: Priority,
    default_severity: Severity,
) -> Result<Vec<TestCase>> {
    let Some(raw) = extract_json_object(text) else {
        tracing::warn!(reply_len = text.len(), "generation reply contained no JSON object");
        return Ok(Vec::new());
    };
    let root: Value = serde_json::from_str(raw)?;
    let Some(items) = root.get("test_cases").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let cases = items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| TestCase {
            id: string_field(item, "id"),
            title: string_field(item, "title"),
            preconditions: list_field(item, "preconditions"),
            test_data: list_field(item, "test_data"),
            test_steps: list_field(item, "test_steps"),
            expected_results: list_field(item, "expected_results"),
            priority: item
                .get("priority")
                .and_then(Value::as_str)
                .and_then(Priority::parse_lenient)
                .unwrap_or(default_priority),
            severity: item
                .get("severity")
                .and_then(Value::as_str)
                .and_then(Severity::parse_lenient)
                .unwrap_or(default_severity),
            attachments: item
                .get("attachments")
                .and_then(|v| serde_json::from_value::<Vec<Attachment>>(v.clone()).ok())
                .unwrap_or_default(),
        })
        .collect();
    Ok(cases)
}

fn string_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn list_field(item: &Value, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => split_lines(s),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Split generated code on `// FILE: <path>` marker lines.
///
/// Text before the first marker is dropped. A repeated path replaces the
/// earlier content in place.
pub fn parse_generated_code(code: &str) -> Vec<GeneratedFile> {
    let mut files: Vec<GeneratedFile> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in code.lines() {
        if let Some(path) = line.strip_prefix(FILE_MARKER) {
            if let Some((path, body)) = current.take() {
                push_file(&mut files, path, body.join("\n"));
            }
            current = Some((path.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((path, body)) = current.filter(|(_, body)| !body.is_empty()) {
        push_file(&mut files, path, body.join("\n"));
    }
    files
}

fn push_file(files: &mut Vec<GeneratedFile>, path: String, content: String) {
    if path.is_empty() {
        return;
    }
    match files.iter_mut().find(|f| f.path == path) {
        Some(existing) => existing.content = content,
        None => files.push(GeneratedFile { path, content }),
    }
}
