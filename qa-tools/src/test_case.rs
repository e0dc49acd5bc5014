use crate::error::{Result, ToolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_MODULE: &str = "ReyadaServices";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Case-insensitive match on the label; `None` for anything else.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    /// System crash.
    Critical,
    /// Feature broken.
    Major,
    #[default]
    Normal,
    Minor,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Major => "Major",
            Self::Normal => "Normal",
            Self::Minor => "Minor",
        }
    }

    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "major" => Some(Self::Major),
            "normal" => Some(Self::Normal),
            "minor" => Some(Self::Minor),
            _ => None,
        }
    }
}

/// A file attached to a test case. Content is base64 so the case stays JSON-safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(rename = "content")]
    pub content_base64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub test_data: Vec<String>,
    pub test_steps: Vec<String>,
    pub expected_results: Vec<String>,
    pub priority: Priority,
    pub severity: Severity,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Raw form input: multi-line fields hold one item per line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestCaseDraft {
    pub title: String,
    #[serde(default)]
    pub preconditions: String,
    #[serde(default)]
    pub test_data: String,
    pub test_steps: String,
    pub expected_results: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl TestCaseDraft {
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("title", self.title.as_str()),
            ("test_steps", self.test_steps.as_str()),
            ("expected_results", self.expected_results.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();
        if !missing.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "required fields missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn into_test_case(self, id: String, priority: Priority, severity: Severity) -> Result<TestCase> {
        self.validate()?;
        Ok(TestCase {
            id,
            title: self.title.trim().to_string(),
            preconditions: split_lines(&self.preconditions),
            test_data: split_lines(&self.test_data),
            test_steps: split_lines(&self.test_steps),
            expected_results: split_lines(&self.expected_results),
            priority: self.priority.unwrap_or(priority),
            severity: self.severity.unwrap_or(severity),
            attachments: self.attachments,
        })
    }
}

/// One item per non-blank line, trimmed.
pub(crate) fn split_lines(s: &str) -> Vec<String> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ordered test cases of one session plus the current selection.
#[derive(Debug, Clone, Serialize)]
pub struct TestCaseStore {
    module: String,
    cases: Vec<TestCase>,
    selected: BTreeSet<String>,
}

impl Default for TestCaseStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE)
    }
}

impl TestCaseStore {
    pub fn new(module: &str) -> Self {
        Self {
            module: normalize_module(module),
            cases: Vec::new(),
            selected: BTreeSet::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn set_module(&mut self, module: &str) {
        self.module = normalize_module(module);
    }

    pub fn list(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|tc| tc.id == id)
    }

    /// Save a manual case as `TC_{module}_{n}`.
    pub fn add_manual(
        &mut self,
        draft: TestCaseDraft,
        priority: Priority,
        severity: Severity,
    ) -> Result<&TestCase> {
        let id = self.free_id(self.cases.len() + 1, "");
        let tc = draft.into_test_case(id, priority, severity)?;
        self.cases.push(tc);
        Ok(&self.cases[self.cases.len() - 1])
    }

    /// Append generated cases, re-numbering them `TC_{module}_G{n}`.
    pub fn add_generated(&mut self, generated: Vec<TestCase>) -> Vec<String> {
        let base = self.cases.len();
        let mut ids = Vec::with_capacity(generated.len());
        for (i, mut tc) in generated.into_iter().enumerate() {
            tc.id = self.free_id(base + i + 1, "G");
            ids.push(tc.id.clone());
            self.cases.push(tc);
        }
        ids
    }

    /// Replace the fields of an existing case, keeping its id.
    pub fn update(&mut self, id: &str, draft: TestCaseDraft) -> Result<&TestCase> {
        let idx = self
            .cases
            .iter()
            .position(|tc| tc.id == id)
            .ok_or_else(|| ToolError::NotFound(format!("test case {id}")))?;
        let current = &self.cases[idx];
        let updated = draft.into_test_case(id.to_string(), current.priority, current.severity)?;
        self.cases[idx] = updated;
        Ok(&self.cases[idx])
    }

    /// Remove cases by id; returns how many were removed.
    pub fn delete(&mut self, ids: &[String]) -> usize {
        let before = self.cases.len();
        self.cases.retain(|tc| !ids.contains(&tc.id));
        for id in ids {
            self.selected.remove(id);
        }
        before - self.cases.len()
    }

    pub fn set_selected(&mut self, ids: &[String], selected: bool) {
        for id in ids {
            if selected {
                if self.get(id).is_some() {
                    self.selected.insert(id.clone());
                }
            } else {
                self.selected.remove(id);
            }
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.cases.iter().map(|tc| tc.id.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Selected cases in store order.
    pub fn selected(&self) -> Vec<TestCase> {
        self.cases
            .iter()
            .filter(|tc| self.selected.contains(&tc.id))
            .cloned()
            .collect()
    }

    /// Look up several ids in the given order; fails on the first unknown id.
    pub fn find_many(&self, ids: &[String]) -> Result<Vec<TestCase>> {
        ids.iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| ToolError::NotFound(format!("test case {id}")))
            })
            .collect()
    }

    fn free_id(&self, mut n: usize, prefix: &str) -> String {
        loop {
            let id = format!("TC_{}_{prefix}{n}", self.module);
            if self.get(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }
}

fn normalize_module(module: &str) -> String {
    let trimmed = module.trim();
    if trimmed.is_empty() {
        return DEFAULT_MODULE.to_string();
    }
    trimmed.replace(char::is_whitespace, "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> TestCaseDraft {
        TestCaseDraft {
            title: title.to_string(),
            preconditions: "1. User is registered\n\n  2. App is running  ".to_string(),
            test_steps: "Open login\nSubmit".to_string(),
            expected_results: "Dashboard shown".to_string(),
            ..TestCaseDraft::default()
        }
    }

    #[test]
    fn manual_cases_are_numbered_by_module() {
        let mut store = TestCaseStore::new("Billing");
        let tc = store
            .add_manual(draft("Login"), Priority::High, Severity::Major)
            .expect("add");
        assert_eq!(tc.id, "TC_Billing_1");
        assert_eq!(tc.preconditions, vec!["1. User is registered", "2. App is running"]);
        assert_eq!(tc.priority, Priority::High);
        assert_eq!(tc.severity, Severity::Major);
        let tc = store
            .add_manual(draft("Logout"), Priority::Low, Severity::Minor)
            .expect("add");
        assert_eq!(tc.id, "TC_Billing_2");
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut store = TestCaseStore::default();
        let mut d = draft("");
        d.expected_results = " ".to_string();
        let err = store
            .add_manual(d, Priority::Medium, Severity::Normal)
            .expect_err("invalid");
        assert!(err.to_string().contains("title, expected_results"));
        assert!(store.is_empty());
    }

    #[test]
    fn generated_cases_get_g_ids_after_existing() {
        let mut store = TestCaseStore::new("Shop");
        store
            .add_manual(draft("Manual"), Priority::Medium, Severity::Normal)
            .expect("add");
        let template = store.list()[0].clone();
        let ids = store.add_generated(vec![template.clone(), template]);
        assert_eq!(ids, vec!["TC_Shop_G2", "TC_Shop_G3"]);
    }

    #[test]
    fn ids_stay_unique_after_deletion() {
        let mut store = TestCaseStore::new("M");
        for t in ["a", "b"] {
            store
                .add_manual(draft(t), Priority::Medium, Severity::Normal)
                .expect("add");
        }
        assert_eq!(store.delete(&["TC_M_1".to_string()]), 1);
        let tc = store
            .add_manual(draft("c"), Priority::Medium, Severity::Normal)
            .expect("add");
        assert_eq!(tc.id, "TC_M_3");
    }

    #[test]
    fn update_keeps_id_and_selection_follows_deletes() {
        let mut store = TestCaseStore::new("M");
        store
            .add_manual(draft("a"), Priority::High, Severity::Critical)
            .expect("add");
        store
            .add_manual(draft("b"), Priority::Medium, Severity::Normal)
            .expect("add");

        let updated = store.update("TC_M_1", draft("a2")).expect("update");
        assert_eq!(updated.id, "TC_M_1");
        assert_eq!(updated.title, "a2");
        assert_eq!(updated.priority, Priority::High);

        store.select_all();
        assert_eq!(store.selected().len(), 2);
        store.delete(&["TC_M_2".to_string()]);
        let selected = store.selected();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "TC_M_1");

        store.set_selected(&["TC_M_1".to_string(), "nope".to_string()], false);
        assert!(store.selected().is_empty());
        assert!(store.find_many(&["nope".to_string()]).is_err());
    }

    #[test]
    fn lenient_labels() {
        assert_eq!(Priority::parse_lenient(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse_lenient("High/Medium/Low"), None);
        assert_eq!(Severity::parse_lenient("minor"), Some(Severity::Minor));
    }
}
