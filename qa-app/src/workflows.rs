//! Generation workflows: prompt building, the gateway call, and parsing.
//!
//! Each function takes the effective [`GatewayConfig`] for the calling
//! session; none of them touch session state, so no session lock is held
//! across a provider call.

use crate::session::{BugReport, GeneratedPlan, GeneratedSuite};
use chrono::Utc;
use serde::Serialize;
use qa_llm::{AiGateway, GatewayConfig, LlmError};
use qa_tools::{
    AutomationOptions, BugReportRequest, ChatEntry, DocumentExtractor, TestCase,
    TestCaseGenerationRequest, TestPlanRequest, ToolError, UploadedDocument,
};
use std::fmt;
use uuid::Uuid;

#[derive(Debug)]
pub enum WorkflowError {
    Llm(LlmError),
    Tool(ToolError),
    /// An attached document could not be read.
    Document(ToolError),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Llm(e) => write!(f, "{e}"),
            Self::Tool(e) => write!(f, "{e}"),
            Self::Document(e) => write!(f, "attachment: {e}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<LlmError> for WorkflowError {
    fn from(e: LlmError) -> Self {
        Self::Llm(e)
    }
}

impl From<ToolError> for WorkflowError {
    fn from(e: ToolError) -> Self {
        Self::Tool(e)
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationMode {
    /// One suite covering every case.
    #[default]
    Combined,
    /// One suite per case.
    Separate,
}

#[tracing::instrument(level = "info", skip_all, fields(count = req.count))]
pub async fn generate_test_cases(
    gateway: &AiGateway,
    cfg: &GatewayConfig,
    req: &TestCaseGenerationRequest,
) -> WorkflowResult<Vec<TestCase>> {
    req.validate()?;
    let prompt = qa_tools::test_case_generation_prompt(req);
    let reply = gateway.generate(cfg, &prompt, None).await?;
    let cases = qa_tools::parse_generated_test_cases(&reply, req.priority, req.severity)?;
    tracing::info!(requested = req.count, parsed = cases.len(), "test cases generated");
    Ok(cases)
}

/// Suites produced by one automation request, plus the cases that failed
/// in separate mode.
#[derive(Debug, Default)]
pub struct AutomationRun {
    pub suites: Vec<GeneratedSuite>,
    pub failures: Vec<SuiteFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteFailure {
    pub test_case_id: String,
    pub error: String,
}

/// Combined mode fails as a whole. Separate mode keeps going past a failed
/// case and only errors when no case succeeded or the provider setup is
/// unusable.
#[tracing::instrument(level = "info", skip_all, fields(cases = cases.len(), mode = ?mode))]
pub async fn generate_automation(
    gateway: &AiGateway,
    cfg: &GatewayConfig,
    cases: &[TestCase],
    options: &AutomationOptions,
    mode: AutomationMode,
) -> WorkflowResult<AutomationRun> {
    if cases.is_empty() {
        return Err(ToolError::InvalidArguments(
            "select at least one test case to automate".to_string(),
        )
        .into());
    }

    match mode {
        AutomationMode::Combined => {
            let prompt = qa_tools::combined_automation_prompt(cases, options);
            let raw = gateway.generate(cfg, &prompt, None).await?;
            Ok(AutomationRun {
                suites: vec![suite(
                    "combined",
                    cases.iter().map(|tc| tc.id.clone()).collect(),
                    raw,
                )],
                failures: Vec::new(),
            })
        }
        AutomationMode::Separate => {
            let mut run = AutomationRun::default();
            let mut last_error = None;
            for tc in cases {
                let prompt = qa_tools::automation_code_prompt(tc, options);
                match gateway.generate(cfg, &prompt, None).await {
                    Ok(raw) => run.suites.push(suite(&tc.id, vec![tc.id.clone()], raw)),
                    Err(e) if e.is_configuration() || matches!(e, LlmError::InvalidInput(_)) => {
                        return Err(e.into());
                    }
                    Err(e) => {
                        tracing::warn!(test_case_id = %tc.id, error = %e, "automation generation failed for case");
                        run.failures.push(SuiteFailure {
                            test_case_id: tc.id.clone(),
                            error: e.to_string(),
                        });
                        last_error = Some(e);
                    }
                }
            }
            match last_error {
                Some(e) if run.suites.is_empty() => Err(e.into()),
                _ => Ok(run),
            }
        }
    }
}

fn suite(label: &str, test_case_ids: Vec<String>, raw: String) -> GeneratedSuite {
    let files = qa_tools::parse_generated_code(&raw);
    if files.is_empty() {
        tracing::warn!(label, "generated code contained no file markers");
    }
    GeneratedSuite {
        label: label.to_string(),
        test_case_ids,
        files,
        raw,
        generated_at: Utc::now(),
    }
}

#[tracing::instrument(level = "info", skip_all, fields(testers = req.testers.len()))]
pub async fn generate_test_plan(
    gateway: &AiGateway,
    cfg: &GatewayConfig,
    req: &TestPlanRequest,
) -> WorkflowResult<GeneratedPlan> {
    req.validate()?;
    let prompt = qa_tools::test_plan_prompt(req);
    let markdown = gateway.generate(cfg, &prompt, None).await?;
    Ok(GeneratedPlan {
        markdown,
        total_days: req.timeline.map(|t| t.total_days()),
        working_days: req.timeline.map(|t| t.working_days()),
        generated_at: Utc::now(),
    })
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn generate_bug_report(
    gateway: &AiGateway,
    cfg: &GatewayConfig,
    req: &BugReportRequest,
) -> WorkflowResult<BugReport> {
    req.validate()?;
    let prompt = qa_tools::bug_report_prompt(req);
    let markdown = gateway.generate(cfg, &prompt, None).await?;
    Ok(BugReport {
        id: Uuid::new_v4(),
        notes: req.notes.trim().to_string(),
        markdown,
        created_at: Utc::now(),
    })
}

/// Reply to the latest user entry of `history`.
#[tracing::instrument(level = "info", skip_all, fields(history = history.len()))]
pub async fn chat_reply(
    gateway: &AiGateway,
    cfg: &GatewayConfig,
    history: &[ChatEntry],
    attachment: Option<(&str, &str)>,
) -> WorkflowResult<String> {
    let prompt = qa_tools::build_chat_prompt(history, attachment);
    Ok(gateway.generate(cfg, &prompt, None).await?)
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn quick_answer(
    gateway: &AiGateway,
    cfg: &GatewayConfig,
    question: &str,
) -> WorkflowResult<String> {
    let prompt = qa_tools::quick_prompt(question);
    Ok(gateway.generate(cfg, &prompt, None).await?)
}

/// Extract an attachment, keeping document failures distinct from others.
pub fn read_attachment(
    doc: &UploadedDocument,
    extractor: &dyn DocumentExtractor,
) -> WorkflowResult<String> {
    doc.extract_with(extractor).map_err(WorkflowError::Document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qa_llm::{CompletionBackend, Credentials, ProviderConfig, ProviderKind};
    use qa_tools::{Language, Priority, Severity};
    use std::sync::{Arc, Mutex};

    /// Replies with queued texts and records each prompt.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn with(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts lock").clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _provider: &ProviderConfig, prompt: &str) -> qa_llm::Result<String> {
            self.prompts.lock().expect("prompts lock").push(prompt.to_string());
            Ok(self
                .replies
                .lock()
                .expect("replies lock")
                .pop()
                .unwrap_or_default())
        }
    }

    fn cfg() -> GatewayConfig {
        let mut credentials = Credentials::default();
        credentials.set(ProviderKind::Gemini, Some("key".to_string()));
        GatewayConfig::default().with_credentials(credentials)
    }

    fn case(id: &str) -> TestCase {
        TestCase {
            id: id.to_string(),
            title: format!("Case {id}"),
            preconditions: vec![],
            test_data: vec![],
            test_steps: vec!["Step".to_string()],
            expected_results: vec!["Result".to_string()],
            priority: Priority::Medium,
            severity: Severity::Normal,
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn generated_cases_are_parsed_with_defaults() {
        let backend = ScriptedBackend::with(&[
            "```json\n{\"test_cases\":[{\"title\":\"Login\",\"test_steps\":[\"Open\"],\"expected_results\":[\"Ok\"]}]}\n```",
        ]);
        let gateway = AiGateway::new(backend.clone());
        let req = TestCaseGenerationRequest {
            requirements: "Login".to_string(),
            count: 3,
            priority: Priority::High,
            severity: Severity::Major,
            language: Language::English,
        };
        let cases = generate_test_cases(&gateway, &cfg(), &req).await.expect("cases");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].priority, Priority::High);
        assert_eq!(cases[0].severity, Severity::Major);
        assert!(backend.prompts()[0].contains("Generate 3 comprehensive test cases"));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_a_provider() {
        let backend = ScriptedBackend::with(&[]);
        let gateway = AiGateway::new(backend.clone());
        let req = TestCaseGenerationRequest {
            requirements: "Login".to_string(),
            count: 0,
            priority: Priority::Medium,
            severity: Severity::Normal,
            language: Language::English,
        };
        let err = generate_test_cases(&gateway, &cfg(), &req)
            .await
            .expect_err("invalid");
        assert!(matches!(err, WorkflowError::Tool(ToolError::InvalidArguments(_))));
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn separate_mode_calls_once_per_case() {
        let backend = ScriptedBackend::with(&[
            "// FILE: A.java\nclass A {}",
            "// FILE: B.java\nclass B {}",
        ]);
        let gateway = AiGateway::new(backend.clone());
        let run = generate_automation(
            &gateway,
            &cfg(),
            &[case("TC_1"), case("TC_2")],
            &AutomationOptions::default(),
            AutomationMode::Separate,
        )
        .await
        .expect("suites");
        assert!(run.failures.is_empty());
        assert_eq!(run.suites.len(), 2);
        assert_eq!(run.suites[0].label, "TC_1");
        assert_eq!(run.suites[1].files[0].path, "B.java");
        assert_eq!(backend.prompts().len(), 2);
    }

    /// Fails the listed 1-based calls and answers the rest with one file.
    struct FailingCalls {
        fail_on: Vec<usize>,
        calls: Mutex<usize>,
    }

    impl FailingCalls {
        fn on(fail_on: &[usize]) -> Arc<Self> {
            Arc::new(Self {
                fail_on: fail_on.to_vec(),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("calls lock")
        }
    }

    #[async_trait]
    impl CompletionBackend for FailingCalls {
        async fn complete(&self, provider: &ProviderConfig, _prompt: &str) -> qa_llm::Result<String> {
            let n = {
                let mut calls = self.calls.lock().expect("calls lock");
                *calls += 1;
                *calls
            };
            if self.fail_on.contains(&n) {
                return Err(LlmError::Transport {
                    provider: provider.kind,
                    message: "status=500".to_string(),
                });
            }
            Ok(format!("// FILE: Case{n}.java\nclass Case{n} {{}}"))
        }
    }

    #[tokio::test]
    async fn separate_mode_keeps_suites_when_one_case_fails() {
        let backend = FailingCalls::on(&[2]);
        let gateway = AiGateway::new(backend.clone());
        let run = generate_automation(
            &gateway,
            &cfg(),
            &[case("TC_1"), case("TC_2"), case("TC_3")],
            &AutomationOptions::default(),
            AutomationMode::Separate,
        )
        .await
        .expect("partial success");
        assert_eq!(backend.calls(), 3);
        let labels: Vec<&str> = run.suites.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["TC_1", "TC_3"]);
        assert_eq!(run.suites[1].files[0].path, "Case3.java");
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].test_case_id, "TC_2");
        assert!(run.failures[0].error.contains("status=500"));
    }

    #[tokio::test]
    async fn separate_mode_errors_when_every_case_fails() {
        let backend = FailingCalls::on(&[1, 2]);
        let gateway = AiGateway::new(backend.clone());
        let err = generate_automation(
            &gateway,
            &cfg(),
            &[case("TC_1"), case("TC_2")],
            &AutomationOptions::default(),
            AutomationMode::Separate,
        )
        .await
        .expect_err("all failed");
        assert!(matches!(err, WorkflowError::Llm(LlmError::AllProvidersFailed { .. })));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn separate_mode_stops_when_nothing_is_configured() {
        let backend = FailingCalls::on(&[]);
        let gateway = AiGateway::new(backend.clone());
        let err = generate_automation(
            &gateway,
            &GatewayConfig::default(),
            &[case("TC_1"), case("TC_2")],
            &AutomationOptions::default(),
            AutomationMode::Separate,
        )
        .await
        .expect_err("no provider");
        assert!(matches!(err, WorkflowError::Llm(LlmError::NoProviderConfigured)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn combined_mode_makes_one_call() {
        let backend = ScriptedBackend::with(&["// FILE: Suite.java\nclass Suite {}"]);
        let gateway = AiGateway::new(backend.clone());
        let run = generate_automation(
            &gateway,
            &cfg(),
            &[case("TC_1"), case("TC_2")],
            &AutomationOptions::default(),
            AutomationMode::Combined,
        )
        .await
        .expect("suites");
        assert_eq!(run.suites.len(), 1);
        assert_eq!(run.suites[0].test_case_ids, vec!["TC_1", "TC_2"]);
        assert_eq!(backend.prompts().len(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_llm_errors() {
        let gateway = AiGateway::new(ScriptedBackend::with(&[]));
        let err = chat_reply(&gateway, &GatewayConfig::default(), &[ChatEntry::user("hi")], None)
            .await
            .expect_err("no provider");
        assert!(matches!(err, WorkflowError::Llm(LlmError::NoProviderConfigured)));
    }
}
