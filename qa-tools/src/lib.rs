//! QA domain toolkit: test cases, prompt templates, response parsing,
//! document extraction and export.
//!
//! Nothing here talks to an LLM; callers feed the prompts built here to
//! `qa_llm::AiGateway` and hand the replies back to the parsers.

mod chat;
mod document;
mod error;
mod export;
mod parse;
mod prompts;
mod test_case;
mod test_plan;

pub use chat::{
    CHAT_HISTORY_WINDOW, ChatEntry, ChatRole, QUICK_PROMPTS, build_chat_prompt, quick_prompt,
};
pub use document::{
    DocumentExtractor, DocumentFormat, FormatExtractor, UploadedDocument, combine_requirements,
};
pub use error::{Result, ToolError};
pub use export::{code_bundle_zip, render_test_cases_text, test_cases_csv, test_cases_xlsx};
pub use parse::{GeneratedFile, extract_json_object, parse_generated_code, parse_generated_test_cases};
pub use prompts::{
    AutomationOptions, BugReportRequest, Language, MAX_GENERATED_CASES, TestCaseGenerationRequest,
    automation_code_prompt, bug_report_prompt, combined_automation_prompt,
    test_case_generation_prompt, test_plan_prompt,
};
pub use test_case::{
    Attachment, DEFAULT_MODULE, Priority, Severity, TestCase, TestCaseDraft, TestCaseStore,
};
pub use test_plan::{MAX_EXPERIENCE_YEARS, Specialization, TestPlanRequest, Tester, Timeline};
