//! Prompt templates for every generation workflow.

use crate::error::{Result, ToolError};
use crate::test_case::{Priority, Severity, TestCase};
use crate::test_plan::TestPlanRequest;
use serde::{Deserialize, Serialize};

pub const MAX_GENERATED_CASES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Arabic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseGenerationRequest {
    pub requirements: String,
    #[serde(default = "default_case_count")]
    pub count: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub language: Language,
}

fn default_case_count() -> u32 {
    10
}

impl TestCaseGenerationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.requirements.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "requirements text or an uploaded document is required".to_string(),
            ));
        }
        if !(1..=MAX_GENERATED_CASES).contains(&self.count) {
            return Err(ToolError::InvalidArguments(format!(
                "count must be between 1 and {MAX_GENERATED_CASES}, got {}",
                self.count
            )));
        }
        Ok(())
    }
}

pub fn test_case_generation_prompt(req: &TestCaseGenerationRequest) -> String {
    let language_instruction = match req.language {
        Language::Arabic => {
            "- IMPORTANT: Generate all test case content (title, preconditions, test_data, test_steps, expected_results) in Arabic language.
- Use proper Arabic text and formatting.
- Keep only the JSON keys in English, but all values must be in Arabic."
        }
        Language::English => "- Generate all content in English language.",
    };
    format!(
        r#"You are a senior QA engineer with 15+ years of experience.
Generate {count} comprehensive test cases based on the following requirements:

{requirements}

Instructions:
- Default Priority: {priority}
- Default Severity: {severity} (Critical=System crash, Major=Feature broken, Normal=General severity, Minor=Minor issue)
{language_instruction}
- Respond with JSON only, using this structure:
{{
    "test_cases": [
        {{
            "id": "TC_001",
            "title": "Test case title",
            "preconditions": ["Precondition 1", "Precondition 2"],
            "test_data": ["Data 1", "Data 2"],
            "test_steps": ["Step 1", "Step 2", "Step 3"],
            "expected_results": ["Expected result 1", "Expected result 2"],
            "priority": "High/Medium/Low",
            "severity": "Critical/Major/Normal/Minor",
            "attachments": []
        }}
    ]
}}"#,
        count = req.count,
        requirements = req.requirements.trim(),
        priority = req.priority.as_str(),
        severity = req.severity.as_str(),
    )
}

/// Design patterns requested for generated Selenium code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutomationOptions {
    #[serde(default = "default_true")]
    pub page_object_model: bool,
    #[serde(default = "default_true")]
    pub oop: bool,
    #[serde(default)]
    pub data_driven: bool,
    #[serde(default)]
    pub bdd: bool,
    #[serde(default)]
    pub bot_style: bool,
    #[serde(default)]
    pub custom_prompt: String,
}

fn default_true() -> bool {
    true
}

impl Default for AutomationOptions {
    fn default() -> Self {
        Self {
            page_object_model: true,
            oop: true,
            data_driven: false,
            bdd: false,
            bot_style: false,
            custom_prompt: String::new(),
        }
    }
}

impl AutomationOptions {
    fn design_instructions(&self) -> String {
        let mut lines: Vec<&str> = Vec::new();
        if self.page_object_model {
            lines.extend([
                "- Page Object Model with @FindBy annotations",
                "- Separate Page classes for each page",
                "- Use Selenium 'By' locators (id, name, cssSelector, xpath) for dynamic or computed elements",
                "- Combine @FindBy for static elements with By-based lookups in actions and waits",
                "- Prefer stable CSS/XPath strategies; avoid brittle absolute XPaths; include meaningful locator names",
            ]);
        }
        if self.oop {
            lines.extend([
                "- Object-Oriented Programming principles (Encapsulation, Inheritance, Polymorphism)",
                "- Use inheritance with BaseTest and BasePage classes",
                "- Apply SOLID principles",
            ]);
        }
        if self.data_driven {
            lines.extend([
                "- Data-driven testing with @DataProvider",
                "- External test data from JSON/Excel files",
            ]);
        }
        if self.bdd {
            lines.extend([
                "- BDD style with descriptive method names",
                "- Given-When-Then comments in test methods",
            ]);
        }
        if self.bot_style {
            lines.extend([
                "- Bot Style Architecture Pattern",
                "- Create a Bot class that encapsulates all user actions",
                "- Fluent/chainable API for method chaining (return this)",
                "- Bot methods should be action-oriented like: bot.login(user, pass).navigateTo(page).clickButton(name)",
                "- Separate Bot class from Page Objects for reusable action sequences",
                "- Bot should handle common workflows and complex user journeys",
            ]);
        }
        if !self.page_object_model && !self.oop && !self.bot_style {
            lines.extend([
                "- Simple linear test script without Page Object Model",
                "- All code in single test class",
            ]);
        }
        lines.join("\n")
    }

    fn custom_section(&self) -> String {
        let custom = self.custom_prompt.trim();
        if custom.is_empty() {
            return String::new();
        }
        format!("\nAdditional Requirements:\n{custom}\n")
    }
}

const ENTERPRISE_STANDARDS: &str = "- Java 17
- Selenium WebDriver
- TestNG
- Factory Pattern for WebDriver
- Singleton for configuration
- Log4j2 logging
- Allure reporting annotations
- Explicit waits with WebDriverWait
- Meaningful assertions
- Thread-safe implementation";

const AUTOMATION_PREAMBLE: &str = "You are a super senior QA automation engineer with over 30 years of enterprise experience.
Write complete, production-grade Selenium test automation code in Java using TestNG.";

pub fn automation_code_prompt(tc: &TestCase, opts: &AutomationOptions) -> String {
    format!(
        "{AUTOMATION_PREAMBLE}

Based on the following test case:
- Title: {title}
- Steps:
{steps}
- Expected Results:
{expected}

Design Pattern Requirements:
{design}

Use the following enterprise standards:
{ENTERPRISE_STANDARDS}
{custom}
Output the code in the following format:

// FILE: src/main/java/com/qa/pages/[PageName]Page.java
[Java code here]

// FILE: src/test/java/com/qa/tests/[TestName]Test.java
[Java code here]",
        title = tc.title,
        steps = tc.test_steps.join("\n"),
        expected = tc.expected_results.join("\n"),
        design = opts.design_instructions(),
        custom = opts.custom_section(),
    )
}

pub fn combined_automation_prompt(cases: &[TestCase], opts: &AutomationOptions) -> String {
    let cases_str = cases
        .iter()
        .enumerate()
        .map(|(idx, tc)| {
            format!(
                "Test Case {n}: {title}\nSteps:\n{steps}\nExpected Results:\n{expected}",
                n = idx + 1,
                title = tc.title,
                steps = tc.test_steps.join("\n"),
                expected = tc.expected_results.join("\n"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "{AUTOMATION_PREAMBLE}

Create a SINGLE test class that includes test methods for the following test cases:

{cases_str}

Design Pattern Requirements:
{design}

Use the following enterprise standards:
{ENTERPRISE_STANDARDS}
{custom}
Output the code in the following format:

// FILE: src/main/java/com/qa/pages/[PageName]Page.java
[Java code here]

// FILE: src/test/java/com/qa/tests/GeneratedTestSuite.java
[Java code for the combined test suite]",
        design = opts.design_instructions(),
        custom = opts.custom_section(),
    )
}

pub fn test_plan_prompt(req: &TestPlanRequest) -> String {
    let timeline = req
        .timeline
        .map(|t| t.to_string())
        .unwrap_or_else(|| "Not specified".to_string());
    let team = req
        .testers
        .iter()
        .enumerate()
        .map(|(idx, t)| {
            format!(
                "{} Tester {}: {} years of experience",
                t.specialization.as_str(),
                idx + 1,
                t.experience_years
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "You are an experienced QA Lead. Generate a comprehensive Test Plan based on the following requirements.

REQUIREMENTS DOCUMENT:
{requirements}

EXECUTION TIMELINE:
{timeline}

TEST TEAM:
{team}

Please generate a detailed Test Plan in Markdown format that includes:

1. **Test Plan Overview** - Brief introduction and purpose

2. **Test Scope and Objectives** - What will be tested and goals

3. **Test Strategy** - Overall approach and methodology

4. **Test Environment Requirements** - Infrastructure and setup needs

5. **Test Deliverables** - List of documents and artifacts

6. **Resource Allocation** - Presented as a TABLE with columns:
   - Tester Name/ID
   - Years of Experience
   - Specialization
   - Assigned Tasks/Modules
   - Estimated Effort
   - Responsibilities

7. **Task Allocation** - Presented as a TABLE with columns:
   - Task ID
   - Task Description
   - Assigned Tester
   - Priority
   - Status
   - Dependencies
   - Estimated Duration

8. **Test Schedule/Timeline** - Presented as a TABLE with columns:
   - Phase/Milestone
   - Start Date
   - End Date
   - Duration
   - Responsible Tester
   - Deliverables

9. **Risk Assessment** - Presented as a TABLE with columns:
   - Risk ID
   - Risk Description
   - Probability (High/Medium/Low)
   - Impact (High/Medium/Low)
   - Mitigation Strategy
   - Owner

10. **Entry and Exit Criteria** - Clear criteria for starting and completing testing

IMPORTANT: Use proper Markdown formatting with tables, headers, and bullet points.",
        requirements = req.requirements.trim(),
    );
    let custom = req.custom_instructions.trim();
    if !custom.is_empty() {
        prompt.push_str("\n\nADDITIONAL CUSTOM INSTRUCTIONS:\n");
        prompt.push_str(custom);
    }
    prompt
}

/// Freeform notes to turn into a structured bug report.
#[derive(Debug, Clone, Deserialize)]
pub struct BugReportRequest {
    pub notes: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl BugReportRequest {
    pub fn validate(&self) -> Result<()> {
        if self.notes.trim().is_empty() {
            return Err(ToolError::InvalidArguments("notes must not be empty".to_string()));
        }
        Ok(())
    }
}

pub fn bug_report_prompt(req: &BugReportRequest) -> String {
    let mut hints = Vec::new();
    let environment = req.environment.trim();
    if !environment.is_empty() {
        hints.push(format!("- Environment: {environment}"));
    }
    if let Some(s) = req.severity {
        hints.push(format!("- Use Severity: {}", s.as_str()));
    }
    if let Some(p) = req.priority {
        hints.push(format!("- Use Priority: {}", p.as_str()));
    }
    let hints = if hints.is_empty() {
        "- Infer severity (Critical/Major/Normal/Minor) and priority (High/Medium/Low) from the notes".to_string()
    } else {
        hints.join("\n")
    };

    format!(
        "You are a meticulous QA engineer. Convert the following freeform notes into a clear, professional bug report.

NOTES:
{notes}

Known details:
{hints}

Write the bug report in Markdown with these sections:
- **Title** - one concise sentence describing the defect
- **Environment** - browser, OS, build or URL if mentioned, otherwise \"Not specified\"
- **Steps to Reproduce** - numbered list
- **Expected Result**
- **Actual Result**
- **Severity** - Critical/Major/Normal/Minor
- **Priority** - High/Medium/Low
- **Additional Notes** - logs, attachments or assumptions

Do not invent facts that are not supported by the notes; mark unknown details as \"Not specified\".",
        notes = req.notes.trim(),
    )
}
