use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries considered when building the conversation prompt, counting the
/// message being answered.
pub const CHAT_HISTORY_WINDOW: usize = 10;

pub const QUICK_PROMPTS: [&str; 5] = [
    "What are best practices for writing test cases?",
    "Explain the difference between unit and integration tests",
    "How do I set up Selenium WebDriver?",
    "What is the testing pyramid?",
    "Tips for effective bug reporting",
];

const PERSONA: &str = "You are a helpful AI assistant specializing in QA, testing, and software development. Be conversational, friendly, and helpful.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    /// UI notices such as "file attached"; never sent to the model.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// Conversation prompt for the latest user entry in `history`.
///
/// `attachment` is `(file name, extracted text)` of a file sent along with
/// the message.
pub fn build_chat_prompt(history: &[ChatEntry], attachment: Option<(&str, &str)>) -> String {
    let mut prompt = format!("{PERSONA}\n\n");
    if let Some((name, content)) = attachment {
        prompt.push_str(&format!(
            "USER ATTACHED A FILE. HERE IS THE CONTENT:\n\n\n--- ATTACHED FILE: {name} ---\n{content}\n-----------------------------\n\n\n"
        ));
    }

    let (latest, earlier) = match history.split_last() {
        Some((last, rest)) if last.role == ChatRole::User => (last.content.as_str(), rest),
        _ => ("", history),
    };
    let start = earlier.len().saturating_sub(CHAT_HISTORY_WINDOW - 1);
    for entry in &earlier[start..] {
        let speaker = match entry.role {
            ChatRole::System => continue,
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{speaker}: {}\n\n", entry.content));
    }
    prompt.push_str(&format!("User: {latest}\n\nAssistant:"));
    prompt
}

/// One-shot prompt for the canned questions.
pub fn quick_prompt(question: &str) -> String {
    format!(
        "You are a helpful AI assistant specializing in QA and testing. Answer this question:\n\n{}",
        question.trim()
    )
}
