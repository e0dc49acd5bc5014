//! In-memory QA sessions keyed by UUID.
//!
//! Each session is one user's workspace: provider choice and credential
//! overrides, test cases, generated code, test plan, bug reports and chat
//! history. Nothing is persisted; idle sessions are pruned.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use qa_llm::{CredentialOverrides, GatewayConfig, ProviderKind, ProviderSelector};
use qa_tools::{ChatEntry, GeneratedFile, TestCaseStore, TestPlanRequest};
use serde::Serialize;
use uuid::Uuid;

/// Settings that change which provider a session's calls go to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSettings {
    /// `None` defers to the server-wide selector.
    pub provider: Option<ProviderSelector>,
    #[serde(skip)]
    pub credentials: CredentialOverrides,
    pub github_model: Option<String>,
}

impl SessionSettings {
    /// Layer this session's choices over the server defaults.
    pub fn gateway_config(&self, base: &GatewayConfig) -> GatewayConfig {
        let mut cfg = base.clone();
        if let Some(selector) = self.provider {
            cfg.selector = selector;
        }
        cfg.credentials = base.credentials.overlay(&self.credentials);
        if let Some(model) = self.github_model.as_deref().filter(|m| !m.trim().is_empty()) {
            cfg.github_model = Some(model.to_string());
        }
        cfg
    }

    /// Providers that have a session-level credential, for display.
    pub fn overridden_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::FALLBACK_ORDER
            .into_iter()
            .filter(|kind| self.credentials.get(*kind).is_some())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSuite {
    /// `combined` or the test case id the code was generated for.
    pub label: String,
    pub test_case_ids: Vec<String>,
    pub files: Vec<GeneratedFile>,
    pub raw: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPlan {
    pub markdown: String,
    pub total_days: Option<i64>,
    pub working_days: Option<i64>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BugReport {
    pub id: Uuid,
    pub notes: String,
    pub markdown: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub settings: SessionSettings,
    pub test_cases: TestCaseStore,
    pub automation: Vec<GeneratedSuite>,
    pub test_plan_request: Option<TestPlanRequest>,
    pub test_plan: Option<GeneratedPlan>,
    pub bug_reports: Vec<BugReport>,
    pub chat: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(module: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            settings: SessionSettings::default(),
            test_cases: TestCaseStore::new(module),
            automation: Vec::new(),
            test_plan_request: None,
            test_plan: None,
            bug_reports: Vec::new(),
            chat: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            last_active: self.last_active,
            provider: self.settings.provider,
            module: self.test_cases.module().to_string(),
            test_cases: self.test_cases.len(),
            automation_suites: self.automation.len(),
            has_test_plan: self.test_plan.is_some(),
            bug_reports: self.bug_reports.len(),
            chat_messages: self.chat.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub provider: Option<ProviderSelector>,
    pub module: String,
    pub test_cases: usize,
    pub automation_suites: usize,
    pub has_test_plan: bool,
    pub bug_reports: usize,
    pub chat_messages: usize,
}

pub struct SessionManager {
    sessions: DashMap<Uuid, Session>,
    default_module: String,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(default_module: &str, idle_timeout: std::time::Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            default_module: default_module.to_string(),
            idle_timeout: Duration::from_std(idle_timeout).unwrap_or(Duration::MAX),
        }
    }

    pub fn create(&self) -> SessionSummary {
        let session = Session::new(&self.default_module);
        let summary = session.summary();
        self.sessions.insert(session.id, session);
        tracing::info!(session_id = %summary.id, "session created");
        summary
    }

    /// Mutable access that also marks the session active.
    pub fn get_mut(&self, id: Uuid) -> Option<RefMut<'_, Uuid, Session>> {
        let mut entry = self.sessions.get_mut(&id)?;
        entry.touch();
        Some(entry)
    }

    /// Run `f` against a snapshot without holding the shard lock afterwards.
    pub fn read<T>(&self, id: Uuid, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.sessions.get(&id).map(|entry| f(entry.value()))
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> =
            self.sessions.iter().map(|entry| entry.summary()).collect();
        out.sort_by_key(|s| s.last_active);
        out.reverse();
        out
    }

    pub fn delete(&self, id: Uuid) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session deleted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle for longer than the configured timeout.
    pub fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.signed_duration_since(s.last_active) <= self.idle_timeout);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            tracing::info!(pruned, remaining = self.sessions.len(), "idle sessions pruned");
        }
        pruned
    }
}
