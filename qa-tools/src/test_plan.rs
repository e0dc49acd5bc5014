use crate::error::{Result, ToolError};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_EXPERIENCE_YEARS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Specialization {
    #[default]
    Manual,
    Automation,
    #[serde(rename = "Junior/Fresher", alias = "Junior")]
    Junior,
}

impl Specialization {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Automation => "Automation",
            Self::Junior => "Junior/Fresher",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tester {
    #[serde(default)]
    pub specialization: Specialization,
    #[serde(default = "default_experience")]
    pub experience_years: u8,
}

fn default_experience() -> u8 {
    2
}

impl Default for Tester {
    fn default() -> Self {
        Self {
            specialization: Specialization::Manual,
            experience_years: default_experience(),
        }
    }
}

/// Inclusive execution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Timeline {
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Monday through Friday inside the window.
    pub fn working_days(&self) -> i64 {
        if self.end < self.start {
            return 0;
        }
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as i64
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlanRequest {
    pub requirements: String,
    #[serde(default)]
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub testers: Vec<Tester>,
    #[serde(default)]
    pub custom_instructions: String,
}

impl TestPlanRequest {
    pub fn validate(&self) -> Result<()> {
        if self.requirements.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "requirements text or an uploaded document is required".to_string(),
            ));
        }
        if self.testers.is_empty() {
            return Err(ToolError::InvalidArguments(
                "at least one tester is required".to_string(),
            ));
        }
        if let Some(t) = self.testers.iter().find(|t| t.experience_years > MAX_EXPERIENCE_YEARS) {
            return Err(ToolError::InvalidArguments(format!(
                "tester experience must be 0..={MAX_EXPERIENCE_YEARS} years, got {}",
                t.experience_years
            )));
        }
        if self.timeline.is_some_and(|t| t.end < t.start) {
            return Err(ToolError::InvalidArguments(
                "timeline end date must not be before the start date".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn counts_total_and_working_days() {
        // Monday 2026-03-02 .. Sunday 2026-03-15
        let t = Timeline {
            start: date(2026, 3, 2),
            end: date(2026, 3, 15),
        };
        assert_eq!(t.total_days(), 14);
        assert_eq!(t.working_days(), 10);

        let weekend = Timeline {
            start: date(2026, 3, 7),
            end: date(2026, 3, 8),
        };
        assert_eq!(weekend.total_days(), 2);
        assert_eq!(weekend.working_days(), 0);
    }

    #[test]
    fn displays_iso_range() {
        let t = Timeline {
            start: date(2026, 1, 5),
            end: date(2026, 1, 9),
        };
        assert_eq!(t.to_string(), "2026-01-05 to 2026-01-09");
    }

    #[test]
    fn validation_rules() {
        let mut req = TestPlanRequest {
            requirements: "Payments".to_string(),
            timeline: None,
            testers: vec![Tester::default()],
            custom_instructions: String::new(),
        };
        req.validate().expect("valid");

        req.timeline = Some(Timeline {
            start: date(2026, 2, 2),
            end: date(2026, 2, 1),
        });
        assert!(req.validate().is_err());
        req.timeline = None;

        req.testers[0].experience_years = 11;
        assert!(req.validate().is_err());

        req.testers.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn specialization_accepts_display_names() {
        let t: Tester = serde_json::from_str(
            r#"{"specialization":"Junior/Fresher","experience_years":0}"#,
        )
        .expect("tester");
        assert_eq!(t.specialization, Specialization::Junior);
        let t: Tester = serde_json::from_str(r#"{}"#).expect("tester");
        assert_eq!(t, Tester::default());
    }
}
