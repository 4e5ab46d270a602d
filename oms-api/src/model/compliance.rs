use super::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Blocking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceFlagType {
    RestrictedInstrument,
    ConcentrationLimit,
    /// The compliance collaborator could not be reached.
    ComplianceUnavailable,
}

/// Result of a pre-trade rule, attached to the order. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFlag {
    pub flag_type: ComplianceFlagType,
    pub severity: Severity,
    pub description: String,
    pub requires_approval: bool,
    #[serde(default)]
    pub approved_by: Option<UserId>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    pub raised_at: DateTime<Utc>,
}

impl ComplianceFlag {
    pub fn new(
        flag_type: ComplianceFlagType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            flag_type,
            severity,
            description: description.into(),
            requires_approval: severity >= Severity::Error,
            approved_by: None,
            approved_at: None,
            raised_at: Utc::now(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking && self.approved_by.is_none()
    }
}

/// Concentration-limit verdict from the compliance rules engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationVerdict {
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
}

impl ConcentrationVerdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            severity: Severity::Info,
            message: String::new(),
        }
    }

    pub fn breach(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            severity,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheckResult {
    pub passed: bool,
    pub flags: Vec<ComplianceFlag>,
}

impl ComplianceCheckResult {
    pub fn from_flags(flags: Vec<ComplianceFlag>) -> Self {
        Self {
            passed: !flags.iter().any(ComplianceFlag::is_blocking),
            flags,
        }
    }

    pub fn blocking_flags(&self) -> Vec<ComplianceFlag> {
        self.flags.iter().filter(|f| f.is_blocking()).cloned().collect()
    }
}
