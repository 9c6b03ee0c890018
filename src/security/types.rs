// Security event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of a reported security event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SecuritySeverity {
    /// Informational (normal operations)
    Info,
    /// Unusual but not critical
    Warning,
    /// Possible attack in progress
    Critical,
}

/// A single suspicious-activity report handed to the sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Unique identifier for the event
    pub id: String,
    /// When the event was raised
    pub timestamp: DateTime<Utc>,
    /// Component that raised the event
    pub context: String,
    /// What happened
    pub description: String,
    /// Affected user, when known
    pub user_id: Option<i64>,
    /// Affected user's role tag, when known
    pub user_type: Option<String>,
    pub severity: SecuritySeverity,
    /// Event-specific key/value pairs (old/new fingerprints, expected vs
    /// actual ids)
    pub details: HashMap<String, String>,
}

impl SecurityEvent {
    /// Create a new event builder
    pub fn builder() -> SecurityEventBuilder {
        SecurityEventBuilder::default()
    }
}

/// Builder for creating security events
#[derive(Default)]
pub struct SecurityEventBuilder {
    context: Option<String>,
    description: Option<String>,
    user_id: Option<i64>,
    user_type: Option<String>,
    severity: Option<SecuritySeverity>,
    details: HashMap<String, String>,
}

impl SecurityEventBuilder {
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = Some(user_type.into());
        self
    }

    pub fn severity(mut self, severity: SecuritySeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SecurityEvent {
        SecurityEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            context: self.context.unwrap_or_else(|| "session".to_string()),
            description: self.description.unwrap_or_default(),
            user_id: self.user_id,
            user_type: self.user_type,
            severity: self.severity.unwrap_or(SecuritySeverity::Warning),
            details: self.details,
        }
    }
}
