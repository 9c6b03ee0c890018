// Security event sinks

use super::types::{SecurityEvent, SecuritySeverity};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Consumer of suspicious-activity reports.
///
/// Reporting is fire and forget: callers log and discard sink errors, so a
/// failing sink never changes the outcome of a session operation. How events
/// are persisted or routed (structured log, alerting, SIEM) is the sink's
/// business.
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    /// Deliver one event
    async fn report_suspicious_activity(&self, event: SecurityEvent) -> Result<(), String>;
}

/// Sink that forwards events to the tracing pipeline
pub struct TracingSecurityEventSink;

#[async_trait]
impl SecurityEventSink for TracingSecurityEventSink {
    async fn report_suspicious_activity(&self, event: SecurityEvent) -> Result<(), String> {
        match event.severity {
            SecuritySeverity::Critical => error!(
                "Security event [{}]: {} (user: {:?}, details: {:?})",
                event.context, event.description, event.user_id, event.details
            ),
            _ => warn!(
                "Security event [{}]: {} (user: {:?}, details: {:?})",
                event.context, event.description, event.user_id, event.details
            ),
        }

        Ok(())
    }
}

/// In-memory sink retaining every reported event
/// Suitable for development and testing
pub struct MemorySecurityEventSink {
    events: Arc<RwLock<Vec<SecurityEvent>>>,
}

impl MemorySecurityEventSink {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshot of everything reported so far
    pub async fn events(&self) -> Vec<SecurityEvent> {
        self.events.read().await.clone()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

impl Default for MemorySecurityEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecurityEventSink for MemorySecurityEventSink {
    async fn report_suspicious_activity(&self, event: SecurityEvent) -> Result<(), String> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }
}
