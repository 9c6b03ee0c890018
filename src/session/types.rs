// Session types and data structures

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Session tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum concurrent sessions per user
    #[serde(default = "default_max_sessions_per_user")]
    pub max_sessions_per_user: usize,
    /// Idle timeout in seconds; a session with no successful validation for
    /// longer than this is expired
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: i64,
    /// Interval between expiry sweeps, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_max_sessions_per_user() -> usize {
    3
}

fn default_session_timeout_secs() -> i64 {
    86_400 // 24 hours
}

fn default_cleanup_interval_secs() -> u64 {
    3_600 // sweep hourly
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_user: default_max_sessions_per_user(),
            session_timeout_secs: default_session_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl SessionConfig {
    /// Validate the configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.max_sessions_per_user == 0 {
            return Err("max_sessions_per_user must be at least 1".to_string());
        }
        if self.session_timeout_secs <= 0 {
            return Err("session_timeout_secs must be positive".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            return Err("cleanup_interval_secs must be positive".to_string());
        }
        Ok(())
    }

    /// Idle timeout as a chrono duration
    pub fn session_timeout(&self) -> Duration {
        Duration::seconds(self.session_timeout_secs)
    }

    /// Sweep interval as a std duration, for the tokio timer
    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// One tracked login session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier
    pub session_id: String,
    /// Owning account
    pub user_id: i64,
    /// Role tag carried for downstream authorization (e.g. "instructor");
    /// opaque to session tracking
    pub user_type: String,
    /// IP address at session creation time
    pub ip_address: String,
    /// User agent at session creation time
    pub user_agent: String,
    /// Creation timestamp; eviction tie-break, oldest first
    pub login_time: DateTime<Utc>,
    /// Refreshed on every successful validation; drives idle expiry
    pub last_activity: DateTime<Utc>,
    /// Cleared when the session is terminated
    pub is_active: bool,
}

impl SessionRecord {
    /// Create a new active record with both timestamps set to now
    pub fn new(
        session_id: String,
        user_id: i64,
        user_type: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            user_type: user_type.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            login_time: now,
            last_activity: now,
            is_active: true,
        }
    }

    /// Time since the last successful validation
    pub fn idle_time(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity
    }

    /// Whether the session has exceeded the idle timeout
    pub fn is_expired(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        self.idle_time(now) > timeout
    }
}

/// Aggregate session counts for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_active_sessions: usize,
    pub unique_users: usize,
    /// total_active_sessions / unique_users, 0 when no users
    pub average_sessions_per_user: f64,
    /// Active sessions broken down by role tag
    pub by_user_type: HashMap<String, usize>,
}
