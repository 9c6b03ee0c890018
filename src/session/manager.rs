// Session manager: creation, eviction policy, validation, anomaly detection

use super::store::SessionStore;
use super::types::{SessionConfig, SessionRecord, SessionStats};
use crate::security::{SecurityEvent, SecurityEventSink, SecuritySeverity};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Public-facing session component.
///
/// Owns the store behind a single lock; every compound sequence (the
/// create-time eviction scan, validate's check-then-touch, the expiry sweep)
/// runs under one continuously held guard so the per-user cap cannot be
/// violated by interleaved calls. Anomalies are reported to the sink after
/// the guard is released.
pub struct SessionManager {
    pub(crate) store: RwLock<SessionStore>,
    sink: Arc<dyn SecurityEventSink>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(config: SessionConfig, sink: Arc<dyn SecurityEventSink>) -> Self {
        Self {
            store: RwLock::new(SessionStore::new()),
            sink,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a new session for a user, returning the fresh session id.
    ///
    /// When the user is already at the concurrent-session cap, exactly one
    /// session is evicted to make room: the one with the earliest login
    /// time. Below the cap nothing is evicted.
    pub async fn create_session(
        &self,
        user_id: i64,
        user_type: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> String {
        let mut evicted = None;
        let session_id;

        {
            let mut store = self.store.write().await;

            if store.user_session_count(user_id) >= self.config.max_sessions_per_user {
                if let Some(oldest) = store.oldest_session_for_user(user_id) {
                    evicted = store.remove(&oldest);
                }
            }

            // ids must stay unique for the process lifetime; re-roll the
            // random suffix under the lock on a collision
            session_id = loop {
                let candidate = generate_session_id(user_id);
                if !store.contains(&candidate) {
                    break candidate;
                }
            };

            store.insert(SessionRecord::new(
                session_id.clone(),
                user_id,
                user_type,
                ip_address,
                user_agent,
            ));
        }

        if let Some(old) = evicted {
            warn!(
                "User {} reached the session cap ({}), evicted oldest session {}",
                user_id, self.config.max_sessions_per_user, old.session_id
            );
        }

        info!(
            "Created session {} for user {} ({})",
            session_id, user_id, user_type
        );

        session_id
    }

    /// Check that a session exists, belongs to the expected user, and is not
    /// idle past the timeout. Success refreshes the last-activity timestamp
    /// (sliding-window expiry).
    ///
    /// An ownership mismatch is reported to the security sink with both the
    /// expected and actual user id; an idle session is invalidated as a side
    /// effect. All failures return false, none are errors.
    pub async fn validate_session(&self, session_id: &str, expected_user_id: i64) -> bool {
        let now = Utc::now();

        let (owner_id, owner_type) = {
            let mut store = self.store.write().await;

            let (owner_id, owner_type, last_activity) = match store.get(session_id) {
                Some(record) => (record.user_id, record.user_type.clone(), record.last_activity),
                None => return false,
            };

            if owner_id == expected_user_id {
                if now - last_activity > self.config.session_timeout() {
                    store.remove(session_id);
                    debug!(
                        "Session {} expired after exceeding the {}s idle timeout",
                        session_id, self.config.session_timeout_secs
                    );
                    return false;
                }

                store.touch(session_id, now);
                return true;
            }

            (owner_id, owner_type)
        };

        warn!(
            "Session {} belongs to user {}, not user {}",
            session_id, owner_id, expected_user_id
        );

        self.report(
            SecurityEvent::builder()
                .context("session_validation")
                .description("Session user mismatch")
                .user_id(owner_id)
                .user_type(owner_type)
                .severity(SecuritySeverity::Critical)
                .detail("session_id", session_id)
                .detail("expected_user_id", expected_user_id.to_string())
                .detail("actual_user_id", owner_id.to_string())
                .build(),
        )
        .await;

        false
    }

    /// Terminate a session. Unknown or already-terminated ids are a no-op.
    pub async fn invalidate_session(&self, session_id: &str) {
        let removed = self.store.write().await.remove(session_id);

        if let Some(record) = removed {
            info!(
                "Invalidated session {} for user {}",
                session_id, record.user_id
            );
        }
    }

    /// Terminate every active session for a user (password change, "log out
    /// everywhere", account suspension).
    pub async fn invalidate_all_user_sessions(&self, user_id: i64) {
        let mut count = 0;

        {
            let mut store = self.store.write().await;
            // snapshot the id set; removal mutates it
            for session_id in store.user_session_ids(user_id) {
                if store.remove(&session_id).is_some() {
                    count += 1;
                }
            }
        }

        info!("Invalidated {} sessions for user {}", count, user_id);
    }

    /// Compare an observed network fingerprint against the one recorded at
    /// session creation. Returns true when either component drifted.
    ///
    /// At most one anomaly is reported per call; the IP check takes
    /// precedence over the user-agent check. Unknown ids return false with
    /// no report. The session is never invalidated here; that decision is
    /// the caller's.
    pub async fn detect_suspicious_activity(
        &self,
        session_id: &str,
        observed_ip: &str,
        observed_user_agent: &str,
    ) -> bool {
        let record = {
            let store = self.store.read().await;
            match store.get(session_id) {
                Some(record) => record.clone(),
                None => return false,
            }
        };

        if record.ip_address != observed_ip {
            warn!(
                "Session {}: IP address changed from {} to {}",
                session_id, record.ip_address, observed_ip
            );

            self.report(
                SecurityEvent::builder()
                    .context("anomaly_detection")
                    .description("IP address changed")
                    .user_id(record.user_id)
                    .user_type(record.user_type)
                    .severity(SecuritySeverity::Warning)
                    .detail("session_id", session_id)
                    .detail("old_ip", record.ip_address)
                    .detail("new_ip", observed_ip)
                    .build(),
            )
            .await;

            return true;
        }

        if record.user_agent != observed_user_agent {
            warn!(
                "Session {}: User-Agent changed from {:?} to {:?}",
                session_id, record.user_agent, observed_user_agent
            );

            self.report(
                SecurityEvent::builder()
                    .context("anomaly_detection")
                    .description("User-Agent changed")
                    .user_id(record.user_id)
                    .user_type(record.user_type)
                    .severity(SecuritySeverity::Warning)
                    .detail("session_id", session_id)
                    .detail("old_user_agent", record.user_agent)
                    .detail("new_user_agent", observed_user_agent)
                    .build(),
            )
            .await;

            return true;
        }

        false
    }

    /// Remove every session whose idle time exceeds the timeout. Called by
    /// the expiry sweeper; also usable directly.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let now = Utc::now();
        let timeout = self.config.session_timeout();

        let mut store = self.store.write().await;
        let expired = store.expired_session_ids(timeout, now);
        let count = expired.len();

        for session_id in expired {
            store.remove(&session_id);
        }

        if count > 0 {
            debug!("Cleaned up {} expired sessions", count);
        }

        count
    }

    /// Number of active sessions for a user
    pub async fn get_active_session_count(&self, user_id: i64) -> usize {
        self.store.read().await.user_session_count(user_id)
    }

    /// A user's active sessions, most recent activity first ("manage your
    /// devices" view)
    pub async fn get_active_sessions(&self, user_id: i64) -> Vec<SessionRecord> {
        let mut records = self.store.read().await.user_records(user_id);
        records.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        records
    }

    /// Every active session in the store, for operational use
    pub async fn get_all_sessions(&self) -> Vec<SessionRecord> {
        self.store.read().await.all_records()
    }

    /// Aggregate counts for monitoring
    pub async fn get_session_stats(&self) -> SessionStats {
        let store = self.store.read().await;

        let total = store.session_count();
        let users = store.user_count();

        let mut by_user_type: HashMap<String, usize> = HashMap::new();
        for record in store.records() {
            *by_user_type.entry(record.user_type.clone()).or_insert(0) += 1;
        }

        SessionStats {
            total_active_sessions: total,
            unique_users: users,
            average_sessions_per_user: if users == 0 {
                0.0
            } else {
                total as f64 / users as f64
            },
            by_user_type,
        }
    }

    /// Reporting is best effort; a failing sink never affects the session
    /// operation that raised the event.
    async fn report(&self, event: SecurityEvent) {
        if let Err(e) = self.sink.report_suspicious_activity(event).await {
            error!("Failed to report security event: {}", e);
        }
    }
}

/// Generate a session id: owner, creation time in base 36, and nine random
/// alphanumeric characters
fn generate_session_id(user_id: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();

    format!(
        "{}_{}_{}",
        user_id,
        encode_base36(Utc::now().timestamp_millis() as u64),
        suffix
    )
}

fn encode_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }

    out.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::MemorySecurityEventSink;
    use chrono::Duration;

    fn manager_with_sink() -> (SessionManager, Arc<MemorySecurityEventSink>) {
        let sink = Arc::new(MemorySecurityEventSink::new());
        let manager = SessionManager::new(SessionConfig::default(), sink.clone());
        (manager, sink)
    }

    #[tokio::test]
    async fn test_create_session() {
        let (manager, _) = manager_with_sink();

        let sid = manager
            .create_session(1, "instructor", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(sid.starts_with("1_"));
        assert_eq!(manager.get_active_session_count(1).await, 1);

        let sessions = manager.get_active_sessions(1).await;
        assert_eq!(sessions[0].session_id, sid);
        assert_eq!(sessions[0].user_type, "instructor");
        assert!(sessions[0].is_active);
    }

    #[tokio::test]
    async fn test_session_cap_never_exceeded() {
        let (manager, _) = manager_with_sink();

        for i in 0..6 {
            manager
                .create_session(1, "customer", &format!("192.168.1.{}", i), "Mozilla/5.0")
                .await;
            assert!(manager.get_active_session_count(1).await <= 3);
        }

        assert_eq!(manager.get_active_session_count(1).await, 3);
    }

    #[tokio::test]
    async fn test_eviction_removes_oldest_only() {
        let (manager, _) = manager_with_sink();

        let first = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;
        let second = manager
            .create_session(1, "customer", "192.168.1.2", "Mozilla/5.0")
            .await;
        let third = manager
            .create_session(1, "customer", "192.168.1.3", "Mozilla/5.0")
            .await;

        // backdate the first session so eviction ordering does not depend
        // on sub-millisecond timing
        {
            let mut store = manager.store.write().await;
            let mut record = store.remove(&first).unwrap();
            record.is_active = true;
            record.login_time = Utc::now() - Duration::minutes(10);
            record.last_activity = record.login_time;
            store.insert(record);
        }

        let fourth = manager
            .create_session(1, "customer", "192.168.1.4", "Mozilla/5.0")
            .await;

        assert_eq!(manager.get_active_session_count(1).await, 3);
        assert!(!manager.validate_session(&first, 1).await);
        assert!(manager.validate_session(&second, 1).await);
        assert!(manager.validate_session(&third, 1).await);
        assert!(manager.validate_session(&fourth, 1).await);
    }

    #[tokio::test]
    async fn test_no_eviction_below_cap() {
        let (manager, _) = manager_with_sink();

        let first = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;
        manager
            .create_session(1, "customer", "192.168.1.2", "Mozilla/5.0")
            .await;

        assert!(manager.validate_session(&first, 1).await);
        assert_eq!(manager.get_active_session_count(1).await, 2);
    }

    #[tokio::test]
    async fn test_validate_refreshes_last_activity() {
        let (manager, _) = manager_with_sink();

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        let stale = Utc::now() - Duration::hours(5);
        manager.store.write().await.touch(&sid, stale);

        assert!(manager.validate_session(&sid, 1).await);

        let sessions = manager.get_active_sessions(1).await;
        assert!(sessions[0].last_activity > stale);
    }

    #[tokio::test]
    async fn test_validate_unknown_session() {
        let (manager, sink) = manager_with_sink();

        assert!(!manager.validate_session("nonexistent", 1).await);
        assert!(sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_validate_ownership_mismatch_is_reported() {
        let (manager, sink) = manager_with_sink();

        let sid = manager
            .create_session(1, "instructor", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(!manager.validate_session(&sid, 999).await);

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].description, "Session user mismatch");
        assert_eq!(events[0].user_id, Some(1));
        assert_eq!(
            events[0].details.get("expected_user_id"),
            Some(&"999".to_string())
        );
        assert_eq!(
            events[0].details.get("actual_user_id"),
            Some(&"1".to_string())
        );

        // the mismatch does not terminate the session for its real owner
        assert!(manager.validate_session(&sid, 1).await);
    }

    #[tokio::test]
    async fn test_validate_expired_session_is_invalidated() {
        let (manager, _) = manager_with_sink();

        let now = Utc::now();
        let mut record =
            SessionRecord::new("stale".to_string(), 1, "customer", "192.168.1.1", "UA");
        record.login_time = now - Duration::hours(30);
        record.last_activity = now - Duration::hours(25);
        manager.store.write().await.insert(record);

        assert!(!manager.validate_session("stale", 1).await);
        assert_eq!(manager.get_active_session_count(1).await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (manager, _) = manager_with_sink();

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        manager.invalidate_session("nonexistent").await;
        assert_eq!(manager.get_active_session_count(1).await, 1);

        manager.invalidate_session(&sid).await;
        manager.invalidate_session(&sid).await;
        assert_eq!(manager.get_active_session_count(1).await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_all_user_sessions() {
        let (manager, _) = manager_with_sink();

        for i in 0..3 {
            manager
                .create_session(1, "customer", &format!("192.168.1.{}", i), "Mozilla/5.0")
                .await;
        }
        let other = manager
            .create_session(2, "instructor", "10.0.0.1", "Mozilla/5.0")
            .await;

        manager.invalidate_all_user_sessions(1).await;

        assert_eq!(manager.get_active_session_count(1).await, 0);
        assert!(manager.get_active_sessions(1).await.is_empty());
        assert!(manager.validate_session(&other, 2).await);
    }

    #[tokio::test]
    async fn test_detect_ip_change() {
        let (manager, sink) = manager_with_sink();

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(
            manager
                .detect_suspicious_activity(&sid, "10.0.0.1", "Mozilla/5.0")
                .await
        );

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].description, "IP address changed");
        assert_eq!(events[0].details.get("old_ip"), Some(&"192.168.1.1".to_string()));
        assert_eq!(events[0].details.get("new_ip"), Some(&"10.0.0.1".to_string()));
    }

    #[tokio::test]
    async fn test_detect_user_agent_change() {
        let (manager, sink) = manager_with_sink();

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(
            manager
                .detect_suspicious_activity(&sid, "192.168.1.1", "curl/8.0")
                .await
        );

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].description, "User-Agent changed");
    }

    #[tokio::test]
    async fn test_detect_ip_takes_precedence_over_user_agent() {
        let (manager, sink) = manager_with_sink();

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(
            manager
                .detect_suspicious_activity(&sid, "10.0.0.1", "curl/8.0")
                .await
        );

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].description, "IP address changed");
    }

    #[tokio::test]
    async fn test_detect_matching_fingerprint() {
        let (manager, sink) = manager_with_sink();

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(
            !manager
                .detect_suspicious_activity(&sid, "192.168.1.1", "Mozilla/5.0")
                .await
        );
        assert!(sink.events().await.is_empty());

        // detection never invalidates
        assert!(manager.validate_session(&sid, 1).await);
    }

    #[tokio::test]
    async fn test_detect_unknown_session() {
        let (manager, sink) = manager_with_sink();

        assert!(
            !manager
                .detect_suspicious_activity("nonexistent", "10.0.0.1", "curl/8.0")
                .await
        );
        assert!(sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (manager, _) = manager_with_sink();

        let now = Utc::now();
        let mut stale = SessionRecord::new("stale".to_string(), 1, "customer", "ip", "ua");
        stale.login_time = now - Duration::hours(30);
        stale.last_activity = now - Duration::hours(25);
        manager.store.write().await.insert(stale);

        let fresh = manager
            .create_session(2, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert_eq!(manager.cleanup_expired_sessions().await, 1);
        assert_eq!(manager.get_active_session_count(1).await, 0);
        assert!(manager.validate_session(&fresh, 2).await);

        // nothing left to expire
        assert_eq!(manager.cleanup_expired_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_session_stats() {
        let (manager, _) = manager_with_sink();

        manager
            .create_session(1, "instructor", "192.168.1.1", "Mozilla/5.0")
            .await;
        manager
            .create_session(1, "instructor", "192.168.1.2", "Mozilla/5.0")
            .await;
        manager
            .create_session(2, "customer", "10.0.0.1", "Mozilla/5.0")
            .await;

        let stats = manager.get_session_stats().await;
        assert_eq!(stats.total_active_sessions, 3);
        assert_eq!(stats.unique_users, 2);
        assert!((stats.average_sessions_per_user - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats.by_user_type.get("instructor"), Some(&2));
        assert_eq!(stats.by_user_type.get("customer"), Some(&1));
    }

    #[tokio::test]
    async fn test_session_stats_empty() {
        let (manager, _) = manager_with_sink();

        let stats = manager.get_session_stats().await;
        assert_eq!(stats.total_active_sessions, 0);
        assert_eq!(stats.unique_users, 0);
        assert_eq!(stats.average_sessions_per_user, 0.0);
        assert!(stats.by_user_type.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_affect_results() {
        struct FailingSink;

        #[async_trait::async_trait]
        impl SecurityEventSink for FailingSink {
            async fn report_suspicious_activity(
                &self,
                _event: SecurityEvent,
            ) -> Result<(), String> {
                Err("sink unavailable".to_string())
            }
        }

        let manager = SessionManager::new(SessionConfig::default(), Arc::new(FailingSink));

        let sid = manager
            .create_session(1, "customer", "192.168.1.1", "Mozilla/5.0")
            .await;

        assert!(!manager.validate_session(&sid, 999).await);
        assert!(
            manager
                .detect_suspicious_activity(&sid, "10.0.0.1", "Mozilla/5.0")
                .await
        );
        assert!(manager.validate_session(&sid, 1).await);
    }

    #[test]
    fn test_encode_base36() {
        assert_eq!(encode_base36(0), "0");
        assert_eq!(encode_base36(35), "z");
        assert_eq!(encode_base36(36), "10");
        assert_eq!(encode_base36(1_000_000), "lfls");
    }

    #[test]
    fn test_generate_session_id_format() {
        let id = generate_session_id(42);
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "42");
        assert!(!parts[1].is_empty());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
