// Dual-index session store

use super::types::SessionRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// In-memory store owning every tracked session.
///
/// Two indexes are kept in lockstep: the flat `session_id -> record` map and
/// the `user_id -> {session_id}` set used for per-user enumeration. `insert`
/// and `remove` are the only mutation entry points that change membership,
/// and each updates both indexes, so a record is in the map exactly when its
/// id is in the owning user's set and every stored record is active.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, SessionRecord>,
    user_sessions: HashMap<i64, HashSet<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session id is known to the store
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Add a record to both indexes
    pub fn insert(&mut self, record: SessionRecord) {
        self.user_sessions
            .entry(record.user_id)
            .or_default()
            .insert(record.session_id.clone());
        self.sessions.insert(record.session_id.clone(), record);
    }

    /// Remove a record from both indexes.
    ///
    /// The returned record has `is_active` cleared. An emptied user set is
    /// dropped entirely rather than left dangling. Unknown ids return None.
    pub fn remove(&mut self, session_id: &str) -> Option<SessionRecord> {
        let mut record = self.sessions.remove(session_id)?;
        record.is_active = false;

        if let Some(ids) = self.user_sessions.get_mut(&record.user_id) {
            ids.remove(session_id);
            if ids.is_empty() {
                self.user_sessions.remove(&record.user_id);
            }
        }

        Some(record)
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionRecord> {
        self.sessions.get(session_id)
    }

    /// Refresh a session's last-activity timestamp
    pub fn touch(&mut self, session_id: &str, at: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(record) => {
                record.last_activity = at;
                true
            }
            None => false,
        }
    }

    /// Snapshot of a user's session ids
    pub fn user_session_ids(&self, user_id: i64) -> Vec<String> {
        self.user_sessions
            .get(&user_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn user_session_count(&self, user_id: i64) -> usize {
        self.user_sessions.get(&user_id).map_or(0, |ids| ids.len())
    }

    /// The user's session with the earliest login time.
    ///
    /// Set entries whose record is missing from the flat map are skipped, so
    /// an inconsistent set degrades to "nothing to evict" instead of a panic.
    pub fn oldest_session_for_user(&self, user_id: i64) -> Option<String> {
        let ids = self.user_sessions.get(&user_id)?;
        ids.iter()
            .filter_map(|id| self.sessions.get(id))
            .min_by_key(|record| record.login_time)
            .map(|record| record.session_id.clone())
    }

    /// Clones of a user's records
    pub fn user_records(&self, user_id: i64) -> Vec<SessionRecord> {
        self.user_sessions
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clones of every record in the store
    pub fn all_records(&self) -> Vec<SessionRecord> {
        self.sessions.values().cloned().collect()
    }

    /// Iterate over every record without cloning
    pub fn records(&self) -> impl Iterator<Item = &SessionRecord> {
        self.sessions.values()
    }

    /// Ids of every session whose idle time exceeds the timeout
    pub fn expired_session_ids(&self, timeout: Duration, now: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .values()
            .filter(|record| record.is_expired(timeout, now))
            .map(|record| record.session_id.clone())
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn user_count(&self) -> usize {
        self.user_sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
