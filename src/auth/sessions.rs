// src/auth/sessions.rs
// Token-keyed session registry for the HTTP surface. Each token maps to one
// SessionState plus a deadline; expiry behaves exactly like logout.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::SessionState;

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub logged_in_at: chrono::DateTime<chrono::Utc>,
}

struct Entry {
    state: SessionState,
    logged_in_at: chrono::DateTime<chrono::Utc>,
    deadline: Instant,
}

/// In-memory session registry with a fixed TTL, refreshed on each lookup.
pub struct SessionRegistry {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register an authenticated session state and hand out its opaque token.
    pub fn insert(&self, state: SessionState) -> String {
        debug_assert!(state.is_authenticated());
        let token = Uuid::new_v4().to_string();
        let entry = Entry {
            state,
            logged_in_at: chrono::Utc::now(),
            deadline: Instant::now() + self.ttl,
        };
        self.entries
            .lock()
            .expect("session registry lock poisoned")
            .insert(token.clone(), entry);
        token
    }

    /// Look up a live session, refreshing its deadline. Expired entries are
    /// dropped on the way, indistinguishable from a logout.
    pub fn get(&self, token: &str) -> Option<Session> {
        let mut entries = self.entries.lock().expect("session registry lock poisoned");
        let now = Instant::now();
        match entries.get_mut(token) {
            Some(entry) if entry.deadline > now => {
                entry.deadline = now + self.ttl;
                entry.state.username().map(|username| Session {
                    username: username.to_string(),
                    logged_in_at: entry.logged_in_at,
                })
            }
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    /// Log out: remove the token and reset its state.
    pub fn remove(&self, token: &str) -> bool {
        let mut entries = self.entries.lock().expect("session registry lock poisoned");
        match entries.remove(token) {
            Some(mut entry) => {
                entry.state.logout();
                true
            }
            None => false,
        }
    }

    /// Drop every expired entry. Called opportunistically from the login path
    /// so abandoned sessions do not accumulate.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("session registry lock poisoned")
            .retain(|_, entry| entry.deadline > now);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
