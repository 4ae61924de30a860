//! Per-requester intake sessions and per-key serialization

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::models::{RequestData, Template};
use crate::core::types::Identity;

pub const TITLE_FIELD: &str = "title";
pub const DESCRIPTION_FIELD: &str = "description";

/// Which form field the next free-text message fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStep {
    AwaitingTitle,
    AwaitingDescription,
}

/// In-progress intake form of one requester.
///
/// The template is a copy taken at selection time, later catalog edits do not
/// affect a running session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub requester: Identity,
    pub template: Template,
    pub fields: RequestData,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(requester: Identity, template: Template) -> Self {
        Self {
            requester,
            template,
            fields: RequestData::new(),
            started_at: Utc::now(),
        }
    }

    /// The first unset field decides the step.
    pub fn step(&self) -> IntakeStep {
        if self.fields.contains_key(TITLE_FIELD) {
            IntakeStep::AwaitingDescription
        } else {
            IntakeStep::AwaitingTitle
        }
    }
}

/// Storage of intake sessions, at most one per requester.
///
/// Callers serialize access per requester; the store itself only has to be
/// safe for concurrent use across different keys.
pub trait SessionStore: Send + Sync {
    fn get(&self, requester: &Identity) -> Option<Session>;

    /// Stores a session, returning the one it replaced.
    fn put(&self, session: Session) -> Option<Session>;

    fn delete(&self, requester: &Identity) -> Option<Session>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local session store. Sessions are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<Identity, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, requester: &Identity) -> Option<Session> {
        self.sessions.get(requester).map(|entry| entry.value().clone())
    }

    fn put(&self, session: Session) -> Option<Session> {
        self.sessions.insert(session.requester.clone(), session)
    }

    fn delete(&self, requester: &Identity) -> Option<Session> {
        self.sessions.remove(requester).map(|(_, session)| session)
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// One async mutex per key, created on demand and dropped when idle.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { locks: DashMap::new() }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `key` is active.
    pub async fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        let mutex = Arc::clone(&self.locks.entry(key.clone()).or_default());
        let guard = mutex.lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live mutex.
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }
}

pub struct KeyGuard<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        // Release first so an idle mutex is only referenced by the map.
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Category, Priority};
    use std::time::Duration;

    fn template(id: i64) -> Template {
        Template {
            id,
            name: format!("Template {}", id),
            description: None,
            category: Category::Expense,
            priority: Priority::Medium,
            estimated_time_hours: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_step_follows_unset_fields() {
        let mut session = Session::new(Identity::from("u"), template(1));
        assert_eq!(session.step(), IntakeStep::AwaitingTitle);
        session.fields.insert(TITLE_FIELD.to_string(), "Office supplies".to_string());
        assert_eq!(session.step(), IntakeStep::AwaitingDescription);
    }

    #[test]
    fn test_put_replaces_previous_session() {
        let store = InMemorySessionStore::new();
        assert!(store.put(Session::new(Identity::from("u"), template(1))).is_none());

        let replaced = store.put(Session::new(Identity::from("u"), template(2))).unwrap();
        assert_eq!(replaced.template.id, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&Identity::from("u")).unwrap().template.id, 2);

        assert!(store.delete(&Identity::from("u")).is_some());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<Identity>::new());
        let counter = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&Identity::from("same")).await;
                counter.lock().unwrap().push(("enter", i));
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.lock().unwrap().push(("leave", i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let events = counter.lock().unwrap().clone();
        for pair in events.chunks(2) {
            assert_eq!(pair[0].0, "enter");
            assert_eq!(pair[1].0, "leave");
            assert_eq!(pair[0].1, pair[1].1);
        }
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::<i64>::new();
        let _a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&2)).await;
        assert!(b.is_ok());
    }
}
