//! Common test utilities
//!
//! Shared by the fincore integration tests: a recording notifier and an
//! environment that wires the intake machine to a temporary SQLite database.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use fincore::core::models::{NewTemplate, Template};
use fincore::core::types::{Category, Identity, Priority, Role};
use fincore::intake::{InMemorySessionStore, IntakeMachine};
use fincore::notify::{Notification, Notifier};
use fincore::storage::{create_pool, DbPool, SqliteRoleDirectory, SqliteTemplateCatalog, SqliteTicketRepository};

/// Records every delivery attempt; recipients in `failing` report failure.
#[derive(Default)]
pub struct RecordingNotifier {
    failing: HashSet<Identity>,
    delivered: Mutex<Vec<(Identity, Notification)>>,
    attempts: Mutex<Vec<Identity>>,
}

impl RecordingNotifier {
    pub fn failing_for(ids: &[Identity]) -> Self {
        Self {
            failing: ids.iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn received(&self, recipient: &Identity) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn attempts_for(&self, recipient: &Identity) -> usize {
        self.attempts.lock().unwrap().iter().filter(|to| *to == recipient).count()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
        self.attempts.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &Identity, notification: &Notification) -> bool {
        self.attempts.lock().unwrap().push(recipient.clone());
        if self.failing.contains(recipient) {
            return false;
        }
        self.delivered
            .lock()
            .unwrap()
            .push((recipient.clone(), notification.clone()));
        true
    }
}

pub struct TestEnvironment {
    _db_file: NamedTempFile,
    pub pool: DbPool,
    pub notifier: Arc<RecordingNotifier>,
    pub sessions: Arc<InMemorySessionStore>,
    pub tickets: Arc<SqliteTicketRepository>,
    pub templates: Arc<SqliteTemplateCatalog>,
    pub roles: Arc<SqliteRoleDirectory>,
    pub machine: IntakeMachine,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        let db_file = NamedTempFile::new().unwrap();
        let pool = create_pool(db_file.path().to_str().unwrap()).unwrap();

        let notifier = Arc::new(notifier);
        let sessions = Arc::new(InMemorySessionStore::new());
        let tickets = Arc::new(SqliteTicketRepository::new(pool.clone()));
        let templates = Arc::new(SqliteTemplateCatalog::new(pool.clone()));
        let roles = Arc::new(SqliteRoleDirectory::new(pool.clone()));

        let machine = IntakeMachine::new(
            sessions.clone(),
            tickets.clone(),
            templates.clone(),
            roles.clone(),
            notifier.clone(),
        );

        Self {
            _db_file: db_file,
            pool,
            notifier,
            sessions,
            tickets,
            templates,
            roles,
            machine,
        }
    }

    pub fn template(&self, name: &str, category: Category, priority: Priority) -> Template {
        self.templates
            .create_template(&NewTemplate {
                name: name.to_string(),
                description: None,
                category,
                priority,
                estimated_time_hours: None,
            })
            .unwrap()
    }

    pub fn reviewers(&self, ids: &[i64]) -> Vec<Identity> {
        self.roles.grant_all(ids, Role::REVIEWER).unwrap();
        ids.iter().map(|id| Identity::from(*id)).collect()
    }
}
