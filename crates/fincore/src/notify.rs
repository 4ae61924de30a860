//! Best-effort notification delivery
//!
//! A [`Notifier`] delivers one message to one recipient and reports whether it
//! got through. [`dispatch`] fans a notification out to many recipients, one
//! tokio task each, so a slow or failing recipient never holds up the others.
//! The returned [`Deliveries`] handle can be dropped (the tasks keep running) or
//! awaited for a [`DeliveryReport`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::core::metrics;
use crate::core::types::Identity;

/// A button attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accept(i64),
    View(i64),
    Complete(i64),
    Cancel(i64),
}

impl Action {
    pub fn ticket_id(&self) -> i64 {
        match self {
            Action::Accept(id) | Action::View(id) | Action::Complete(id) | Action::Cancel(id) => *id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Accept(_) => "✅ Accept",
            Action::View(_) => "👁 View",
            Action::Complete(_) => "🏁 Complete",
            Action::Cancel(_) => "❌ Cancel",
        }
    }
}

/// A plain-text message with optional action buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub actions: Vec<Action>,
}

impl Notification {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// Delivers a notification to a single recipient.
///
/// Implementations log their own failures and return `false`; they never retry.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, recipient: &Identity, notification: &Notification) -> bool;
}

/// Outcome counts of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// In-flight delivery tasks.
#[derive(Debug, Default)]
#[must_use = "drop explicitly to detach the delivery tasks, or call wait()"]
pub struct Deliveries {
    handles: Vec<JoinHandle<bool>>,
}

impl Deliveries {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn extend(&mut self, other: Deliveries) {
        self.handles.extend(other.handles);
    }

    /// Waits for every task. A panicked task counts as a failed delivery.
    pub async fn wait(self) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for handle in self.handles {
            match handle.await {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    log::error!("Notification task failed to complete: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Starts one delivery task per recipient.
///
/// Must be called from within a tokio runtime.
pub fn dispatch(notifier: &Arc<dyn Notifier>, recipients: Vec<Identity>, notification: Notification) -> Deliveries {
    let notification = Arc::new(notification);
    let handles = recipients
        .into_iter()
        .map(|recipient| {
            let notifier = Arc::clone(notifier);
            let notification = Arc::clone(&notification);
            tokio::spawn(async move {
                let delivered = notifier.notify(&recipient, &notification).await;
                metrics::record_notification(delivered);
                if !delivered {
                    log::warn!("Notification to {} was not delivered", recipient);
                }
                delivered
            })
        })
        .collect();

    Deliveries { handles }
}
