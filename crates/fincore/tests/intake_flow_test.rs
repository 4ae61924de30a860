//! Integration tests for the intake state machine over SQLite storage
//!
//! Run with: cargo test -p fincore --test intake_flow_test

mod common;

use std::sync::Arc;

use common::{RecordingNotifier, TestEnvironment};
use fincore::core::error::{AppError, AppResult};
use fincore::core::models::{Comment, NewTicket, Ticket, TicketFilter, TicketPatch, TicketStats};
use fincore::core::types::{Category, Identity, Priority, TicketStatus};
use fincore::intake::{Entity, InMemorySessionStore, IntakeError, IntakeMachine, Progress, TicketRepository};
use fincore::notify::Action;
use fincore::storage::SqliteTicketRepository;

const REQUESTER: i64 = 1001;

async fn create_ticket(env: &TestEnvironment, requester: &Identity, template_id: i64) -> Ticket {
    env.machine.select_template(requester, template_id).await.unwrap();
    env.machine.submit_text(requester, "Taxi to client meeting").await.unwrap();
    let outcome = env.machine.submit_text(requester, "15000 CLP, receipt attached").await.unwrap();
    outcome.deliveries.wait().await;
    match outcome.value {
        Progress::Created(ticket) => ticket,
        other => panic!("expected a ticket, got {:?}", other),
    }
}

// ============================================================================
// End-to-end request lifecycle
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_expense_request_reaches_both_reviewers() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001, 2002]);
        let requester = Identity::from(REQUESTER);

        let selected = env.machine.select_template(&requester, template.id).await.unwrap();
        assert_eq!(selected.value.id, template.id);

        let title = env.machine.submit_text(&requester, "Taxi to client meeting").await.unwrap();
        assert_eq!(title.value, Progress::AwaitingDescription);

        let created = env
            .machine
            .submit_text(&requester, "15000 CLP, receipt attached")
            .await
            .unwrap();
        let report = created.deliveries.wait().await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);

        let Progress::Created(ticket) = created.value else {
            panic!("expected the ticket to be created");
        };
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.category, Category::Expense);
        assert_eq!(ticket.priority, Priority::Medium);
        assert_eq!(ticket.requester_id, requester);
        assert_eq!(ticket.title, "Taxi to client meeting");
        assert_eq!(ticket.request_data.get("description").map(String::as_str), Some("15000 CLP, receipt attached"));
        assert!(env.machine.session(&requester).is_none());

        let stored = env.tickets.list_filtered(&TicketFilter::default()).unwrap();
        assert_eq!(stored.len(), 1);

        for reviewer in &reviewers {
            let received = env.notifier.received(reviewer);
            assert_eq!(received.len(), 1, "reviewer {}", reviewer);
            assert!(received[0].text.contains("Taxi to client meeting"));
            assert!(received[0].actions.contains(&Action::Accept(ticket.id)));
        }
    }

    #[tokio::test]
    async fn test_accept_then_complete() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001, 2002]);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;
        env.notifier.clear();

        let accepted = env.machine.accept_ticket(&reviewers[0], ticket.id).await.unwrap();
        accepted.deliveries.wait().await;
        assert_eq!(accepted.value.status, TicketStatus::InProgress);
        assert_eq!(accepted.value.assignee_id.as_ref(), Some(&reviewers[0]));
        assert_eq!(env.notifier.received(&requester).len(), 1);

        let prompt = env.machine.begin_completion(&reviewers[0], ticket.id).await.unwrap();
        prompt.deliveries.wait().await;
        assert_eq!(env.machine.pending_completion(&reviewers[0]), Some(ticket.id));

        let completed = env.machine.complete_ticket(&reviewers[0], "Approved, paid").await.unwrap();
        completed.deliveries.wait().await;
        assert_eq!(completed.value.status, TicketStatus::Completed);
        assert_eq!(completed.value.response.as_deref(), Some("Approved, paid"));
        assert!(completed.value.completed_at.is_some());
        assert_eq!(env.machine.pending_completion(&reviewers[0]), None);

        let to_requester = env.notifier.received(&requester);
        assert_eq!(to_requester.len(), 2);
        assert!(to_requester[1].text.contains("Approved, paid"));

        let again = env.machine.complete_ticket(&reviewers[0], "Paid twice?").await;
        assert!(matches!(again, Err(IntakeError::NoPendingCompletion)));
    }

    #[tokio::test]
    async fn test_completed_ticket_is_frozen() {
        let env = TestEnvironment::new();
        let template = env.template("Invoice", Category::Invoice, Priority::High);
        let reviewers = env.reviewers(&[2001]);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;

        env.machine.accept_ticket(&reviewers[0], ticket.id).await.unwrap();
        env.machine.begin_completion(&reviewers[0], ticket.id).await.unwrap();
        let completed = env.machine.complete_ticket(&reviewers[0], "Done").await.unwrap().value;

        let cancel = env.machine.cancel_ticket(&requester, ticket.id).await;
        assert!(matches!(
            cancel,
            Err(IntakeError::InvalidTransition {
                from: TicketStatus::Completed,
                to: TicketStatus::Cancelled
            })
        ));

        // Re-stating the status keeps the original completion time.
        let restated = env
            .tickets
            .update(ticket.id, &TicketPatch::status(TicketStatus::Completed))
            .unwrap()
            .unwrap();
        assert_eq!(restated.completed_at, completed.completed_at);

        let back = env.tickets.update(ticket.id, &TicketPatch::status(TicketStatus::Pending));
        assert!(back.is_err());
    }
}

// ============================================================================
// Requester sessions
// ============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_text_without_session_is_ignored() {
        let env = TestEnvironment::new();
        let outcome = env.machine.submit_text(&Identity::from(REQUESTER), "hello").await.unwrap();
        assert_eq!(outcome.value, Progress::Ignored);
        assert!(outcome.deliveries.is_empty());
        assert!(env.tickets.list_filtered(&TicketFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reselecting_restarts_the_form() {
        let env = TestEnvironment::new();
        let expense = env.template("Expense report", Category::Expense, Priority::Medium);
        let budget = env.template("Budget request", Category::Budget, Priority::High);
        let requester = Identity::from(REQUESTER);

        env.machine.select_template(&requester, expense.id).await.unwrap();
        env.machine.submit_text(&requester, "First title").await.unwrap();
        env.machine.select_template(&requester, budget.id).await.unwrap();

        let session = env.machine.session(&requester).unwrap();
        assert_eq!(session.template.id, budget.id);
        assert!(session.fields.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_template() {
        let env = TestEnvironment::new();
        let template = env.template("Old form", Category::Other, Priority::Low);
        env.templates.deactivate_template(template.id).unwrap();
        let requester = Identity::from(REQUESTER);

        let inactive = env.machine.select_template(&requester, template.id).await;
        assert!(matches!(inactive, Err(IntakeError::NotFound(Entity::Template))));

        let missing = env.machine.select_template(&requester, 9999).await;
        assert!(matches!(missing, Err(IntakeError::NotFound(Entity::Template))));
        assert!(env.machine.session(&requester).is_none());
    }

    #[tokio::test]
    async fn test_invalid_text_keeps_session() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);

        env.machine.select_template(&requester, template.id).await.unwrap();
        let blank = env.machine.submit_text(&requester, "   ").await;
        assert!(matches!(blank, Err(IntakeError::ValidationFailed(_))));

        let session = env.machine.session(&requester).unwrap();
        assert!(session.fields.is_empty());

        let retry = env.machine.submit_text(&requester, "Taxi").await.unwrap();
        assert_eq!(retry.value, Progress::AwaitingDescription);
    }

    #[tokio::test]
    async fn test_cancel_drops_session() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);

        env.machine.select_template(&requester, template.id).await.unwrap();
        let cancelled = env.machine.cancel(&requester).await;
        assert!(cancelled.session);
        assert!(!cancelled.completion);

        let after = env.machine.submit_text(&requester, "late text").await.unwrap();
        assert_eq!(after.value, Progress::Ignored);
        assert!(!env.machine.cancel(&requester).await.anything());
    }

    #[tokio::test]
    async fn test_form_text_is_stored_as_sent() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);

        env.machine.select_template(&requester, template.id).await.unwrap();
        env.machine.submit_text(&requester, "  Office supplies\n").await.unwrap();
        let created = env.machine.submit_text(&requester, "Q4 licenses  ").await.unwrap();

        let Progress::Created(ticket) = created.value else {
            panic!("expected the ticket to be created");
        };
        assert_eq!(ticket.title, "  Office supplies\n");
        assert_eq!(ticket.description.as_deref(), Some("Q4 licenses  "));
        assert_eq!(ticket.request_data.get("title").map(String::as_str), Some("  Office supplies\n"));

        let stored = env.tickets.get(ticket.id).unwrap().unwrap();
        assert_eq!(stored.title, "  Office supplies\n");
    }

    #[tokio::test]
    async fn test_same_requester_submissions_run_one_at_a_time() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);

        env.machine.select_template(&requester, template.id).await.unwrap();
        env.machine.submit_text(&requester, "Taxi").await.unwrap();

        let (first, second) = tokio::join!(
            env.machine.submit_text(&requester, "15000 CLP"),
            env.machine.submit_text(&requester, "15000 CLP, resent")
        );
        let outcomes = [first.unwrap().value, second.unwrap().value];

        let created = outcomes.iter().filter(|p| matches!(p, Progress::Created(_))).count();
        let ignored = outcomes.iter().filter(|p| **p == Progress::Ignored).count();
        assert_eq!(created, 1);
        assert_eq!(ignored, 1);
        assert_eq!(env.tickets.list_by_requester(&requester).unwrap().len(), 1);
        assert!(env.machine.session(&requester).is_none());
    }

    /// Repository whose `create` can be switched to fail.
    struct FlakyTickets {
        inner: SqliteTicketRepository,
        fail_create: std::sync::atomic::AtomicBool,
    }

    impl TicketRepository for FlakyTickets {
        fn create(&self, ticket: NewTicket) -> AppResult<Ticket> {
            if self.fail_create.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(AppError::Migration("database is locked".to_string()));
            }
            self.inner.create(ticket)
        }
        fn get(&self, id: i64) -> AppResult<Option<Ticket>> {
            self.inner.get(id)
        }
        fn update(&self, id: i64, patch: &TicketPatch) -> AppResult<Option<Ticket>> {
            self.inner.update(id, patch)
        }
        fn list_filtered(&self, filter: &TicketFilter) -> AppResult<Vec<Ticket>> {
            self.inner.list_filtered(filter)
        }
        fn add_comment(&self, ticket_id: i64, author: &Identity, text: &str, internal: bool) -> AppResult<Comment> {
            self.inner.add_comment(ticket_id, author, text, internal)
        }
        fn list_comments(&self, ticket_id: i64, include_internal: bool) -> AppResult<Vec<Comment>> {
            self.inner.list_comments(ticket_id, include_internal)
        }
        fn stats(&self) -> AppResult<TicketStats> {
            self.inner.stats()
        }
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_session() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001]);
        let flaky = Arc::new(FlakyTickets {
            inner: SqliteTicketRepository::new(env.pool.clone()),
            fail_create: std::sync::atomic::AtomicBool::new(true),
        });
        let machine = IntakeMachine::new(
            Arc::new(InMemorySessionStore::new()),
            flaky.clone(),
            env.templates.clone(),
            env.roles.clone(),
            env.notifier.clone(),
        );
        let requester = Identity::from(REQUESTER);

        machine.select_template(&requester, template.id).await.unwrap();
        machine.submit_text(&requester, "Taxi").await.unwrap();
        let failed = machine.submit_text(&requester, "15000 CLP").await;
        match failed {
            Err(err) => assert!(!err.is_recoverable()),
            Ok(_) => panic!("expected a storage failure"),
        }
        assert!(machine.session(&requester).is_some());
        assert!(env.notifier.received(&reviewers[0]).is_empty());

        flaky.fail_create.store(false, std::sync::atomic::Ordering::SeqCst);
        let retried = machine.submit_text(&requester, "15000 CLP").await.unwrap();
        assert!(matches!(retried.value, Progress::Created(_)));
        assert!(machine.session(&requester).is_none());
    }
}

// ============================================================================
// Reviewer authorization and ticket actions
// ============================================================================

mod reviewer_tests {
    use super::*;

    #[tokio::test]
    async fn test_non_reviewer_cannot_accept() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;

        let result = env.machine.accept_ticket(&requester, ticket.id).await;
        assert!(matches!(result, Err(IntakeError::Forbidden)));

        let unchanged = env.tickets.get(ticket.id).unwrap().unwrap();
        assert_eq!(unchanged.status, TicketStatus::Pending);
        assert!(unchanged.assignee_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_ticket_reported_before_role() {
        let env = TestEnvironment::new();
        let stranger = Identity::from(3003_i64);
        let result = env.machine.accept_ticket(&stranger, 424242).await;
        assert!(matches!(result, Err(IntakeError::NotFound(Entity::Ticket))));
    }

    #[tokio::test]
    async fn test_second_accept_is_refused() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001, 2002]);
        let ticket = create_ticket(&env, &Identity::from(REQUESTER), template.id).await;

        let machine = Arc::new(env.machine);
        let (a, b) = tokio::join!(
            machine.accept_ticket(&reviewers[0], ticket.id),
            machine.accept_ticket(&reviewers[1], ticket.id)
        );
        let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1);

        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(IntakeError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_begin_completion_requires_in_progress() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001]);
        let ticket = create_ticket(&env, &Identity::from(REQUESTER), template.id).await;

        let early = env.machine.begin_completion(&reviewers[0], ticket.id).await;
        assert!(matches!(early, Err(IntakeError::InvalidTransition { .. })));
        assert_eq!(env.machine.pending_completion(&reviewers[0]), None);
    }

    #[tokio::test]
    async fn test_stale_completion_intent_is_cleared() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001]);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;

        env.machine.accept_ticket(&reviewers[0], ticket.id).await.unwrap();
        env.machine.begin_completion(&reviewers[0], ticket.id).await.unwrap();
        env.machine.cancel_ticket(&requester, ticket.id).await.unwrap();

        let result = env.machine.complete_ticket(&reviewers[0], "Too late").await;
        assert!(matches!(result, Err(IntakeError::InvalidTransition { .. })));
        assert_eq!(env.machine.pending_completion(&reviewers[0]), None);
    }

    #[tokio::test]
    async fn test_invalid_response_keeps_intent() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001]);
        let ticket = create_ticket(&env, &Identity::from(REQUESTER), template.id).await;

        env.machine.accept_ticket(&reviewers[0], ticket.id).await.unwrap();
        env.machine.begin_completion(&reviewers[0], ticket.id).await.unwrap();

        let blank = env.machine.complete_ticket(&reviewers[0], "  ").await;
        assert!(matches!(blank, Err(IntakeError::ValidationFailed(_))));
        assert_eq!(env.machine.pending_completion(&reviewers[0]), Some(ticket.id));
    }

    #[tokio::test]
    async fn test_cancel_ticket_permissions() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001]);
        let requester = Identity::from(REQUESTER);
        let first = create_ticket(&env, &requester, template.id).await;
        let second = create_ticket(&env, &requester, template.id).await;
        env.notifier.clear();

        let stranger = env.machine.cancel_ticket(&Identity::from(3003_i64), first.id).await;
        assert!(matches!(stranger, Err(IntakeError::Forbidden)));

        let own = env.machine.cancel_ticket(&requester, first.id).await.unwrap();
        assert_eq!(own.value.status, TicketStatus::Cancelled);
        assert!(own.deliveries.is_empty());

        let by_reviewer = env.machine.cancel_ticket(&reviewers[0], second.id).await.unwrap();
        by_reviewer.deliveries.wait().await;
        assert_eq!(by_reviewer.value.status, TicketStatus::Cancelled);
        assert_eq!(env.notifier.received(&requester).len(), 1);
    }

    #[tokio::test]
    async fn test_comments_require_existing_ticket() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let reviewers = env.reviewers(&[2001]);
        let ticket = create_ticket(&env, &Identity::from(REQUESTER), template.id).await;

        let missing = env.machine.add_comment(9999, &reviewers[0], "Hello", false).await;
        assert!(matches!(missing, Err(IntakeError::NotFound(Entity::Ticket))));

        env.machine.add_comment(ticket.id, &reviewers[0], "Need the receipt", false).await.unwrap();
        env.machine.add_comment(ticket.id, &reviewers[0], "Checked with bank", true).await.unwrap();

        assert_eq!(env.tickets.list_comments(ticket.id, false).unwrap().len(), 1);
        assert_eq!(env.tickets.list_comments(ticket.id, true).unwrap().len(), 2);
    }
}

// ============================================================================
// Notification fan-out
// ============================================================================

mod notification_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_failing_reviewer_does_not_block_others() {
        let env = TestEnvironment::with_notifier(RecordingNotifier::failing_for(&[Identity::from(2002_i64)]));
        let template = env.template("Payment", Category::Payment, Priority::Urgent);
        let reviewers = env.reviewers(&[2001, 2002, 2003]);
        let requester = Identity::from(REQUESTER);

        env.machine.select_template(&requester, template.id).await.unwrap();
        env.machine.submit_text(&requester, "Supplier transfer").await.unwrap();
        let created = env.machine.submit_text(&requester, "Invoice 88, due today").await.unwrap();
        let report = created.deliveries.wait().await;

        assert!(matches!(created.value, Progress::Created(_)));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(env.notifier.attempts_for(&reviewers[1]), 1);
        assert_eq!(env.notifier.received(&reviewers[0]).len(), 1);
        assert_eq!(env.notifier.received(&reviewers[2]).len(), 1);
    }

    #[tokio::test]
    async fn test_no_reviewers_still_creates_ticket() {
        let env = TestEnvironment::new();
        let template = env.template("Other", Category::Other, Priority::Low);
        let ticket = create_ticket(&env, &Identity::from(REQUESTER), template.id).await;
        assert_eq!(env.tickets.get(ticket.id).unwrap().unwrap().status, TicketStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_requesters_get_distinct_tickets() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let template_id = template.id;
        let machine = Arc::new(env.machine);

        let mut handles = Vec::new();
        for n in 0..8_i64 {
            let machine = Arc::clone(&machine);
            handles.push(tokio::spawn(async move {
                let requester = Identity::from(5000 + n);
                machine.select_template(&requester, template_id).await.unwrap();
                machine.submit_text(&requester, &format!("Request {}", n)).await.unwrap();
                match machine.submit_text(&requester, "details").await.unwrap().value {
                    Progress::Created(ticket) => ticket,
                    other => panic!("expected a ticket, got {:?}", other),
                }
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            let ticket = handle.await.unwrap();
            assert_eq!(ticket.title, format!("Request {}", ticket.requester_id.as_str().parse::<i64>().unwrap() - 5000));
            ids.push(ticket.id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}

// ============================================================================
// Edits made outside the chat
// ============================================================================

mod dashboard_tests {
    use super::*;

    #[tokio::test]
    async fn test_status_change_reaches_requester() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;
        env.notifier.clear();

        let editor = Identity::from("dashboard");
        let moved = env
            .machine
            .update_ticket(&editor, ticket.id, &TicketPatch::status(TicketStatus::InProgress))
            .await
            .unwrap();
        let report = moved.deliveries.wait().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(moved.value.status, TicketStatus::InProgress);

        let received = env.notifier.received(&requester);
        assert_eq!(received.len(), 1);
        assert!(received[0].text.contains("in_progress"));
        assert_eq!(received[0].actions, vec![Action::View(ticket.id)]);
    }

    #[tokio::test]
    async fn test_edits_without_status_change_are_silent() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;
        env.notifier.clear();

        let patch = TicketPatch {
            priority: Some(Priority::Urgent),
            ..TicketPatch::default()
        };
        let edited = env
            .machine
            .update_ticket(&Identity::from("dashboard"), ticket.id, &patch)
            .await
            .unwrap();
        assert!(edited.deliveries.is_empty());
        assert_eq!(edited.value.priority, Priority::Urgent);

        // The requester's own cancellation is not echoed back.
        let cancelled = env
            .machine
            .update_ticket(&requester, ticket.id, &TicketPatch::status(TicketStatus::Cancelled))
            .await
            .unwrap();
        assert!(cancelled.deliveries.is_empty());
        assert!(env.notifier.received(&requester).is_empty());
    }

    #[tokio::test]
    async fn test_refused_edits_leave_ticket_untouched() {
        let env = TestEnvironment::new();
        let template = env.template("Expense report", Category::Expense, Priority::Medium);
        let requester = Identity::from(REQUESTER);
        let ticket = create_ticket(&env, &requester, template.id).await;
        let editor = Identity::from("dashboard");

        let skipped = env
            .machine
            .update_ticket(&editor, ticket.id, &TicketPatch::status(TicketStatus::Completed))
            .await;
        assert!(matches!(skipped, Err(IntakeError::InvalidTransition { .. })));

        let blank = TicketPatch {
            description: Some("   ".to_string()),
            status: Some(TicketStatus::InProgress),
            ..TicketPatch::default()
        };
        let refused = env.machine.update_ticket(&editor, ticket.id, &blank).await;
        assert!(matches!(refused, Err(IntakeError::ValidationFailed(_))));

        let missing = env
            .machine
            .update_ticket(&editor, 9999, &TicketPatch::status(TicketStatus::Cancelled))
            .await;
        assert!(matches!(missing, Err(IntakeError::NotFound(Entity::Ticket))));

        let stored = env.tickets.get(ticket.id).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Pending);
        assert_eq!(stored.description, ticket.description);
    }
}
