//! The intake state machine
//!
//! Requester side: `select_template` → `submit_text` (title) → `submit_text`
//! (description) → ticket created and session removed.
//!
//! Reviewer side, per ticket: `accept_ticket` (pending → in_progress) →
//! `begin_completion` (intent recorded) → `complete_ticket` (in_progress →
//! completed with a response).
//!
//! Operations on the same actor run one at a time, and so do operations on
//! the same ticket. Lock order is always actor then ticket. Notifications and
//! analytics start after the write succeeds and never affect its outcome.

use dashmap::DashMap;
use std::sync::Arc;

use crate::analytics::{publish_in_background, AnalyticsEvent, DisabledEventSink, EventSink, EventType};
use crate::core::metrics;
use crate::core::models::{Comment, NewTicket, Template, Ticket, TicketPatch};
use crate::core::types::{Identity, Role, TicketStatus};
use crate::core::validation::{validate_form_text, validate_ticket_patch, FormField};
use crate::intake::error::{Entity, IntakeError, IntakeResult};
use crate::intake::session::{IntakeStep, KeyedLocks, Session, SessionStore, DESCRIPTION_FIELD, TITLE_FIELD};
use crate::intake::traits::{RoleDirectory, TemplateCatalog, TicketRepository};
use crate::notify::{dispatch, Action, Deliveries, Notification, Notifier};

/// Result value plus the notifications the operation started.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub deliveries: Deliveries,
}

impl<T> Outcome<T> {
    fn new(value: T, deliveries: Deliveries) -> Self {
        Self { value, deliveries }
    }

    fn quiet(value: T) -> Self {
        Self::new(value, Deliveries::none())
    }
}

/// What a free-text submission did.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// No session was active; the text was dropped.
    Ignored,
    /// Title captured, description expected next.
    AwaitingDescription,
    /// Form completed and stored.
    Created(Ticket),
}

/// What `cancel` dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cancelled {
    pub session: bool,
    pub completion: bool,
}

impl Cancelled {
    pub fn anything(&self) -> bool {
        self.session || self.completion
    }
}

pub struct IntakeMachine {
    sessions: Arc<dyn SessionStore>,
    tickets: Arc<dyn TicketRepository>,
    templates: Arc<dyn TemplateCatalog>,
    roles: Arc<dyn RoleDirectory>,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn EventSink>,
    actor_locks: KeyedLocks<Identity>,
    ticket_locks: KeyedLocks<i64>,
    completions: DashMap<Identity, i64>,
}

impl IntakeMachine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        tickets: Arc<dyn TicketRepository>,
        templates: Arc<dyn TemplateCatalog>,
        roles: Arc<dyn RoleDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            tickets,
            templates,
            roles,
            notifier,
            events: Arc::new(DisabledEventSink),
            actor_locks: KeyedLocks::new(),
            ticket_locks: KeyedLocks::new(),
            completions: DashMap::new(),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn tickets(&self) -> &Arc<dyn TicketRepository> {
        &self.tickets
    }

    pub fn templates(&self) -> &Arc<dyn TemplateCatalog> {
        &self.templates
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    pub fn session(&self, requester: &Identity) -> Option<Session> {
        self.sessions.get(requester)
    }

    /// Ticket the reviewer is about to complete, if any.
    pub fn pending_completion(&self, reviewer: &Identity) -> Option<i64> {
        self.completions.get(reviewer).map(|entry| *entry.value())
    }

    pub fn is_reviewer(&self, identity: &Identity) -> IntakeResult<bool> {
        Ok(self.roles.has_role(identity, Role::REVIEWER)?)
    }

    /// Starts (or restarts) the requester's form with an active template.
    ///
    /// An existing session is replaced without warning.
    pub async fn select_template(&self, requester: &Identity, template_id: i64) -> IntakeResult<Outcome<Template>> {
        let result = self.try_select_template(requester, template_id).await;
        self.observe(result)
    }

    async fn try_select_template(&self, requester: &Identity, template_id: i64) -> IntakeResult<Outcome<Template>> {
        let _actor = self.actor_locks.lock(requester).await;

        let template = self
            .templates
            .get(template_id)?
            .filter(|t| t.is_active)
            .ok_or(IntakeError::NotFound(Entity::Template))?;

        if let Some(previous) = self.sessions.put(Session::new(requester.clone(), template.clone())) {
            log::info!(
                "Requester {} restarted intake, dropped session for template {}",
                requester,
                previous.template.id
            );
        }

        let prompt = Notification::new(format!(
            "{} {}\n\nStep 1/2: send a short title for your request.",
            template.category.emoji(),
            template.name
        ));
        let deliveries = dispatch(&self.notifier, vec![requester.clone()], prompt);
        Ok(Outcome::new(template, deliveries))
    }

    /// Feeds free text into the requester's form.
    ///
    /// Without a session the text is ignored. Invalid text and storage failures
    /// leave the session as it was.
    pub async fn submit_text(&self, requester: &Identity, text: &str) -> IntakeResult<Outcome<Progress>> {
        let result = self.try_submit_text(requester, text).await;
        self.observe(result)
    }

    async fn try_submit_text(&self, requester: &Identity, text: &str) -> IntakeResult<Outcome<Progress>> {
        let _actor = self.actor_locks.lock(requester).await;

        let Some(mut session) = self.sessions.get(requester) else {
            log::debug!("Ignoring text from {} without an intake session", requester);
            return Ok(Outcome::quiet(Progress::Ignored));
        };

        match session.step() {
            IntakeStep::AwaitingTitle => {
                let title = validate_form_text(FormField::Title, text)?;
                session.fields.insert(TITLE_FIELD.to_string(), title);
                self.sessions.put(session);

                let prompt = Notification::new("Step 2/2: describe the request (amounts, dates, vendors).");
                let deliveries = dispatch(&self.notifier, vec![requester.clone()], prompt);
                Ok(Outcome::new(Progress::AwaitingDescription, deliveries))
            }
            IntakeStep::AwaitingDescription => {
                let description = validate_form_text(FormField::Description, text)?;
                let ticket = self.create_from_session(&session, description)?;
                self.sessions.delete(requester);

                let deliveries = self.notify_reviewers(&ticket);
                Ok(Outcome::new(Progress::Created(ticket), deliveries))
            }
        }
    }

    fn create_from_session(&self, session: &Session, description: String) -> IntakeResult<Ticket> {
        let mut request_data = session.fields.clone();
        request_data.insert(DESCRIPTION_FIELD.to_string(), description.clone());
        let title = request_data.get(TITLE_FIELD).cloned().unwrap_or_default();

        let ticket = self.tickets.create(NewTicket {
            template_id: Some(session.template.id),
            title,
            description: Some(description),
            category: session.template.category,
            priority: session.template.priority,
            requester_id: session.requester.clone(),
            request_data,
            estimated_time_hours: session.template.estimated_time_hours,
        })?;

        log::info!(
            "Ticket #{} created by {} ({}, {})",
            ticket.id,
            ticket.requester_id,
            ticket.category,
            ticket.priority
        );
        metrics::record_ticket_created(ticket.category.as_str());
        self.publish(AnalyticsEvent::for_ticket(EventType::TicketCreated, &ticket.requester_id, &ticket));
        Ok(ticket)
    }

    /// The ticket is already stored, so a failed reviewer lookup is only logged.
    fn notify_reviewers(&self, ticket: &Ticket) -> Deliveries {
        let reviewers = match self.roles.members(Role::REVIEWER) {
            Ok(reviewers) => reviewers,
            Err(e) => {
                log::error!("Failed to load reviewers for ticket #{}: {}", ticket.id, e);
                return Deliveries::none();
            }
        };
        if reviewers.is_empty() {
            log::warn!("Ticket #{} created but no reviewers are registered", ticket.id);
        }

        let notification = Notification::new(format!(
            "🆕 New request #{}\n\n{}\n{}\n\n{} {} · {} {}",
            ticket.id,
            ticket.title,
            ticket.description.as_deref().unwrap_or_default(),
            ticket.category.emoji(),
            ticket.category,
            ticket.priority.emoji(),
            ticket.priority
        ))
        .with_action(Action::Accept(ticket.id))
        .with_action(Action::View(ticket.id));

        dispatch(&self.notifier, reviewers, notification)
    }

    /// Loads a ticket, then checks the actor's role. Existence comes first.
    fn reviewable_ticket(&self, reviewer: &Identity, ticket_id: i64) -> IntakeResult<Ticket> {
        let ticket = self.tickets.get(ticket_id)?.ok_or(IntakeError::NotFound(Entity::Ticket))?;
        if !self.roles.has_role(reviewer, Role::REVIEWER)? {
            return Err(IntakeError::Forbidden);
        }
        Ok(ticket)
    }

    fn require_status(ticket: &Ticket, expected: TicketStatus, next: TicketStatus) -> IntakeResult<()> {
        if ticket.status != expected {
            return Err(IntakeError::InvalidTransition {
                from: ticket.status,
                to: next,
            });
        }
        Ok(())
    }

    /// Assigns a pending ticket to the reviewer and moves it to `in_progress`.
    pub async fn accept_ticket(&self, reviewer: &Identity, ticket_id: i64) -> IntakeResult<Outcome<Ticket>> {
        let result = self.try_accept_ticket(reviewer, ticket_id).await;
        self.observe(result)
    }

    async fn try_accept_ticket(&self, reviewer: &Identity, ticket_id: i64) -> IntakeResult<Outcome<Ticket>> {
        let _ticket_lock = self.ticket_locks.lock(&ticket_id).await;

        let ticket = self.reviewable_ticket(reviewer, ticket_id)?;
        Self::require_status(&ticket, TicketStatus::Pending, TicketStatus::InProgress)?;

        let patch = TicketPatch {
            status: Some(TicketStatus::InProgress),
            assignee_id: Some(reviewer.clone()),
            ..TicketPatch::default()
        };
        let ticket = self
            .tickets
            .update(ticket_id, &patch)?
            .ok_or(IntakeError::NotFound(Entity::Ticket))?;

        log::info!("Ticket #{} accepted by {}", ticket.id, reviewer);
        metrics::record_transition(ticket.status.as_str());
        self.publish(AnalyticsEvent::for_ticket(EventType::TicketStatusUpdated, reviewer, &ticket));

        let notification = Notification::new(format!(
            "🔄 Your request #{} \"{}\" was accepted and is now in progress.",
            ticket.id, ticket.title
        ))
        .with_action(Action::View(ticket.id));
        let deliveries = dispatch(&self.notifier, vec![ticket.requester_id.clone()], notification);
        Ok(Outcome::new(ticket, deliveries))
    }

    /// Records that the reviewer's next text message is the completion response.
    ///
    /// A newer intent replaces an older one for the same reviewer.
    pub async fn begin_completion(&self, reviewer: &Identity, ticket_id: i64) -> IntakeResult<Outcome<Ticket>> {
        let result = self.try_begin_completion(reviewer, ticket_id).await;
        self.observe(result)
    }

    async fn try_begin_completion(&self, reviewer: &Identity, ticket_id: i64) -> IntakeResult<Outcome<Ticket>> {
        let _actor = self.actor_locks.lock(reviewer).await;
        let _ticket_lock = self.ticket_locks.lock(&ticket_id).await;

        let ticket = self.reviewable_ticket(reviewer, ticket_id)?;
        Self::require_status(&ticket, TicketStatus::InProgress, TicketStatus::Completed)?;

        if let Some(previous) = self.completions.insert(reviewer.clone(), ticket_id) {
            if previous != ticket_id {
                log::info!("Reviewer {} switched completion from #{} to #{}", reviewer, previous, ticket_id);
            }
        }

        let prompt = Notification::new(format!(
            "✍️ Send the response for request #{} \"{}\". It will be forwarded to the requester.",
            ticket.id, ticket.title
        ));
        let deliveries = dispatch(&self.notifier, vec![reviewer.clone()], prompt);
        Ok(Outcome::new(ticket, deliveries))
    }

    /// Completes the ticket named by the reviewer's pending intent.
    pub async fn complete_ticket(&self, reviewer: &Identity, response_text: &str) -> IntakeResult<Outcome<Ticket>> {
        let result = self.try_complete_ticket(reviewer, response_text).await;
        self.observe(result)
    }

    async fn try_complete_ticket(&self, reviewer: &Identity, response_text: &str) -> IntakeResult<Outcome<Ticket>> {
        let _actor = self.actor_locks.lock(reviewer).await;

        let ticket_id = self.pending_completion(reviewer).ok_or(IntakeError::NoPendingCompletion)?;
        let response = validate_form_text(FormField::Response, response_text)?;

        let _ticket_lock = self.ticket_locks.lock(&ticket_id).await;
        let checked = self
            .reviewable_ticket(reviewer, ticket_id)
            .and_then(|ticket| Self::require_status(&ticket, TicketStatus::InProgress, TicketStatus::Completed));
        if let Err(err) = checked {
            // A ticket that is gone or moved on can never take this intent.
            if matches!(err, IntakeError::NotFound(_) | IntakeError::InvalidTransition { .. }) {
                self.completions.remove(reviewer);
            }
            return Err(err);
        }

        let patch = TicketPatch {
            status: Some(TicketStatus::Completed),
            response: Some(response.clone()),
            ..TicketPatch::default()
        };
        let ticket = self
            .tickets
            .update(ticket_id, &patch)?
            .ok_or(IntakeError::NotFound(Entity::Ticket))?;
        self.completions.remove(reviewer);

        log::info!("Ticket #{} completed by {}", ticket.id, reviewer);
        metrics::record_transition(ticket.status.as_str());
        self.publish(AnalyticsEvent::for_ticket(EventType::TicketStatusUpdated, reviewer, &ticket));

        let notification = Notification::new(format!(
            "✅ Your request #{} \"{}\" is completed.\n\nResponse: {}",
            ticket.id, ticket.title, response
        ));
        let deliveries = dispatch(&self.notifier, vec![ticket.requester_id.clone()], notification);
        Ok(Outcome::new(ticket, deliveries))
    }

    /// Appends a comment to an existing ticket.
    pub async fn add_comment(&self, ticket_id: i64, author: &Identity, text: &str, internal: bool) -> IntakeResult<Comment> {
        let result = self.try_add_comment(ticket_id, author, text, internal);
        self.observe(result)
    }

    fn try_add_comment(&self, ticket_id: i64, author: &Identity, text: &str, internal: bool) -> IntakeResult<Comment> {
        let ticket = self.tickets.get(ticket_id)?.ok_or(IntakeError::NotFound(Entity::Ticket))?;
        let text = validate_form_text(FormField::Comment, text)?;
        let comment = self.tickets.add_comment(ticket_id, author, &text, internal)?;

        log::debug!("Comment #{} added to ticket #{} by {}", comment.id, ticket_id, author);
        let mut event = AnalyticsEvent::for_ticket(EventType::TicketCommented, author, &ticket);
        if let Some(data) = event.data.as_object_mut() {
            data.insert("internal".to_string(), internal.into());
        }
        self.publish(event);
        Ok(comment)
    }

    /// Drops the actor's intake session and pending completion intent.
    pub async fn cancel(&self, actor: &Identity) -> Cancelled {
        let _actor = self.actor_locks.lock(actor).await;
        let cancelled = Cancelled {
            session: self.sessions.delete(actor).is_some(),
            completion: self.completions.remove(actor).is_some(),
        };
        if cancelled.anything() {
            log::info!("Intake cancelled by {}: {:?}", actor, cancelled);
        }
        cancelled
    }

    /// Cancels a non-terminal ticket. Allowed for its requester and for reviewers.
    pub async fn cancel_ticket(&self, actor: &Identity, ticket_id: i64) -> IntakeResult<Outcome<Ticket>> {
        let result = self.try_cancel_ticket(actor, ticket_id).await;
        self.observe(result)
    }

    async fn try_cancel_ticket(&self, actor: &Identity, ticket_id: i64) -> IntakeResult<Outcome<Ticket>> {
        let _ticket_lock = self.ticket_locks.lock(&ticket_id).await;

        let ticket = self.tickets.get(ticket_id)?.ok_or(IntakeError::NotFound(Entity::Ticket))?;
        let is_requester = &ticket.requester_id == actor;
        if !is_requester && !self.roles.has_role(actor, Role::REVIEWER)? {
            return Err(IntakeError::Forbidden);
        }
        if ticket.status.is_terminal() {
            return Err(IntakeError::InvalidTransition {
                from: ticket.status,
                to: TicketStatus::Cancelled,
            });
        }

        let ticket = self
            .tickets
            .update(ticket_id, &TicketPatch::status(TicketStatus::Cancelled))?
            .ok_or(IntakeError::NotFound(Entity::Ticket))?;

        log::info!("Ticket #{} cancelled by {}", ticket.id, actor);
        metrics::record_transition(ticket.status.as_str());
        self.publish(AnalyticsEvent::for_ticket(EventType::TicketStatusUpdated, actor, &ticket));

        let deliveries = if is_requester {
            Deliveries::none()
        } else {
            let notification = Notification::new(format!(
                "❌ Your request #{} \"{}\" was cancelled by the finance team.",
                ticket.id, ticket.title
            ));
            dispatch(&self.notifier, vec![ticket.requester_id.clone()], notification)
        };
        Ok(Outcome::new(ticket, deliveries))
    }

    /// Applies an edit made outside the chat flow, such as the dashboard.
    ///
    /// Text fields follow the same rules as the form. A status change is
    /// checked by the repository, then announced to the requester unless the
    /// requester made it.
    pub async fn update_ticket(&self, editor: &Identity, ticket_id: i64, patch: &TicketPatch) -> IntakeResult<Outcome<Ticket>> {
        let result = self.try_update_ticket(editor, ticket_id, patch).await;
        self.observe(result)
    }

    async fn try_update_ticket(&self, editor: &Identity, ticket_id: i64, patch: &TicketPatch) -> IntakeResult<Outcome<Ticket>> {
        validate_ticket_patch(patch)?;
        let _ticket_lock = self.ticket_locks.lock(&ticket_id).await;

        let before = self.tickets.get(ticket_id)?.ok_or(IntakeError::NotFound(Entity::Ticket))?;
        let ticket = self
            .tickets
            .update(ticket_id, patch)?
            .ok_or(IntakeError::NotFound(Entity::Ticket))?;

        if ticket.status == before.status {
            log::debug!("Ticket #{} edited by {}", ticket.id, editor);
            return Ok(Outcome::quiet(ticket));
        }

        log::info!("Ticket #{} moved from {} to {} by {}", ticket.id, before.status, ticket.status, editor);
        metrics::record_transition(ticket.status.as_str());
        self.publish(AnalyticsEvent::for_ticket(EventType::TicketStatusUpdated, editor, &ticket));

        if &ticket.requester_id == editor {
            return Ok(Outcome::quiet(ticket));
        }

        let mut text = format!(
            "{} Your request #{} \"{}\" is now {}.",
            ticket.status.emoji(),
            ticket.id,
            ticket.title,
            ticket.status
        );
        if ticket.status == TicketStatus::Completed {
            if let Some(response) = &ticket.response {
                text.push_str(&format!("\n\nResponse: {}", response));
            }
        }
        let notification = Notification::new(text).with_action(Action::View(ticket.id));
        let deliveries = dispatch(&self.notifier, vec![ticket.requester_id.clone()], notification);
        Ok(Outcome::new(ticket, deliveries))
    }

    fn publish(&self, event: AnalyticsEvent) {
        // Detached.
        drop(publish_in_background(&self.events, event));
    }

    fn observe<T>(&self, result: IntakeResult<T>) -> IntakeResult<T> {
        if let Err(err) = &result {
            metrics::record_intake_error(err.kind());
            if err.is_recoverable() {
                log::debug!("Intake operation refused: {}", err);
            } else {
                log::error!("Intake operation failed: {}", err);
            }
        }
        result
    }
}
