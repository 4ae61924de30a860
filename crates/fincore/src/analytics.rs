//! Usage events forwarded to an external collector
//!
//! Events are posted as JSON to `{ANALYTICS_API_URL}/events` with a bearer
//! token. Publishing is best-effort: failures are logged and never retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

use crate::core::config::{analytics, network};
use crate::core::error::{AppError, AppResult};
use crate::core::models::Ticket;
use crate::core::types::Identity;
use crate::core::validation::validate_endpoint_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TicketCreated,
    TicketStatusUpdated,
    TicketCommented,
    UserRoleChanged,
    ClientDataRequested,
    AccountStatementRequested,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub event_type: EventType,
    pub user_id: Identity,
    pub timestamp: DateTime<Utc>,
    pub source: &'static str,
    pub data: Value,
}

impl AnalyticsEvent {
    pub fn new(event_type: EventType, user_id: &Identity, data: Value) -> Self {
        Self {
            event_type,
            user_id: user_id.clone(),
            timestamp: Utc::now(),
            source: analytics::EVENT_SOURCE,
            data,
        }
    }

    /// Event carrying the ticket snapshot the collector expects.
    pub fn for_ticket(event_type: EventType, actor: &Identity, ticket: &Ticket) -> Self {
        Self::new(
            event_type,
            actor,
            json!({
                "ticket_id": ticket.id,
                "title": ticket.title,
                "category": ticket.category,
                "priority": ticket.priority,
                "status": ticket.status,
                "requester_id": ticket.requester_id,
                "assignee_id": ticket.assignee_id,
            }),
        )
    }
}

/// Destination for analytics events.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Returns whether the event was accepted.
    async fn publish(&self, event: &AnalyticsEvent) -> bool;
}

/// Sink used when no collector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEventSink;

#[async_trait]
impl EventSink for DisabledEventSink {
    async fn publish(&self, event: &AnalyticsEvent) -> bool {
        log::debug!("Analytics disabled, skipping {:?} event", event.event_type);
        false
    }
}

/// Posts events to the collector over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEventPublisher {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl HttpEventPublisher {
    pub fn new(base_url: &str, api_key: &str) -> AppResult<Self> {
        let endpoint = validate_endpoint_url(&format!("{}/events", base_url.trim_end_matches('/')))
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(network::timeout())
            .user_agent(concat!("finbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    /// Builds a publisher from `ANALYTICS_API_URL` / `ANALYTICS_API_KEY`.
    pub fn from_env() -> Option<Self> {
        let (Some(url), Some(key)) = (analytics::API_URL.as_deref(), analytics::API_KEY.as_deref()) else {
            log::warn!("Analytics API not configured, events will be skipped");
            return None;
        };

        match Self::new(url, key) {
            Ok(publisher) => Some(publisher),
            Err(e) => {
                log::error!("Failed to set up analytics publisher: {}", e);
                None
            }
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, event: &AnalyticsEvent) -> AppResult<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for HttpEventPublisher {
    async fn publish(&self, event: &AnalyticsEvent) -> bool {
        match self.send(event).await {
            Ok(()) => {
                log::debug!("Published {:?} event for {}", event.event_type, event.user_id);
                true
            }
            Err(e) => {
                log::warn!("Failed to publish {:?} event: {}", event.event_type, e);
                false
            }
        }
    }
}

/// The configured sink, or [`DisabledEventSink`].
pub fn sink_from_env() -> Arc<dyn EventSink> {
    match HttpEventPublisher::from_env() {
        Some(publisher) => Arc::new(publisher),
        None => Arc::new(DisabledEventSink),
    }
}

/// Publishes on a background task so the caller never waits on the collector.
pub fn publish_in_background(sink: &Arc<dyn EventSink>, event: AnalyticsEvent) -> JoinHandle<bool> {
    let sink = Arc::clone(sink);
    tokio::spawn(async move { sink.publish(&event).await })
}
