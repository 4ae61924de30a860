//! Prometheus metrics for the intake flow
//!
//! Counters are registered in the default registry on first use and rendered
//! in text exposition format by [`render`] for the `/metrics` endpoint.

#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

/// Tickets created through the intake flow
/// Labels: category
pub static TICKETS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "finbot_tickets_created_total",
        "Total number of tickets created",
        &["category"]
    )
    .expect("tickets_created metric registers once")
});

/// Ticket status transitions
/// Labels: status (target status)
pub static TICKET_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "finbot_ticket_transitions_total",
        "Total number of ticket status transitions",
        &["status"]
    )
    .expect("ticket_transitions metric registers once")
});

/// Notification delivery attempts
/// Labels: outcome (sent/failed)
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "finbot_notifications_total",
        "Total number of notification delivery attempts",
        &["outcome"]
    )
    .expect("notifications metric registers once")
});

/// Refused intake operations
/// Labels: kind (not_found/forbidden/...)
pub static INTAKE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "finbot_intake_errors_total",
        "Total number of intake operations that failed",
        &["kind"]
    )
    .expect("intake_errors metric registers once")
});

pub fn record_ticket_created(category: &str) {
    TICKETS_CREATED_TOTAL.with_label_values(&[category]).inc();
}

pub fn record_transition(status: &str) {
    TICKET_TRANSITIONS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_notification(delivered: bool) {
    let outcome = if delivered { "sent" } else { "failed" };
    NOTIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_intake_error(kind: &str) {
    INTAKE_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

/// Renders every registered metric in Prometheus text format.
pub fn render() -> String {
    // Register the families; empty ones are still skipped by gather().
    Lazy::force(&TICKETS_CREATED_TOTAL);
    Lazy::force(&TICKET_TRANSITIONS_TOTAL);
    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&INTAKE_ERRORS_TOTAL);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
