//! Plain-text replies shown to users

use chrono::NaiveDate;

use fincore::clients::{AgingBucket, AgingReport, ClientRecord};
use fincore::core::models::{Comment, Ticket};
use fincore::core::types::TicketStatus;
use fincore::core::validation::{format_rut, looks_like_rut, validate_client_identifier};
use fincore::intake::{Entity, IntakeError};

/// Longest list rendered in one message.
pub const MAX_LISTED_TICKETS: usize = 10;

pub const MAX_LISTED_INVOICES: usize = 10;

pub fn status_label(status: TicketStatus) -> String {
    format!("{} {}", status.emoji(), status.as_str().replace('_', " "))
}

/// `⏳ #12 Taxi · 📊 expense · 🟡 medium`
pub fn ticket_line(ticket: &Ticket) -> String {
    format!(
        "{} #{} {} · {} {} · {} {}",
        ticket.status.emoji(),
        ticket.id,
        ticket.title,
        ticket.category.emoji(),
        ticket.category,
        ticket.priority.emoji(),
        ticket.priority
    )
}

pub fn ticket_list(header: &str, tickets: &[Ticket], empty: &str) -> String {
    if tickets.is_empty() {
        return empty.to_string();
    }

    let mut text = format!("{}\n", header);
    for ticket in tickets.iter().take(MAX_LISTED_TICKETS) {
        text.push('\n');
        text.push_str(&ticket_line(ticket));
    }
    if tickets.len() > MAX_LISTED_TICKETS {
        text.push_str(&format!("\n\n…and {} more", tickets.len() - MAX_LISTED_TICKETS));
    }
    text
}

pub fn ticket_details(ticket: &Ticket, comments: &[Comment]) -> String {
    let mut text = format!(
        "📋 Request #{}\n\n{}\n{}\n\nStatus: {}\nCategory: {} {}\nPriority: {} {}\nCreated: {}",
        ticket.id,
        ticket.title,
        ticket.description.as_deref().unwrap_or_default(),
        status_label(ticket.status),
        ticket.category.emoji(),
        ticket.category,
        ticket.priority.emoji(),
        ticket.priority,
        ticket.created_at.format("%Y-%m-%d %H:%M UTC"),
    );
    if let Some(assignee) = &ticket.assignee_id {
        text.push_str(&format!("\nAssigned to: {}", assignee));
    }
    if let Some(response) = &ticket.response {
        text.push_str(&format!("\n\nResponse: {}", response));
    }
    if !comments.is_empty() {
        text.push_str("\n\n💬 Comments:");
        for comment in comments {
            let marker = if comment.is_internal { " (internal)" } else { "" };
            text.push_str(&format!("\n• {}{}: {}", comment.author_id, marker, comment.text));
        }
    }
    text
}

/// Message for a refused or failed intake operation.
pub fn intake_error_message(err: &IntakeError) -> String {
    match err {
        IntakeError::NotFound(Entity::Template) => "This request type is no longer available. Use /request to pick another one.".to_string(),
        IntakeError::NotFound(Entity::Ticket) => "Request not found.".to_string(),
        IntakeError::Forbidden => "⛔ You are not allowed to do that.".to_string(),
        IntakeError::NoPendingCompletion => "There is no request waiting for your response.".to_string(),
        IntakeError::ValidationFailed(reason) => format!("⚠️ {}. Please send it again.", reason),
        IntakeError::InvalidTransition { from, .. } => {
            format!("This request is already {}.", status_label(*from))
        }
        IntakeError::Storage(_) => "❌ Something went wrong. Your input was kept, please try again later.".to_string(),
    }
}

/// Reply for `/checkid`.
pub fn identifier_check(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "Usage: /checkid <RUT or client name>".to_string();
    }
    match validate_client_identifier(value) {
        Ok(()) if looks_like_rut(value) => format!("✅ Valid RUT: {}", format_rut(value)),
        Ok(()) => format!("✅ Valid client name: {}", value),
        Err(e) => format!("❌ {}", e),
    }
}

/// Chilean pesos, no decimals: `$1.234.567`.
pub fn format_clp(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{}${}", sign, grouped)
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Reply for `/client`.
pub fn client_card(client: &ClientRecord) -> String {
    let missing = "not registered";
    format!(
        "📋 Client\n\n🏢 {}\n🆔 RUT: {}\n📧 Email: {}\n📞 Phone: {}\n📍 Address: {}\n👤 Contact: {}\n💰 Credit limit: {}\n⏰ Payment terms: {}\n📊 Status: {}\n\nAccount statement: /statement {}",
        client.name,
        format_rut(&client.rut),
        client.email.as_deref().unwrap_or(missing),
        client.phone.as_deref().unwrap_or(missing),
        client.address.as_deref().unwrap_or(missing),
        client.contact_person.as_deref().unwrap_or(missing),
        format_clp(client.credit_limit),
        client.payment_terms.as_deref().unwrap_or("not defined"),
        client.status,
        format_rut(&client.rut),
    )
}

/// Reply for `/statement`: aging summary, then the first invoices.
pub fn account_statement(report: &AgingReport, today: NaiveDate) -> String {
    let mut text = format!(
        "📊 Account statement\n\n🏢 {}\n🆔 RUT: {}\n📅 {}\n",
        report.client_name,
        report.client_rut,
        today.format("%d/%m/%Y")
    );
    for bucket in AgingBucket::ALL {
        text.push_str(&format!(
            "\n{} {}: {}",
            bucket.emoji(),
            bucket.label(),
            format_clp(report.bucket_total(bucket))
        ));
    }
    text.push_str(&format!(
        "\n\n🔢 Total: {}\n📄 Invoices: {}\n",
        format_clp(report.total()),
        report.invoices.len()
    ));

    for invoice in report.invoices.iter().take(MAX_LISTED_INVOICES) {
        text.push_str(&format!(
            "\n{} {} · issued {} · due {} · balance {}",
            AgingBucket::for_days(invoice.days_overdue).emoji(),
            invoice.number,
            date_or_dash(invoice.issued_on),
            date_or_dash(invoice.due_on),
            format_clp(invoice.balance)
        ));
        if invoice.days_overdue > 0 {
            text.push_str(&format!(" · {} days overdue", invoice.days_overdue));
        }
    }
    if report.invoices.len() > MAX_LISTED_INVOICES {
        text.push_str(&format!("\n\n…and {} more", report.invoices.len() - MAX_LISTED_INVOICES));
    }
    text
}
