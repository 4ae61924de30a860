//! Client accounts and receivables aging
//!
//! Client master data and open invoices live in two spreadsheets kept by the
//! finance team. [`ClientDirectory`] is the read-only seam over them.
//! [`SheetsClientDirectory`] reads both through the Google Sheets values API
//! with an API key; [`DisabledClientDirectory`] stands in when no sheet is
//! configured.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use crate::analytics::{AnalyticsEvent, EventType};
use crate::core::config::{network, sheets};
use crate::core::error::{AppError, AppResult};
use crate::core::types::Identity;
use crate::core::validation::{clean_rut, format_rut, looks_like_rut, validate_endpoint_url};

/// One row of the client sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub rut: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub credit_limit: f64,
    pub payment_terms: Option<String>,
    pub status: String,
}

/// One open invoice of the aging sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub due_on: Option<NaiveDate>,
    pub amount: f64,
    pub balance: f64,
    pub days_overdue: i64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    pub const ALL: [AgingBucket; 5] = [
        AgingBucket::Current,
        AgingBucket::Days1To30,
        AgingBucket::Days31To60,
        AgingBucket::Days61To90,
        AgingBucket::Over90,
    ];

    pub fn for_days(days_overdue: i64) -> Self {
        match days_overdue {
            d if d <= 0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgingBucket::Current => "Current",
            AgingBucket::Days1To30 => "1-30 days",
            AgingBucket::Days31To60 => "31-60 days",
            AgingBucket::Days61To90 => "61-90 days",
            AgingBucket::Over90 => "Over 90 days",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AgingBucket::Current => "🟢",
            AgingBucket::Days1To30 => "🟡",
            AgingBucket::Days31To60 => "🟠",
            AgingBucket::Days61To90 => "🔴",
            AgingBucket::Over90 => "⚫",
        }
    }
}

/// Open invoices of one client, in sheet order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingReport {
    pub client_rut: String,
    pub client_name: String,
    pub invoices: Vec<Invoice>,
}

impl AgingReport {
    /// Sum of outstanding balances.
    pub fn total(&self) -> f64 {
        self.invoices.iter().map(|invoice| invoice.balance).sum()
    }

    pub fn bucket_total(&self, bucket: AgingBucket) -> f64 {
        self.invoices
            .iter()
            .filter(|invoice| AgingBucket::for_days(invoice.days_overdue) == bucket)
            .map(|invoice| invoice.balance)
            .sum()
    }
}

fn cell_text(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn optional_cell(row: &[Value], index: usize) -> Option<String> {
    Some(cell_text(row, index)).filter(|s| !s.is_empty())
}

/// Numeric cell. Text cells may carry a `$` sign; unreadable values count as zero.
fn cell_number(row: &[Value], index: usize) -> f64 {
    match row.get(index) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s
            .trim()
            .trim_start_matches('$')
            .replace(' ', "")
            .parse()
            .unwrap_or_default(),
        _ => 0.0,
    }
}

fn cell_date(row: &[Value], index: usize) -> Option<NaiveDate> {
    let text = cell_text(row, index);
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
}

/// Parses a client row. Rows without both RUT and name are skipped.
pub fn client_from_row(row: &[Value]) -> Option<ClientRecord> {
    let rut = cell_text(row, 0);
    let name = cell_text(row, 1);
    if rut.is_empty() && name.is_empty() {
        return None;
    }

    Some(ClientRecord {
        rut,
        name,
        email: optional_cell(row, 2),
        phone: optional_cell(row, 3),
        address: optional_cell(row, 4),
        contact_person: optional_cell(row, 5),
        credit_limit: cell_number(row, 6),
        payment_terms: optional_cell(row, 7),
        status: optional_cell(row, 8).unwrap_or_else(|| "Active".to_string()),
    })
}

pub fn invoice_from_row(row: &[Value]) -> Invoice {
    Invoice {
        number: cell_text(row, 2),
        issued_on: cell_date(row, 3),
        due_on: cell_date(row, 4),
        amount: cell_number(row, 5),
        balance: cell_number(row, 6),
        days_overdue: cell_number(row, 7) as i64,
        status: optional_cell(row, 8).unwrap_or_else(|| "Pending".to_string()),
    }
}

/// First client matching `identifier`, skipping the header row.
///
/// RUT-shaped input matches the RUT column ignoring formatting; anything else
/// is a case-insensitive substring of the name.
pub fn find_client_in(rows: &[Vec<Value>], identifier: &str) -> Option<ClientRecord> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return None;
    }

    let by_rut = looks_like_rut(identifier);
    let wanted_rut = clean_rut(identifier);
    let wanted_name = identifier.to_lowercase();

    rows.iter().skip(1).filter_map(|row| client_from_row(row)).find(|client| {
        if by_rut {
            clean_rut(&client.rut) == wanted_rut
        } else {
            client.name.to_lowercase().contains(&wanted_name)
        }
    })
}

/// Aging report for one RUT, or `None` when it has no invoices.
pub fn aging_report_from(rows: &[Vec<Value>], rut: &str) -> Option<AgingReport> {
    let wanted = clean_rut(rut);
    let matching: Vec<&Vec<Value>> = rows
        .iter()
        .skip(1)
        .filter(|row| clean_rut(&cell_text(row, 0)) == wanted)
        .collect();

    let first = matching.first()?;
    Some(AgingReport {
        client_rut: format_rut(rut),
        client_name: cell_text(first, 1),
        invoices: matching.iter().map(|row| invoice_from_row(row)).collect(),
    })
}

/// Read-only access to client accounts.
#[async_trait]
pub trait ClientDirectory: Send + Sync + 'static {
    async fn find_client(&self, identifier: &str) -> AppResult<Option<ClientRecord>>;

    async fn aging_report(&self, rut: &str) -> AppResult<Option<AgingReport>>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Directory used when no spreadsheet is configured. Finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledClientDirectory;

#[async_trait]
impl ClientDirectory for DisabledClientDirectory {
    async fn find_client(&self, _identifier: &str) -> AppResult<Option<ClientRecord>> {
        Ok(None)
    }

    async fn aging_report(&self, _rut: &str) -> AppResult<Option<AgingReport>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the client and aging sheets over HTTP.
#[derive(Debug, Clone)]
pub struct SheetsClientDirectory {
    client: reqwest::Client,
    base: Url,
    api_key: String,
    client_sheet: String,
    aging_sheet: Option<String>,
}

impl SheetsClientDirectory {
    pub fn new(base_url: &str, api_key: &str, client_sheet: &str, aging_sheet: Option<&str>) -> AppResult<Self> {
        let base = validate_endpoint_url(base_url).map_err(|e| AppError::Validation(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Validation(format!("Invalid sheets URL: {}", base_url)));
        }

        let client = reqwest::Client::builder()
            .timeout(network::timeout())
            .user_agent(concat!("finbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base,
            api_key: api_key.to_string(),
            client_sheet: client_sheet.to_string(),
            aging_sheet: aging_sheet.map(str::to_string),
        })
    }

    /// Builds a directory from `SHEETS_API_KEY`, `CLIENT_SHEET_ID` and `AGING_SHEET_ID`.
    pub fn from_env() -> Option<Self> {
        let (Some(key), Some(client_sheet)) = (sheets::API_KEY.as_deref(), sheets::CLIENT_SHEET_ID.as_deref()) else {
            log::info!("Client sheets not configured, client lookup disabled");
            return None;
        };

        match Self::new(&sheets::API_URL, key, client_sheet, sheets::AGING_SHEET_ID.as_deref()) {
            Ok(directory) => Some(directory),
            Err(e) => {
                log::error!("Failed to set up client sheets: {}", e);
                None
            }
        }
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> AppResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Validation(format!("Invalid sheets URL: {}", self.base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", sheet_id, "values", range]);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");
        Ok(url)
    }

    async fn values(&self, sheet_id: &str, range: &str) -> AppResult<Vec<Vec<Value>>> {
        let response = self.client.get(self.values_url(sheet_id, range)?).send().await?;
        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }
        Ok(response.json::<ValueRange>().await?.values)
    }
}

#[async_trait]
impl ClientDirectory for SheetsClientDirectory {
    async fn find_client(&self, identifier: &str) -> AppResult<Option<ClientRecord>> {
        let rows = self.values(&self.client_sheet, sheets::CLIENT_RANGE).await?;
        log::debug!("Searched {} client rows for {:?}", rows.len().saturating_sub(1), identifier);
        Ok(find_client_in(&rows, identifier))
    }

    async fn aging_report(&self, rut: &str) -> AppResult<Option<AgingReport>> {
        let Some(sheet) = self.aging_sheet.as_deref() else {
            log::warn!("AGING_SHEET_ID is not set, no account statements available");
            return Ok(None);
        };
        let rows = self.values(sheet, sheets::AGING_RANGE).await?;
        Ok(aging_report_from(&rows, rut))
    }
}

/// The configured directory, or [`DisabledClientDirectory`].
pub fn directory_from_env() -> Arc<dyn ClientDirectory> {
    match SheetsClientDirectory::from_env() {
        Some(directory) => Arc::new(directory),
        None => Arc::new(DisabledClientDirectory),
    }
}

pub fn client_lookup_event(actor: &Identity, identifier: &str, client: &ClientRecord) -> AnalyticsEvent {
    AnalyticsEvent::new(
        EventType::ClientDataRequested,
        actor,
        json!({
            "identifier": identifier,
            "client_rut": client.rut,
            "client_name": client.name,
        }),
    )
}

pub fn account_statement_event(actor: &Identity, report: &AgingReport) -> AnalyticsEvent {
    AnalyticsEvent::new(
        EventType::AccountStatementRequested,
        actor,
        json!({
            "client_rut": report.client_rut,
            "client_name": report.client_name,
            "total_amount": report.total(),
            "invoice_count": report.invoices.len(),
        }),
    )
}
