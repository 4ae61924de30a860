//! Dashboard JSON API.
//!
//! Lets the finance team list, filter and edit tickets, read and add comments,
//! see aggregate stats, manage the template catalog and the bot's users. Runs
//! on WEB_PORT (default 3000) next to the bot. Authentication is left to the
//! reverse proxy.
//!
//! Ticket edits go through the intake machine, so a status change made here
//! reaches the requester the same way a change made in the chat does.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::analytics::{publish_in_background, AnalyticsEvent, EventType};
use crate::core::error::AppError;
use crate::core::metrics;
use crate::core::models::{NewTemplate, TemplatePatch, TicketFilter, TicketPatch, UserPatch};
use crate::core::types::{Identity, Role};
use crate::intake::{IntakeError, IntakeMachine};
use crate::storage::templates::SqliteTemplateCatalog;
use crate::storage::users::{SqliteRoleDirectory, UserProfile};

/// Identity recorded as the actor of dashboard edits.
pub const DASHBOARD_ACTOR: &str = "dashboard";

/// Shared state for the web server.
#[derive(Clone)]
pub struct WebState {
    pub machine: Arc<IntakeMachine>,
    pub templates: Arc<SqliteTemplateCatalog>,
    pub users: Arc<SqliteRoleDirectory>,
}

/// Error body `{"error": "..."}` with a matching status code.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{} not found", what),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::NotFound(entity) => Self::not_found(&entity.to_string()),
            IntakeError::ValidationFailed(message) => Self::bad_request(message),
            IntakeError::Storage(inner) => Self::from(inner),
            other => Self::conflict(other.to_string()),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => {
                log::error!("Dashboard API storage failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

/// Builds the API router. Split from [`start_web_server`] so tests can drive it directly.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/tickets", get(list_tickets_handler))
        .route("/api/tickets/{id}", get(get_ticket_handler).patch(update_ticket_handler))
        .route(
            "/api/tickets/{id}/comments",
            get(list_comments_handler).post(add_comment_handler),
        )
        .route("/api/stats", get(stats_handler))
        .route("/api/telegram-users", get(list_users_handler).post(create_user_handler))
        .route("/api/telegram-users/{telegram_id}", axum::routing::patch(update_user_handler))
        .route("/api/templates", get(list_templates_handler).post(create_template_handler))
        .route(
            "/api/templates/{id}",
            axum::routing::patch(update_template_handler).delete(delete_template_handler),
        )
        .with_state(state)
}

/// Start the dashboard API server.
pub async fn start_web_server(port: u16, state: WebState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    log::info!("Starting dashboard API on http://{}", addr);
    log::info!("  /api/tickets    - Ticket list, detail and updates");
    log::info!("  /api/templates  - Template catalog");
    log::info!("  /api/stats      - Aggregate counters");
    log::info!("  /api/telegram-users - Bot users and roles");
    log::info!("  /metrics        - Prometheus metrics");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health — simple health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

/// GET /api/tickets?status=&priority=&category=&assignee=&requester=
async fn list_tickets_handler(State(state): State<WebState>, Query(filter): Query<TicketFilter>) -> ApiResult {
    let tickets = state.machine.tickets().list_filtered(&filter)?;
    Ok(Json(tickets).into_response())
}

/// GET /api/tickets/{id}
async fn get_ticket_handler(State(state): State<WebState>, Path(id): Path<i64>) -> ApiResult {
    let ticket = state.machine.tickets().get(id)?.ok_or_else(|| ApiError::not_found("Ticket"))?;
    Ok(Json(ticket).into_response())
}

/// PATCH /api/tickets/{id} — partial update, 409 on a forbidden status change.
async fn update_ticket_handler(
    State(state): State<WebState>,
    Path(id): Path<i64>,
    Json(patch): Json<TicketPatch>,
) -> ApiResult {
    if patch.is_empty() {
        return Err(ApiError::bad_request("Empty update"));
    }

    let outcome = state
        .machine
        .update_ticket(&Identity::from(DASHBOARD_ACTOR), id, &patch)
        .await?;
    // Detached, the requester is told in the background.
    drop(outcome.deliveries);
    Ok(Json(outcome.value).into_response())
}

#[derive(Debug, Deserialize)]
struct CommentsQuery {
    #[serde(default)]
    include_internal: bool,
}

/// GET /api/tickets/{id}/comments?include_internal=true
async fn list_comments_handler(
    State(state): State<WebState>,
    Path(id): Path<i64>,
    Query(query): Query<CommentsQuery>,
) -> ApiResult {
    state.machine.tickets().get(id)?.ok_or_else(|| ApiError::not_found("Ticket"))?;
    let comments = state.machine.tickets().list_comments(id, query.include_internal)?;
    Ok(Json(comments).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewCommentBody {
    author_id: Identity,
    text: String,
    #[serde(default)]
    is_internal: bool,
}

/// POST /api/tickets/{id}/comments
async fn add_comment_handler(
    State(state): State<WebState>,
    Path(id): Path<i64>,
    Json(body): Json<NewCommentBody>,
) -> ApiResult {
    let comment = state
        .machine
        .add_comment(id, &body.author_id, &body.text, body.is_internal)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

/// GET /api/stats
async fn stats_handler(State(state): State<WebState>) -> ApiResult {
    Ok(Json(state.machine.tickets().stats()?).into_response())
}

/// GET /api/templates — all templates, inactive included.
async fn list_templates_handler(State(state): State<WebState>) -> ApiResult {
    Ok(Json(state.templates.all_templates()?).into_response())
}

/// POST /api/templates
async fn create_template_handler(State(state): State<WebState>, Json(template): Json<NewTemplate>) -> ApiResult {
    let template = state.templates.create_template(&template)?;
    log::info!("Template #{} \"{}\" created from dashboard", template.id, template.name);
    Ok((StatusCode::CREATED, Json(template)).into_response())
}

/// PATCH /api/templates/{id}
async fn update_template_handler(
    State(state): State<WebState>,
    Path(id): Path<i64>,
    Json(patch): Json<TemplatePatch>,
) -> ApiResult {
    let template = state
        .templates
        .update_template(id, &patch)?
        .ok_or_else(|| ApiError::not_found("Template"))?;
    Ok(Json(template).into_response())
}

/// DELETE /api/templates/{id} — soft delete.
async fn delete_template_handler(State(state): State<WebState>, Path(id): Path<i64>) -> ApiResult {
    if state.templates.deactivate_template(id)? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::not_found("Template"))
    }
}

/// GET /api/telegram-users
async fn list_users_handler(State(state): State<WebState>) -> ApiResult {
    Ok(Json(state.users.all_users()?).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewUserBody {
    telegram_id: Identity,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    #[serde(default)]
    role: Role,
}

/// POST /api/telegram-users — registers a user before they write to the bot.
async fn create_user_handler(State(state): State<WebState>, Json(body): Json<NewUserBody>) -> ApiResult {
    if body.telegram_id.chat_id().is_none() {
        return Err(ApiError::bad_request("telegramId must be a numeric Telegram id"));
    }
    if state.users.get_user(&body.telegram_id)?.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let profile = UserProfile {
        username: body.username,
        first_name: body.first_name,
        last_name: body.last_name,
    };
    state.users.ensure_user(&body.telegram_id, &profile)?;
    if body.role != Role::default() {
        state.users.set_role(&body.telegram_id, body.role)?;
    }

    let user = state
        .users
        .get_user(&body.telegram_id)?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// PATCH /api/telegram-users/{telegram_id} — role and active flag.
async fn update_user_handler(
    State(state): State<WebState>,
    Path(telegram_id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> ApiResult {
    if patch.is_empty() {
        return Err(ApiError::bad_request("Empty update"));
    }
    let telegram_id = Identity::from(telegram_id);

    let before = state
        .users
        .get_user(&telegram_id)?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let user = state
        .users
        .update_user(&telegram_id, &patch)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if user.role != before.role {
        log::info!("Dashboard changed role of {} from {} to {}", telegram_id, before.role, user.role);
        let event = AnalyticsEvent::new(
            EventType::UserRoleChanged,
            &Identity::from(DASHBOARD_ACTOR),
            json!({
                "telegram_id": telegram_id,
                "old_role": before.role,
                "new_role": user.role,
            }),
        );
        drop(publish_in_background(state.machine.events(), event));
    }
    Ok(Json(user).into_response())
}
