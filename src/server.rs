//! HTTP surface: axum routes over `InboxService`
//!
//! Every route except `/health` needs `Authorization: Bearer <token>`. The
//! token is turned into a Gmail client for that request only.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::auth::{bearer_token, GmailClientFactory};
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::inbox::InboxService;
use crate::subscriptions::unsubscribe_http_client;
use crate::models::{
    Category, Email, EmailLabel, LargeEmail, SenderStat, Subscription, UnsubscribeOutcome,
};

pub struct AppState {
    pub factory: Arc<dyn GmailClientFactory>,
    pub config: Arc<Config>,
    /// Outbound client for one-click unsubscribe POSTs
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(factory: Arc<dyn GmailClientFactory>, config: Config) -> Result<Self> {
        let http = unsubscribe_http_client(&config.subscriptions)?;

        Ok(Self {
            factory,
            config: Arc::new(config),
            http,
        })
    }

    fn service(&self, token: &AccessToken) -> InboxService {
        InboxService::new(
            self.factory.for_token(&token.0),
            self.config.clone(),
            self.http.clone(),
        )
    }
}

/// Bearer token of the current request
pub struct AccessToken(String);

#[async_trait]
impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(|token| AccessToken(token.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// Error body every route returns on failure
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    /// Provider failure; only `action` reaches the caller
    Internal {
        action: &'static str,
        source: GmailError,
    },
}

impl ApiError {
    fn gmail(action: &'static str, error: GmailError) -> Self {
        match error {
            GmailError::AuthError(reason) => {
                warn!("Gmail rejected the access token while trying to {}: {}", action, reason);
                ApiError::Unauthorized
            }
            GmailError::InvalidRequest(reason) => ApiError::BadRequest(reason),
            source => ApiError::Internal { action, source },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            ApiError::Internal { action, source } => {
                error!("Failed to {}: {}", action, source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to {}", action),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn query<T>(params: std::result::Result<Query<T>, QueryRejection>) -> std::result::Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn required<T>(value: Option<T>, message: &str) -> std::result::Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

fn parse_label(label: &str) -> std::result::Result<EmailLabel, ApiError> {
    label
        .parse()
        .map_err(|e| ApiError::gmail("parse label", e))
}

#[derive(Debug, Deserialize)]
pub struct EmailsQuery {
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    pub email_id: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelResponse {
    pub success: bool,
    pub labeled: usize,
    pub filter_created: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    pub email_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanRequest {
    pub label: Option<String>,
    pub email_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CleanResponse {
    pub success: bool,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleRequest {
    pub label: Option<String>,
    pub older_than_days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentsQuery {
    pub min_size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_url: Option<String>,
}

// GET /emails?label=
pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    params: std::result::Result<Query<EmailsQuery>, QueryRejection>,
) -> ApiResult<Vec<Email>> {
    let params = query(params)?;
    let category: Category = params
        .label
        .as_deref()
        .unwrap_or("")
        .parse()
        .map_err(|e| ApiError::gmail("parse category", e))?;

    state
        .service(&token)
        .list_emails(category)
        .await
        .map(Json)
        .map_err(|e| ApiError::gmail("fetch emails", e))
}

// POST /label
pub async fn apply_label(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    payload: std::result::Result<Json<LabelRequest>, JsonRejection>,
) -> ApiResult<LabelResponse> {
    let req = body(payload)?;
    let email_id = required(req.email_id, "emailId is required")?;
    let label = parse_label(&required(req.label, "label is required")?)?;

    let outcome = state
        .service(&token)
        .apply_label(&email_id, label)
        .await
        .map_err(|e| ApiError::gmail("apply label", e))?;

    Ok(Json(LabelResponse {
        success: true,
        labeled: outcome.messages_labeled,
        filter_created: outcome.filter_created,
    }))
}

// POST /archive
pub async fn archive_email(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    payload: std::result::Result<Json<ArchiveRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse> {
    let email_id = required(body(payload)?.email_id, "emailId is required")?;

    state
        .service(&token)
        .archive_email(&email_id)
        .await
        .map_err(|e| ApiError::gmail("archive email", e))?;

    Ok(Json(SuccessResponse { success: true }))
}

// POST /clean
pub async fn clean(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    payload: std::result::Result<Json<CleanRequest>, JsonRejection>,
) -> ApiResult<CleanResponse> {
    let req = body(payload)?;
    let service = state.service(&token);

    let count = match (req.email_ids, req.label) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Send either label or emailIds, not both".to_string(),
            ))
        }
        (Some(ids), None) => service.trash_emails(&ids).await,
        (None, Some(label)) => service.batch_delete_by_label(parse_label(&label)?).await,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "label or emailIds is required".to_string(),
            ))
        }
    }
    .map_err(|e| ApiError::gmail("clean emails", e))?;

    Ok(Json(CleanResponse {
        success: true,
        count,
    }))
}

// POST /clean/stale
pub async fn clean_stale(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    payload: std::result::Result<Json<StaleRequest>, JsonRejection>,
) -> ApiResult<CountResponse> {
    let req = body(payload)?;
    let label = parse_label(&required(req.label, "label is required")?)?;
    let days = required(req.older_than_days, "olderThanDays is required")?;

    let count = state
        .service(&token)
        .clean_stale_emails(label, days)
        .await
        .map_err(|e| ApiError::gmail("clean stale emails", e))?;

    Ok(Json(CountResponse { count }))
}

// GET /attachments?minSize=
pub async fn list_large_emails(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    params: std::result::Result<Query<AttachmentsQuery>, QueryRejection>,
) -> ApiResult<Vec<LargeEmail>> {
    let params = query(params)?;
    let min_size_mb = match params.min_size.as_deref().map(str::trim) {
        None | Some("") => state.config.large_emails.default_min_size_mb,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|mb| *mb > 0)
            .ok_or_else(|| ApiError::BadRequest("minSize must be a positive integer".to_string()))?,
    };

    state
        .service(&token)
        .list_large_emails(min_size_mb)
        .await
        .map(Json)
        .map_err(|e| ApiError::gmail("fetch large emails", e))
}

// GET /analytics
pub async fn sender_stats(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
) -> ApiResult<Vec<SenderStat>> {
    state
        .service(&token)
        .get_sender_stats()
        .await
        .map(Json)
        .map_err(|e| ApiError::gmail("fetch analytics", e))
}

// GET /subscriptions
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
) -> ApiResult<Vec<Subscription>> {
    state
        .service(&token)
        .list_subscriptions()
        .await
        .map(Json)
        .map_err(|e| ApiError::gmail("fetch subscriptions", e))
}

// POST /subscriptions
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    token: AccessToken,
    payload: std::result::Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> ApiResult<UnsubscribeResponse> {
    let subscription = required(body(payload)?.subscription, "subscription is required")?;

    let outcome = state
        .service(&token)
        .unsubscribe(&subscription)
        .await
        .map_err(|e| ApiError::gmail("unsubscribe", e))?;

    Ok(Json(match outcome {
        UnsubscribeOutcome::Unsubscribed => UnsubscribeResponse {
            success: true,
            manual_url: None,
        },
        UnsubscribeOutcome::Manual { url } => UnsubscribeResponse {
            success: false,
            manual_url: Some(url),
        },
    }))
}

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application router
///
/// API routes are served both at the root and under `/api`.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/emails", get(list_emails))
        .route("/label", post(apply_label))
        .route("/archive", post(archive_email))
        .route("/clean", post(clean))
        .route("/clean/stale", post(clean_stale))
        .route("/attachments", get(list_large_emails))
        .route("/analytics", get(sender_stats))
        .route("/subscriptions", get(list_subscriptions).post(unsubscribe));

    let cors = if state.config.server.permissive_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health))
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
