//! HTTP surface for account setup and balance sync.
//!
//! Plays the host framework's part over HTTP:
//! - `GET /accounts` - list connectors and their credential fields
//! - `GET /accounts/:code/interaction` - interactive authorization; also the
//!   OAuth redirect target
//! - `POST /accounts/:code/balances` - refresh credentials and fetch balances
//!
//! The CSRF state for an interaction lives in a [`SessionStore`] entry keyed
//! by the `account_session` cookie.

use crate::error::ConnectorError;
use crate::registry::ConnectorRegistry;
use crate::types::{AccountField, Balances, Interaction, InteractionRequest};
use crate::AccountConnector;
use account_oauth::credentials::{CredentialSink, Credentials};
use account_oauth::oauth::{OAuthError, SessionStore};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "account_session";

/// Shared state for the account API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ConnectorRegistry>,
    pub sessions: Arc<SessionStore>,
    /// Lifetime of the session cookie (seconds); matches the CSRF state expiry
    pub session_ttl_seconds: i64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    /// Credentials refreshed before the failure; the caller must store them
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<HashMap<String, String>>,
}

/// A single entry in the `GET /accounts` response.
#[derive(Serialize)]
pub struct ConnectorInfo {
    pub code: String,
    pub name: String,
    pub url: String,
    pub fields: Vec<AccountField>,
}

/// Response for a completed interaction.
#[derive(Serialize)]
pub struct InteractionResponse {
    pub connector: String,
    pub fields: HashMap<String, String>,
}

/// Response for `POST /accounts/:code/balances`.
#[derive(Serialize)]
pub struct BalancesResponse {
    pub balances: Balances,
    /// Refreshed credentials to store in place of the submitted ones
    pub credentials: HashMap<String, String>,
}

/// Application error types for account endpoints
enum AppError {
    BadRequest(String),
    NotFound(String),
    ServerError(String),
    Connector {
        error: ConnectorError,
        credentials: Option<Credentials>,
    },
}

impl From<ConnectorError> for AppError {
    fn from(error: ConnectorError) -> Self {
        AppError::Connector {
            error,
            credentials: None,
        }
    }
}

fn status_for(error: &ConnectorError) -> StatusCode {
    match error {
        ConnectorError::Csrf(_) => StatusCode::FORBIDDEN,
        ConnectorError::Auth(OAuthError::AuthorizationDenied(_)) => StatusCode::FORBIDDEN,
        ConnectorError::Auth(_) | ConnectorError::Fetch { .. } => StatusCode::BAD_GATEWAY,
        ConnectorError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ConnectorError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, credentials) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            AppError::Connector { error, credentials } => (
                status_for(&error),
                error.to_string(),
                credentials.map(|c| c.to_fields()),
            ),
        };

        (status, Json(ErrorResponse { error, credentials })).into_response()
    }
}

/// Create account API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/accounts", get(list_connectors))
        .route("/accounts/:code/interaction", get(interaction))
        .route("/accounts/:code/balances", post(fetch_balances))
        .with_state(Arc::new(state))
}

fn lookup(state: &ApiState, code: &str) -> Result<Arc<dyn AccountConnector>, AppError> {
    state.registry.get(code).ok_or_else(|| {
        warn!(connector = %code, "Unknown connector");
        AppError::NotFound(format!("Connector '{}' not found", code))
    })
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn session_cookie(id: &str, max_age: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, id, max_age
    ))
    .ok()
}

/// GET /accounts
async fn list_connectors(State(state): State<Arc<ApiState>>) -> Json<Vec<ConnectorInfo>> {
    Json(
        state
            .registry
            .all()
            .iter()
            .map(|c| ConnectorInfo {
                code: c.code().to_string(),
                name: c.name().to_string(),
                url: c.url().to_string(),
                fields: c.fields(),
            })
            .collect(),
    )
}

/// GET /accounts/:code/interaction
///
/// Without a `code` query parameter: issue a CSRF state, set the session
/// cookie and redirect (302) to the provider. With one: validate the state
/// against the session and return the credential fields to store.
async fn interaction(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Query(request): Query<InteractionRequest>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let connector = lookup(&state, &code)?;

    let (id, mut session) = state.sessions.checkout(session_id(&headers).as_deref());
    let result = connector.interaction(&mut session, &request).await;
    state.sessions.checkin(id.clone(), session);

    match result? {
        Interaction::Redirect { url } => {
            let location = HeaderValue::from_str(&url).map_err(|_| {
                AppError::ServerError("Authorization URL is not a valid header".to_string())
            })?;
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(header::LOCATION, location);
            if let Some(cookie) = session_cookie(&id, state.session_ttl_seconds) {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            debug!(connector = %code, "Issued authorization redirect");
            Ok(response)
        }
        Interaction::Complete(credentials) => {
            let mut response = Json(InteractionResponse {
                connector: code,
                fields: credentials.to_fields(),
            })
            .into_response();
            if let Some(cookie) = session_cookie("", 0) {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Ok(response)
        }
    }
}

/// Keeps the credentials a connector hands back during one request.
#[derive(Default)]
struct CapturingSink {
    captured: Mutex<Option<Credentials>>,
}

impl CredentialSink for CapturingSink {
    fn update(&self, credentials: &Credentials) -> anyhow::Result<()> {
        let mut captured = self
            .captured
            .lock()
            .map_err(|_| anyhow::anyhow!("credential capture lock poisoned"))?;
        *captured = Some(credentials.clone());
        Ok(())
    }
}

impl CapturingSink {
    fn take(&self) -> Option<Credentials> {
        self.captured.lock().ok().and_then(|mut c| c.take())
    }
}

/// POST /accounts/:code/balances
///
/// Body: the stored credential fields. The response carries the refreshed
/// fields, also on failure when the refresh itself went through.
async fn fetch_balances(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Json(fields): Json<HashMap<String, String>>,
) -> Result<Json<BalancesResponse>, AppError> {
    let connector = lookup(&state, &code)?;
    let credentials = Credentials::from_fields(&fields)
        .map_err(|e| AppError::BadRequest(format!("Invalid credentials: {:#}", e)))?;

    let sink = CapturingSink::default();
    let result = connector.fetch_balances(&credentials, &sink).await;
    let refreshed = sink.take();

    match result {
        Ok(balances) => {
            let refreshed = refreshed.ok_or_else(|| {
                AppError::ServerError(
                    "connector returned balances without refreshed credentials".to_string(),
                )
            })?;
            Ok(Json(BalancesResponse {
                balances,
                credentials: refreshed.to_fields(),
            }))
        }
        Err(error) => Err(AppError::Connector {
            error,
            credentials: refreshed,
        }),
    }
}
