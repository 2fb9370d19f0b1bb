//! Admin session endpoints: login, logout and the guarded admin view.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};

use super::{revision, success, ApiResult};
use crate::auth::{session_token, AdminPage, AdminView, SignInError};
use crate::errors::ErrorResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub identity: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutData {
    pub signed_out: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewData {
    pub can_enter_admin: bool,
    #[serde(flatten)]
    pub view: AdminView,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub page: AdminPage,
    /// EventSource cannot send headers, so streams may pass the token here.
    #[serde(default)]
    pub token: Option<String>,
}

/// Failed sign-in rendered in the error envelope.
pub struct SignInRejection {
    error: SignInError,
    revision_id: i64,
}

impl IntoResponse for SignInRejection {
    fn into_response(self) -> Response {
        let status = match self.error {
            SignInError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            SignInError::MalformedIdentifier => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = ErrorResponse::with_details(
            self.error.code(),
            self.error.message().to_string(),
            None,
            self.revision_id,
        );
        (status, Json(body)).into_response()
    }
}

/// POST /api/session/login - Sign in and receive a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<super::ApiResponse<LoginData>, SignInRejection> {
    let revision_id = revision(&state).await;

    match state.guard.sign_in(&request.email, &request.password).await {
        Ok(session) => Ok(super::ApiResponse::new(
            LoginData {
                token: session.token,
                identity: session.identity,
                expires_at: session.expires_at,
            },
            revision_id,
        )),
        Err(error) => Err(SignInRejection { error, revision_id }),
    }
}

/// POST /api/session/logout - End the caller's session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<LogoutData> {
    let revision_id = revision(&state).await;

    let signed_out = match session_token(&headers) {
        Some(token) => {
            let active = state.guard.current(&token).is_some();
            state.guard.sign_out(&token).await;
            active
        }
        None => false,
    };
    success(LogoutData { signed_out }, revision_id)
}

/// GET /api/session/view?page= - What the admin route shows right now.
pub async fn get_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ViewQuery>,
) -> ApiResult<ViewData> {
    let revision_id = revision(&state).await;
    let token = session_token(&headers).or(query.token).unwrap_or_default();

    let watch = state.guard.watch(&token);
    success(
        ViewData {
            can_enter_admin: watch.can_enter_admin(),
            view: watch.resolve(query.page),
        },
        revision_id,
    )
}

/// GET /api/session/events?page= - Admin view transitions as server-sent events.
pub async fn view_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ViewQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let token = session_token(&headers).or(query.token).unwrap_or_default();
    let views = state.guard.watch(&token).into_views(query.page);

    let events = views.filter_map(|view| match Event::default().event("view").json_data(view) {
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            tracing::warn!("Dropping unserializable view event: {}", e);
            None
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
