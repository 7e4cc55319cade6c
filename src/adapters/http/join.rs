use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

use crate::application::Granted;
use crate::domain::GuardError;

use super::auth::bearer_token;
use super::error::ApiResult;
use super::pages;
use super::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    /// Address to share with; the authenticated email when absent.
    pub email: Option<String>,
    /// Used only when no `Authorization` header is sent.
    pub credential: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub message: String,
    #[serde(flatten)]
    pub granted: Granted,
}

#[instrument(skip_all)]
pub async fn join_page(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.issuer.resolve(&token).await {
        Ok(config) => Html(pages::join_page(&config)).into_response(),
        Err(report) => {
            let status = match report.current_context() {
                GuardError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => {
                    event!(Level::ERROR, error = ?report, "Failed to resolve join link");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, Html(pages::not_found_page())).into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn join(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<Json<JoinResponse>> {
    let Json(request) = payload?;
    let credential = bearer_token(&headers)
        .or(request.credential.as_deref())
        .unwrap_or_default();

    let granted = state
        .orchestrator
        .grant_access(&token, credential, request.email.as_deref())
        .await?;

    Ok(Json(JoinResponse {
        message: format!("Successfully added {} as {}", granted.email, granted.role),
        granted,
    }))
}
