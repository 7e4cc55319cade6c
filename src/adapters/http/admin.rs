use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::application::{Registration, SpreadsheetDetails, SpreadsheetSummary};
use crate::domain::{BanRecord, Role, SpreadsheetConfig};

use super::auth::Authenticated;
use super::error::ApiResult;
use super::pages;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub spreadsheet_id: String,
    /// Falls back to `join.default_role`.
    pub role: Option<Role>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub role: Option<Role>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceAccountEmail {
    pub email: String,
}

pub async fn admin_page(State(state): State<AppState>) -> Html<String> {
    Html(pages::admin_page(&state.admin.service_account_email()))
}

pub async fn service_account_email(State(state): State<AppState>) -> Json<ServiceAccountEmail> {
    Json(ServiceAccountEmail {
        email: state.admin.service_account_email(),
    })
}

#[instrument(skip_all, fields(admin = %admin.id))]
pub async fn register(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Registration>)> {
    let Json(request) = payload?;
    let role = request.role.unwrap_or(state.settings.default_role);
    let registration = state
        .admin
        .register(&admin, &request.spreadsheet_id, role, request.title.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[instrument(skip_all, fields(admin = %admin.id))]
pub async fn list(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
) -> ApiResult<Json<Vec<SpreadsheetSummary>>> {
    Ok(Json(state.admin.list(&admin).await?))
}

#[instrument(skip_all, fields(admin = %admin.id, %spreadsheet_id))]
pub async fn get(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path(spreadsheet_id): Path<String>,
) -> ApiResult<Json<SpreadsheetDetails>> {
    Ok(Json(state.admin.get(&admin, &spreadsheet_id).await?))
}

#[instrument(skip_all, fields(admin = %admin.id, %spreadsheet_id))]
pub async fn update(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path(spreadsheet_id): Path<String>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Json<SpreadsheetConfig>> {
    let Json(request) = payload?;
    let config = state
        .admin
        .update(&admin, &spreadsheet_id, request.role, request.title.as_deref())
        .await?;
    Ok(Json(config))
}

#[instrument(skip_all, fields(admin = %admin.id, %spreadsheet_id))]
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path(spreadsheet_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.admin.delete(&admin, &spreadsheet_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(admin = %admin.id, %spreadsheet_id))]
pub async fn rotate(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path(spreadsheet_id): Path<String>,
) -> ApiResult<Json<SpreadsheetSummary>> {
    Ok(Json(state.admin.rotate(&admin, &spreadsheet_id).await?))
}

#[instrument(skip_all, fields(admin = %admin.id, %spreadsheet_id))]
pub async fn ban(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path(spreadsheet_id): Path<String>,
    payload: Result<Json<BanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BanRecord>)> {
    let Json(request) = payload?;
    let ban = state
        .admin
        .ban(&admin, &spreadsheet_id, &request.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ban)))
}

#[instrument(skip_all, fields(admin = %admin.id, %spreadsheet_id, %user_id))]
pub async fn unban(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path((spreadsheet_id, user_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.admin.unban(&admin, &spreadsheet_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
