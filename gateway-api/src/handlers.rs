use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::instrument;

use crate::admin;
use crate::api::ApiError;
use crate::connection::ConnectionContext;
use crate::contacts;
use crate::router;
use crate::session::Session;
use crate::tasks;
use crate::workflows::{self, NewTask, NewTimesheetLine};

async fn open_session(state: &router::State) -> Result<Session, ApiError> {
    let context = state.store.snapshot().await;
    Session::open(state.connector.as_ref(), &context).await
}

#[instrument(skip_all)]
pub async fn store_data(
    state: State<router::State>,
    Json(context): Json<ConnectionContext>,
) -> &'static str {
    tracing::debug!(url = %context.url, db = %context.db, username = %context.username, "storing connection context");
    state.store.store(context).await;
    "Data stored successfully"
}

pub async fn get_data(state: State<router::State>) -> Json<ConnectionContext> {
    Json(state.store.snapshot().await)
}

#[instrument(skip_all)]
pub async fn test_database_api(state: State<router::State>) -> Result<Json<JsonValue>, ApiError> {
    let context = state.store.snapshot().await;
    if context.url.is_empty() {
        return Err(ApiError::MissingConfiguration("URL"));
    }

    let rpc = state.connector.connect(&context.url)?;
    let info = rpc.probe().await?;
    Ok(Json(info.into()))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub url: String,
}

#[instrument(skip_all)]
pub async fn login_api(
    state: State<router::State>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    state.store.store_url(request.url.clone()).await;

    let rpc = state.connector.connect(&request.url)?;
    let version = rpc.server_version().await?;
    let databases = rpc.list_databases().await?;

    Ok(Json(json!({
        "version": JsonValue::from(version),
        "databases": databases,
    })))
}

#[instrument(skip_all)]
pub async fn authenticate_api(state: State<router::State>) -> Response {
    match open_session(&state).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({"status": "success", "uid": session.uid})),
        )
            .into_response(),
        Err(error) => {
            tracing::error!("authentication request failed: {}", error);
            (
                error.status(),
                Json(json!({"status": "failed", "message": error.to_string()})),
            )
                .into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn fetch_tasks(state: State<router::State>) -> Result<Json<JsonValue>, ApiError> {
    let session = open_session(&state).await?;
    let tasks = tasks::assigned_tasks(&session).await?;
    Ok(Json(JsonValue::Array(
        tasks.into_iter().map(Into::into).collect(),
    )))
}

#[instrument(skip_all)]
pub async fn fetch_apps(state: State<router::State>) -> Result<Json<JsonValue>, ApiError> {
    let session = open_session(&state).await?;
    let active_apps = admin::installed_modules(&session).await?;
    Ok(Json(json!({"active_apps": active_apps})))
}

#[derive(Deserialize)]
pub struct UpdateStageRequest {
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub new_stage_name: Option<String>,
}

#[instrument(skip_all)]
pub async fn update_stage(
    state: State<router::State>,
    Json(request): Json<UpdateStageRequest>,
) -> Response {
    let result: Result<(), ApiError> = async {
        let missing = || ApiError::InvalidInput("Missing task_id or new_stage_name".to_string());
        let task_id = request.task_id.ok_or_else(missing)?;
        let stage_name = request
            .new_stage_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(missing)?;

        let session = open_session(&state).await?;
        workflows::update_stage(&session, task_id, stage_name).await
    }
    .await;

    write_outcome(result.map(|_| json!({"success": true})))
}

#[instrument(skip_all)]
pub async fn isadmin(state: State<router::State>) -> Result<Json<JsonValue>, ApiError> {
    let session = open_session(&state).await?;
    let is_admin = admin::is_admin(&session).await?;
    Ok(Json(json!({"is_admin": is_admin})))
}

#[instrument(skip_all)]
pub async fn fetch_new_task(
    state: State<router::State>,
) -> Result<Json<tasks::ProjectSnapshot>, ApiError> {
    let session = open_session(&state).await?;
    Ok(Json(tasks::project_snapshot(&session).await?))
}

#[instrument(skip_all)]
pub async fn add_task(state: State<router::State>, Json(request): Json<NewTask>) -> Response {
    let result: Result<i64, ApiError> = async {
        // Reject a bad priority literal before any remote call goes out.
        request.priority_flag()?;
        let session = open_session(&state).await?;
        workflows::create_task(&session, &request).await
    }
    .await;

    write_outcome(result.map(|_| json!({"success": true})))
}

#[instrument(skip_all)]
pub async fn fetch_contacts(state: State<router::State>) -> Result<Json<JsonValue>, ApiError> {
    let session = open_session(&state).await?;
    let contacts = contacts::contacts(&session).await?;
    Ok(Json(JsonValue::Array(
        contacts.into_iter().map(Into::into).collect(),
    )))
}

#[instrument(skip_all)]
pub async fn fetch_timesheet(state: State<router::State>) -> Result<Json<JsonValue>, ApiError> {
    let session = open_session(&state).await?;
    let tasks = tasks::tasks_with_timesheets(&session).await?;
    Ok(Json(JsonValue::Array(
        tasks.into_iter().map(Into::into).collect(),
    )))
}

#[instrument(skip_all)]
pub async fn add_timesheet_line(
    state: State<router::State>,
    Json(request): Json<NewTimesheetLine>,
) -> Result<Json<JsonValue>, ApiError> {
    let session = open_session(&state).await?;
    workflows::add_timesheet_line(&session, &request).await?;
    Ok(Json(json!({"status": "Timesheet line added successfully"})))
}

/// The write endpoints answer in the `{success, error}` envelope instead of
/// the generic one; the status code still comes from the error kind.
fn write_outcome(result: Result<JsonValue, ApiError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => {
            tracing::error!("write request failed: {}", error);
            (
                error.status(),
                Json(json!({"success": false, "error": error.to_string()})),
            )
                .into_response()
        }
    }
}
