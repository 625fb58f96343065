// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    Extension,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{Method, StatusCode},
};
use common::{Tag, Task, TaskDetail, TaskStats, TaskSummary};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::filters::{TaskFilter, TaskListParams};
use crate::permissions::Permission;
use crate::state::AppState;
use crate::{selectors, services, validation};

type JsonBody = Result<Json<Value>, JsonRejection>;
type TaskPath = Result<Path<i64>, PathRejection>;
type QueryParams<T> = Result<Query<T>, QueryRejection>;

/// Query string of `DELETE /tasks/{id}/delete_tag`.
#[derive(Deserialize, Debug)]
pub struct DeleteTagParams {
    pub tag_id: Option<String>,
}

/// Loads a task through the owner-scoped set, then applies `permission`.
///
/// An id that is not a number cannot name a task, so it is a 404 as well.
async fn get_object(
    state: &AppState,
    user: &AuthenticatedUser,
    path: TaskPath,
    method: &Method,
    permission: Permission,
) -> Result<Task, AppError> {
    let Path(task_id) = path.map_err(|rejection| {
        debug!("Rejected task path: {}", rejection.body_text());
        AppError::task_not_found()
    })?;
    let task = selectors::task_for_user(&state.db, user.id, task_id)
        .await?
        .ok_or_else(AppError::task_not_found)?;
    permission.check_object(method, user, &task)?;
    Ok(task)
}

fn filtered(params: QueryParams<TaskListParams>) -> Result<TaskFilter, AppError> {
    let Query(params) = params?;
    Ok(TaskFilter::try_from(params)?)
}

/// Handler for `GET /health`.
pub async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

/// Handler for `GET /tasks`: compact rows, filters applied.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    params: QueryParams<TaskListParams>,
) -> Result<Json<Vec<TaskSummary>>, AppError> {
    let filter = filtered(params)?;
    let tasks = selectors::tasks_for_user(&state.db, user.id, &filter).await?;
    info!("Successfully retrieved {} tasks.", tasks.len());
    Ok(Json(tasks.iter().map(TaskSummary::from).collect()))
}

/// Handler for `GET /tasks/get_all_tasks_and_their_info`: full rows, filters applied.
pub async fn get_all_tasks_and_their_info(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    params: QueryParams<TaskListParams>,
) -> Result<Json<Vec<TaskDetail>>, AppError> {
    let filter = filtered(params)?;
    let tasks = selectors::tasks_for_user(&state.db, user.id, &filter).await?;
    info!("Successfully retrieved {} tasks with details.", tasks.len());
    Ok(Json(tasks.into_iter().map(TaskDetail::from).collect()))
}

/// Handler for creating a new task. The owner is the authenticated user.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: JsonBody,
) -> Result<(StatusCode, Json<TaskDetail>), AppError> {
    let Json(body) = body?;
    debug!("Received request to create task for user: {}", user.username);

    let payload = validation::create_payload(body)?;
    let new_task = validation::validate_create(payload)?;
    let task = services::create_task(&state.db, user.id, new_task).await?;

    info!("Task created successfully with ID: {}", task.id);
    Ok((StatusCode::CREATED, Json(TaskDetail::from(task))))
}

pub async fn retrieve_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
) -> Result<Json<TaskDetail>, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsAuthenticated).await?;
    Ok(Json(TaskDetail::from(task)))
}

/// Handler for `PUT /tasks/{id}`.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
    body: JsonBody,
) -> Result<Json<TaskDetail>, AppError> {
    apply_update(&state, &user, &method, path, body, false).await
}

/// Handler for `PATCH /tasks/{id}`.
pub async fn partial_update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
    body: JsonBody,
) -> Result<Json<TaskDetail>, AppError> {
    apply_update(&state, &user, &method, path, body, true).await
}

async fn apply_update(
    state: &AppState,
    user: &AuthenticatedUser,
    method: &Method,
    path: TaskPath,
    body: JsonBody,
    partial: bool,
) -> Result<Json<TaskDetail>, AppError> {
    let task = get_object(state, user, path, method, Permission::IsOwnerOrReadOnly).await?;
    let Json(body) = body?;

    let payload = validation::update_payload(body)?;
    let changes = validation::validate_update(&task, payload, partial)?;
    let task = services::update_task(&state.db, task, changes).await?;
    Ok(Json(TaskDetail::from(task)))
}

/// Handler for deleting a task by ID.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
) -> Result<StatusCode, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsOwnerOrReadOnly).await?;
    let task_id = task.id;
    debug!("Attempting to delete task with ID: {}", task_id);

    services::delete_task(&state.db, task).await?;

    info!("Task with ID {} deleted successfully.", task_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_title(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
    body: JsonBody,
) -> Result<Json<TaskDetail>, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsOwnerOrReadOnly).await?;
    let Json(body) = body?;

    let payload = validation::change_title_payload(body)?;
    let title = validation::validate_change_title(payload)?;
    let task = services::change_title(&state.db, task, &title).await?;
    Ok(Json(TaskDetail::from(task)))
}

/// Flips completion without the due-date check; see `services::toggle_task_done`.
pub async fn toggle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
) -> Result<Json<TaskDetail>, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsOwnerOrReadOnly).await?;
    let task = services::toggle_task_done(&state.db, task).await?;
    Ok(Json(TaskDetail::from(task)))
}

/// Marks the task done, enforcing the due-date rule.
pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
) -> Result<Json<TaskDetail>, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsOwnerOrReadOnly).await?;
    validation::validate_complete(&task)?;
    let task = services::complete_task(&state.db, task).await?;
    Ok(Json(TaskDetail::from(task)))
}

/// Totals over every owned task; list filters are not applied.
pub async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<TaskStats>, AppError> {
    let stats = selectors::task_stats(&state.db, user.id).await?;
    Ok(Json(stats))
}

pub async fn add_tag(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
    body: JsonBody,
) -> Result<Json<TaskDetail>, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsOwnerOrReadOnly).await?;
    let Json(body) = body?;

    let payload = validation::add_tag_payload(body)?;
    let tag = validation::validate_add_tag(payload)?;
    let task = services::add_tag_to_task(&state.db, task, tag).await?;
    Ok(Json(TaskDetail::from(task)))
}

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
) -> Result<Json<Vec<Tag>>, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsAuthenticated).await?;
    let tags = selectors::get_task_tags(&state.db, task.id).await?;
    Ok(Json(tags))
}

/// Handler for `DELETE /tasks/{id}/delete_tag?tag_id=N`.
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    method: Method,
    path: TaskPath,
    params: QueryParams<DeleteTagParams>,
) -> Result<StatusCode, AppError> {
    let task = get_object(&state, &user, path, &method, Permission::IsOwnerOrReadOnly).await?;
    let Query(params) = params?;
    let tag_id = parse_tag_id(params.tag_id.as_deref())?;

    services::delete_tag_from_task(&state.db, &task, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_tag_id(raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw.ok_or_else(|| AppError::BadRequest("tag_id is required".to_string()))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("tag_id must be integer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_id() {
        assert_eq!(parse_tag_id(Some("12")).unwrap(), 12);
        assert_eq!(parse_tag_id(Some(" 3 ")).unwrap(), 3);

        match parse_tag_id(None).unwrap_err() {
            AppError::BadRequest(msg) => assert_eq!(msg, "tag_id is required"),
            other => panic!("unexpected error: {:?}", other),
        }
        match parse_tag_id(Some("abc")).unwrap_err() {
            AppError::BadRequest(msg) => assert_eq!(msg, "tag_id must be integer"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
