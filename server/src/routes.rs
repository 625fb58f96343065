// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::{auth, handlers, state::AppState};
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    let tasks = Router::new()
        // `GET /tasks` lists, `POST /tasks` creates
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks/get_all_tasks_and_their_info",
            get(handlers::get_all_tasks_and_their_info),
        )
        .route("/tasks/stats", get(handlers::stats))
        .route(
            "/tasks/{id}",
            get(handlers::retrieve_task)
                .put(handlers::update_task)
                .patch(handlers::partial_update_task)
                .delete(handlers::delete_task),
        )
        .route("/tasks/{id}/change_title", post(handlers::change_title))
        .route("/tasks/{id}/toggle", post(handlers::toggle))
        .route("/tasks/{id}/complete", post(handlers::complete))
        .route("/tasks/{id}/add_tag", post(handlers::add_tag))
        .route("/tasks/{id}/list_tags", get(handlers::list_tags))
        .route("/tasks/{id}/delete_tag", delete(handlers::delete_tag))
        // Every task route requires a valid bearer token
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(tasks)
        // Adds the shared state (DB pool and config) to the application
        .with_state(state)
}
