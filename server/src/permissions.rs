// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::http::Method;
use common::Task;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;

/// Object-level authorization predicate declared by each task handler.
///
/// Authentication itself is enforced by the `auth` middleware, so reaching a
/// handler already satisfies `IsAuthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    IsAuthenticated,
    IsOwnerOrReadOnly,
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Permission {
    pub fn check_object(
        self,
        method: &Method,
        user: &AuthenticatedUser,
        task: &Task,
    ) -> Result<(), AppError> {
        match self {
            Permission::IsAuthenticated => Ok(()),
            Permission::IsOwnerOrReadOnly if is_safe(method) || task.user_id == user.id => Ok(()),
            Permission::IsOwnerOrReadOnly => {
                tracing::warn!(
                    "User {} tried {} on task {} owned by {}",
                    user.id,
                    method,
                    task.id,
                    task.user_id
                );
                Err(AppError::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task_owned_by(user_id: i64) -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            user_id,
            title: "Buy milk".to_string(),
            is_done: false,
            created_at: now,
            updated_at: now,
            due_date: None,
            tags: Vec::new(),
        }
    }

    fn user(id: i64) -> AuthenticatedUser {
        AuthenticatedUser {
            id,
            username: format!("user{}", id),
        }
    }

    #[test]
    fn test_owner_may_write() {
        let task = task_owned_by(1);
        for method in [Method::GET, Method::POST, Method::PATCH, Method::DELETE] {
            assert!(
                Permission::IsOwnerOrReadOnly
                    .check_object(&method, &user(1), &task)
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_non_owner_is_read_only() {
        let task = task_owned_by(1);
        let stranger = user(2);
        assert!(
            Permission::IsOwnerOrReadOnly
                .check_object(&Method::GET, &stranger, &task)
                .is_ok()
        );
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let err = Permission::IsOwnerOrReadOnly
                .check_object(&method, &stranger, &task)
                .unwrap_err();
            assert!(matches!(err, AppError::Forbidden));
        }
    }

    #[test]
    fn test_is_authenticated_allows_any_user() {
        let task = task_owned_by(1);
        assert!(
            Permission::IsAuthenticated
                .check_object(&Method::DELETE, &user(2), &task)
                .is_ok()
        );
    }
}
