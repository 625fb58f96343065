// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Write operations. Each function runs inside one transaction and is
//! either fully applied or rolled back when an error is returned.
use common::Task;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::database;
use crate::error::AppError;
use crate::validation::{NewTask, TaskChanges};

/// How a tag is referenced when attaching it to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
    /// Must point at an existing tag.
    Id(i64),
    /// Looked up by exact name, created when absent.
    Name(String),
}

pub async fn create_task(
    pool: &SqlitePool,
    user_id: i64,
    new_task: NewTask,
) -> Result<Task, AppError> {
    let mut tx = pool.begin().await?;
    let task = database::insert_task(&mut tx, user_id, &new_task).await?;
    tx.commit().await?;

    info!("Created new task: {}", task.title);
    Ok(task)
}

/// Replaces the editable fields of `task` with an already validated state.
pub async fn update_task(
    pool: &SqlitePool,
    task: Task,
    changes: TaskChanges,
) -> Result<Task, AppError> {
    let mut tx = pool.begin().await?;
    if !database::update_task(&mut tx, task.id, &changes).await? {
        return Err(AppError::task_not_found());
    }
    let updated = reload(&mut tx, task).await?;
    tx.commit().await?;

    debug!("Updated task with ID: {}", updated.id);
    Ok(updated)
}

pub async fn delete_task(pool: &SqlitePool, task: Task) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    if !database::delete_task(&mut tx, task.id).await? {
        return Err(AppError::task_not_found());
    }
    tx.commit().await?;
    Ok(())
}

/// Overwrites the title only. The caller validates `title` first.
pub async fn change_title(pool: &SqlitePool, task: Task, title: &str) -> Result<Task, AppError> {
    let mut tx = pool.begin().await?;
    if !database::update_task_title(&mut tx, task.id, title).await? {
        return Err(AppError::task_not_found());
    }
    let updated = reload(&mut tx, task).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Flips the completion flag.
///
/// This does not check the due-date rule: a task without a due date can be
/// toggled to done here, unlike the validated update path.
pub async fn toggle_task_done(pool: &SqlitePool, task: Task) -> Result<Task, AppError> {
    let mut tx = pool.begin().await?;
    if !database::update_task_done(&mut tx, task.id, !task.is_done).await? {
        return Err(AppError::task_not_found());
    }
    let updated = reload(&mut tx, task).await?;
    tx.commit().await?;

    debug!("Toggled task {} to is_done={}", updated.id, updated.is_done);
    Ok(updated)
}

/// Marks the task done. The caller checks the due-date rule beforehand.
pub async fn complete_task(pool: &SqlitePool, task: Task) -> Result<Task, AppError> {
    let mut tx = pool.begin().await?;
    if !database::update_task_done(&mut tx, task.id, true).await? {
        return Err(AppError::task_not_found());
    }
    let updated = reload(&mut tx, task).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Attaches a tag to `task`. Attaching an already attached tag is a no-op.
pub async fn add_tag_to_task(
    pool: &SqlitePool,
    mut task: Task,
    tag: TagRef,
) -> Result<Task, AppError> {
    let mut tx = pool.begin().await?;

    let tag = match tag {
        TagRef::Id(tag_id) => database::find_tag(&mut tx, tag_id)
            .await?
            .ok_or_else(AppError::tag_not_found)?,
        TagRef::Name(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::BadRequest(
                    "Either tag_id or tag_name is required".to_string(),
                ));
            }
            database::find_or_create_tag(&mut tx, name).await?
        }
    };

    let attached = database::attach_tag(&mut tx, task.id, tag.id).await?;
    tx.commit().await?;

    if attached {
        info!("Attached tag {} to task {}", tag.id, task.id);
        task.tags.push(tag);
        task.tags.sort_by_key(|tag| tag.id);
    } else {
        debug!("Tag {} was already attached to task {}", tag.id, task.id);
    }
    Ok(task)
}

/// Detaches a tag. The tag must exist; detaching one that is not attached is a no-op.
pub async fn delete_tag_from_task(
    pool: &SqlitePool,
    task: &Task,
    tag_id: i64,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    if database::find_tag(&mut tx, tag_id).await?.is_none() {
        return Err(AppError::tag_not_found());
    }
    let detached = database::detach_tag(&mut tx, task.id, tag_id).await?;
    tx.commit().await?;

    debug!(
        "Detach tag {} from task {}: link existed={}",
        tag_id, task.id, detached
    );
    Ok(())
}

// Re-reads the row inside the transaction; tags are not touched by these writes.
async fn reload(conn: &mut sqlx::SqliteConnection, task: Task) -> Result<Task, AppError> {
    let mut fresh = database::find_task(conn, task.id)
        .await?
        .ok_or_else(AppError::task_not_found)?;
    fresh.tags = task.tags;
    Ok(fresh)
}
