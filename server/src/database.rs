// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Utc;
use common::{Tag, Task};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::validation::{NewTask, TaskChanges};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        is_done BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        due_date DATE NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks (user_id);",
    r#"
    CREATE TABLE IF NOT EXISTS task_tags (
        task_id INTEGER NOT NULL REFERENCES tasks (id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
        PRIMARY KEY (task_id, tag_id)
    );
    "#,
];

const TASK_COLUMNS: &str = "id, user_id, title, is_done, created_at, updated_at, due_date";

/// Establishes the database connection pool.
/// If the database does not exist, it creates it, then makes sure the schema is in place.
pub async fn establish_connection_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    // SQLite creates the file but not its directory.
    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
            debug!("Created database directory {}", parent.display());
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Creates the `tags`, `tasks` and `task_tags` tables if they are missing.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }
    info!("Database schema is ready.");
    Ok(())
}

/// Fetches a single task row (without tags).
pub async fn find_task(conn: &mut SqliteConnection, task_id: i64) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
    sqlx::query_as::<_, Task>(&sql)
        .bind(task_id)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("Failed to fetch task with ID: {}", task_id))
}

/// Inserts a new task owned by `user_id` and returns it.
pub async fn insert_task(
    conn: &mut SqliteConnection,
    user_id: i64,
    new_task: &NewTask,
) -> Result<Task> {
    let now = Utc::now();

    debug!(
        "Insert values: user_id={}, title={}, is_done={}, due_date={:?}",
        user_id, new_task.title, new_task.is_done, new_task.due_date
    );

    let id = sqlx::query(
        "INSERT INTO tasks (user_id, title, is_done, created_at, updated_at, due_date) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&new_task.title)
    .bind(new_task.is_done)
    .bind(now)
    .bind(now)
    .bind(new_task.due_date)
    .execute(conn)
    .await
    .context("Failed to insert task into DB")?
    .last_insert_rowid();

    Ok(Task {
        id,
        user_id,
        title: new_task.title.clone(),
        is_done: new_task.is_done,
        created_at: now,
        updated_at: now,
        due_date: new_task.due_date,
        tags: Vec::new(),
    })
}

/// Overwrites the editable columns of a task. Returns false if no row matched.
pub async fn update_task(
    conn: &mut SqliteConnection,
    task_id: i64,
    changes: &TaskChanges,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE tasks SET title = ?, is_done = ?, due_date = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&changes.title)
    .bind(changes.is_done)
    .bind(changes.due_date)
    .bind(Utc::now())
    .bind(task_id)
    .execute(conn)
    .await
    .with_context(|| format!("Failed to update task with ID: {}", task_id))?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_task_title(
    conn: &mut SqliteConnection,
    task_id: i64,
    title: &str,
) -> Result<bool> {
    let result = sqlx::query("UPDATE tasks SET title = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(Utc::now())
        .bind(task_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to change title of task with ID: {}", task_id))?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_task_done(
    conn: &mut SqliteConnection,
    task_id: i64,
    is_done: bool,
) -> Result<bool> {
    let result = sqlx::query("UPDATE tasks SET is_done = ?, updated_at = ? WHERE id = ?")
        .bind(is_done)
        .bind(Utc::now())
        .bind(task_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to set completion of task with ID: {}", task_id))?;

    Ok(result.rows_affected() > 0)
}

/// Hard deletes a task; its tag links go with it through `ON DELETE CASCADE`.
/// Returns true if a task was deleted, false if no task with the given ID was found.
pub async fn delete_task(conn: &mut SqliteConnection, task_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to delete task with ID: {}", task_id))?;

    let rows_affected = result.rows_affected();
    info!("Deleted {} rows for task ID: {}", rows_affected, task_id);

    Ok(rows_affected > 0)
}

pub async fn find_tag(conn: &mut SqliteConnection, tag_id: i64) -> Result<Option<Tag>> {
    sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = ?")
        .bind(tag_id)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("Failed to fetch tag with ID: {}", tag_id))
}

/// Returns the oldest tag called `name`, creating one if none exists.
pub async fn find_or_create_tag(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
    let existing = sqlx::query_as::<_, Tag>(
        "SELECT id, name FROM tags WHERE name = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("Failed to look up tag named: {}", name))?;

    if let Some(tag) = existing {
        return Ok(tag);
    }

    let id = sqlx::query("INSERT INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to create tag named: {}", name))?
        .last_insert_rowid();

    info!("Created tag {} with ID: {}", name, id);
    Ok(Tag {
        id,
        name: name.to_string(),
    })
}

/// Links a tag to a task. Linking twice is a no-op; returns whether a row was added.
pub async fn attach_tag(conn: &mut SqliteConnection, task_id: i64, tag_id: i64) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
        .bind(task_id)
        .bind(tag_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to attach tag {} to task {}", tag_id, task_id))?;

    Ok(result.rows_affected() > 0)
}

/// Unlinks a tag from a task; returns whether a link existed.
pub async fn detach_tag(conn: &mut SqliteConnection, task_id: i64, tag_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM task_tags WHERE task_id = ? AND tag_id = ?")
        .bind(task_id)
        .bind(tag_id)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to detach tag {} from task {}", tag_id, task_id))?;

    Ok(result.rows_affected() > 0)
}

/// Task columns qualified by a table alias, e.g. `t.id AS id, ...`.
pub(crate) fn task_columns(alias: &str) -> String {
    TASK_COLUMNS
        .split(", ")
        .map(|column| format!("{}.{} AS {}", alias, column, column))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone};

    /// Helper function to set up an in-memory SQLite database for testing.
    /// A single connection keeps every query on the same in-memory database.
    pub(crate) async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory SQLite");
        init_schema(&pool).await.expect("Failed to create schema");
        pool
    }

    pub(crate) async fn seed_task(
        pool: &SqlitePool,
        user_id: i64,
        title: &str,
        due_date: Option<NaiveDate>,
    ) -> Task {
        let mut conn = pool.acquire().await.unwrap();
        insert_task(
            &mut conn,
            user_id,
            &NewTask {
                title: title.to_string(),
                is_done: false,
                due_date,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_task() {
        let pool = setup_test_db().await;
        let due = NaiveDate::from_ymd_opt(2025, 9, 30);
        let created = seed_task(&pool, 1, "Buy milk", due).await;
        assert!(created.id > 0);

        let mut conn = pool.acquire().await.unwrap();
        let found = find_task(&mut conn, created.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Buy milk");
        assert_eq!(found.user_id, 1);
        assert!(!found.is_done);
        assert_eq!(found.due_date, due);
        assert!(found.tags.is_empty());

        assert!(find_task(&mut conn, created.id + 100).await.unwrap().is_none());
    }

    // Moves both timestamps into the past so any later write is strictly newer.
    pub(crate) async fn backdate_task(pool: &SqlitePool, task_id: i64) -> DateTime<Utc> {
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 8, 0, 0).unwrap();
        sqlx::query("UPDATE tasks SET created_at = ?, updated_at = ? WHERE id = ?")
            .bind(past)
            .bind(past)
            .bind(task_id)
            .execute(pool)
            .await
            .unwrap();
        past
    }

    #[tokio::test]
    async fn test_update_task_refreshes_updated_at() {
        let pool = setup_test_db().await;
        let created = seed_task(&pool, 1, "Buy milk", None).await;
        let past = backdate_task(&pool, created.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let changed = update_task(
            &mut conn,
            created.id,
            &TaskChanges {
                title: "Buy oat milk".to_string(),
                is_done: true,
                due_date: NaiveDate::from_ymd_opt(2025, 10, 1),
            },
        )
        .await
        .unwrap();
        assert!(changed);

        let found = find_task(&mut conn, created.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Buy oat milk");
        assert!(found.is_done);
        assert!(found.updated_at > past);
        assert_eq!(found.created_at, past);
    }

    #[tokio::test]
    async fn test_single_field_writes_refresh_updated_at() {
        let pool = setup_test_db().await;
        let task = seed_task(&pool, 1, "Buy milk", None).await;

        let past = backdate_task(&pool, task.id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(update_task_title(&mut conn, task.id, "Buy bread").await.unwrap());
        let found = find_task(&mut conn, task.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Buy bread");
        assert!(found.updated_at > past);
        assert_eq!(found.created_at, past);
        drop(conn);

        let past = backdate_task(&pool, task.id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(update_task_done(&mut conn, task.id, true).await.unwrap());
        let found = find_task(&mut conn, task.id).await.unwrap().unwrap();
        assert!(found.is_done);
        assert!(found.updated_at > past);
        assert_eq!(found.created_at, past);
    }

    #[tokio::test]
    async fn test_tag_links_leave_updated_at_alone() {
        let pool = setup_test_db().await;
        let task = seed_task(&pool, 1, "Buy milk", None).await;
        let past = backdate_task(&pool, task.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let tag = find_or_create_tag(&mut conn, "home").await.unwrap();
        attach_tag(&mut conn, task.id, tag.id).await.unwrap();
        detach_tag(&mut conn, task.id, tag.id).await.unwrap();

        let found = find_task(&mut conn, task.id).await.unwrap().unwrap();
        assert_eq!(found.updated_at, past);
    }

    #[tokio::test]
    async fn test_find_or_create_tag_reuses_existing_name() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = find_or_create_tag(&mut conn, "urgent").await.unwrap();
        let second = find_or_create_tag(&mut conn, "urgent").await.unwrap();
        assert_eq!(first, second);

        let other = find_or_create_tag(&mut conn, "Urgent").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_and_detach_reports_missing_link() {
        let pool = setup_test_db().await;
        let task = seed_task(&pool, 1, "Buy milk", None).await;
        let mut conn = pool.acquire().await.unwrap();
        let tag = find_or_create_tag(&mut conn, "home").await.unwrap();

        assert!(attach_tag(&mut conn, task.id, tag.id).await.unwrap());
        assert!(!attach_tag(&mut conn, task.id, tag.id).await.unwrap());

        assert!(detach_tag(&mut conn, task.id, tag.id).await.unwrap());
        assert!(!detach_tag(&mut conn, task.id, tag.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_task_cascades_links_but_keeps_tag() {
        let pool = setup_test_db().await;
        let task = seed_task(&pool, 1, "Buy milk", None).await;
        let mut conn = pool.acquire().await.unwrap();
        let tag = find_or_create_tag(&mut conn, "home").await.unwrap();
        attach_tag(&mut conn, task.id, tag.id).await.unwrap();

        assert!(delete_task(&mut conn, task.id).await.unwrap());
        assert!(!delete_task(&mut conn, task.id).await.unwrap());

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_tags")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(links, 0);
        assert!(find_tag(&mut conn, tag.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_establish_connection_pool_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database").join("tasks.db");
        let url = format!("sqlite://{}", path.display());

        let pool = establish_connection_pool(&url, 2).await.unwrap();
        assert!(path.exists());

        // Running the schema twice must be harmless.
        init_schema(&pool).await.unwrap();
        pool.close().await;
    }
}
