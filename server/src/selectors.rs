// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Read-only queries. Everything here is scoped to a single owner.
use std::collections::HashMap;

use anyhow::{Context, Result};
use common::{Tag, Task, TaskStats};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::database;
use crate::filters::TaskFilter;

#[derive(sqlx::FromRow)]
struct TaskTagRow {
    task_id: i64,
    id: i64,
    name: String,
}

/// Tasks owned by `user_id`, newest first unless `filter` says otherwise,
/// with their tags loaded.
pub async fn tasks_for_user(
    pool: &SqlitePool,
    user_id: i64,
    filter: &TaskFilter,
) -> Result<Vec<Task>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM tasks t WHERE t.user_id = ",
        database::task_columns("t")
    ));
    query.push_bind(user_id);

    if let Some(is_done) = filter.is_done {
        query.push(" AND t.is_done = ").push_bind(is_done);
    }
    if let Some(tag_id) = filter.tag_id {
        query
            .push(" AND t.id IN (SELECT task_id FROM task_tags WHERE tag_id = ")
            .push_bind(tag_id)
            .push(")");
    }
    if let Some(due_from) = filter.due_from {
        query.push(" AND t.due_date >= ").push_bind(due_from);
    }
    if let Some(due_to) = filter.due_to {
        query.push(" AND t.due_date <= ").push_bind(due_to);
    }
    query.push(" ORDER BY ").push(filter.order_by_sql());

    let mut conn = pool.acquire().await?;
    let mut tasks = query
        .build_query_as::<Task>()
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("Failed to list tasks for user ID: {}", user_id))?;

    // SQLite only folds ASCII case, so title search runs on the loaded rows.
    if !filter.search_terms.is_empty() {
        tasks.retain(|task| filter.matches_search(&task.title));
    }

    load_tags(&mut conn, &mut tasks).await?;
    debug!("Selected {} tasks for user ID: {}", tasks.len(), user_id);
    Ok(tasks)
}

/// A single task, only if `user_id` owns it.
pub async fn task_for_user(pool: &SqlitePool, user_id: i64, task_id: i64) -> Result<Option<Task>> {
    let mut conn = pool.acquire().await?;
    let task = match database::find_task(&mut conn, task_id).await? {
        Some(task) if task.user_id == user_id => task,
        _ => return Ok(None),
    };

    let mut tasks = vec![task];
    load_tags(&mut conn, &mut tasks).await?;
    Ok(tasks.pop())
}

/// Totals over every task `user_id` owns. List filters never apply here.
pub async fn task_stats(pool: &SqlitePool, user_id: i64) -> Result<TaskStats> {
    let (count, done_count): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_done THEN 1 ELSE 0 END), 0) FROM tasks WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to compute stats for user ID: {}", user_id))?;

    Ok(compute_stats(count, done_count))
}

/// `percent` is rounded to two decimals and is 0.0 for an empty set.
pub fn compute_stats(count: i64, done_count: i64) -> TaskStats {
    let percent = if count == 0 {
        0.0
    } else {
        let raw = done_count as f64 / count as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    };

    TaskStats {
        count,
        done_count,
        percent,
    }
}

pub async fn get_task_tags(pool: &SqlitePool, task_id: i64) -> Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT tg.id AS id, tg.name AS name
        FROM tags tg
        INNER JOIN task_tags tt ON tg.id = tt.tag_id
        WHERE tt.task_id = ?
        ORDER BY tg.id
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to fetch tags for task ID: {}", task_id))
}

// One query for the tags of every task in the batch.
async fn load_tags(conn: &mut SqliteConnection, tasks: &mut [Task]) -> Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT tt.task_id AS task_id, tg.id AS id, tg.name AS name \
         FROM task_tags tt INNER JOIN tags tg ON tg.id = tt.tag_id \
         WHERE tt.task_id IN (",
    );
    let mut ids = query.separated(", ");
    for task in tasks.iter() {
        ids.push_bind(task.id);
    }
    ids.push_unseparated(") ORDER BY tg.id");

    let rows = query
        .build_query_as::<TaskTagRow>()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load task tags")?;

    let mut by_task: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in rows {
        by_task.entry(row.task_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
        });
    }
    for task in tasks.iter_mut() {
        task.tags = by_task.remove(&task.id).unwrap_or_default();
    }
    Ok(())
}
