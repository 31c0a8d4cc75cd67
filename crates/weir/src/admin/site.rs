//! Model-view registry.
//!
//! Tables are registered once at startup and exposed through generic
//! list/get/delete operations with rows decoded to JSON dynamically. Table
//! and key names only ever come from the registry, never from the request,
//! so the interpolated SQL stays injection-free.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo};
use std::sync::Arc;
use tracing::instrument;

/// A registered table.
#[derive(Debug, Clone, Serialize)]
pub struct ModelView {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    /// Columns omitted from responses (password hashes, raw tokens).
    #[serde(skip)]
    pub hidden_columns: &'static [&'static str],
}

impl ModelView {
    pub fn new(name: &'static str, table: &'static str, primary_key: &'static str) -> Self {
        Self {
            name,
            table,
            primary_key,
            hidden_columns: &[],
        }
    }

    pub fn hide(mut self, columns: &'static [&'static str]) -> Self {
        self.hidden_columns = columns;
        self
    }
}

/// One page of rows from a view.
#[derive(Debug, Serialize)]
pub struct RowPage {
    pub rows: Vec<Value>,
    pub total: i64,
}

/// The admin surface: a pool plus the registered views.
#[derive(Clone)]
pub struct AdminSite {
    pool: SqlitePool,
    views: Arc<Vec<ModelView>>,
}

impl AdminSite {
    pub fn new(pool: SqlitePool, views: Vec<ModelView>) -> Self {
        Self {
            pool,
            views: Arc::new(views),
        }
    }

    pub fn views(&self) -> &[ModelView] {
        &self.views
    }

    pub fn view(&self, name: &str) -> Option<&ModelView> {
        self.views.iter().find(|v| v.name == name)
    }

    /// List one page of rows with the overall count.
    #[instrument(skip(self, view), fields(table = view.table))]
    pub async fn list_rows(&self, view: &ModelView, limit: i64, offset: i64) -> Result<RowPage> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);

        let rows = sqlx::query(&format!(
            "SELECT * FROM {} ORDER BY {} LIMIT ? OFFSET ?",
            view.table, view.primary_key
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list rows of {}", view.table))?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", view.table))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows of {}", view.table))?;

        Ok(RowPage {
            rows: rows.iter().map(|row| row_to_json(row, view)).collect(),
            total,
        })
    }

    /// Fetch a single row by primary key.
    #[instrument(skip(self, view), fields(table = view.table))]
    pub async fn get_row(&self, view: &ModelView, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query(&format!(
            "SELECT * FROM {} WHERE {} = ?",
            view.table, view.primary_key
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch row of {}", view.table))?;

        Ok(row.map(|row| row_to_json(&row, view)))
    }

    /// Delete a row by primary key. Returns whether it existed.
    #[instrument(skip(self, view), fields(table = view.table))]
    pub async fn delete_row(&self, view: &ModelView, key: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ?",
            view.table, view.primary_key
        ))
        .bind(key)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to delete row of {}", view.table))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Decode a row into JSON by column type, masking hidden columns.
fn row_to_json(row: &SqliteRow, view: &ModelView) -> Value {
    let mut map = Map::new();

    for column in row.columns() {
        let name = column.name();
        if view.hidden_columns.contains(&name) {
            map.insert(name.to_string(), Value::String("********".to_string()));
            continue;
        }

        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "INTEGER" | "BOOLEAN" => row
                .try_get::<Option<i64>, _>(idx)
                .ok()
                .flatten()
                .map(Value::from),
            "REAL" => row
                .try_get::<Option<f64>, _>(idx)
                .ok()
                .flatten()
                .map(Value::from),
            "BLOB" => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map(|bytes| Value::String(format!("<{} bytes>", bytes.len()))),
            _ => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map(Value::String),
        };

        map.insert(name.to_string(), value.unwrap_or(Value::Null));
    }

    Value::Object(map)
}

/// The gateway's own models, registered for the admin surface.
pub fn default_views() -> Vec<ModelView> {
    vec![
        ModelView::new("users", "users", "id").hide(&["hashed_password"]),
        ModelView::new("oauth-accounts", "oauth_accounts", "id")
            .hide(&["access_token", "refresh_token"]),
        ModelView::new("access-tokens", "access_tokens", "token").hide(&["token"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_lookup() {
        let site_views = default_views();
        assert!(site_views.iter().any(|v| v.name == "users"));

        let users = site_views.iter().find(|v| v.name == "users").unwrap();
        assert_eq!(users.primary_key, "id");
        assert!(users.hidden_columns.contains(&"hashed_password"));
    }
}
