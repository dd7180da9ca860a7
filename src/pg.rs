// Local MCP Gateway - Postgres Collaborator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One connection per call, opened and closed inside the call, on a
// throwaway current-thread runtime. No pooling, nothing survives the call.
// Reads run inside a READ ONLY transaction that is always rolled back.

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::providers::{DatabaseProvider, QueryResult};
use serde_json::{json, Value};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use std::future::Future;
use std::time::Duration;

pub struct Postgres<'a> {
    config: &'a Config,
    timeout: Duration,
}

impl<'a> Postgres<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, timeout: config.tool_timeout() }
    }

    /// URL for a named connection. Unknown names are a parameter error.
    pub fn connection_url(&self, conn: &str) -> GatewayResult<&'a str> {
        let entry = self
            .config
            .postgres
            .connections
            .get(conn)
            .ok_or_else(|| GatewayError::invalid_params(format!("Unknown Postgres connection: {}", conn)))?;
        entry
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GatewayError::invalid_params(format!("Missing url for Postgres connection: {}", conn)))
    }

    fn block_on<T, F>(&self, what: &str, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Internal(format!("tokio runtime: {}", e)))?;
        let timeout = self.timeout;
        runtime.block_on(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(GatewayError::collaborator(format!("{}: {}", what, e))),
                Err(_) => Err(GatewayError::Timeout { what: what.to_string(), secs: timeout.as_secs() }),
            }
        })
    }
}

impl DatabaseProvider for Postgres<'_> {
    fn query(&self, conn: &str, sql: &str, limit: usize) -> GatewayResult<QueryResult> {
        let url = self.connection_url(conn)?;
        log::info!("pg_query on {}", conn);

        let rows = self.block_on("postgres query", async move {
            let mut connection = PgConnection::connect(url).await?;
            let mut tx = connection.begin().await?;
            sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
            // Extended protocol: a prepared statement holds exactly one statement
            let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;
            tx.rollback().await?;
            connection.close().await?;
            Ok::<_, sqlx::Error>(rows)
        })?;

        Ok(rows_to_result(&rows, limit))
    }

    fn exec(&self, conn: &str, sql: &str) -> GatewayResult<u64> {
        let url = self.connection_url(conn)?;
        log::info!("pg_exec on {}", conn);

        self.block_on("postgres exec", async move {
            let mut connection = PgConnection::connect(url).await?;
            let done = sqlx::raw_sql(sql).execute(&mut connection).await?;
            connection.close().await?;
            Ok::<_, sqlx::Error>(done.rows_affected())
        })
    }
}

fn rows_to_result(rows: &[PgRow], limit: usize) -> QueryResult {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    QueryResult {
        columns,
        rows: rows.iter().take(limit).map(row_values).collect(),
        row_count: rows.len(),
    }
}

/// Decode a row positionally. Unsupported types render as `<typename>`.
fn row_values(row: &PgRow) -> Vec<Value> {
    (0..row.columns().len()).map(|i| cell(row, i)).collect()
}

fn cell(row: &PgRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(i) {
        return v.unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
        return json!(v.map(|t| t.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        return json!(v.map(|t| t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        return json!(v.map(|t| t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<String>>, _>(i) {
        return json!(v);
    }
    let type_name = row.columns().get(i).map(|c| c.type_info().name().to_string()).unwrap_or_default();
    json!(format!("<{}>", type_name))
}

/// Append a LIMIT to a bare SELECT that has none.
/// Textual check, same spirit as the write guards: any "limit" substring counts.
pub fn apply_default_limit(sql: &str, limit: usize) -> String {
    let trimmed = sql.trim();
    let is_select = trimmed
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("select"))
        .unwrap_or(false);
    if is_select && !trimmed.to_lowercase().contains("limit") {
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
        format!("{}\nLIMIT {}", body, limit)
    } else {
        sql.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
