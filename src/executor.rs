//! The boundary between the engine and the relational store.
//!
//! Every statement the engine issues goes through [`QueryExecutor`] as SQL
//! text plus positional parameters (`?1`, `?2`, ...). Filter values are only
//! ever passed as [`SqlValue`] parameters.

use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::error::Result;

/// A bound parameter or a column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Real(f) => Some(*f),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(f) => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn from_value_ref(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Real(f)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// One result row: column names and values in select-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: &str, value: impl Into<SqlValue>) {
        self.columns.push((column.to_string(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Numeric column, with NULL or a missing column read as zero.
    pub fn get_f64(&self, column: &str) -> f64 {
        self.get(column).and_then(SqlValue::as_f64).unwrap_or(0.0)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    pub fn get_opt_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(SqlValue::as_f64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Executes parameterized statements against the relational store.
///
/// Implementations are shared across concurrent requests and must be
/// reentrant; pooling and locking are their own concern.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a read statement and return every row.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Run a write statement and return the number of rows affected.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run an insert and return the new row id.
    async fn insert(&self, sql: &str, params: &[SqlValue]) -> Result<i64>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Wraps another executor and records every statement it sees.
    pub(crate) struct RecordingExecutor {
        inner: Arc<dyn QueryExecutor>,
        statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
    }

    impl RecordingExecutor {
        pub(crate) fn new(inner: Arc<dyn QueryExecutor>) -> Self {
            Self {
                inner,
                statements: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
            self.statements.lock().unwrap().clone()
        }

        pub(crate) fn count_touching(&self, table: &str) -> usize {
            self.statements
                .lock()
                .unwrap()
                .iter()
                .filter(|(sql, _)| sql.contains(table))
                .count()
        }

        fn record(&self, sql: &str, params: &[SqlValue]) {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
        }
    }

    #[async_trait]
    impl QueryExecutor for RecordingExecutor {
        async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
            self.record(sql, params);
            self.inner.query(sql, params).await
        }

        async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
            self.record(sql, params);
            self.inner.execute(sql, params).await
        }

        async fn insert(&self, sql: &str, params: &[SqlValue]) -> Result<i64> {
            self.record(sql, params);
            self.inner.insert(sql, params).await
        }
    }
}
