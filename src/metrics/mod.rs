//! Scope-specific aggregate queries over the fact tables.

pub mod types;

pub use types::*;

use log::{debug, warn};
use serde::Serialize;

use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::goal::{FilterSet, Scope};
use crate::query::{AggregateQuery, Bucket, DateWindow, SortOrder};

/// Units of the benefits-card operation. Their billing lines are card
/// revenue, not clinic revenue.
pub const CARD_UNIT_PATTERNS: &[&str] = &["%RESOLVECARD%", "%GESTÃO DE BENEFICOS%"];

/// Proposal statuses that count as closed.
pub const PROPOSAL_DONE_STATUSES: &[&str] = &["executada", "aprovada pelo cliente", "ganho"];

pub const CONTRACT_APPROVED: &str = "Aprovado";

/// Build the aggregate for `metric` over `window`, restricted to completed
/// records and to every filter the metric's table can express.
pub fn build_query(metric: Metric, window: DateWindow, filters: &FilterSet) -> AggregateQuery {
    let table = metric.table();
    let mut q = AggregateQuery::new(table.name(), table.date_expr(), metric.value_expr())
        .window(window);

    q = match table {
        FactTable::Billing => q.not_like_any(table.unit_column(), CARD_UNIT_PATTERNS),
        FactTable::Proposals => q.lower_in("status", PROPOSAL_DONE_STATUSES),
        FactTable::Contracts => q.equals("status_contract", CONTRACT_APPROVED),
    };

    for (dim, value) in filters.constrained() {
        match table.column_for(dim) {
            Some(column) => q = q.text_match(column, value),
            None => debug!(
                "ignoring {} filter: {} has no such column",
                dim.as_str(),
                table.name()
            ),
        }
    }
    q
}

/// Aggregate `metric_id` over `window` into a single value.
///
/// `manual` returns 0 without issuing a query. A fact table that does not
/// exist yet reads as 0.
pub async fn current_value(
    exec: &dyn QueryExecutor,
    metric_id: &str,
    window: DateWindow,
    scope: Scope,
    filters: &FilterSet,
) -> Result<f64> {
    let Some(metric) = Metric::resolve(metric_id, scope)? else {
        return Ok(0.0);
    };
    let (sql, params) = build_query(metric, window, filters).build_sql();
    debug!("current {} over {window}", metric.id());

    let rows = match exec.query(&sql, &params).await {
        Ok(rows) => rows,
        Err(e) if e.is_missing_table() => {
            warn!("{e}; {} reads as 0", metric.id());
            return Ok(0.0);
        }
        Err(e) => return Err(e),
    };
    let (total, count) = rows
        .first()
        .map(|r| (r.get_f64("total"), r.get_i64("cnt").unwrap_or(0).max(0) as u64))
        .unwrap_or((0.0, 0));
    Ok(metric_value(metric.value_kind(), total, count))
}

/// Aggregate `metric_id` over `window`, one row per bucket, in `order`.
///
/// Buckets with no matching records are absent. `manual` and missing
/// tables yield an empty series.
pub async fn history(
    exec: &dyn QueryExecutor,
    metric_id: &str,
    window: DateWindow,
    scope: Scope,
    filters: &FilterSet,
    bucket: Bucket,
    order: SortOrder,
) -> Result<Vec<AggregateRow>> {
    let Some(metric) = Metric::resolve(metric_id, scope)? else {
        return Ok(Vec::new());
    };
    let q = build_query(metric, window, filters).order(order);
    let q = match bucket {
        Bucket::Day => q.by_day(),
        Bucket::Month => q.by_month(),
    };
    let (sql, params) = q.build_sql();
    debug!("history {} by {} over {window}", metric.id(), bucket.as_str());

    let rows = match exec.query(&sql, &params).await {
        Ok(rows) => rows,
        Err(e) if e.is_missing_table() => {
            warn!("{e}; {} history is empty", metric.id());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    Ok(rows
        .iter()
        .map(|r| {
            AggregateRow::new(
                r.get_str("period").unwrap_or_default().to_string(),
                r.get_f64("total"),
                r.get_i64("cnt").unwrap_or(0).max(0) as u64,
                metric.value_kind(),
            )
        })
        .collect())
}

/// Row count and latest record date of one fact table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStatus {
    pub table: &'static str,
    /// False when the ingestion workers have not created the table yet.
    pub present: bool,
    pub rows: u64,
    pub latest: Option<String>,
}

pub async fn table_status(exec: &dyn QueryExecutor, table: FactTable) -> Result<TableStatus> {
    let sql = format!(
        "SELECT COUNT(*) AS cnt, MAX({}) AS latest FROM {}",
        table.date_expr(),
        table.name()
    );
    match exec.query(&sql, &[]).await {
        Ok(rows) => Ok(TableStatus {
            table: table.name(),
            present: true,
            rows: rows
                .first()
                .and_then(|r| r.get_i64("cnt"))
                .unwrap_or(0)
                .max(0) as u64,
            latest: rows
                .first()
                .and_then(|r| r.get_str("latest"))
                .map(str::to_string),
        }),
        Err(e) if e.is_missing_table() => Ok(TableStatus {
            table: table.name(),
            present: false,
            rows: 0,
            latest: None,
        }),
        Err(e) => Err(e),
    }
}
