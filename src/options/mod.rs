//! Distinct dimension values for the goal form's filter dropdowns.

use std::collections::BTreeSet;

use log::warn;

use crate::error::Result;
use crate::executor::{QueryExecutor, SqlValue};
use crate::goal::{Dimension, Scope};
use crate::metrics::{FactTable, CARD_UNIT_PATTERNS};

/// Trimmed, non-empty, de-duplicated values of `dim` across the scope's
/// fact tables, sorted. Tables without the column, or not created yet,
/// contribute nothing.
pub async fn distinct_values(
    exec: &dyn QueryExecutor,
    scope: Scope,
    dim: Dimension,
) -> Result<Vec<String>> {
    let mut values = BTreeSet::new();

    for table in FactTable::for_scope(scope) {
        let Some(column) = table.column_for(dim) else {
            continue;
        };
        let mut sql = format!(
            "SELECT DISTINCT TRIM({column}) AS value FROM {name}
             WHERE {column} IS NOT NULL AND TRIM({column}) <> ''",
            name = table.name()
        );
        let mut params: Vec<SqlValue> = Vec::new();
        if *table == FactTable::Billing {
            let unit = table.unit_column();
            for (i, pattern) in CARD_UNIT_PATTERNS.iter().enumerate() {
                sql.push_str(&format!(
                    " AND ({unit} IS NULL OR {unit} NOT LIKE ?{})",
                    i + 1
                ));
                params.push((*pattern).into());
            }
        }

        match exec.query(&sql, &params).await {
            Ok(rows) => values.extend(
                rows.iter()
                    .filter_map(|r| r.get_str("value"))
                    .map(str::to_string),
            ),
            Err(e) if e.is_missing_table() => warn!("{e}; no {} options from it", dim.as_str()),
            Err(e) => return Err(e),
        }
    }

    Ok(values.into_iter().collect())
}

pub async fn distinct_groups(exec: &dyn QueryExecutor, scope: Scope) -> Result<Vec<String>> {
    distinct_values(exec, scope, Dimension::Group).await
}

pub async fn distinct_units(exec: &dyn QueryExecutor, scope: Scope) -> Result<Vec<String>> {
    distinct_values(exec, scope, Dimension::Unit).await
}

pub async fn distinct_collaborators(
    exec: &dyn QueryExecutor,
    scope: Scope,
) -> Result<Vec<String>> {
    distinct_values(exec, scope, Dimension::Collaborator).await
}

pub async fn distinct_teams(exec: &dyn QueryExecutor, scope: Scope) -> Result<Vec<String>> {
    distinct_values(exec, scope, Dimension::Team).await
}
