use serde::Serialize;

use crate::executor::SqlValue;
use crate::query::period::DateWindow;

/// Ordering of grouped rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
enum Condition {
    /// `col IS NULL OR col NOT LIKE every pattern`
    NotLikeAny(&'static str, Vec<String>),
    /// `LOWER(TRIM(col)) IN (...)`
    LowerIn(&'static str, Vec<String>),
    Equals(&'static str, SqlValue),
    /// Trimmed, case-insensitive text match.
    TextMatch(&'static str, String),
}

/// Builder for `SUM`/`COUNT` aggregates over one fact table.
///
/// Column names and expressions come from the metric catalogue and are
/// `'static`; every caller-controlled value goes into the parameter list.
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    table: &'static str,
    date_expr: &'static str,
    value_expr: &'static str,
    window: Option<DateWindow>,
    conditions: Vec<Condition>,
    group_expr: Option<String>,
    order: SortOrder,
}

impl AggregateQuery {
    /// `date_expr` must evaluate to an ISO `YYYY-MM-DD` string;
    /// `value_expr` is summed into `total`.
    pub fn new(table: &'static str, date_expr: &'static str, value_expr: &'static str) -> Self {
        Self {
            table,
            date_expr,
            value_expr,
            window: None,
            conditions: Vec::new(),
            group_expr: None,
            order: SortOrder::default(),
        }
    }

    pub fn window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn not_like_any(mut self, column: &'static str, patterns: &[&str]) -> Self {
        self.conditions.push(Condition::NotLikeAny(
            column,
            patterns.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }

    pub fn lower_in(mut self, column: &'static str, values: &[&str]) -> Self {
        self.conditions.push(Condition::LowerIn(
            column,
            values.iter().map(|v| v.to_lowercase()).collect(),
        ));
        self
    }

    pub fn equals(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(Condition::Equals(column, value.into()));
        self
    }

    pub fn text_match(mut self, column: &'static str, value: &str) -> Self {
        self.conditions
            .push(Condition::TextMatch(column, value.to_string()));
        self
    }

    /// Group by day (the date expression itself).
    pub fn by_day(mut self) -> Self {
        self.group_expr = Some(self.date_expr.to_string());
        self
    }

    /// Group by `YYYY-MM`.
    pub fn by_month(mut self) -> Self {
        self.group_expr = Some(format!("substr({}, 1, 7)", self.date_expr));
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Render the statement and its positional parameters.
    ///
    /// Grouped queries select `period, total, cnt`; ungrouped ones select
    /// `total, cnt`.
    pub fn build_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params: Vec<SqlValue> = Vec::new();
        let mut wheres = Vec::new();
        let mut param_idx = 1;

        if let Some(ref w) = self.window {
            wheres.push(format!(
                "{d} >= ?{a} AND {d} <= ?{b}",
                d = self.date_expr,
                a = param_idx,
                b = param_idx + 1
            ));
            params.push(w.start_key().into());
            params.push(w.end_key().into());
            param_idx += 2;
        }

        for cond in &self.conditions {
            match cond {
                Condition::NotLikeAny(col, patterns) => {
                    let mut parts = Vec::new();
                    for p in patterns {
                        parts.push(format!("{col} NOT LIKE ?{param_idx}"));
                        params.push(p.clone().into());
                        param_idx += 1;
                    }
                    if parts.is_empty() {
                        continue;
                    }
                    wheres.push(format!("({col} IS NULL OR ({}))", parts.join(" AND ")));
                }
                Condition::LowerIn(col, values) => {
                    if values.is_empty() {
                        wheres.push("0".to_string());
                        continue;
                    }
                    let mut slots = Vec::new();
                    for v in values {
                        slots.push(format!("?{param_idx}"));
                        params.push(v.clone().into());
                        param_idx += 1;
                    }
                    wheres.push(format!("LOWER(TRIM({col})) IN ({})", slots.join(", ")));
                }
                Condition::Equals(col, value) => {
                    wheres.push(format!("{col} = ?{param_idx}"));
                    params.push(value.clone());
                    param_idx += 1;
                }
                Condition::TextMatch(col, value) => {
                    wheres.push(format!("UPPER(TRIM({col})) = UPPER(TRIM(?{param_idx}))"));
                    params.push(value.clone().into());
                    param_idx += 1;
                }
            }
        }

        let aggregates = format!(
            "COALESCE(SUM({}), 0) AS total, COUNT(*) AS cnt",
            self.value_expr
        );
        let mut sql = match self.group_expr {
            Some(ref g) => format!("SELECT {g} AS period, {aggregates} FROM {}", self.table),
            None => format!("SELECT {aggregates} FROM {}", self.table),
        };
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }
        if self.group_expr.is_some() {
            sql.push_str(&format!(" GROUP BY period ORDER BY period {}", self.order.sql()));
        }

        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_sql_default() {
        let (sql, params) = AggregateQuery::new("facts", "d", "v").build_sql();
        assert_eq!(sql, "SELECT COALESCE(SUM(v), 0) AS total, COUNT(*) AS cnt FROM facts");
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_sql_with_conditions() {
        let (sql, params) = AggregateQuery::new("facts", "d", "v")
            .window(window())
            .not_like_any("unit", &["%CARD%", "%RESOLVE%"])
            .lower_in("status", &["Ganho"])
            .equals("kind", "Aprovado")
            .text_match("team", " crc ")
            .build_sql();

        assert!(sql.contains("d >= ?1 AND d <= ?2"));
        assert!(sql.contains("(unit IS NULL OR (unit NOT LIKE ?3 AND unit NOT LIKE ?4))"));
        assert!(sql.contains("LOWER(TRIM(status)) IN (?5)"));
        assert!(sql.contains("kind = ?6"));
        assert!(sql.contains("UPPER(TRIM(team)) = UPPER(TRIM(?7))"));
        assert_eq!(params.len(), 7);
        assert_eq!(params[0], SqlValue::from("2025-01-01"));
        assert_eq!(params[1], SqlValue::from("2025-01-31"));
        assert_eq!(params[4], SqlValue::from("ganho"));
        assert_eq!(params[6], SqlValue::from(" crc "));
    }

    #[test]
    fn test_filter_values_never_reach_sql_text() {
        let hostile = "x' OR '1'='1";
        let (sql, params) = AggregateQuery::new("facts", "d", "v")
            .text_match("team", hostile)
            .build_sql();
        assert!(!sql.contains(hostile));
        assert!(!sql.contains('\''));
        assert_eq!(params, vec![SqlValue::from(hostile)]);
    }

    #[test]
    fn test_grouping_and_order() {
        let (sql, _) = AggregateQuery::new("facts", "d", "v")
            .by_month()
            .order(SortOrder::Descending)
            .build_sql();
        assert!(sql.starts_with("SELECT substr(d, 1, 7) AS period,"));
        assert!(sql.ends_with("GROUP BY period ORDER BY period DESC"));

        let (sql, _) = AggregateQuery::new("facts", "d", "v").by_day().build_sql();
        assert!(sql.starts_with("SELECT d AS period,"));
        assert!(sql.ends_with("ORDER BY period ASC"));
    }
}
