//! Reads and writes of `goals_config` through the [`QueryExecutor`].

use crate::date_util::{parse_date, to_key};
use crate::error::{Error, Result};
use crate::executor::{QueryExecutor, Row, SqlValue};

use super::types::{Goal, GoalDraft, Periodicity, Scope};

const GOAL_COLUMNS: &str = "id, name, sector, scope, periodicity, target_value, unit,
    start_date, end_date, linked_kpi_id, filter_group, clinic_unit, collaborator, team";

/// Parse a caller-supplied goal identifier.
pub fn parse_goal_id(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidParameter("goal id is required".into()));
    }
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| Error::InvalidParameter(format!("malformed goal id: {raw:?}")))
}

fn opt_string(row: &Row, column: &str) -> Option<String> {
    row.get_str(column)
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}

fn opt_date(row: &Row, column: &str) -> Result<Option<chrono::NaiveDate>> {
    match row.get_str(column).map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}

/// Decode one `goals_config` row.
pub fn goal_from_row(row: &Row) -> Result<Goal> {
    let id = row
        .get_i64("id")
        .ok_or_else(|| Error::DataSource("goal row without id".into()))?;
    Ok(Goal {
        id,
        name: row.get_str("name").unwrap_or_default().to_string(),
        sector: opt_string(row, "sector"),
        scope: Scope::parse(row.get_str("scope"))?,
        periodicity: Periodicity::parse(row.get_str("periodicity").unwrap_or_default())?,
        target_value: row.get_opt_f64("target_value"),
        measure: opt_string(row, "unit"),
        start_date: opt_date(row, "start_date")?,
        end_date: opt_date(row, "end_date")?,
        linked_metric_id: opt_string(row, "linked_kpi_id").unwrap_or_else(|| "manual".into()),
        filter_group: opt_string(row, "filter_group"),
        unit: opt_string(row, "clinic_unit"),
        collaborator: opt_string(row, "collaborator"),
        team: opt_string(row, "team"),
    })
}

pub async fn fetch_goal(exec: &dyn QueryExecutor, id: i64) -> Result<Goal> {
    let sql = format!("SELECT {GOAL_COLUMNS} FROM goals_config WHERE id = ?1");
    let rows = exec.query(&sql, &[id.into()]).await?;
    match rows.first() {
        Some(row) => goal_from_row(row),
        None => Err(Error::NotFound(format!("goal {id}"))),
    }
}

/// Every goal, newest first.
pub async fn list_goals(exec: &dyn QueryExecutor) -> Result<Vec<Goal>> {
    let sql = format!("SELECT {GOAL_COLUMNS} FROM goals_config ORDER BY created_at DESC, id DESC");
    let rows = exec.query(&sql, &[]).await?;
    rows.iter().map(goal_from_row).collect()
}

/// Validate a draft into bound parameters, in `GOAL_COLUMNS` order minus `id`.
fn draft_params(draft: &GoalDraft) -> Result<Vec<SqlValue>> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidParameter("goal name is required".into()));
    }
    let scope = Scope::parse(draft.scope.as_deref())?;
    let periodicity = Periodicity::parse(&draft.periodicity)?;
    let start = draft.start_date.as_deref().map(parse_date).transpose()?;
    let end = draft.end_date.as_deref().map(parse_date).transpose()?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(Error::InvalidParameter(format!(
                "start date {s} is after end date {e}"
            )));
        }
    }
    if periodicity == Periodicity::Total && (start.is_none() || end.is_none()) {
        return Err(Error::InvalidParameter(
            "total goals need a start and end date".into(),
        ));
    }
    let metric = draft
        .linked_metric_id
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("manual");

    Ok(vec![
        name.into(),
        draft.sector.clone().into(),
        scope.as_str().into(),
        periodicity.as_str().into(),
        draft.target_value.into(),
        draft.measure.clone().into(),
        start.map(to_key).into(),
        end.map(to_key).into(),
        metric.into(),
        draft.filter_group.clone().into(),
        draft.unit.clone().into(),
        draft.collaborator.clone().into(),
        draft.team.clone().into(),
    ])
}

/// Insert or update a goal, returning its id.
pub async fn save_goal(exec: &dyn QueryExecutor, draft: &GoalDraft) -> Result<i64> {
    let mut params = draft_params(draft)?;
    match draft.id {
        Some(id) => {
            params.push(id.into());
            let n = exec
                .execute(
                    "UPDATE goals_config SET
                        name = ?1, sector = ?2, scope = ?3, periodicity = ?4,
                        target_value = ?5, unit = ?6, start_date = ?7, end_date = ?8,
                        linked_kpi_id = ?9, filter_group = ?10, clinic_unit = ?11,
                        collaborator = ?12, team = ?13, updated_at = datetime('now')
                     WHERE id = ?14",
                    &params,
                )
                .await?;
            if n == 0 {
                return Err(Error::NotFound(format!("goal {id}")));
            }
            Ok(id)
        }
        None => {
            exec.insert(
                "INSERT INTO goals_config (
                    name, sector, scope, periodicity, target_value, unit, start_date,
                    end_date, linked_kpi_id, filter_group, clinic_unit, collaborator, team
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                &params,
            )
            .await
        }
    }
}

pub async fn delete_goal(exec: &dyn QueryExecutor, id: i64) -> Result<()> {
    let n = exec
        .execute("DELETE FROM goals_config WHERE id = ?1", &[id.into()])
        .await?;
    if n == 0 {
        return Err(Error::NotFound(format!("goal {id}")));
    }
    Ok(())
}
