use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which fact-table family a goal aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// Billing / appointment summaries.
    Clinic,
    /// Proposal and contract records.
    Card,
}

impl Scope {
    /// Parse a stored scope. Empty or missing means `CLINIC`, the default
    /// every goal had before scopes existed.
    pub fn parse(s: Option<&str>) -> Result<Self> {
        match s.map(str::trim).unwrap_or("") {
            "" => Ok(Scope::Clinic),
            v if v.eq_ignore_ascii_case("clinic") => Ok(Scope::Clinic),
            v if v.eq_ignore_ascii_case("card") => Ok(Scope::Card),
            other => Err(Error::Unconfigured(format!("unknown scope: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Clinic => "CLINIC",
            Scope::Card => "CARD",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// How a goal's evaluation window is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Daily,
    Weekly,
    Monthly,
    /// The goal's own configured range.
    Total,
}

impl Periodicity {
    /// Parse a stored periodicity. Portuguese labels from older rows
    /// (`diaria`, `semanal`, `mensal`) are accepted.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "diaria" | "diária" => Ok(Periodicity::Daily),
            "weekly" | "semanal" => Ok(Periodicity::Weekly),
            "monthly" | "mensal" => Ok(Periodicity::Monthly),
            "total" => Ok(Periodicity::Total),
            other => Err(Error::Unconfigured(format!("unknown periodicity: {other:?}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Daily => "daily",
            Periodicity::Weekly => "weekly",
            Periodicity::Monthly => "monthly",
            Periodicity::Total => "total",
        }
    }
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A persisted goal configuration.
///
/// The filter fields hold the raw stored values; use
/// [`crate::goal::normalize`] to turn them into a [`crate::goal::FilterSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub id: i64,
    pub name: String,
    pub sector: Option<String>,
    pub scope: Scope,
    pub periodicity: Periodicity,
    pub target_value: Option<f64>,
    /// Unit of measure used for display (`currency`, `qtd`, ...).
    pub measure: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Metric to aggregate, or `manual`.
    pub linked_metric_id: String,
    pub filter_group: Option<String>,
    /// Clinic unit filter.
    pub unit: Option<String>,
    pub collaborator: Option<String>,
    pub team: Option<String>,
}

impl Goal {
    /// Whether today's date falls inside the goal's configured range.
    /// Goals without a complete range are never active.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= day && day <= end,
            _ => false,
        }
    }
}

/// Input for creating or updating a goal. `id = None` inserts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalDraft {
    pub id: Option<i64>,
    pub name: String,
    pub sector: Option<String>,
    pub scope: Option<String>,
    pub periodicity: String,
    pub target_value: Option<f64>,
    pub measure: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub linked_metric_id: Option<String>,
    pub filter_group: Option<String>,
    pub unit: Option<String>,
    pub collaborator: Option<String>,
    pub team: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse(None).unwrap(), Scope::Clinic);
        assert_eq!(Scope::parse(Some("")).unwrap(), Scope::Clinic);
        assert_eq!(Scope::parse(Some("CARD")).unwrap(), Scope::Card);
        assert_eq!(Scope::parse(Some("clinic")).unwrap(), Scope::Clinic);
        assert!(matches!(
            Scope::parse(Some("HOSPITAL")),
            Err(Error::Unconfigured(_))
        ));
    }

    #[test]
    fn test_periodicity_parse() {
        assert_eq!(Periodicity::parse("daily").unwrap(), Periodicity::Daily);
        assert_eq!(Periodicity::parse("Mensal").unwrap(), Periodicity::Monthly);
        assert_eq!(Periodicity::parse("semanal").unwrap(), Periodicity::Weekly);
        assert_eq!(Periodicity::parse(" total ").unwrap(), Periodicity::Total);
        assert!(Periodicity::parse("hourly").is_err());
    }

    #[test]
    fn test_scope_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Scope::Card).unwrap(), "\"CARD\"");
        assert_eq!(
            serde_json::to_string(&Periodicity::Monthly).unwrap(),
            "\"monthly\""
        );
    }
}
