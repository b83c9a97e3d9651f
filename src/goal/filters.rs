use serde::Serialize;

use super::types::{Goal, Scope};

/// Unit-of-measure tags that older goal forms saved into the unit field.
/// They are never clinic units.
pub const MEASURE_TAGS: &[&str] = &["currency", "qtd", "percent", "minutes"];

/// A filterable dimension of the fact tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Group,
    Unit,
    Collaborator,
    Team,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Group,
        Dimension::Unit,
        Dimension::Collaborator,
        Dimension::Team,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Group => "group",
            Dimension::Unit => "unit",
            Dimension::Collaborator => "collaborator",
            Dimension::Team => "team",
        }
    }
}

/// Query-ready filters. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    pub group: Option<String>,
    pub unit: Option<String>,
    pub collaborator: Option<String>,
    pub team: Option<String>,
}

impl FilterSet {
    pub fn get(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::Group => self.group.as_deref(),
            Dimension::Unit => self.unit.as_deref(),
            Dimension::Collaborator => self.collaborator.as_deref(),
            Dimension::Team => self.team.as_deref(),
        }
    }

    /// Constrained dimensions in a fixed order.
    pub fn constrained(&self) -> impl Iterator<Item = (Dimension, &str)> {
        Dimension::ALL
            .into_iter()
            .filter_map(move |dim| self.get(dim).map(|v| (dim, v)))
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constrained().next().is_none()
    }
}

/// A goal reduced to what the aggregator needs to pick a table and build
/// its predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedGoal {
    pub scope: Scope,
    pub filters: FilterSet,
}

/// Empty, whitespace-only and `all` mean "no filter"; anything else is an
/// exact match on the trimmed value.
pub fn normalize_value(raw: Option<&str>) -> Option<String> {
    let v = raw?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(v.to_string())
    }
}

/// Like [`normalize_value`], and measurement tags are dropped too.
pub fn normalize_unit(raw: Option<&str>) -> Option<String> {
    normalize_value(raw).filter(|v| !MEASURE_TAGS.iter().any(|t| v.eq_ignore_ascii_case(t)))
}

pub fn normalize(goal: &Goal) -> NormalizedGoal {
    NormalizedGoal {
        scope: goal.scope,
        filters: FilterSet {
            group: normalize_value(goal.filter_group.as_deref()),
            unit: normalize_unit(goal.unit.as_deref()),
            collaborator: normalize_value(goal.collaborator.as_deref()),
            team: normalize_value(goal.team.as_deref()),
        },
    }
}
