use serde::Serialize;

use crate::goal::{Periodicity, Scope};

/// Percent of `target` reached by `current`, rounded to the nearest integer.
///
/// A missing or non-positive target yields 0. There is no upper clamp.
pub fn percentage(current: f64, target: Option<f64>) -> u64 {
    match target {
        Some(t) if t > 0.0 => {
            let pct = (current / t * 100.0).round();
            if pct.is_finite() && pct > 0.0 {
                pct as u64
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Round to cents for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Success,
    Warning,
    Danger,
}

impl ProgressStatus {
    pub fn from_percentage(pct: u64) -> Self {
        match pct {
            100.. => ProgressStatus::Success,
            70..=99 => ProgressStatus::Warning,
            _ => ProgressStatus::Danger,
        }
    }
}

/// Result of [`crate::KpiEngine::compute_current`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentProgress {
    pub current_value: f64,
    pub percentage: u64,
}

/// One dashboard card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub id: i64,
    pub name: String,
    pub target: Option<f64>,
    pub current: f64,
    pub percentage: u64,
    pub unit: Option<String>,
    pub periodicity: Periodicity,
    pub scope: Scope,
    pub status: ProgressStatus,
}
