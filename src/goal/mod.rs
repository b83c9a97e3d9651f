//! Goal configuration: the persisted record, its filters and its storage.

pub mod filters;
pub mod store;
pub mod types;

pub use filters::{normalize, Dimension, FilterSet, NormalizedGoal};
pub use types::{Goal, GoalDraft, Periodicity, Scope};
