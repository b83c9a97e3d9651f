pub mod cache;
pub mod clock;
pub mod config;
pub mod date_util;
pub mod error;
pub mod executor;
pub mod goal;
pub mod metrics;
pub mod options;
pub mod progress;
pub mod query;
pub mod storage;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

pub use cache::ResponseCache;
pub use clock::{Clock, FixedOffsetClock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use executor::{QueryExecutor, Row, SqlValue};
pub use goal::{Dimension, FilterSet, Goal, GoalDraft, Periodicity, Scope};
pub use metrics::{AggregateRow, FactTable, Metric, TableStatus};
pub use progress::{CurrentProgress, GoalProgress, ProgressStatus};
pub use query::{Bucket, DateWindow, SortOrder};
pub use storage::Database;

use cache::cache_key;
use date_util::to_key;
use goal::store;
use query::{history_bucket, resolve_window, WindowMode};

/// Cache namespace of everything derived from goal configuration. Goal
/// writes invalidate every key under it.
pub const GOALS_NAMESPACE: &str = "goals";
const GOALS_PREFIX: &str = "goals:";
const OPTIONS_NAMESPACE: &str = "options";
const STATUS_NAMESPACE: &str = "status";

/// Snapshot of the fact tables and of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub today: NaiveDate,
    pub tables: Vec<TableStatus>,
    pub cached_entries: usize,
    pub in_flight: usize,
}

/// Main entry point: goal progress, history and lookups, served through a
/// shared coalescing cache.
pub struct KpiEngine {
    exec: Arc<dyn QueryExecutor>,
    clock: Arc<dyn Clock>,
    cache: ResponseCache,
    config: EngineConfig,
}

impl KpiEngine {
    pub fn new(exec: Arc<dyn QueryExecutor>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let cache = ResponseCache::new(clock.clone());
        Self {
            exec,
            clock,
            cache,
            config,
        }
    }

    /// Engine over `db`, with cache lifetimes read from its `app_config`.
    pub async fn from_database(db: Database, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = EngineConfig::load(&db).await?;
        debug!("engine config: {config:?}");
        Ok(Self::new(Arc::new(db), clock, config))
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.exec.as_ref()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ── Cache ──────────────────────────────────────────────────────

    /// Serve `compute` through the cache under `namespace` plus the
    /// normalized request signature (path and query string).
    pub async fn cached_read<T, F, Fut>(
        &self,
        namespace: &str,
        signature: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = cache::cache_key_from_request(namespace, signature);
        self.cache.with_cache(&key, ttl, compute).await
    }

    /// Drop cached reads; see [`ResponseCache::invalidate`].
    pub fn invalidate(&self, prefix: Option<&str>) -> usize {
        self.cache.invalidate(prefix)
    }

    // ── Goal progress ──────────────────────────────────────────────

    /// Current value and percentage of a goal.
    pub async fn compute_current(&self, goal_id: &str) -> Result<CurrentProgress> {
        let id = store::parse_goal_id(goal_id)?;
        let today = self.today();
        let key = cache_key(
            GOALS_NAMESPACE,
            "current",
            &[("id", id.to_string().as_str()), ("day", to_key(today).as_str())],
        );
        let exec = self.exec.clone();
        self.cache
            .with_cache(&key, self.config.current_ttl, move || async move {
                let goal = store::fetch_goal(exec.as_ref(), id).await?;
                let current = goal_current_value(exec.as_ref(), &goal, today).await?;
                Ok(CurrentProgress {
                    current_value: progress::round2(current),
                    percentage: progress::percentage(current, goal.target_value),
                })
            })
            .await
    }

    /// History series of a goal, ascending by period.
    pub async fn compute_history(&self, goal_id: &str) -> Result<Vec<AggregateRow>> {
        let id = store::parse_goal_id(goal_id)?;
        let today = self.today();
        let key = cache_key(
            GOALS_NAMESPACE,
            "history",
            &[("id", id.to_string().as_str()), ("day", to_key(today).as_str())],
        );
        let exec = self.exec.clone();
        self.cache
            .with_cache(&key, self.config.history_ttl, move || async move {
                let goal = store::fetch_goal(exec.as_ref(), id).await?;
                goal_history(exec.as_ref(), &goal, today).await
            })
            .await
    }

    /// Progress of every goal whose configured range contains today.
    pub async fn dashboard(&self) -> Result<Vec<GoalProgress>> {
        let today = self.today();
        let key = cache_key(GOALS_NAMESPACE, "dashboard", &[("day", to_key(today).as_str())]);
        let exec = self.exec.clone();
        self.cache
            .with_cache(&key, self.config.current_ttl, move || async move {
                let goals = match store::list_goals(exec.as_ref()).await {
                    Ok(goals) => goals,
                    Err(e) if e.is_missing_table() => {
                        log::warn!("{e}; dashboard is empty");
                        return Ok(Vec::new());
                    }
                    Err(e) => return Err(e),
                };
                let active: Vec<Goal> = goals
                    .into_iter()
                    .filter(|g| g.is_active_on(today))
                    .collect();
                debug!("dashboard: {} active goals on {today}", active.len());

                let exec = exec.as_ref();
                futures::future::try_join_all(active.iter().map(|goal| async move {
                    match goal_progress(exec, goal, today).await {
                        // One misconfigured goal must not blank the board.
                        Err(Error::Unconfigured(reason)) => {
                            log::warn!("goal {}: {reason}; shown as 0", goal.id);
                            Ok(progress_card(goal, 0.0))
                        }
                        other => other,
                    }
                }))
                .await
            })
            .await
    }

    // ── Lookups ────────────────────────────────────────────────────

    /// Distinct values of `dim` for the goal form, cached with the lookup TTL.
    pub async fn options(&self, scope: Scope, dim: Dimension) -> Result<Vec<String>> {
        let key = cache_key(OPTIONS_NAMESPACE, dim.as_str(), &[("scope", scope.as_str())]);
        let exec = self.exec.clone();
        self.cache
            .with_cache(&key, self.config.lookup_ttl, move || async move {
                options::distinct_values(exec.as_ref(), scope, dim).await
            })
            .await
    }

    /// Fact table freshness, cached with the status TTL.
    pub async fn status(&self) -> Result<EngineStatus> {
        let key = cache_key(STATUS_NAMESPACE, "tables", &[]);
        let exec = self.exec.clone();
        let tables = self
            .cache
            .with_cache(&key, self.config.status_ttl, move || async move {
                let mut tables = Vec::new();
                for table in [FactTable::Billing, FactTable::Proposals, FactTable::Contracts] {
                    tables.push(metrics::table_status(exec.as_ref(), table).await?);
                }
                Ok(tables)
            })
            .await?;
        Ok(EngineStatus {
            today: self.today(),
            tables,
            cached_entries: self.cache.len(),
            in_flight: self.cache.in_flight_count(),
        })
    }

    // ── Goal administration ────────────────────────────────────────

    /// Every goal, newest first. Not cached.
    pub async fn list_goals(&self) -> Result<Vec<Goal>> {
        store::list_goals(self.exec.as_ref()).await
    }

    pub async fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        let id = store::parse_goal_id(goal_id)?;
        store::fetch_goal(self.exec.as_ref(), id).await
    }

    /// Insert or update a goal and drop every cached goal read.
    pub async fn save_goal(&self, draft: &GoalDraft) -> Result<i64> {
        let id = store::save_goal(self.exec.as_ref(), draft).await?;
        let dropped = self.cache.invalidate(Some(GOALS_PREFIX));
        info!("saved goal {id}; invalidated {dropped} cached reads");
        Ok(id)
    }

    pub async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        let id = store::parse_goal_id(goal_id)?;
        store::delete_goal(self.exec.as_ref(), id).await?;
        let dropped = self.cache.invalidate(Some(GOALS_PREFIX));
        info!("deleted goal {id}; invalidated {dropped} cached reads");
        Ok(())
    }
}

async fn goal_current_value(
    exec: &dyn QueryExecutor,
    goal: &Goal,
    today: NaiveDate,
) -> Result<f64> {
    // Manual goals have nothing to resolve, not even a window.
    if Metric::resolve(&goal.linked_metric_id, goal.scope)?.is_none() {
        return Ok(0.0);
    }
    let window = resolve_window(goal, WindowMode::Current, today)?;
    let normalized = goal::normalize(goal);
    metrics::current_value(
        exec,
        &goal.linked_metric_id,
        window,
        normalized.scope,
        &normalized.filters,
    )
    .await
}

async fn goal_history(
    exec: &dyn QueryExecutor,
    goal: &Goal,
    today: NaiveDate,
) -> Result<Vec<AggregateRow>> {
    if Metric::resolve(&goal.linked_metric_id, goal.scope)?.is_none() {
        return Ok(Vec::new());
    }
    let window = resolve_window(goal, WindowMode::History, today)?;
    let normalized = goal::normalize(goal);
    metrics::history(
        exec,
        &goal.linked_metric_id,
        window,
        normalized.scope,
        &normalized.filters,
        history_bucket(goal.periodicity),
        SortOrder::Ascending,
    )
    .await
}

async fn goal_progress(
    exec: &dyn QueryExecutor,
    goal: &Goal,
    today: NaiveDate,
) -> Result<GoalProgress> {
    let current = goal_current_value(exec, goal, today).await?;
    Ok(progress_card(goal, current))
}

fn progress_card(goal: &Goal, current: f64) -> GoalProgress {
    let percentage = progress::percentage(current, goal.target_value);
    GoalProgress {
        id: goal.id,
        name: goal.name.clone(),
        target: goal.target_value,
        current: progress::round2(current),
        percentage,
        unit: goal.measure.clone(),
        periodicity: goal.periodicity,
        scope: goal.scope,
        status: ProgressStatus::from_percentage(percentage),
    }
}
