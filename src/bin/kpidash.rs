use std::sync::Arc;

use clap::{Parser, Subcommand};
use kpidash::{Clock, Dimension, FixedOffsetClock, GoalDraft, KpiEngine, Scope, SystemClock};

#[derive(Parser)]
#[command(name = "kpidash", about = "Goal and KPI progress for the operations dashboard")]
struct Cli {
    /// Database path (default: ~/.kpidash/kpidash.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Evaluate "today" at this UTC offset in minutes (e.g. -180) instead
    /// of the local timezone
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage goals and compute their progress
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },
    /// Progress of every goal active today
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Distinct filter values for the goal form
    Options {
        #[command(subcommand)]
        dimension: OptionsDimension,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show fact table status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalAction {
    /// List all goals, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one goal
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Current value and percentage
    Current {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// History series, oldest period first
    History {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Create a goal, or update it when --id is given
    Save(SaveArgs),
    /// Delete a goal
    Delete { id: String },
}

#[derive(clap::Args)]
struct SaveArgs {
    /// Read the whole goal from a JSON file; other flags are ignored
    #[arg(long, value_name = "FILE")]
    from_json: Option<String>,
    #[arg(long)]
    id: Option<i64>,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long)]
    sector: Option<String>,
    /// CLINIC or CARD
    #[arg(long)]
    scope: Option<String>,
    /// daily, weekly, monthly or total
    #[arg(long, default_value = "monthly")]
    periodicity: String,
    #[arg(long)]
    target: Option<f64>,
    /// Unit of measure for display (currency, qtd, percent, minutes)
    #[arg(long)]
    measure: Option<String>,
    /// Start date (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long)]
    start: Option<String>,
    /// End date (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long)]
    end: Option<String>,
    /// Metric id, or "manual"
    #[arg(long)]
    metric: Option<String>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    collaborator: Option<String>,
    #[arg(long)]
    team: Option<String>,
}

impl SaveArgs {
    fn into_draft(self) -> anyhow::Result<GoalDraft> {
        if let Some(path) = self.from_json {
            let text = std::fs::read_to_string(&path)?;
            return Ok(serde_json::from_str(&text)?);
        }
        Ok(GoalDraft {
            id: self.id,
            name: self.name,
            sector: self.sector,
            scope: self.scope,
            periodicity: self.periodicity,
            target_value: self.target,
            measure: self.measure,
            start_date: self.start,
            end_date: self.end,
            linked_metric_id: self.metric,
            filter_group: self.group,
            unit: self.unit,
            collaborator: self.collaborator,
            team: self.team,
        })
    }
}

#[derive(Subcommand)]
enum OptionsDimension {
    Groups(OptionsArgs),
    Units(OptionsArgs),
    Collaborators(OptionsArgs),
    Teams(OptionsArgs),
}

#[derive(clap::Args)]
struct OptionsArgs {
    /// CLINIC or CARD
    #[arg(long, default_value = "CLINIC")]
    scope: String,
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => kpidash::Database::open_at(path).await?,
        None => kpidash::Database::open().await?,
    };

    // Config is handled before the engine so a bad TTL value can be fixed.
    let command = match cli.command {
        Commands::Config { action } => return handle_config(&db, action).await,
        other => other,
    };

    let clock: Arc<dyn Clock> = match cli.utc_offset {
        Some(minutes) => Arc::new(
            FixedOffsetClock::from_minutes(minutes)
                .ok_or_else(|| anyhow::anyhow!("invalid UTC offset: {minutes} minutes"))?,
        ),
        None => Arc::new(SystemClock),
    };
    let engine = KpiEngine::from_database(db, clock).await?;

    match command {
        Commands::Goal { action } => handle_goal(&engine, action).await?,
        Commands::Dashboard { json } => print_dashboard(&engine, json).await?,
        Commands::Options { dimension } => handle_options(&engine, dimension).await?,
        Commands::Status { json } => print_status(&engine, json).await?,
        Commands::Config { .. } => unreachable!("handled above"),
    }
    Ok(())
}

async fn handle_goal(engine: &KpiEngine, action: GoalAction) -> anyhow::Result<()> {
    match action {
        GoalAction::List { json } => {
            let goals = engine.list_goals().await?;
            if json {
                return print_json(&goals);
            }
            if goals.is_empty() {
                println!("No goals configured.");
            }
            for g in &goals {
                println!(
                    "{:>4}  {:<32} {:<6} {:<8} {:<13} target {}",
                    g.id,
                    g.name,
                    g.scope,
                    g.periodicity,
                    g.linked_metric_id,
                    g.target_value.map_or("-".to_string(), |t| t.to_string()),
                );
            }
        }
        GoalAction::Show { id, json } => {
            let goal = engine.get_goal(&id).await?;
            if json {
                return print_json(&goal);
            }
            println!("Goal {}: {}", goal.id, goal.name);
            println!("  Scope:       {}", goal.scope);
            println!("  Periodicity: {}", goal.periodicity);
            println!("  Metric:      {}", goal.linked_metric_id);
            println!(
                "  Target:      {}",
                goal.target_value.map_or("-".to_string(), |t| t.to_string())
            );
            println!(
                "  Range:       {} .. {}",
                goal.start_date.map_or("-".to_string(), |d| d.to_string()),
                goal.end_date.map_or("-".to_string(), |d| d.to_string())
            );
            let filters = kpidash::goal::normalize(&goal).filters;
            for dim in Dimension::ALL {
                println!(
                    "  {:<12} {}",
                    format!("{}:", dim.as_str()),
                    filters.get(dim).unwrap_or("all")
                );
            }
        }
        GoalAction::Current { id, json } => {
            let progress = engine.compute_current(&id).await?;
            if json {
                return print_json(&progress);
            }
            println!("{} ({}%)", progress.current_value, progress.percentage);
        }
        GoalAction::History { id, json } => {
            let rows = engine.compute_history(&id).await?;
            if json {
                return print_json(&rows);
            }
            if rows.is_empty() {
                println!("No history.");
            }
            for r in &rows {
                println!("{:<10}  {:>14.2}  {:>6}", r.period, r.value, r.count);
            }
        }
        GoalAction::Save(args) => {
            let draft = args.into_draft()?;
            let id = engine.save_goal(&draft).await?;
            println!("Saved goal {id}.");
        }
        GoalAction::Delete { id } => {
            engine.delete_goal(&id).await?;
            println!("Deleted goal {id}.");
        }
    }
    Ok(())
}

async fn print_dashboard(engine: &KpiEngine, json: bool) -> anyhow::Result<()> {
    let cards = engine.dashboard().await?;
    if json {
        return print_json(&cards);
    }
    if cards.is_empty() {
        println!("No active goals on {}.", engine.today());
        return Ok(());
    }
    for c in &cards {
        println!(
            "{:>4}  {:<32} {:>14.2} / {:<12} {:>4}%  {:?}",
            c.id,
            c.name,
            c.current,
            c.target.map_or("-".to_string(), |t| t.to_string()),
            c.percentage,
            c.status,
        );
    }
    Ok(())
}

async fn handle_options(engine: &KpiEngine, dimension: OptionsDimension) -> anyhow::Result<()> {
    let (dim, args) = match dimension {
        OptionsDimension::Groups(a) => (Dimension::Group, a),
        OptionsDimension::Units(a) => (Dimension::Unit, a),
        OptionsDimension::Collaborators(a) => (Dimension::Collaborator, a),
        OptionsDimension::Teams(a) => (Dimension::Team, a),
    };
    let scope = Scope::parse(Some(args.scope.as_str()))?;
    let values = engine.options(scope, dim).await?;
    if args.json {
        return print_json(&values);
    }
    for v in &values {
        println!("{v}");
    }
    Ok(())
}

async fn print_status(engine: &KpiEngine, json: bool) -> anyhow::Result<()> {
    let status = engine.status().await?;
    if json {
        return print_json(&status);
    }
    println!("KPI Engine Status ({})", status.today);
    for t in &status.tables {
        if t.present {
            println!(
                "  {:<24} {:>8} rows, latest {}",
                t.table,
                t.rows,
                t.latest.as_deref().unwrap_or("-")
            );
        } else {
            println!("  {:<24} not created yet", t.table);
        }
    }
    println!("  Cached reads: {}", status.cached_entries);
    Ok(())
}

async fn handle_config(db: &kpidash::Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let val: Option<String> = db
                .reader()
                .call({
                    let key = key.clone();
                    move |conn| kpidash::storage::repository::get_config(conn, &key)
                })
                .await?;
            match val {
                Some(v) => println!("{key} = {v}"),
                None => println!("{key} is not set"),
            }
        }
        ConfigAction::Set { key, value } => {
            db.writer()
                .call(move |conn| {
                    kpidash::storage::repository::set_config(conn, &key, &value)?;
                    Ok::<(), rusqlite::Error>(())
                })
                .await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items: Vec<(String, String)> = db
                .reader()
                .call(|conn| kpidash::storage::repository::list_config(conn))
                .await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
