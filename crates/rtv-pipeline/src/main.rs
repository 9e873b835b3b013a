//! `rtv`: run the survey pipeline and serve the warehouse API.
//!
//! Reads `rtv.toml` (or the path given with `--config`), overridden by
//! `RTV_*` environment variables.
//!
//! ```text
//! rtv run                       # ingest, load and assess once
//! rtv requeue                   # retry batches quarantined under failed/
//! rtv alerts list --severity error
//! rtv serve                     # JSON API on 0.0.0.0:8501
//! rtv schema diff --current 02 --previous 01
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rtv_core::{
  audit::AlertSeverity,
  registry::{ColumnDefinition, DataType},
  store::Warehouse,
};
use rtv_pipeline::{DataLake, Pipeline, PipelineConfig};
use rtv_store_sqlite::SqliteStore;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rtv", author, version, about = "RTV household survey pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "rtv.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the warehouse schema and the landing zone.
  Init,
  /// Stage every survey file in the source directory.
  Ingest,
  /// Load staged batches into the warehouse.
  Load,
  /// Run the data-quality checks and log the result.
  Quality {
    /// Anchor of the timeliness window (default: today).
    #[arg(long)]
    as_of: Option<NaiveDate>,
  },
  /// Ingest, load and assess as one logged pipeline run.
  Run {
    #[arg(long)]
    as_of: Option<NaiveDate>,
  },
  /// Move batches that failed to load back into the load queue.
  Requeue,
  /// Serve the JSON API.
  Serve,
  /// Show recent ingestions and their change counts.
  Lineage {
    #[arg(long, default_value_t = 10)]
    limit: usize,
  },
  /// Show recorded run metrics, newest first.
  Metrics {
    /// Only this metric, e.g. `batches_failed`.
    #[arg(long)]
    name:  Option<String>,
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
  /// List or resolve pipeline alerts.
  #[command(subcommand)]
  Alerts(AlertsCommand),
  /// Manage per-round column definitions.
  #[command(subcommand)]
  Schema(SchemaCommand),
}

#[derive(Subcommand)]
enum AlertsCommand {
  /// Show the active alerts.
  List {
    /// info, warning, error or critical.
    #[arg(long)]
    severity: Option<AlertSeverity>,
  },
  /// Mark an alert resolved.
  Resolve { id: i64 },
}

#[derive(Subcommand)]
enum SchemaCommand {
  /// Register a new version of a column for a round.
  Register {
    #[arg(long)]
    round: String,
    #[arg(long)]
    column: String,
    /// VARCHAR, INTEGER, DECIMAL, BOOLEAN, TIMESTAMP or JSON.
    #[arg(long = "type")]
    data_type: DataType,
    #[arg(long, default_value = "")]
    description: String,
    /// JSON array of accepted values, e.g. '["Male","Female"]'.
    #[arg(long)]
    valid_values: Option<String>,
    /// Allow records without this column.
    #[arg(long)]
    optional: bool,
    #[arg(long)]
    reason: Option<String>,
  },
  /// Show the active schema of a round, or one column definition.
  Show {
    #[arg(long)]
    round: String,
    #[arg(long)]
    column: Option<String>,
    #[arg(long, requires = "column")]
    version: Option<i64>,
  },
  /// Compare the active schemas of two rounds.
  Diff {
    #[arg(long)]
    current: String,
    #[arg(long)]
    previous: String,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = PipelineConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

  let store = SqliteStore::open(&config.store_path)
    .await
    .with_context(|| format!("failed to open store at {}", config.store_path.display()))?;
  let store = Arc::new(store);
  let today = Utc::now().date_naive();

  match cli.command {
    Command::Init => {
      DataLake::open(&config.lake_dir)
        .await
        .with_context(|| format!("failed to create lake at {}", config.lake_dir.display()))?;
      tracing::info!(
        store = %config.store_path.display(),
        lake = %config.lake_dir.display(),
        "initialised warehouse"
      );
    }
    Command::Ingest => print(&pipeline(store, &config).await?.ingest().await?)?,
    Command::Load => print(&pipeline(store, &config).await?.load().await?)?,
    Command::Quality { as_of } => {
      let report = pipeline(store, &config)
        .await?
        .quality(as_of.unwrap_or(today))
        .await?;
      print(&report)?;
    }
    Command::Run { as_of } => {
      let report = pipeline(store, &config)
        .await?
        .run(as_of.unwrap_or(today))
        .await
        .context("pipeline run failed")?;
      print(&report)?;
    }
    Command::Requeue => print(&pipeline(store, &config).await?.requeue().await?)?,
    Command::Serve => serve(store, &config).await?,
    Command::Lineage { limit } => print(&store.lineage_history(limit).await?)?,
    Command::Metrics { name, limit } => {
      let pipeline_name = Some(config.pipeline_name.clone());
      print(&store.pipeline_metrics(pipeline_name, name, limit).await?)?;
    }
    Command::Alerts(AlertsCommand::List { severity }) => {
      let pipeline_name = Some(config.pipeline_name.clone());
      print(&store.active_alerts(pipeline_name, severity).await?)?;
    }
    Command::Alerts(AlertsCommand::Resolve { id }) => {
      let alert = store.resolve_alert(id).await?;
      tracing::info!(alert_id = id, alert_type = %alert.alert_type, "resolved alert");
      print(&alert)?;
    }
    Command::Schema(cmd) => schema(&store, cmd).await?,
  }

  Ok(())
}

async fn pipeline(
  store: Arc<SqliteStore>,
  config: &PipelineConfig,
) -> anyhow::Result<Pipeline<SqliteStore>> {
  let lake = DataLake::open(&config.lake_dir)
    .await
    .with_context(|| format!("failed to open lake at {}", config.lake_dir.display()))?;
  Ok(Pipeline::new(store, lake, config))
}

async fn serve(store: Arc<SqliteStore>, config: &PipelineConfig) -> anyhow::Result<()> {
  let app = rtv_api::api_router(store).layer(TraceLayer::new_for_http());
  let address = config.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn schema(store: &SqliteStore, cmd: SchemaCommand) -> anyhow::Result<()> {
  match cmd {
    SchemaCommand::Register {
      round,
      column,
      data_type,
      description,
      valid_values,
      optional,
      reason,
    } => {
      let valid_values = valid_values
        .map(|raw| serde_json::from_str::<Vec<serde_json::Value>>(&raw))
        .transpose()
        .context("--valid-values must be a JSON array")?;
      let definition = ColumnDefinition {
        description,
        valid_values,
        is_required: !optional,
        ..ColumnDefinition::new(column.clone(), data_type)
      };
      let version = store.register_column(round.clone(), definition, reason).await?;
      tracing::info!(round = %round, column = %column, version, "registered column");
      print(&serde_json::json!({ "round_id": round, "column": column, "version": version }))?;
    }
    SchemaCommand::Show { round, column: Some(column), version } => {
      let definition = store
        .column_definition(round.clone(), column.clone(), version)
        .await?
        .with_context(|| format!("no definition of {column} in round {round}"))?;
      print(&definition)?;
    }
    SchemaCommand::Show { round, column: None, .. } => print(&store.active_schema(round).await?)?,
    SchemaCommand::Diff { current, previous } => {
      print(&store.detect_schema_changes(current, previous).await?)?;
    }
  }
  Ok(())
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
