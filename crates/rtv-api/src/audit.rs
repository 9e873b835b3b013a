//! Handlers for the audit trail: quality logs, pipeline runs, their metrics
//! and alerts, and lineage.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use rtv_core::{
  audit::{
    AlertSeverity, DataQualityLog, LineageSummary, PipelineAlert, PipelineLog, PipelineMetric,
  },
  store::Warehouse,
};
use serde::Deserialize;

use crate::{MAX_LIMIT, error::ApiError};

const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
  pub limit: Option<usize>,
}

impl LimitParams {
  fn resolve(&self) -> Result<usize, ApiError> {
    match self.limit {
      None => Ok(DEFAULT_LIMIT),
      Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
      Some(_) => Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_LIMIT}"))),
    }
  }
}

/// `GET /quality/logs[?limit=N]`
pub async fn quality_logs<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<DataQualityLog>>, ApiError>
where
  S: Warehouse,
{
  let logs = store
    .recent_quality_logs(params.resolve()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(logs))
}

/// `GET /pipeline/runs[?limit=N]`
pub async fn pipeline_runs<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<PipelineLog>>, ApiError>
where
  S: Warehouse,
{
  let runs = store
    .recent_pipeline_runs(params.resolve()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(runs))
}

#[derive(Debug, Deserialize)]
pub struct MetricParams {
  pub pipeline: Option<String>,
  pub metric:   Option<String>,
  pub limit:    Option<usize>,
}

/// `GET /pipeline/metrics[?pipeline=&metric=&limit=N]`, newest first.
pub async fn pipeline_metrics<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<MetricParams>,
) -> Result<Json<Vec<PipelineMetric>>, ApiError>
where
  S: Warehouse,
{
  let limit = LimitParams { limit: params.limit }.resolve()?;
  let metrics = store
    .pipeline_metrics(params.pipeline, params.metric, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(metrics))
}

#[derive(Debug, Deserialize)]
pub struct AlertParams {
  pub pipeline: Option<String>,
  /// Only alerts of exactly this severity.
  pub severity: Option<AlertSeverity>,
}

/// `GET /pipeline/alerts[?pipeline=&severity=]`: alerts still active.
pub async fn pipeline_alerts<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<AlertParams>,
) -> Result<Json<Vec<PipelineAlert>>, ApiError>
where
  S: Warehouse,
{
  let alerts = store
    .active_alerts(params.pipeline, params.severity)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(alerts))
}

/// `GET /lineage[?limit=N]`
pub async fn lineage<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<LineageSummary>>, ApiError>
where
  S: Warehouse,
{
  let history = store
    .lineage_history(params.resolve()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(history))
}
