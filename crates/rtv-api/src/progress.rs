//! Handlers for `GET /progress` and `GET /overview`.
//!
//! Query params of `/progress` map directly to [`ProgressQuery`] fields.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use rtv_core::{
  progress::{HouseholdProgress, Overview, ProgressQuery},
  store::Warehouse,
};
use serde::Deserialize;

use crate::{MAX_LIMIT, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct ProgressParams {
  pub village_id:   Option<String>,
  pub household_id: Option<String>,
  pub round_id:     Option<String>,
  /// Indicator category, e.g. `income`.
  pub category:     Option<String>,
  /// Only surveys on or after this date (`YYYY-MM-DD`).
  pub since:        Option<NaiveDate>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// `GET /progress[?village_id=...][&household_id=...][&round_id=...][&category=...][&since=...][&limit=...][&offset=...]`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ProgressParams>,
) -> Result<Json<Vec<HouseholdProgress>>, ApiError>
where
  S: Warehouse,
{
  if let Some(limit) = params.limit
    && !(1..=MAX_LIMIT).contains(&limit)
  {
    return Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_LIMIT}")));
  }

  let query = ProgressQuery {
    village_id:   params.village_id,
    household_id: params.household_id,
    round_id:     params.round_id,
    category:     params.category,
    since:        params.since,
    limit:        params.limit,
    offset:       params.offset,
  };

  let rows = store.progress(&query).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct OverviewParams {
  /// Defaults to today (UTC).
  pub as_of: Option<NaiveDate>,
}

/// `GET /overview[?as_of=YYYY-MM-DD]`
pub async fn overview<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<OverviewParams>,
) -> Result<Json<Overview>, ApiError>
where
  S: Warehouse,
{
  let as_of = params.as_of.unwrap_or_else(|| Utc::now().date_naive());
  let overview = store.overview(as_of).await.map_err(ApiError::store)?;
  Ok(Json(overview))
}
