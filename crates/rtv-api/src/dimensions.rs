//! Handlers for the dimension endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/villages` | |
//! | `GET`  | `/households` | Optional `?village_id=` |
//! | `GET`  | `/households/{id}` | 404 if not found |
//! | `GET`  | `/rounds` | |
//! | `GET`  | `/indicators` | |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use rtv_core::{
  dimension::{Household, Indicator, SurveyRound, Village},
  store::Warehouse,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Villages ─────────────────────────────────────────────────────────────────

/// `GET /villages`
pub async fn villages<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Village>>, ApiError>
where
  S: Warehouse,
{
  let villages = store.list_villages().await.map_err(ApiError::store)?;
  Ok(Json(villages))
}

// ─── Households ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HouseholdParams {
  pub village_id: Option<String>,
}

/// `GET /households[?village_id=<id>]`
pub async fn households<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<HouseholdParams>,
) -> Result<Json<Vec<Household>>, ApiError>
where
  S: Warehouse,
{
  let households = store
    .list_households(params.village_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(households))
}

/// `GET /households/{id}`
pub async fn household<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Household>, ApiError>
where
  S: Warehouse,
{
  let household = store
    .get_household(id.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("household {id} not found")))?;
  Ok(Json(household))
}

// ─── Rounds & indicators ──────────────────────────────────────────────────────

/// `GET /rounds`
pub async fn rounds<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<SurveyRound>>, ApiError>
where
  S: Warehouse,
{
  let rounds = store.list_rounds().await.map_err(ApiError::store)?;
  Ok(Json(rounds))
}

/// `GET /indicators`
pub async fn indicators<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Indicator>>, ApiError>
where
  S: Warehouse,
{
  let indicators = store.list_indicators().await.map_err(ApiError::store)?;
  Ok(Json(indicators))
}
