//! JSON REST API over the RTV survey warehouse.
//!
//! Exposes an axum [`Router`] backed by any [`rtv_core::store::Warehouse`].
//! This is the data source of the dashboard; the API is read-only.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rtv_api::api_router(store.clone()))
//! ```

pub mod audit;
pub mod dimensions;
pub mod error;
pub mod progress;

use std::sync::Arc;

use axum::{Router, routing::get};
use rtv_core::store::Warehouse;

pub use error::ApiError;

/// Largest `limit` a list endpoint accepts.
pub const MAX_LIMIT: usize = 1000;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: Warehouse + 'static,
{
  Router::new()
    // Dimensions
    .route("/villages", get(dimensions::villages::<S>))
    .route("/households", get(dimensions::households::<S>))
    .route("/households/{id}", get(dimensions::household::<S>))
    .route("/rounds", get(dimensions::rounds::<S>))
    .route("/indicators", get(dimensions::indicators::<S>))
    // Reporting
    .route("/progress", get(progress::handler::<S>))
    .route("/overview", get(progress::overview::<S>))
    // Audit
    .route("/quality/logs", get(audit::quality_logs::<S>))
    .route("/pipeline/runs", get(audit::pipeline_runs::<S>))
    .route("/pipeline/metrics", get(audit::pipeline_metrics::<S>))
    .route("/pipeline/alerts", get(audit::pipeline_alerts::<S>))
    .route("/lineage", get(audit::lineage::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::{NaiveDate, Utc};
  use rtv_core::{
    audit::{
      AlertSeverity, MetricType, NewAlert, NewLineage, NewMetric, NewQualityLog, PipelineStatus,
    },
    dimension::{NewHousehold, NewIndicator, NewSurveyRound, NewVillage},
    fact::{NewMeasurement, NewSurvey, SurveyStatus},
    store::Warehouse,
  };
  use rtv_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  fn household(id: &str, village_id: &str) -> NewHousehold {
    NewHousehold {
      household_id:      id.into(),
      village_id:        village_id.into(),
      household_code:    format!("HH-{id}"),
      head_of_household: Some("Jane Doe".into()),
      household_size:    Some(4),
    }
  }

  /// Two villages, one household each, and a measured survey for H1.
  async fn seeded() -> Arc<SqliteStore> {
    let s = SqliteStore::open_in_memory().await.unwrap();
    s.upsert_village(NewVillage::bare("V1")).await.unwrap();
    s.upsert_village(NewVillage::bare("V2")).await.unwrap();
    s.upsert_household(household("H1", "V1")).await.unwrap();
    s.upsert_household(household("H2", "V2")).await.unwrap();
    s.upsert_round(NewSurveyRound::new("R1", "Baseline")).await.unwrap();
    s.upsert_indicator(NewIndicator {
      indicator_id: "I1".into(),
      category:     "income".into(),
      name:         "Monthly Income".into(),
      unit:         "UGX".into(),
      target_value: Some(100.0),
      is_positive:  true,
    })
    .await
    .unwrap();
    let survey = s
      .record_survey(NewSurvey {
        household_id: "H1".into(),
        round_id:     "R1".into(),
        survey_date:  NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        surveyor:     None,
        status:       SurveyStatus::Completed,
      })
      .await
      .unwrap();
    s.record_measurement(NewMeasurement::new(survey.survey_id, "I1", 42.0))
      .await
      .unwrap();
    Arc::new(s)
  }

  async fn get(store: Arc<SqliteStore>, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = api_router(store).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  // ── Dimensions ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn lists_villages_and_filters_households() {
    let store = seeded().await;

    let (status, body) = get(store.clone(), "/villages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = get(store.clone(), "/households").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = get(store, "/households?village_id=V2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["household_id"], "H2");
    assert_eq!(body.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn unknown_household_is_404_with_json_error() {
    let store = seeded().await;

    let (status, body) = get(store.clone(), "/households/H1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["household_code"], "HH-H1");

    let (status, body) = get(store, "/households/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "household nope not found" }));
  }

  #[tokio::test]
  async fn rounds_and_indicators_are_listed() {
    let store = seeded().await;

    let (_, rounds) = get(store.clone(), "/rounds").await;
    assert_eq!(rounds[0]["name"], "Baseline");

    let (_, indicators) = get(store, "/indicators").await;
    assert_eq!(indicators[0]["indicator_id"], "I1");
    assert_eq!(indicators[0]["target_value"], 100.0);
  }

  // ── Reporting ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn progress_rows_are_filtered() {
    let store = seeded().await;

    let (status, body) = get(store.clone(), "/progress").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["measurement_value"], 42.0);
    assert_eq!(rows[0]["progress_pct"], 42.0);
    assert_eq!(rows[0]["village_name"], "V1");

    let (_, body) = get(store.clone(), "/progress?category=income&village_id=V1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = get(store.clone(), "/progress?village_id=V2").await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = get(store, "/progress?since=2024-03-02").await;
    assert!(body.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn out_of_range_limit_is_rejected() {
    let store = seeded().await;

    let (status, body) = get(store.clone(), "/progress?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"));

    let (status, _) = get(store, "/lineage?limit=5000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn overview_reports_totals() {
    let store = seeded().await;

    let (status, body) = get(store, "/overview?as_of=2024-03-05").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_households"], 2);
    assert_eq!(body["active_villages"], 1);
    assert_eq!(body["total_surveys"], 1);
    assert_eq!(body["average_progress"], 42.0);
    assert_eq!(body["data_quality_score"], Value::Null);
    assert_eq!(body["as_of"], "2024-03-05");
  }

  // ── Audit ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn audit_endpoints_return_recent_rows() {
    let store = seeded().await;

    store
      .log_quality(NewQualityLog {
        table_name:        "households".into(),
        check_type:        "completeness".into(),
        check_description: None,
        status:            "completed".into(),
        details:           json!({ "score": 100.0 }),
      })
      .await
      .unwrap();
    let run = store
      .start_pipeline_run("rtv_pipeline".into(), "run-1".into())
      .await
      .unwrap();
    store
      .finish_pipeline_run(run.log_id, PipelineStatus::Completed, json!({}))
      .await
      .unwrap();
    store
      .record_lineage(NewLineage {
        source_file:       "01_baseline.csv".into(),
        ingestion_time:    Utc::now(),
        record_count:      2,
        hash_value:        "abc".into(),
        metadata:          json!({}),
        parent_lineage_id: None,
      })
      .await
      .unwrap();

    let (_, logs) = get(store.clone(), "/quality/logs").await;
    assert_eq!(logs[0]["check_type"], "completeness");

    let (_, runs) = get(store.clone(), "/pipeline/runs?limit=1").await;
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["status"], "completed");

    let (_, lineage) = get(store, "/lineage").await;
    assert_eq!(lineage[0]["lineage"]["source_file"], "01_baseline.csv");
    assert!(lineage[0]["changes"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn run_metrics_and_active_alerts_are_listed() {
    let store = seeded().await;
    let run = store
      .start_pipeline_run("rtv_pipeline".into(), "run-1".into())
      .await
      .unwrap();
    store
      .record_metrics(run.log_id, vec![
        NewMetric::new("batches_loaded", 2.0, MetricType::Count),
        NewMetric::new("overall_quality_score", 91.5, MetricType::Gauge),
      ])
      .await
      .unwrap();
    for (alert_type, severity) in
      [("load_failure", AlertSeverity::Error), ("ingest_failure", AlertSeverity::Warning)]
    {
      store
        .record_alert(run.log_id, NewAlert {
          alert_type:    alert_type.into(),
          alert_message: format!("{alert_type} in run-1"),
          severity,
          metadata:      json!({}),
        })
        .await
        .unwrap();
    }

    let (status, metrics) = get(store.clone(), "/pipeline/metrics?metric=batches_loaded").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics.as_array().unwrap().len(), 1);
    assert_eq!(metrics[0]["metric_value"], 2.0);
    assert_eq!(metrics[0]["run_id"], "run-1");

    let (_, metrics) = get(store.clone(), "/pipeline/metrics?pipeline=other&limit=5").await;
    assert!(metrics.as_array().unwrap().is_empty());

    let (_, alerts) = get(store.clone(), "/pipeline/alerts").await;
    assert_eq!(alerts.as_array().unwrap().len(), 2);

    let (status, alerts) = get(store, "/pipeline/alerts?severity=error").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["alert_type"], "load_failure");
    assert_eq!(alerts[0]["status"], "active");
  }
}
