//! Synchronous row operations shared by single-row store calls and batch
//! loads.
//!
//! Every function takes a plain `&Connection`, so it runs unchanged on a
//! [`rusqlite::Transaction`] through deref. Upserts read the current row
//! first and only issue an `UPDATE` when an attribute actually differs; an
//! unchanged row keeps its `updated_at`.

use rusqlite::{Connection, OptionalExtension as _, ffi, params};

use rtv_core::{
  dimension::{GeoPoint, NewHousehold, NewIndicator, NewSurveyRound, NewVillage},
  fact::{Change, NewMeasurement, NewSurvey},
};

use crate::encode::{
  HOUSEHOLD_COLUMNS, INDICATOR_COLUMNS, MEASUREMENT_COLUMNS, RawHousehold, RawIndicator,
  RawMeasurement, RawRound, RawSurvey, RawVillage, ROUND_COLUMNS, SURVEY_COLUMNS,
  VILLAGE_COLUMNS, encode_date,
};

/// A foreign-key failure raised by application code, classified the same way
/// as one raised by SQLite itself.
pub fn foreign_key_violation(message: String) -> rusqlite::Error {
  rusqlite::Error::SqliteFailure(
    ffi::Error::new(ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
    Some(message),
  )
}

/// Re-read a row that was just written.
fn reread<T>(row: Option<T>) -> rusqlite::Result<T> {
  row.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn split_location(location: Option<GeoPoint>) -> (Option<f64>, Option<f64>) {
  match location {
    Some(p) => (Some(p.latitude), Some(p.longitude)),
    None => (None, None),
  }
}

// ─── Villages ────────────────────────────────────────────────────────────────

pub fn select_village(conn: &Connection, village_id: &str) -> rusqlite::Result<Option<RawVillage>> {
  conn
    .query_row(
      &format!("SELECT {VILLAGE_COLUMNS} FROM villages WHERE village_id = ?1"),
      params![village_id],
      RawVillage::from_row,
    )
    .optional()
}

pub fn upsert_village(
  conn: &Connection,
  input: &NewVillage,
) -> rusqlite::Result<(RawVillage, Change)> {
  let (latitude, longitude) = split_location(input.location);

  let change = match select_village(conn, &input.village_id)? {
    None => {
      conn.execute(
        "INSERT INTO villages (village_id, name, district, region, latitude, longitude)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![input.village_id, input.name, input.district, input.region, latitude, longitude],
      )?;
      Change::Inserted
    }
    Some(row)
      if row.name == input.name
        && row.district == input.district
        && row.region == input.region
        && row.latitude == latitude
        && row.longitude == longitude =>
    {
      Change::Unchanged
    }
    Some(_) => {
      conn.execute(
        "UPDATE villages
            SET name = ?2, district = ?3, region = ?4, latitude = ?5, longitude = ?6
          WHERE village_id = ?1",
        params![input.village_id, input.name, input.district, input.region, latitude, longitude],
      )?;
      Change::Updated
    }
  };

  Ok((reread(select_village(conn, &input.village_id)?)?, change))
}

/// Create the village when it is not stored yet; never touches an existing
/// row.
pub fn ensure_village(conn: &Connection, input: &NewVillage) -> rusqlite::Result<Change> {
  let (latitude, longitude) = split_location(input.location);
  let inserted = conn.execute(
    "INSERT INTO villages (village_id, name, district, region, latitude, longitude)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT (village_id) DO NOTHING",
    params![input.village_id, input.name, input.district, input.region, latitude, longitude],
  )?;
  Ok(if inserted == 1 { Change::Inserted } else { Change::Unchanged })
}

// ─── Households ──────────────────────────────────────────────────────────────

pub fn select_household(
  conn: &Connection,
  household_id: &str,
) -> rusqlite::Result<Option<RawHousehold>> {
  conn
    .query_row(
      &format!("SELECT {HOUSEHOLD_COLUMNS} FROM households WHERE household_id = ?1"),
      params![household_id],
      RawHousehold::from_row,
    )
    .optional()
}

pub fn upsert_household(
  conn: &Connection,
  input: &NewHousehold,
) -> rusqlite::Result<(RawHousehold, Change)> {
  let change = match select_household(conn, &input.household_id)? {
    None => {
      conn.execute(
        "INSERT INTO households
           (household_id, village_id, household_code, head_of_household, household_size)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
          input.household_id,
          input.village_id,
          input.household_code,
          input.head_of_household,
          input.household_size,
        ],
      )?;
      Change::Inserted
    }
    Some(row)
      if row.village_id == input.village_id
        && row.household_code == input.household_code
        && row.head_of_household == input.head_of_household
        && row.household_size == input.household_size =>
    {
      Change::Unchanged
    }
    Some(_) => {
      conn.execute(
        "UPDATE households
            SET village_id = ?2, household_code = ?3, head_of_household = ?4,
                household_size = ?5
          WHERE household_id = ?1",
        params![
          input.household_id,
          input.village_id,
          input.household_code,
          input.head_of_household,
          input.household_size,
        ],
      )?;
      Change::Updated
    }
  };

  Ok((reread(select_household(conn, &input.household_id)?)?, change))
}

// ─── Survey rounds ───────────────────────────────────────────────────────────

pub fn select_round(conn: &Connection, round_id: &str) -> rusqlite::Result<Option<RawRound>> {
  conn
    .query_row(
      &format!("SELECT {ROUND_COLUMNS} FROM survey_rounds WHERE round_id = ?1"),
      params![round_id],
      RawRound::from_row,
    )
    .optional()
}

pub fn upsert_round(
  conn: &Connection,
  input: &NewSurveyRound,
) -> rusqlite::Result<(RawRound, Change)> {
  let start_date = input.start_date.map(encode_date);
  let end_date = input.end_date.map(encode_date);

  let change = match select_round(conn, &input.round_id)? {
    None => {
      conn.execute(
        "INSERT INTO survey_rounds (round_id, name, start_date, end_date, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![input.round_id, input.name, start_date, end_date, input.description],
      )?;
      Change::Inserted
    }
    Some(row)
      if row.name == input.name
        && row.start_date == start_date
        && row.end_date == end_date
        && row.description == input.description =>
    {
      Change::Unchanged
    }
    Some(_) => {
      conn.execute(
        "UPDATE survey_rounds
            SET name = ?2, start_date = ?3, end_date = ?4, description = ?5
          WHERE round_id = ?1",
        params![input.round_id, input.name, start_date, end_date, input.description],
      )?;
      Change::Updated
    }
  };

  Ok((reread(select_round(conn, &input.round_id)?)?, change))
}

// ─── Indicators ──────────────────────────────────────────────────────────────

pub fn select_indicator(
  conn: &Connection,
  indicator_id: &str,
) -> rusqlite::Result<Option<RawIndicator>> {
  conn
    .query_row(
      &format!("SELECT {INDICATOR_COLUMNS} FROM indicators WHERE indicator_id = ?1"),
      params![indicator_id],
      RawIndicator::from_row,
    )
    .optional()
}

pub fn upsert_indicator(
  conn: &Connection,
  input: &NewIndicator,
) -> rusqlite::Result<(RawIndicator, Change)> {
  let change = match select_indicator(conn, &input.indicator_id)? {
    None => {
      conn.execute(
        "INSERT INTO indicators (indicator_id, category, name, unit, target_value, is_positive)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          input.indicator_id,
          input.category,
          input.name,
          input.unit,
          input.target_value,
          input.is_positive,
        ],
      )?;
      Change::Inserted
    }
    Some(row)
      if row.category == input.category
        && row.name == input.name
        && row.unit == input.unit
        && row.target_value == input.target_value
        && row.is_positive == input.is_positive =>
    {
      Change::Unchanged
    }
    Some(_) => {
      conn.execute(
        "UPDATE indicators
            SET category = ?2, name = ?3, unit = ?4, target_value = ?5, is_positive = ?6
          WHERE indicator_id = ?1",
        params![
          input.indicator_id,
          input.category,
          input.name,
          input.unit,
          input.target_value,
          input.is_positive,
        ],
      )?;
      Change::Updated
    }
  };

  Ok((reread(select_indicator(conn, &input.indicator_id)?)?, change))
}

/// Create the indicator when it is not stored yet. Curated attributes such
/// as targets are never overwritten by a load.
pub fn ensure_indicator(conn: &Connection, input: &NewIndicator) -> rusqlite::Result<Change> {
  let inserted = conn.execute(
    "INSERT INTO indicators (indicator_id, category, name, unit, target_value, is_positive)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT (indicator_id) DO NOTHING",
    params![
      input.indicator_id,
      input.category,
      input.name,
      input.unit,
      input.target_value,
      input.is_positive,
    ],
  )?;
  Ok(if inserted == 1 { Change::Inserted } else { Change::Unchanged })
}

// ─── Surveys ─────────────────────────────────────────────────────────────────

pub fn select_survey(conn: &Connection, survey_id: i64) -> rusqlite::Result<Option<RawSurvey>> {
  conn
    .query_row(
      &format!("SELECT {SURVEY_COLUMNS} FROM household_surveys WHERE survey_id = ?1"),
      params![survey_id],
      RawSurvey::from_row,
    )
    .optional()
}

pub fn find_survey(
  conn: &Connection,
  household_id: &str,
  round_id: &str,
) -> rusqlite::Result<Option<RawSurvey>> {
  conn
    .query_row(
      &format!(
        "SELECT {SURVEY_COLUMNS} FROM household_surveys
          WHERE household_id = ?1 AND round_id = ?2"
      ),
      params![household_id, round_id],
      RawSurvey::from_row,
    )
    .optional()
}

pub fn insert_survey(conn: &Connection, input: &NewSurvey) -> rusqlite::Result<RawSurvey> {
  conn.execute(
    "INSERT INTO household_surveys (household_id, round_id, survey_date, surveyor, status)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      input.household_id,
      input.round_id,
      encode_date(input.survey_date),
      input.surveyor,
      input.status.as_str(),
    ],
  )?;
  reread(select_survey(conn, conn.last_insert_rowid())?)
}

pub fn upsert_survey(
  conn: &Connection,
  input: &NewSurvey,
) -> rusqlite::Result<(RawSurvey, Change)> {
  let survey_date = encode_date(input.survey_date);

  match find_survey(conn, &input.household_id, &input.round_id)? {
    None => Ok((insert_survey(conn, input)?, Change::Inserted)),
    Some(row)
      if row.survey_date == survey_date
        && row.surveyor == input.surveyor
        && row.status == input.status.as_str() =>
    {
      Ok((row, Change::Unchanged))
    }
    Some(row) => {
      conn.execute(
        "UPDATE household_surveys SET survey_date = ?2, surveyor = ?3, status = ?4
          WHERE survey_id = ?1",
        params![row.survey_id, survey_date, input.surveyor, input.status.as_str()],
      )?;
      Ok((reread(select_survey(conn, row.survey_id)?)?, Change::Updated))
    }
  }
}

// ─── Measurements ────────────────────────────────────────────────────────────

fn select_measurement(
  conn: &Connection,
  survey_id: i64,
  indicator_id: &str,
) -> rusqlite::Result<Option<RawMeasurement>> {
  conn
    .query_row(
      &format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM household_measurements
          WHERE survey_id = ?1 AND indicator_id = ?2"
      ),
      params![survey_id, indicator_id],
      RawMeasurement::from_row,
    )
    .optional()
}

pub fn insert_measurement(
  conn: &Connection,
  input: &NewMeasurement,
) -> rusqlite::Result<RawMeasurement> {
  conn.execute(
    "INSERT INTO household_measurements (survey_id, indicator_id, value, notes)
     VALUES (?1, ?2, ?3, ?4)",
    params![input.survey_id, input.indicator_id, input.value, input.notes],
  )?;
  reread(select_measurement(conn, input.survey_id, &input.indicator_id)?)
}

pub fn upsert_measurement(
  conn: &Connection,
  input: &NewMeasurement,
) -> rusqlite::Result<(RawMeasurement, Change)> {
  match select_measurement(conn, input.survey_id, &input.indicator_id)? {
    None => Ok((insert_measurement(conn, input)?, Change::Inserted)),
    Some(row) if row.value == input.value && row.notes == input.notes => {
      Ok((row, Change::Unchanged))
    }
    Some(row) => {
      conn.execute(
        "UPDATE household_measurements SET value = ?2, notes = ?3 WHERE measurement_id = ?1",
        params![row.measurement_id, input.value, input.notes],
      )?;
      Ok((
        reread(select_measurement(conn, input.survey_id, &input.indicator_id)?)?,
        Change::Updated,
      ))
    }
  }
}

pub fn list_measurements(conn: &Connection, survey_id: i64) -> rusqlite::Result<Vec<RawMeasurement>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {MEASUREMENT_COLUMNS} FROM household_measurements
      WHERE survey_id = ?1 ORDER BY indicator_id"
  ))?;
  stmt
    .query_map(params![survey_id], RawMeasurement::from_row)?
    .collect()
}
