//! SQL schema for the RTV SQLite warehouse.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
///
/// Audit timestamps are written by SQLite itself in RFC 3339 form with
/// millisecond precision so that triggers and defaults agree on one format.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Dimensions ──────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS villages (
    village_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    district    TEXT,
    region      TEXT,
    latitude    REAL,
    longitude   REAL,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

CREATE TABLE IF NOT EXISTS households (
    household_id      TEXT PRIMARY KEY,
    village_id        TEXT NOT NULL REFERENCES villages(village_id),
    household_code    TEXT NOT NULL UNIQUE,
    head_of_household TEXT,
    household_size    INTEGER CHECK (household_size IS NULL OR household_size >= 0),
    created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS survey_rounds (
    round_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    start_date  TEXT,                -- YYYY-MM-DD
    end_date    TEXT,                -- YYYY-MM-DD
    description TEXT,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS indicators (
    indicator_id TEXT PRIMARY KEY,
    category     TEXT NOT NULL,
    name         TEXT NOT NULL,
    unit         TEXT NOT NULL,
    target_value REAL,
    is_positive  INTEGER NOT NULL DEFAULT 1,   -- 1 when higher is better
    created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- ── Facts ───────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS household_surveys (
    survey_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    household_id TEXT NOT NULL REFERENCES households(household_id),
    round_id     TEXT NOT NULL REFERENCES survey_rounds(round_id),
    survey_date  TEXT NOT NULL,       -- YYYY-MM-DD
    surveyor     TEXT,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (household_id, round_id)
);

CREATE TABLE IF NOT EXISTS household_measurements (
    measurement_id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_id      INTEGER NOT NULL REFERENCES household_surveys(survey_id),
    indicator_id   TEXT NOT NULL REFERENCES indicators(indicator_id),
    value          REAL NOT NULL,
    notes          TEXT,
    created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (survey_id, indicator_id)
);

-- ── Audit ───────────────────────────────────────────────────────────────────

-- Append-only.
CREATE TABLE IF NOT EXISTS data_quality_logs (
    log_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name        TEXT NOT NULL,
    check_type        TEXT NOT NULL,
    check_description TEXT,
    status            TEXT NOT NULL,
    details           TEXT NOT NULL DEFAULT '{}',   -- JSON
    created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS pipeline_logs (
    log_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_name TEXT NOT NULL,
    run_id        TEXT NOT NULL,
    status        TEXT NOT NULL,     -- 'running' | 'completed' | 'failed'
    start_time    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    end_time      TEXT,
    details       TEXT NOT NULL DEFAULT '{}',       -- JSON
    created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS pipeline_metrics (
    metric_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    log_id       INTEGER NOT NULL REFERENCES pipeline_logs(log_id),
    metric_name  TEXT NOT NULL,
    metric_value REAL NOT NULL,
    metric_type  TEXT NOT NULL,      -- 'count' | 'gauge' | 'duration'
    recorded_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    metadata     TEXT NOT NULL DEFAULT '{}'         -- JSON
);

CREATE TABLE IF NOT EXISTS pipeline_alerts (
    alert_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    log_id        INTEGER NOT NULL REFERENCES pipeline_logs(log_id),
    alert_type    TEXT NOT NULL,
    alert_message TEXT NOT NULL,
    severity      TEXT NOT NULL,     -- 'info' | 'warning' | 'error' | 'critical'
    status        TEXT NOT NULL DEFAULT 'active',   -- 'active' | 'resolved'
    created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    resolved_at   TEXT,
    metadata      TEXT NOT NULL DEFAULT '{}'        -- JSON
);

CREATE TABLE IF NOT EXISTS data_lineage (
    lineage_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file       TEXT NOT NULL,
    ingestion_time    TEXT NOT NULL,
    record_count      INTEGER NOT NULL,
    hash_value        TEXT NOT NULL,
    metadata          TEXT NOT NULL DEFAULT '{}',   -- JSON
    parent_lineage_id INTEGER REFERENCES data_lineage(lineage_id)
);

CREATE TABLE IF NOT EXISTS change_log (
    change_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    lineage_id   INTEGER NOT NULL REFERENCES data_lineage(lineage_id),
    table_name   TEXT NOT NULL,
    operation    TEXT NOT NULL,      -- 'INSERT' | 'UPDATE'
    record_count INTEGER NOT NULL,
    change_time  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    details      TEXT NOT NULL DEFAULT '{}'         -- JSON
);

-- ── Schema registry ─────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS schema_registry (
    round_id        TEXT NOT NULL,
    column_name     TEXT NOT NULL,
    data_type       TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    valid_values    TEXT,              -- JSON array or NULL
    is_required     INTEGER NOT NULL DEFAULT 1,
    version         INTEGER NOT NULL,
    effective_date  TEXT NOT NULL DEFAULT (date('now')),
    deprecated_date TEXT,
    PRIMARY KEY (round_id, column_name, version)
);

CREATE TABLE IF NOT EXISTS schema_changes (
    change_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    round_id      TEXT NOT NULL,
    change_type   TEXT NOT NULL,
    column_name   TEXT NOT NULL,
    old_version   INTEGER,
    new_version   INTEGER NOT NULL,
    change_date   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    change_reason TEXT
);

-- ── updated_at maintenance ──────────────────────────────────────────────────
-- Each trigger only fires when the statement did not set updated_at itself,
-- so the nested UPDATE cannot re-trigger it.

CREATE TRIGGER IF NOT EXISTS households_touch_updated_at
AFTER UPDATE ON households FOR EACH ROW
WHEN NEW.updated_at IS OLD.updated_at
BEGIN
    UPDATE households
       SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
     WHERE household_id = NEW.household_id;
END;

CREATE TRIGGER IF NOT EXISTS indicators_touch_updated_at
AFTER UPDATE ON indicators FOR EACH ROW
WHEN NEW.updated_at IS OLD.updated_at
BEGIN
    UPDATE indicators
       SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
     WHERE indicator_id = NEW.indicator_id;
END;

CREATE TRIGGER IF NOT EXISTS household_surveys_touch_updated_at
AFTER UPDATE ON household_surveys FOR EACH ROW
WHEN NEW.updated_at IS OLD.updated_at
BEGIN
    UPDATE household_surveys
       SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
     WHERE survey_id = NEW.survey_id;
END;

CREATE TRIGGER IF NOT EXISTS household_measurements_touch_updated_at
AFTER UPDATE ON household_measurements FOR EACH ROW
WHEN NEW.updated_at IS OLD.updated_at
BEGIN
    UPDATE household_measurements
       SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
     WHERE measurement_id = NEW.measurement_id;
END;

-- ── Reporting view ──────────────────────────────────────────────────────────

-- One row per measurement with every dimension joined in.
CREATE VIEW IF NOT EXISTS household_progress AS
SELECT
    h.household_id,
    h.household_code,
    h.head_of_household,
    h.household_size,
    v.village_id,
    v.name          AS village_name,
    v.district,
    v.region,
    r.round_id,
    r.name          AS survey_round,
    s.survey_id,
    s.survey_date,
    s.surveyor,
    s.status        AS survey_status,
    i.indicator_id,
    i.category      AS indicator_category,
    i.name          AS indicator_name,
    i.unit          AS indicator_unit,
    i.target_value,
    i.is_positive,
    m.measurement_id,
    m.value         AS measurement_value,
    m.notes         AS measurement_notes,
    CASE
        WHEN i.target_value IS NULL OR i.target_value <= 0 THEN NULL
        WHEN i.is_positive THEN 100.0 * m.value / i.target_value
        WHEN m.value = 0 THEN NULL
        ELSE 100.0 * i.target_value / m.value
    END             AS progress_pct
FROM household_measurements m
JOIN household_surveys s ON s.survey_id    = m.survey_id
JOIN households        h ON h.household_id = s.household_id
JOIN villages          v ON v.village_id   = h.village_id
JOIN survey_rounds     r ON r.round_id     = s.round_id
JOIN indicators        i ON i.indicator_id = m.indicator_id;

CREATE INDEX IF NOT EXISTS households_village_idx     ON households(village_id);
CREATE INDEX IF NOT EXISTS surveys_round_idx          ON household_surveys(round_id);
CREATE INDEX IF NOT EXISTS surveys_date_idx           ON household_surveys(survey_date);
CREATE INDEX IF NOT EXISTS measurements_indicator_idx ON household_measurements(indicator_id);
CREATE INDEX IF NOT EXISTS lineage_hash_idx           ON data_lineage(hash_value);
CREATE INDEX IF NOT EXISTS change_log_lineage_idx     ON change_log(lineage_id);
CREATE INDEX IF NOT EXISTS quality_logs_created_idx   ON data_quality_logs(created_at);
CREATE INDEX IF NOT EXISTS metrics_log_idx            ON pipeline_metrics(log_id, metric_name);
CREATE INDEX IF NOT EXISTS alerts_status_idx          ON pipeline_alerts(status, severity);

PRAGMA user_version = 2;
";

/// Tables covered by the completeness check, in report order.
pub const COMPLETENESS_TABLES: [&str; 4] =
  ["households", "household_surveys", "household_measurements", "indicators"];
