//! Typed cells of a survey record, shared by the ETL and the schema registry.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single value read from a survey file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
  Missing,
  Text(String),
  Integer(i64),
  Decimal(f64),
  Boolean(bool),
  Date(NaiveDate),
}

impl Cell {
  pub fn is_missing(&self) -> bool { matches!(self, Self::Missing) }

  /// Numeric view of the cell; integers widen to `f64`.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Integer(i) => Some(*i as f64),
      Self::Decimal(d) => Some(*d),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      Self::Decimal(d) if d.fract() == 0.0 => Some(*d as i64),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<NaiveDate> {
    match self {
      Self::Date(d) => Some(*d),
      _ => None,
    }
  }

  /// Text form of any present cell; `None` only for [`Cell::Missing`].
  pub fn as_text(&self) -> Option<String> {
    match self {
      Self::Missing => None,
      other => Some(other.to_string()),
    }
  }

  /// The cell as a JSON scalar, for comparison against registry value lists.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Self::Missing => serde_json::Value::Null,
      Self::Text(s) => serde_json::Value::from(s.as_str()),
      Self::Integer(i) => serde_json::Value::from(*i),
      Self::Decimal(d) => serde_json::Value::from(*d),
      Self::Boolean(b) => serde_json::Value::from(*b),
      Self::Date(d) => serde_json::Value::from(d.to_string()),
    }
  }
}

impl fmt::Display for Cell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Missing => Ok(()),
      Self::Text(s) => f.write_str(s),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Decimal(d) => write!(f, "{d}"),
      Self::Boolean(b) => write!(f, "{b}"),
      Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
    }
  }
}

/// One row of a survey file keyed by column name.
pub type Record = BTreeMap<String, Cell>;
