//! Schema registry: versioned column definitions per survey round.
//!
//! Questionnaires drift between rounds. The registry records which columns a
//! round is expected to carry so incoming records can be validated and
//! rounds compared.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::record::{Cell, Record};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DataType {
  Varchar,
  Integer,
  Decimal,
  Boolean,
  Timestamp,
  Json,
}

impl DataType {
  /// Whether `cell` is acceptable for a column of this type. Missing cells
  /// always pass; requiredness is checked separately.
  pub fn accepts(self, cell: &Cell) -> bool {
    match (self, cell) {
      (_, Cell::Missing) => true,
      (Self::Varchar, Cell::Text(_)) => true,
      (Self::Integer, Cell::Integer(_)) => true,
      (Self::Decimal, Cell::Integer(_) | Cell::Decimal(_)) => true,
      (Self::Boolean, Cell::Boolean(_)) => true,
      (Self::Timestamp, Cell::Date(_)) => true,
      (Self::Json, Cell::Text(s)) => serde_json::from_str::<serde_json::Value>(s).is_ok(),
      _ => false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
  pub name:         String,
  pub data_type:    DataType,
  pub description:  String,
  /// When set, a present value must equal one of these.
  pub valid_values: Option<Vec<serde_json::Value>>,
  pub is_required:  bool,
  pub version:      i64,
}

impl ColumnDefinition {
  pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
    Self {
      name: name.into(),
      data_type,
      description: String::new(),
      valid_values: None,
      is_required: true,
      version: 1,
    }
  }
}

/// Validate `record` against the active definitions of a round and return
/// every problem found. An empty vector means the record is valid.
pub fn validate_record(schema: &[ColumnDefinition], record: &Record) -> Vec<String> {
  let mut errors = Vec::new();

  for column in schema {
    let Some(cell) = record.get(&column.name) else {
      if column.is_required {
        errors.push(format!("required column {} is missing", column.name));
      }
      continue;
    };

    if !column.data_type.accepts(cell) {
      errors.push(format!(
        "column {} has invalid type: expected {}, got {cell:?}",
        column.name, column.data_type
      ));
      continue;
    }

    if let Some(valid) = &column.valid_values
      && !cell.is_missing()
      && !valid.contains(&cell.to_json())
    {
      errors.push(format!(
        "column {} has invalid value {cell}: expected one of {}",
        column.name,
        serde_json::Value::from(valid.clone())
      ));
    }
  }

  errors
}

/// Column-level differences between two rounds' schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChanges {
  pub added:     Vec<String>,
  pub removed:   Vec<String>,
  pub modified:  Vec<String>,
  pub unchanged: Vec<String>,
}

/// Compare `current` against `previous`. A column is modified when its type
/// or its value list differs. Output lists are sorted by name.
pub fn diff(current: &[ColumnDefinition], previous: &[ColumnDefinition]) -> SchemaChanges {
  let current: BTreeMap<&str, &ColumnDefinition> =
    current.iter().map(|c| (c.name.as_str(), c)).collect();
  let previous: BTreeMap<&str, &ColumnDefinition> =
    previous.iter().map(|c| (c.name.as_str(), c)).collect();

  let mut changes = SchemaChanges::default();

  for (name, cur) in &current {
    match previous.get(name) {
      None => changes.added.push((*name).to_owned()),
      Some(prev)
        if prev.data_type != cur.data_type || prev.valid_values != cur.valid_values =>
      {
        changes.modified.push((*name).to_owned())
      }
      Some(_) => changes.unchanged.push((*name).to_owned()),
    }
  }
  changes.removed = previous
    .keys()
    .filter(|name| !current.contains_key(*name))
    .map(|name| (*name).to_owned())
    .collect();

  changes
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn record(pairs: &[(&str, Cell)]) -> Record {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
  }

  #[test]
  fn missing_required_column_is_reported() {
    let schema = [ColumnDefinition::new("hh_size", DataType::Integer)];
    let errors = validate_record(&schema, &Record::new());
    assert_eq!(errors, ["required column hh_size is missing"]);
  }

  #[test]
  fn optional_column_may_be_absent() {
    let mut def = ColumnDefinition::new("notes", DataType::Varchar);
    def.is_required = false;
    assert!(validate_record(&[def], &Record::new()).is_empty());
  }

  #[test]
  fn decimal_accepts_integers_but_integer_rejects_text() {
    let schema = [
      ColumnDefinition::new("income", DataType::Decimal),
      ColumnDefinition::new("hh_size", DataType::Integer),
    ];
    let rec = record(&[
      ("income", Cell::Integer(1200)),
      ("hh_size", Cell::Text("five".into())),
    ]);
    let errors = validate_record(&schema, &rec);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("column hh_size has invalid type"));
  }

  #[test]
  fn value_outside_valid_list_is_reported() {
    let mut def = ColumnDefinition::new("hhh_sex", DataType::Varchar);
    def.valid_values = Some(vec![json!("Male"), json!("Female")]);
    let ok = record(&[("hhh_sex", Cell::Text("Female".into()))]);
    let bad = record(&[("hhh_sex", Cell::Text("F".into()))]);
    assert!(validate_record(std::slice::from_ref(&def), &ok).is_empty());
    assert_eq!(validate_record(&[def], &bad).len(), 1);
  }

  #[test]
  fn json_type_requires_parseable_text() {
    assert!(DataType::Json.accepts(&Cell::Text("{\"a\":1}".into())));
    assert!(!DataType::Json.accepts(&Cell::Text("{a".into())));
  }

  #[test]
  fn data_type_parses_case_insensitively() {
    assert_eq!("decimal".parse::<DataType>().unwrap(), DataType::Decimal);
    assert_eq!(DataType::Timestamp.to_string(), "TIMESTAMP");
  }

  #[test]
  fn diff_classifies_columns() {
    let previous = [
      ColumnDefinition::new("hh_size", DataType::Integer),
      ColumnDefinition::new("income", DataType::Integer),
      ColumnDefinition::new("pre_vid", DataType::Varchar),
    ];
    let current = [
      ColumnDefinition::new("hh_size", DataType::Integer),
      ColumnDefinition::new("income", DataType::Decimal),
      ColumnDefinition::new("cereals_week", DataType::Decimal),
    ];
    let changes = diff(&current, &previous);
    assert_eq!(changes.added, ["cereals_week"]);
    assert_eq!(changes.removed, ["pre_vid"]);
    assert_eq!(changes.modified, ["income"]);
    assert_eq!(changes.unchanged, ["hh_size"]);
  }
}
