//! Content fingerprints used to recognise files that were already ingested.

use sha2::{Digest as _, Sha256};

use crate::table::Table;

/// SHA-256 hex digest of a table's contents.
///
/// Columns are sorted by name first, so two exports that differ only in
/// column order hash identically. Row order is significant.
pub fn content_hash(table: &Table) -> String {
  let mut order: Vec<usize> = (0..table.columns.len()).collect();
  order.sort_by(|a, b| table.columns[*a].cmp(&table.columns[*b]));

  let mut hasher = Sha256::new();
  let header: Vec<&str> = order.iter().map(|i| table.columns[*i].as_str()).collect();
  hasher.update(header.join(",").as_bytes());
  hasher.update(b"\n");

  for row in &table.rows {
    let line: Vec<String> = order.iter().map(|i| row[*i].to_string()).collect();
    hasher.update(line.join(",").as_bytes());
    hasher.update(b"\n");
  }

  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use rtv_core::record::Cell;

  use super::*;

  fn table(columns: [&str; 2], rows: &[[Cell; 2]]) -> Table {
    let mut t = Table::new(columns.map(String::from).to_vec());
    for row in rows {
      t.push_row(row.to_vec());
    }
    t
  }

  #[test]
  fn column_order_does_not_change_the_hash() {
    let a = table(["a", "b"], &[[Cell::Integer(1), Cell::Text("x".into())]]);
    let b = table(["b", "a"], &[[Cell::Text("x".into()), Cell::Integer(1)]]);
    assert_eq!(content_hash(&a), content_hash(&b));
  }

  #[test]
  fn values_change_the_hash() {
    let a = table(["a", "b"], &[[Cell::Integer(1), Cell::Integer(2)]]);
    let b = table(["a", "b"], &[[Cell::Integer(1), Cell::Integer(3)]]);
    let digest = content_hash(&a);
    assert_ne!(digest, content_hash(&b));
    assert_eq!(digest.len(), 64);
  }
}
