//! Column-ordered table of JSON cells.
//!
//! Used both for filtered layout selections and for tabular artifacts returned
//! by the TSV/CSV handlers. Missing cells are stored as `Value::Null` so every
//! row carries every column.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<BTreeMap<String, Value>>,
}

impl Table {
    /// Empty table with a fixed header.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for column in columns {
            table.add_column(column.into());
        }
        table
    }

    /// Build a table from JSON objects; columns are added as they first appear.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut table = Table::default();
        for record in records {
            table.push_row(record.clone().into_iter());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[BTreeMap<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// Append a row. Unknown columns are added to the header and back-filled
    /// with null in earlier rows.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut row = BTreeMap::new();
        for (name, value) in cells {
            let name = name.into();
            self.add_column(name.clone());
            row.insert(name, value);
        }
        for column in &self.columns {
            row.entry(column.clone()).or_insert(Value::Null);
        }
        self.rows.push(row);
    }

    /// Iterate one column's cells in row order.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(name).unwrap_or(&NULL))
    }

    /// Set `name` to `value` on every row, adding the column if needed.
    pub fn set_constant(&mut self, name: &str, value: Value) {
        self.add_column(name.to_string());
        for row in &mut self.rows {
            row.insert(name.to_string(), value.clone());
        }
    }

    /// Rewrite every cell of an existing column in place.
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        if !self.has_column(name) {
            return;
        }
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(name) {
                *cell = f(cell);
            }
        }
    }

    /// Remove every column whose cells are all null.
    pub fn drop_empty_columns(&mut self) {
        let rows = &self.rows;
        let empty: Vec<String> = self
            .columns
            .iter()
            .filter(|column| {
                rows.iter()
                    .all(|row| row.get(column.as_str()).is_none_or(Value::is_null))
            })
            .cloned()
            .collect();
        if empty.is_empty() {
            return;
        }
        self.columns.retain(|column| !empty.contains(column));
        for row in &mut self.rows {
            for column in &empty {
                row.remove(column);
            }
        }
    }

    fn add_column(&mut self, name: String) {
        if self.has_column(&name) {
            return;
        }
        for row in &mut self.rows {
            row.insert(name.clone(), Value::Null);
        }
        self.columns.push(name);
    }
}
