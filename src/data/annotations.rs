//! Auxiliary metadata tables for cells and characters.
//!
//! Values are categorical or numeric; absent entries are `None`. The cell
//! table follows the live leaf set across topology mutations: removed leaves
//! lose their row, new leaves start with a row of nulls.

use std::collections::HashMap;

/// One metadata value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MetaValue {
    Numeric(f64),
    Categorical(String),
}

/// Named rows by named columns of optional metadata values.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationTable {
    columns: Vec<String>,
    rows: HashMap<String, Vec<Option<MetaValue>>>,
    order: Vec<String>,
}

impl AnnotationTable {
    /// An empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row names in insertion order.
    pub fn row_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// True iff `row` exists.
    #[inline]
    pub fn contains(&self, row: &str) -> bool {
        self.rows.contains_key(row)
    }

    /// One cell of the table; `None` if the row is absent or the entry null.
    pub fn get(&self, row: &str, column: &str) -> Option<&MetaValue> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)?.as_ref()
    }

    /// Set one cell, creating a null-filled row if needed.
    pub fn set(&mut self, row: impl Into<String>, column: &str, value: MetaValue) {
        let Some(col) = self.columns.iter().position(|c| c == column) else {
            return;
        };
        let row = row.into();
        let width = self.columns.len();
        let entry = self.rows.entry(row.clone()).or_insert_with(|| {
            self.order.push(row);
            vec![None; width]
        });
        entry[col] = Some(value);
    }

    /// Insert a null-filled row if `row` is not yet present.
    pub fn add_null_row(&mut self, row: impl Into<String>) {
        let row = row.into();
        if !self.rows.contains_key(&row) {
            self.order.push(row.clone());
            self.rows.insert(row, vec![None; self.columns.len()]);
        }
    }

    /// Remove a row, if present.
    pub fn drop_row(&mut self, row: &str) {
        if self.rows.remove(row).is_some() {
            self.order.retain(|name| name.as_str() != row);
        }
    }
}
