//! Table descriptor.

use super::Column;
use crate::error::{DbmiError, DbmiResult};
use crate::types::Value;

/// SELECT privilege bit for `grant_on_table`.
pub const PRIV_SELECT: i32 = 0x01;
/// Grant to the owner's group.
pub const GRANT_GROUP: i32 = 0x01;
/// Grant to everybody.
pub const GRANT_PUBLIC: i32 = 0x02;

/// A table: name, ordered columns and privileges.
///
/// The column list of a described table never changes size; only the DDL
/// helpers used by backends edit it.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub description: String,
    columns: Vec<Column>,
    pub insert_granted: bool,
    pub delete_granted: bool,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            columns,
            insert_granted: true,
            delete_granted: true,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> DbmiResult<&Column> {
        let count = self.columns.len();
        self.columns
            .get(index)
            .ok_or(DbmiError::ColumnOutOfRange { index, count })
    }

    pub fn column_mut(&mut self, index: usize) -> DbmiResult<&mut Column> {
        let count = self.columns.len();
        self.columns
            .get_mut(index)
            .ok_or(DbmiError::ColumnOutOfRange { index, count })
    }

    /// Case-insensitive lookup by name.
    pub fn find_column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values currently held in the column slots.
    pub fn row(&self) -> Vec<Value> {
        self.columns.iter().map(|c| c.value.clone()).collect()
    }

    /// Refill every column slot from `values`, type-checking each one.
    pub fn fill_row(&mut self, values: &[Value]) -> DbmiResult<()> {
        if values.len() != self.columns.len() {
            return Err(DbmiError::Failed(format!(
                "Row has {} values, table '{}' has {} columns",
                values.len(),
                self.name,
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.set_value(value)?;
        }
        Ok(())
    }

    /// Reset every column slot to null.
    pub fn clear_row(&mut self) {
        for column in &mut self.columns {
            column.value = Value::Null;
        }
    }

    /// Append a column (ALTER TABLE ADD COLUMN in a backend).
    pub fn add_column(&mut self, column: Column) -> DbmiResult<()> {
        if self.find_column(&column.name).is_some() {
            return Err(DbmiError::Failed(format!(
                "Column '{}' already exists in table '{}'",
                column.name, self.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove a column by name (ALTER TABLE DROP COLUMN in a backend),
    /// returning its former position.
    pub fn drop_column(&mut self, name: &str) -> DbmiResult<usize> {
        let (index, _) = self.find_column(name).ok_or_else(|| {
            DbmiError::Failed(format!("Column '{}' not found in table '{}'", name, self.name))
        })?;
        self.columns.remove(index);
        Ok(index)
    }
}
