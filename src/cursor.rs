//! Client-side cursor: the token a driver handed out, the table whose
//! column slots hold the current row, and the per-column update flags.
//!
//! A cursor is `Open` from the moment a driver returns its token until
//! `Driver::close_cursor`; afterwards every accessor fails with
//! `CursorClosed` and the table is gone.

use crate::error::{DbmiError, DbmiResult};
use crate::schema::{Column, Table};
use crate::types::Value;
use std::fmt;
use std::ops::BitOr;

/// What the cursor was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Readonly,
    Insert,
    Update,
}

impl CursorKind {
    pub const fn code(self) -> i32 {
        match self {
            CursorKind::Readonly => 1,
            CursorKind::Insert => 2,
            CursorKind::Update => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(CursorKind::Readonly),
            2 => Some(CursorKind::Insert),
            3 => Some(CursorKind::Update),
            _ => None,
        }
    }
}

/// Cursor mode bits, orthogonal to the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorMode(i32);

impl CursorMode {
    pub const SEQUENTIAL: CursorMode = CursorMode(0x00);
    pub const SCROLL: CursorMode = CursorMode(0x01);
    pub const INSENSITIVE: CursorMode = CursorMode(0x04);

    pub const fn bits(self) -> i32 {
        self.0
    }

    pub const fn from_bits(bits: i32) -> Self {
        CursorMode(bits)
    }

    pub const fn contains(self, other: CursorMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CursorMode {
    type Output = CursorMode;

    fn bitor(self, rhs: CursorMode) -> CursorMode {
        CursorMode(self.0 | rhs.0)
    }
}

/// Fetch direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Next,
    Current,
    Previous,
    First,
    Last,
}

impl Position {
    pub const fn code(self) -> i32 {
        match self {
            Position::Next => 0,
            Position::Current => 1,
            Position::Previous => 2,
            Position::First => 3,
            Position::Last => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Position::Next),
            1 => Some(Position::Current),
            2 => Some(Position::Previous),
            3 => Some(Position::First),
            4 => Some(Position::Last),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Position::Next => "NEXT",
            Position::Current => "CURRENT",
            Position::Previous => "PREVIOUS",
            Position::First => "FIRST",
            Position::Last => "LAST",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Closed,
}

/// An open (or closed) cursor on one driver.
#[derive(Debug)]
pub struct Cursor {
    token: String,
    kind: CursorKind,
    mode: CursorMode,
    state: CursorState,
    table: Option<Table>,
    update_flags: Vec<bool>,
}

impl Cursor {
    pub(crate) fn open(token: String, kind: CursorKind, mode: CursorMode, table: Table) -> Self {
        let update_flags = vec![false; table.column_count()];
        Self {
            token,
            kind,
            mode,
            state: CursorState::Open,
            table: Some(table),
            update_flags,
        }
    }

    /// Drop the table and flags. Further use fails with `CursorClosed`.
    pub(crate) fn close(&mut self) {
        self.state = CursorState::Closed;
        self.table = None;
        self.update_flags = Vec::new();
    }

    pub(crate) fn ensure_open(&self) -> DbmiResult<()> {
        match self.state {
            CursorState::Open => Ok(()),
            CursorState::Closed => Err(DbmiError::CursorClosed),
        }
    }

    pub(crate) fn table_mut(&mut self) -> DbmiResult<&mut Table> {
        self.ensure_open()?;
        self.table.as_mut().ok_or(DbmiError::CursorClosed)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.state == CursorState::Open
    }

    pub fn is_readonly(&self) -> bool {
        self.kind == CursorKind::Readonly
    }

    pub fn table(&self) -> DbmiResult<&Table> {
        self.ensure_open()?;
        self.table.as_ref().ok_or(DbmiError::CursorClosed)
    }

    pub fn column_count(&self) -> DbmiResult<usize> {
        Ok(self.table()?.column_count())
    }

    pub fn column(&self, index: usize) -> DbmiResult<&Column> {
        self.table()?.column(index)
    }

    /// Value of column `index` in the current row.
    pub fn value(&self, index: usize) -> DbmiResult<&Value> {
        Ok(&self.column(index)?.value)
    }

    /// Case-insensitive lookup; returns the column's index too.
    pub fn column_by_name(&self, name: &str) -> DbmiResult<(usize, &Column)> {
        let table = self.table()?;
        table.find_column(name).ok_or_else(|| {
            DbmiError::Failed(format!("Column '{}' not found in cursor '{}'", name, self.token))
        })
    }

    /// Store a value for the next insert or update, checked against the
    /// column's host type.
    pub fn set_value(&mut self, index: usize, value: &Value) -> DbmiResult<()> {
        self.table_mut()?.column_mut(index)?.set_value(value)
    }

    fn flag_mut(&mut self, index: usize) -> DbmiResult<&mut bool> {
        self.ensure_open()?;
        let count = self.update_flags.len();
        self.update_flags
            .get_mut(index)
            .ok_or(DbmiError::ColumnOutOfRange { index, count })
    }

    pub fn set_column_for_update(&mut self, index: usize) -> DbmiResult<()> {
        *self.flag_mut(index)? = true;
        Ok(())
    }

    pub fn unset_column_for_update(&mut self, index: usize) -> DbmiResult<()> {
        *self.flag_mut(index)? = false;
        Ok(())
    }

    pub fn column_for_update(&self, index: usize) -> DbmiResult<bool> {
        self.ensure_open()?;
        let count = self.update_flags.len();
        self.update_flags
            .get(index)
            .copied()
            .ok_or(DbmiError::ColumnOutOfRange { index, count })
    }

    pub fn test_any_column_for_update(&self) -> bool {
        self.update_flags.iter().any(|&f| f)
    }

    /// Indices of the flagged columns, in column order.
    pub fn updated_columns(&self) -> Vec<usize> {
        self.update_flags
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| f.then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    fn update_cursor() -> Cursor {
        let table = Table::new(
            "rybniky",
            vec![
                Column::new("kapri", SqlType::Character),
                Column::new("pocet", SqlType::Integer),
                Column::new("hloubka", SqlType::DoublePrecision),
            ],
        );
        Cursor::open("c1".into(), CursorKind::Update, CursorMode::SEQUENTIAL, table)
    }

    #[test]
    fn test_update_flags() {
        let mut cursor = update_cursor();
        assert!(!cursor.test_any_column_for_update());

        cursor.set_column_for_update(0).unwrap();
        assert!(cursor.column_for_update(0).unwrap());
        assert!(cursor.test_any_column_for_update());
        assert_eq!(cursor.updated_columns(), vec![0]);

        cursor.unset_column_for_update(0).unwrap();
        assert!(!cursor.test_any_column_for_update());

        assert!(matches!(
            cursor.set_column_for_update(3),
            Err(DbmiError::ColumnOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_set_value_checks_type() {
        let mut cursor = update_cursor();
        cursor.set_value(1, &Value::Int(7)).unwrap();
        assert_eq!(cursor.value(1).unwrap(), &Value::Int(7));
        assert!(cursor.set_value(1, &Value::string("sedm")).is_err());
        assert!(cursor.set_value(2, &Value::Null).is_ok());
    }

    #[test]
    fn test_closed_cursor_rejects_access() {
        let mut cursor = update_cursor();
        cursor.set_column_for_update(2).unwrap();
        cursor.close();
        assert!(!cursor.is_open());
        assert!(matches!(cursor.table(), Err(DbmiError::CursorClosed)));
        assert!(matches!(cursor.value(0), Err(DbmiError::CursorClosed)));
        assert!(matches!(
            cursor.set_column_for_update(0),
            Err(DbmiError::CursorClosed)
        ));
        assert!(!cursor.test_any_column_for_update());
    }

    #[test]
    fn test_column_by_name() {
        let cursor = update_cursor();
        assert_eq!(cursor.column_by_name("POCET").unwrap().0, 1);
        assert!(cursor.column_by_name("lin").is_err());
    }

    #[test]
    fn test_mode_bits() {
        let mode = CursorMode::SCROLL | CursorMode::INSENSITIVE;
        assert_eq!(mode.bits(), 5);
        assert!(mode.contains(CursorMode::SCROLL));
        assert!(!CursorMode::SEQUENTIAL.contains(CursorMode::SCROLL));
        assert_eq!(Position::from_code(Position::Last.code()), Some(Position::Last));
        assert_eq!(CursorKind::from_code(3), Some(CursorKind::Update));
    }
}
