//! In-memory backend.
//!
//! Understands just enough SQL to drive cursors:
//! `SELECT <* | col, ...> FROM <table> [WHERE <col> = <literal>]`.
//! Everything else passed to `execute_immediate` is recorded, not run.

use super::Backend;
use crate::cursor::{CursorKind, CursorMode, Position};
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::Procedure;
use crate::schema::{Column, Handle, Index, Table};
use crate::types::{SqlType, Value};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

fn failed(message: String) -> DbmiError {
    DbmiError::Failed(message)
}

fn stale(table: &str) -> DbmiError {
    failed(format!(
        "Columns of table '{}' changed while the cursor was open",
        table
    ))
}

/// Table definition plus rows; deleted rows leave a hole so cursor row
/// numbers stay valid.
#[derive(Debug, Clone)]
struct MemoryTable {
    table: Table,
    rows: Vec<Option<Vec<Value>>>,
    /// Changes whenever columns are added or dropped.
    layout: u64,
}

impl MemoryTable {
    fn live_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    fn check_row(&self, row: &[Value]) -> DbmiResult<()> {
        if row.len() != self.table.column_count() {
            return Err(failed(format!(
                "Row has {} values, table '{}' has {} columns",
                row.len(),
                self.table.name,
                self.table.column_count()
            )));
        }
        for (column, value) in self.table.columns().iter().zip(row) {
            value.check_type(column.host_type)?;
            if value.is_null() && !column.null_allowed {
                return Err(failed(format!("Column '{}' cannot be null", column.name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryDatabase {
    tables: BTreeMap<String, MemoryTable>,
    indexes: Vec<Index>,
}

/// Parsed `SELECT`.
#[derive(Debug, PartialEq)]
struct Select {
    columns: Option<Vec<String>>,
    table: String,
    filter: Option<(String, String)>,
}

fn parse_select(sql: &str) -> DbmiResult<Select> {
    let sql = sql.trim().trim_end_matches(';');
    // ASCII lowercasing keeps byte offsets valid for `sql`.
    let lower = sql.to_ascii_lowercase();
    let bad = || failed(format!("Unsupported statement: {}", sql));

    if !lower.starts_with("select ") {
        return Err(bad());
    }
    let from = lower[6..]
        .find(" from ")
        .map(|i| i + 6)
        .ok_or_else(bad)?;
    let list = sql.get("select ".len()..from).unwrap_or("").trim();
    if list.is_empty() {
        return Err(bad());
    }
    let columns = if list == "*" {
        None
    } else {
        Some(
            list.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    };

    let rest = &sql[from + " from ".len()..];
    let rest_lower = &lower[from + " from ".len()..];
    let (table, filter) = match rest_lower.find(" where ") {
        Some(w) => {
            let cond = &rest[w + " where ".len()..];
            let (lhs, rhs) = cond.split_once('=').ok_or_else(bad)?;
            let column = lhs.trim();
            if column.is_empty() || column.contains(char::is_whitespace) {
                return Err(bad());
            }
            let literal = rhs.trim();
            let literal = match literal
                .strip_prefix('\'')
                .and_then(|l| l.strip_suffix('\''))
            {
                Some(quoted) if !quoted.replace("''", "").contains('\'') => {
                    quoted.replace("''", "'")
                }
                Some(_) => return Err(bad()),
                // Anything after an unquoted literal is a second condition.
                None if literal.is_empty()
                    || literal.contains(char::is_whitespace)
                    || literal.contains('\'') =>
                {
                    return Err(bad());
                }
                None => literal.to_string(),
            };
            (&rest[..w], Some((column.to_string(), literal)))
        }
        None => (rest, None),
    };
    let table = table.trim();
    if table.is_empty() || table.contains(char::is_whitespace) {
        return Err(bad());
    }
    Ok(Select {
        columns,
        table: table.to_string(),
        filter,
    })
}

/// Cursor over a `MemoryTable`.
#[derive(Debug)]
pub struct MemoryCursor {
    kind: CursorKind,
    table: String,
    /// Table column index of each cursor column.
    projection: Vec<usize>,
    /// Table row numbers matched when the cursor was opened.
    rows: Vec<usize>,
    /// Index into `rows` of the current row.
    position: Option<usize>,
    /// Table layout the projection was computed against.
    layout: u64,
}

/// Backend keeping every database in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    databases: BTreeMap<String, MemoryDatabase>,
    open: Option<String>,
    disabled: HashSet<Procedure>,
    in_transaction: bool,
    executed: Vec<String>,
    grants: Vec<(String, i32, i32)>,
    layouts: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed databases from a fixture.
    pub fn from_fixture(fixture: &Fixture) -> DbmiResult<Self> {
        let mut backend = Self::new();
        for db in &fixture.database {
            let mut tables = Vec::with_capacity(db.table.len());
            for t in &db.table {
                tables.push(t.build()?);
            }
            backend.add_database(&db.name, tables);
        }
        Ok(backend)
    }

    /// Add (or replace) a database holding `tables`.
    pub fn add_database(&mut self, name: &str, tables: Vec<(Table, Vec<Vec<Value>>)>) {
        let mut db = MemoryDatabase::default();
        for (table, rows) in tables {
            let layout = self.next_layout();
            db.tables.insert(
                table.name.clone(),
                MemoryTable {
                    table,
                    rows: rows.into_iter().map(Some).collect(),
                    layout,
                },
            );
        }
        self.databases.insert(name.to_string(), db);
    }

    /// Answer `procedure` with NOPROC from now on.
    pub fn disable(&mut self, procedure: Procedure) {
        self.disabled.insert(procedure);
    }

    /// Statements passed to `execute_immediate`, oldest first.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Recorded grants as `(table, privileges, to)`.
    pub fn grants(&self) -> &[(String, i32, i32)] {
        &self.grants
    }

    /// Live rows of `table` in the database `database`.
    pub fn rows(&self, database: &str, table: &str) -> Option<Vec<Vec<Value>>> {
        let t = self.databases.get(database)?.tables.get(table)?;
        Some(t.rows.iter().flatten().cloned().collect())
    }

    fn next_layout(&mut self) -> u64 {
        self.layouts += 1;
        self.layouts
    }

    fn db(&self) -> DbmiResult<&MemoryDatabase> {
        self.open
            .as_ref()
            .and_then(|name| self.databases.get(name))
            .ok_or(DbmiError::DatabaseNotOpen)
    }

    fn db_mut(&mut self) -> DbmiResult<&mut MemoryDatabase> {
        let name = self.open.as_ref().ok_or(DbmiError::DatabaseNotOpen)?;
        self.databases
            .get_mut(name)
            .ok_or(DbmiError::DatabaseNotOpen)
    }

    fn table(&self, name: &str) -> DbmiResult<&MemoryTable> {
        self.db()?
            .tables
            .get(name)
            .ok_or_else(|| failed(format!("Table '{}' not found", name)))
    }

    fn table_mut(&mut self, name: &str) -> DbmiResult<&mut MemoryTable> {
        self.db_mut()?
            .tables
            .get_mut(name)
            .ok_or_else(|| failed(format!("Table '{}' not found", name)))
    }

    /// Table under `cursor`. Fails once columns were added or dropped
    /// after the cursor was opened.
    fn cursor_table(&self, cursor: &MemoryCursor) -> DbmiResult<&MemoryTable> {
        let source = self.table(&cursor.table)?;
        if source.layout != cursor.layout {
            return Err(stale(&cursor.table));
        }
        Ok(source)
    }

    fn cursor_table_mut(&mut self, cursor: &MemoryCursor) -> DbmiResult<&mut MemoryTable> {
        let target = self.table_mut(&cursor.table)?;
        if target.layout != cursor.layout {
            return Err(stale(&cursor.table));
        }
        Ok(target)
    }

    fn open_cursor(
        &self,
        kind: CursorKind,
        table_name: &str,
        select: &Select,
    ) -> DbmiResult<(Table, MemoryCursor)> {
        let source = self.table(table_name)?;
        let def = &source.table;

        let projection: Vec<usize> = match &select.columns {
            None => (0..def.column_count()).collect(),
            Some(names) => names
                .iter()
                .map(|n| {
                    def.find_column(n)
                        .map(|(i, _)| i)
                        .ok_or_else(|| failed(format!("Column '{}' not found in '{}'", n, def.name)))
                })
                .collect::<DbmiResult<_>>()?,
        };

        let filter = match &select.filter {
            Some((name, literal)) => {
                let (i, column) = def
                    .find_column(name)
                    .ok_or_else(|| failed(format!("Column '{}' not found in '{}'", name, def.name)))?;
                Some((i, Value::from_text(literal, column.sql_type)?))
            }
            None => None,
        };

        let rows = source
            .rows
            .iter()
            .enumerate()
            .filter_map(|(n, row)| {
                let row = row.as_ref()?;
                match &filter {
                    Some((i, wanted)) if row.get(*i) != Some(wanted) => None,
                    _ => Some(n),
                }
            })
            .collect();

        let mut columns: Vec<Column> = projection
            .iter()
            .map(|&i| def.columns()[i].clone())
            .collect();
        for column in &mut columns {
            column.value = Value::Null;
            column.update = kind == CursorKind::Update;
        }
        let mut result = Table::new(def.name.clone(), columns).description(def.description.clone());
        result.insert_granted = def.insert_granted;
        result.delete_granted = def.delete_granted;

        let cursor = MemoryCursor {
            kind,
            table: def.name.clone(),
            projection,
            rows,
            position: None,
            layout: source.layout,
        };
        Ok((result, cursor))
    }

    /// Table row number under the cursor, if that row still exists.
    fn current_row(&self, cursor: &MemoryCursor) -> DbmiResult<usize> {
        let n = cursor
            .position
            .and_then(|p| cursor.rows.get(p).copied())
            .ok_or_else(|| failed("Cursor is not positioned on a row".to_string()))?;
        match self.table(&cursor.table)?.rows.get(n) {
            Some(Some(_)) => Ok(n),
            _ => Err(failed("Current row was deleted".to_string())),
        }
    }
}

impl Backend for MemoryBackend {
    type Cursor = MemoryCursor;

    fn supports(&self, procedure: Procedure) -> bool {
        !self.disabled.contains(&procedure)
    }

    fn open_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        if !self.databases.contains_key(&handle.name) {
            return Err(failed(format!("Database '{}' not found", handle.name)));
        }
        self.open = Some(handle.name.clone());
        Ok(())
    }

    fn close_database(&mut self) -> DbmiResult<()> {
        self.open = None;
        self.in_transaction = false;
        Ok(())
    }

    fn create_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        if self.databases.contains_key(&handle.name) {
            return Err(failed(format!("Database '{}' already exists", handle.name)));
        }
        self.databases
            .insert(handle.name.clone(), MemoryDatabase::default());
        Ok(())
    }

    fn delete_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        if self.open.as_deref() == Some(handle.name.as_str()) {
            return Err(failed(format!("Database '{}' is open", handle.name)));
        }
        self.databases
            .remove(&handle.name)
            .map(|_| ())
            .ok_or_else(|| failed(format!("Database '{}' not found", handle.name)))
    }

    fn find_database(&mut self, handle: &Handle) -> DbmiResult<Option<Handle>> {
        Ok(self
            .databases
            .contains_key(&handle.name)
            .then(|| handle.clone()))
    }

    fn list_databases(&mut self, _paths: &[String]) -> DbmiResult<Vec<Handle>> {
        Ok(self.databases.keys().map(Handle::new).collect())
    }

    fn open_select_cursor(
        &mut self,
        sql: &str,
        _mode: CursorMode,
    ) -> DbmiResult<(Table, MemoryCursor)> {
        let select = parse_select(sql)?;
        debug!("memory select on '{}'", select.table);
        self.open_cursor(CursorKind::Readonly, &select.table, &select)
    }

    fn open_update_cursor(
        &mut self,
        table: &str,
        sql: &str,
        _mode: CursorMode,
    ) -> DbmiResult<(Table, MemoryCursor)> {
        let select = if sql.trim().is_empty() {
            Select {
                columns: None,
                table: table.to_string(),
                filter: None,
            }
        } else {
            parse_select(sql)?
        };
        if !select.table.eq_ignore_ascii_case(table) {
            return Err(failed(format!(
                "Update cursor on '{}' selects from '{}'",
                table, select.table
            )));
        }
        self.open_cursor(CursorKind::Update, table, &select)
    }

    fn open_insert_cursor(&mut self, table: &Table, _mode: CursorMode) -> DbmiResult<MemoryCursor> {
        let source = self.table(&table.name)?;
        let target = &source.table;
        let projection = table
            .columns()
            .iter()
            .map(|c| {
                target
                    .find_column(&c.name)
                    .map(|(i, _)| i)
                    .ok_or_else(|| failed(format!("Column '{}' not found in '{}'", c.name, target.name)))
            })
            .collect::<DbmiResult<_>>()?;
        Ok(MemoryCursor {
            kind: CursorKind::Insert,
            table: table.name.clone(),
            projection,
            rows: Vec::new(),
            position: None,
            layout: source.layout,
        })
    }

    fn fetch(
        &mut self,
        cursor: &mut MemoryCursor,
        position: Position,
    ) -> DbmiResult<Option<Vec<Value>>> {
        let source = self.cursor_table(cursor)?;
        let len = cursor.rows.len();
        // Rows deleted since the cursor was opened are skipped.
        let live = |p: usize| matches!(source.rows.get(cursor.rows[p]), Some(Some(_)));

        let found = match position {
            Position::Next => {
                let start = cursor.position.map_or(0, |p| p + 1);
                (start..len).find(|&p| live(p))
            }
            Position::Previous => {
                let end = cursor.position.unwrap_or(0).min(len);
                (0..end).rev().find(|&p| live(p))
            }
            Position::First => (0..len).find(|&p| live(p)),
            Position::Last => (0..len).rev().find(|&p| live(p)),
            Position::Current => cursor.position.filter(|&p| p < len && live(p)),
        };

        match found {
            Some(p) => {
                cursor.position = Some(p);
                let row = source.rows[cursor.rows[p]].as_ref().ok_or_else(|| {
                    failed("Current row was deleted".to_string())
                })?;
                let values = cursor
                    .projection
                    .iter()
                    .map(|&i| row.get(i).cloned().ok_or_else(|| stale(&cursor.table)))
                    .collect::<DbmiResult<_>>()?;
                Ok(Some(values))
            }
            None => {
                if position == Position::Next {
                    cursor.position = Some(len);
                }
                Ok(None)
            }
        }
    }

    fn num_rows(&mut self, cursor: &MemoryCursor) -> DbmiResult<i32> {
        let source = self.table(&cursor.table)?;
        let n = cursor
            .rows
            .iter()
            .filter(|&&n| matches!(source.rows.get(n), Some(Some(_))))
            .count();
        i32::try_from(n).map_err(|_| failed(format!("{} rows", n)))
    }

    fn insert(&mut self, cursor: &mut MemoryCursor, row: &[Value]) -> DbmiResult<()> {
        let target = self.cursor_table_mut(cursor)?;
        let mut full: Vec<Value> = target
            .table
            .columns()
            .iter()
            .map(|c| c.default_value.clone().unwrap_or_default())
            .collect();
        if row.len() != cursor.projection.len() {
            return Err(failed(format!(
                "Insert of {} values into a cursor of {} columns",
                row.len(),
                cursor.projection.len()
            )));
        }
        for (&i, value) in cursor.projection.iter().zip(row) {
            full[i] = value.clone();
        }
        target.check_row(&full)?;
        target.rows.push(Some(full));
        Ok(())
    }

    fn update(
        &mut self,
        cursor: &mut MemoryCursor,
        row: &[Value],
        columns: &[usize],
    ) -> DbmiResult<()> {
        let n = self.current_row(cursor)?;
        let target = self.cursor_table_mut(cursor)?;
        let mut updated = target.rows[n].clone().unwrap_or_default();
        for &c in columns {
            let (Some(&i), Some(value)) = (cursor.projection.get(c), row.get(c)) else {
                return Err(DbmiError::ColumnOutOfRange {
                    index: c,
                    count: cursor.projection.len(),
                });
            };
            updated[i] = value.clone();
        }
        target.check_row(&updated)?;
        target.rows[n] = Some(updated);
        Ok(())
    }

    fn delete(&mut self, cursor: &mut MemoryCursor) -> DbmiResult<()> {
        let n = self.current_row(cursor)?;
        self.table_mut(&cursor.table)?.rows[n] = None;
        Ok(())
    }

    fn close_cursor(&mut self, cursor: MemoryCursor) -> DbmiResult<()> {
        debug!("memory {:?} cursor on '{}' closed", cursor.kind, cursor.table);
        Ok(())
    }

    fn execute_immediate(&mut self, sql: &str) -> DbmiResult<()> {
        self.db()?;
        self.executed.push(sql.to_string());
        Ok(())
    }

    fn begin_transaction(&mut self) -> DbmiResult<()> {
        if self.in_transaction {
            return Err(failed("Transaction already in progress".to_string()));
        }
        self.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> DbmiResult<()> {
        if !self.in_transaction {
            return Err(failed("No transaction in progress".to_string()));
        }
        self.in_transaction = false;
        Ok(())
    }

    fn create_table(&mut self, table: &Table) -> DbmiResult<()> {
        let layout = self.next_layout();
        let db = self.db_mut()?;
        if db.tables.contains_key(&table.name) {
            return Err(failed(format!("Table '{}' already exists", table.name)));
        }
        let mut def = table.clone();
        def.clear_row();
        db.tables.insert(
            def.name.clone(),
            MemoryTable {
                table: def,
                rows: Vec::new(),
                layout,
            },
        );
        Ok(())
    }

    fn describe_table(&mut self, name: &str) -> DbmiResult<Table> {
        Ok(self.table(name)?.table.clone())
    }

    fn drop_table(&mut self, name: &str) -> DbmiResult<()> {
        let db = self.db_mut()?;
        db.tables
            .remove(name)
            .ok_or_else(|| failed(format!("Table '{}' not found", name)))?;
        db.indexes.retain(|i| i.table_name != name);
        Ok(())
    }

    fn list_tables(&mut self, _system: bool) -> DbmiResult<Vec<String>> {
        Ok(self.db()?.tables.keys().cloned().collect())
    }

    fn add_column(&mut self, table: &str, column: &Column) -> DbmiResult<()> {
        let layout = self.next_layout();
        let target = self.table_mut(table)?;
        let mut column = column.clone();
        column.value = Value::Null;
        let fill = column.default_value.clone().unwrap_or_default();
        if fill.is_null() && !column.null_allowed && target.live_rows() > 0 {
            return Err(failed(format!(
                "Column '{}' cannot be null and has no default",
                column.name
            )));
        }
        target.table.add_column(column)?;
        for row in target.rows.iter_mut().flatten() {
            row.push(fill.clone());
        }
        target.layout = layout;
        Ok(())
    }

    fn drop_column(&mut self, table: &str, column: &str) -> DbmiResult<()> {
        let layout = self.next_layout();
        let target = self.table_mut(table)?;
        let index = target.table.drop_column(column)?;
        target.layout = layout;
        for row in target.rows.iter_mut().flatten() {
            row.remove(index);
        }
        Ok(())
    }

    fn grant_on_table(&mut self, table: &str, privileges: i32, to: i32) -> DbmiResult<()> {
        self.table(table)?;
        self.grants.push((table.to_string(), privileges, to));
        Ok(())
    }

    fn create_index(&mut self, index: &Index) -> DbmiResult<String> {
        let def = &self.table(&index.table_name)?.table;
        if index.columns.is_empty() {
            return Err(failed("Index has no columns".to_string()));
        }
        if let Some(missing) = index.columns.iter().find(|c| def.find_column(c).is_none()) {
            return Err(failed(format!(
                "Column '{}' not found in '{}'",
                missing, def.name
            )));
        }
        let mut index = index.clone();
        if index.name.is_empty() {
            index.name = index.default_name();
        }
        let db = self.db_mut()?;
        if db.indexes.iter().any(|i| i.name == index.name) {
            return Err(failed(format!("Index '{}' already exists", index.name)));
        }
        let name = index.name.clone();
        db.indexes.push(index);
        Ok(name)
    }

    fn list_indexes(&mut self, table: &str) -> DbmiResult<Vec<Index>> {
        self.table(table)?;
        Ok(self
            .db()?
            .indexes
            .iter()
            .filter(|i| i.table_name == table)
            .cloned()
            .collect())
    }

    fn drop_index(&mut self, name: &str) -> DbmiResult<()> {
        let db = self.db_mut()?;
        let before = db.indexes.len();
        db.indexes.retain(|i| i.name != name);
        if db.indexes.len() == before {
            return Err(failed(format!("Index '{}' not found", name)));
        }
        Ok(())
    }
}

/// Databases to seed a `MemoryBackend` with, usually read from TOML:
///
/// ```toml
/// [[database]]
/// name = "gis"
///
/// [[database.table]]
/// name = "rybniky"
/// columns = [
///     { name = "kapri", type = "varchar", length = 20 },
///     { name = "pocet", type = "integer" },
/// ]
/// rows = [["hodne", 12], ["malo", {}]]
/// ```
///
/// An empty inline table (`{}`) stands for null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub database: Vec<FixtureDatabase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDatabase {
    pub name: String,
    #[serde(default)]
    pub table: Vec<FixtureTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTable {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub columns: Vec<FixtureColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<toml::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub length: i32,
    #[serde(default)]
    pub not_null: bool,
}

impl Fixture {
    pub fn parse(text: &str) -> DbmiResult<Self> {
        toml::from_str(text).map_err(|e| DbmiError::Config(format!("invalid fixture: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> DbmiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbmiError::Config(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }
}

impl FixtureTable {
    fn build(&self) -> DbmiResult<(Table, Vec<Vec<Value>>)> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let sql_type = SqlType::from_name(&c.sql_type).ok_or_else(|| {
                    DbmiError::Config(format!("unknown SQL type '{}' for '{}'", c.sql_type, c.name))
                })?;
                let mut column = Column::new(c.name.clone(), sql_type).length(c.length);
                if c.not_null {
                    column = column.not_null();
                }
                Ok(column)
            })
            .collect::<DbmiResult<Vec<_>>>()?;
        let table = Table::new(self.name.clone(), columns).description(self.description.clone());

        let mut rows = Vec::with_capacity(self.rows.len());
        for (n, raw) in self.rows.iter().enumerate() {
            if raw.len() != table.column_count() {
                return Err(DbmiError::Config(format!(
                    "row {} of '{}' has {} values, expected {}",
                    n + 1,
                    self.name,
                    raw.len(),
                    table.column_count()
                )));
            }
            let row = table
                .columns()
                .iter()
                .zip(raw)
                .map(|(column, v)| fixture_value(v, column.sql_type))
                .collect::<DbmiResult<Vec<_>>>()?;
            rows.push(row);
        }
        Ok((table, rows))
    }
}

fn fixture_value(v: &toml::Value, sql_type: SqlType) -> DbmiResult<Value> {
    let value = match v {
        toml::Value::Table(t) if t.is_empty() => Value::Null,
        toml::Value::String(s) => Value::from_text(s, sql_type)?,
        toml::Value::Integer(n) => Value::from_text(&n.to_string(), sql_type)?,
        toml::Value::Float(d) => Value::from_text(&d.to_string(), sql_type)?,
        toml::Value::Boolean(b) => Value::from_text(if *b { "1" } else { "0" }, sql_type)?,
        toml::Value::Datetime(dt) => Value::from_text(&dt.to_string().replace('T', " "), sql_type)?,
        other => {
            return Err(DbmiError::Config(format!(
                "unsupported fixture value {}",
                other
            )));
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = r#"
[[database]]
name = "gis"

[[database.table]]
name = "rybniky"
columns = [
    { name = "cat", type = "integer" },
    { name = "kapri", type = "varchar", length = 20 },
    { name = "pocet", type = "integer" },
]
rows = [[1, "hodne", 12], [2, "malo", 1], [3, "hodne", {}]]
"#;

    fn backend() -> MemoryBackend {
        let fixture = Fixture::parse(FIXTURE).unwrap();
        let mut backend = MemoryBackend::from_fixture(&fixture).unwrap();
        backend.open_database(&Handle::new("gis")).unwrap();
        backend
    }

    fn drain(backend: &mut MemoryBackend, cursor: &mut MemoryCursor) -> Vec<Vec<Value>> {
        let mut rows = Vec::new();
        while let Some(row) = backend.fetch(cursor, Position::Next).unwrap() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_parse_select() {
        let select = parse_select("select * from rybniky where kapri = 'it''s'").unwrap();
        assert_eq!(select.columns, None);
        assert_eq!(select.table, "rybniky");
        assert_eq!(
            select.filter,
            Some(("kapri".to_string(), "it's".to_string()))
        );

        let select = parse_select("SELECT cat, pocet FROM rybniky;").unwrap();
        assert_eq!(
            select.columns,
            Some(vec!["cat".to_string(), "pocet".to_string()])
        );
        assert_eq!(select.filter, None);

        assert!(parse_select("DELETE FROM rybniky").is_err());
        assert!(parse_select("select from rybniky").is_err());
        assert!(parse_select("SELECT * FROM a b").is_err());
    }

    #[test]
    fn test_single_condition_only() {
        let select = parse_select("select * from rybniky where cat = 2").unwrap();
        assert_eq!(select.filter, Some(("cat".to_string(), "2".to_string())));

        for sql in [
            "select * from rybniky where kapri = 'hodne' and cat = 1",
            "select * from rybniky where cat = 1 and kapri = 'hodne'",
            "select * from rybniky where kapri = 'a' or kapri = 'b'",
            "select * from rybniky where cat = 1 or cat = 2",
            "select * from rybniky where not cat = 1",
            "select * from rybniky where cat =",
        ] {
            assert!(
                matches!(parse_select(sql), Err(DbmiError::Failed(_))),
                "{}",
                sql
            );
        }
    }

    #[test]
    fn test_select_with_filter() {
        let mut backend = backend();
        let (table, mut cursor) = backend
            .open_select_cursor(
                "select kapri, pocet from rybniky where kapri = 'hodne'",
                CursorMode::SEQUENTIAL,
            )
            .unwrap();
        assert_eq!(table.column_names(), vec!["kapri", "pocet"]);
        assert_eq!(backend.num_rows(&cursor).unwrap(), 2);
        assert_eq!(
            drain(&mut backend, &mut cursor),
            vec![
                vec![Value::string("hodne"), Value::Int(12)],
                vec![Value::string("hodne"), Value::Null],
            ]
        );
    }

    #[test]
    fn test_scroll_positions() {
        let mut backend = backend();
        let (_, mut cursor) = backend
            .open_select_cursor("select cat from rybniky", CursorMode::SCROLL)
            .unwrap();
        let cat = |row: Option<Vec<Value>>| row.map(|r| r[0].clone());
        assert_eq!(cat(backend.fetch(&mut cursor, Position::Last).unwrap()), Some(Value::Int(3)));
        assert_eq!(
            cat(backend.fetch(&mut cursor, Position::Previous).unwrap()),
            Some(Value::Int(2))
        );
        assert_eq!(
            cat(backend.fetch(&mut cursor, Position::Current).unwrap()),
            Some(Value::Int(2))
        );
        assert_eq!(cat(backend.fetch(&mut cursor, Position::First).unwrap()), Some(Value::Int(1)));
        assert_eq!(backend.fetch(&mut cursor, Position::Previous).unwrap(), None);
    }

    #[test]
    fn test_update_and_delete() {
        let mut backend = backend();
        let (_, mut cursor) = backend
            .open_update_cursor("rybniky", "select * from rybniky where cat = 2", CursorMode::SEQUENTIAL)
            .unwrap();
        assert!(backend.fetch(&mut cursor, Position::Next).unwrap().is_some());
        backend
            .update(
                &mut cursor,
                &[Value::Int(2), Value::string("zadni"), Value::Int(0)],
                &[1],
            )
            .unwrap();
        assert_eq!(
            backend.rows("gis", "rybniky").unwrap()[1],
            vec![Value::Int(2), Value::string("zadni"), Value::Int(1)]
        );
        backend.delete(&mut cursor).unwrap();
        assert_eq!(backend.rows("gis", "rybniky").unwrap().len(), 2);
        assert!(backend.delete(&mut cursor).is_err());
    }

    #[test]
    fn test_insert_checks_types() {
        let mut backend = backend();
        let def = backend.describe_table("rybniky").unwrap();
        let mut cursor = backend.open_insert_cursor(&def, CursorMode::SEQUENTIAL).unwrap();
        backend
            .insert(&mut cursor, &[Value::Int(4), Value::string("par"), Value::Int(2)])
            .unwrap();
        assert!(backend
            .insert(&mut cursor, &[Value::string("x"), Value::Null, Value::Null])
            .is_err());
        assert_eq!(backend.rows("gis", "rybniky").unwrap().len(), 4);
    }

    #[test]
    fn test_ddl_and_indexes() {
        let mut backend = backend();
        backend
            .add_column("rybniky", &Column::new("hloubka", SqlType::DoublePrecision))
            .unwrap();
        assert_eq!(backend.rows("gis", "rybniky").unwrap()[0].len(), 4);
        backend.drop_column("rybniky", "kapri").unwrap();
        assert_eq!(
            backend.describe_table("rybniky").unwrap().column_names(),
            vec!["cat", "pocet", "hloubka"]
        );

        let name = backend
            .create_index(&Index::new("", "rybniky").column("cat").unique())
            .unwrap();
        assert_eq!(backend.list_indexes("rybniky").unwrap().len(), 1);
        assert!(backend
            .create_index(&Index::new("bad", "rybniky").column("nope"))
            .is_err());
        backend.drop_index(&name).unwrap();
        assert!(backend.drop_index(&name).is_err());

        backend.drop_table("rybniky").unwrap();
        assert!(backend.list_tables(false).unwrap().is_empty());
    }

    #[test]
    fn test_column_change_invalidates_open_cursors() {
        let mut backend = backend();
        let (_, mut select) = backend
            .open_select_cursor("select * from rybniky", CursorMode::SEQUENTIAL)
            .unwrap();
        let (_, mut update) = backend
            .open_update_cursor("rybniky", "select * from rybniky", CursorMode::SEQUENTIAL)
            .unwrap();
        assert!(backend.fetch(&mut update, Position::Next).unwrap().is_some());

        backend.drop_column("rybniky", "pocet").unwrap();
        let err = backend.fetch(&mut select, Position::Next).unwrap_err();
        assert!(matches!(err, DbmiError::Failed(_)));
        assert!(err.to_string().contains("changed while the cursor was open"));
        let row = vec![Value::Int(1), Value::string("malo"), Value::Int(0)];
        assert!(matches!(
            backend.update(&mut update, &row, &[2]),
            Err(DbmiError::Failed(_))
        ));

        backend
            .add_column("rybniky", &Column::new("hloubka", SqlType::DoublePrecision))
            .unwrap();
        let (table, mut fresh) = backend
            .open_select_cursor("select * from rybniky", CursorMode::SEQUENTIAL)
            .unwrap();
        assert_eq!(table.column_names(), vec!["cat", "kapri", "hloubka"]);
        let first = backend.fetch(&mut fresh, Position::Next).unwrap().unwrap();
        assert_eq!(first, vec![Value::Int(1), Value::string("hodne"), Value::Null]);
    }

    #[test]
    fn test_transactions_and_databases() {
        let mut backend = backend();
        backend.begin_transaction().unwrap();
        assert!(backend.begin_transaction().is_err());
        backend.commit_transaction().unwrap();
        assert!(backend.commit_transaction().is_err());

        backend.create_database(&Handle::new("novy")).unwrap();
        assert!(backend.create_database(&Handle::new("novy")).is_err());
        assert!(backend.find_database(&Handle::new("novy")).unwrap().is_some());
        assert!(backend.delete_database(&Handle::new("gis")).is_err());
        backend.delete_database(&Handle::new("novy")).unwrap();
        assert_eq!(backend.list_databases(&[]).unwrap(), vec![Handle::new("gis")]);
    }

    #[test]
    fn test_fixture_errors() {
        assert!(Fixture::parse("[[database]]").is_err());
        let bad_type = r#"
[[database]]
name = "x"
[[database.table]]
name = "t"
columns = [{ name = "a", type = "blob" }]
"#;
        let fixture = Fixture::parse(bad_type).unwrap();
        assert!(MemoryBackend::from_fixture(&fixture).is_err());
    }
}
