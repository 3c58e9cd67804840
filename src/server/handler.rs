//! Driver state and request dispatch.

use super::Backend;
use super::request::Request;
use crate::catval::catval_query;
use crate::cursor::{CursorKind, CursorMode, Position};
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::WireWriter;
use crate::schema::{Handle, Table};
use crate::types::{HostType, SqlType, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A cursor the driver handed a token out for.
struct OpenCursor<C> {
    cursor: C,
    kind: CursorKind,
    table: Table,
    update_columns: Vec<usize>,
    insert_columns: Vec<usize>,
}

/// Everything a driver remembers between calls.
pub struct DriverState<C> {
    database: Option<Handle>,
    cursors: HashMap<String, OpenCursor<C>>,
    next_token: u64,
}

impl<C> Default for DriverState<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DriverState<C> {
    pub fn new() -> Self {
        Self {
            database: None,
            cursors: HashMap::new(),
            next_token: 1,
        }
    }

    pub fn database(&self) -> Option<&Handle> {
        self.database.as_ref()
    }

    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    pub(super) fn cursor_table(&self, token: &str) -> Option<&Table> {
        self.cursors.get(token).map(|c| &c.table)
    }

    fn register(&mut self, cursor: C, kind: CursorKind, table: Table) -> String {
        let token = self.next_token.to_string();
        self.next_token += 1;
        self.cursors.insert(
            token.clone(),
            OpenCursor {
                cursor,
                kind,
                table,
                update_columns: Vec::new(),
                insert_columns: Vec::new(),
            },
        );
        token
    }

    fn cursor_mut(&mut self, token: &str) -> DbmiResult<&mut OpenCursor<C>> {
        self.cursors
            .get_mut(token)
            .ok_or_else(|| DbmiError::Failed(format!("Cursor '{}' not found", token)))
    }

    /// Close every cursor the client left open.
    pub(super) fn close_all<B>(&mut self, backend: &mut B)
    where
        B: Backend<Cursor = C>,
    {
        for (token, open) in self.cursors.drain() {
            warn!("Closing cursor '{}' left open by the client", token);
            if let Err(e) = backend.close_cursor(open.cursor) {
                warn!("Failed to close cursor '{}': {}", token, e);
            }
        }
    }
}

fn bound_columns(columns: &[i32], count: usize) -> DbmiResult<Vec<usize>> {
    columns
        .iter()
        .map(|&c| {
            usize::try_from(c)
                .ok()
                .filter(|&i| i < count)
                .ok_or(DbmiError::ColumnOutOfRange {
                    index: c.max(0) as usize,
                    count,
                })
        })
        .collect()
}

fn expect_kind<C>(open: &OpenCursor<C>, kind: CursorKind, token: &str) -> DbmiResult<()> {
    if open.kind != kind {
        return Err(DbmiError::Failed(format!(
            "Cursor '{}' is {:?}, not {:?}",
            token, open.kind, kind
        )));
    }
    Ok(())
}

impl<C> DriverState<C> {
    /// Run one request against `backend` and encode its results.
    pub(super) fn handle<B>(
        &mut self,
        backend: &mut B,
        version: i32,
        request: Request,
    ) -> DbmiResult<WireWriter>
    where
        B: Backend<Cursor = C>,
    {
        let needs_database = !matches!(
            request,
            Request::Version
                | Request::CloseDatabase
                | Request::CreateDatabase(_)
                | Request::DeleteDatabase(_)
                | Request::FindDatabase(_)
                | Request::ListDatabases(_)
                | Request::OpenDatabase(_)
                | Request::ShutdownDriver
        );
        if needs_database && self.database.is_none() {
            return Err(DbmiError::DatabaseNotOpen);
        }

        let mut out = WireWriter::new();
        match request {
            Request::Version => out.put_int(version),

            Request::OpenDatabase(handle) => {
                if let Some(current) = &self.database {
                    return Err(DbmiError::Failed(format!(
                        "Database {} is already open",
                        current
                    )));
                }
                backend.open_database(&handle)?;
                info!("Opened database {}", handle);
                self.database = Some(handle);
            }
            Request::CloseDatabase => {
                if self.database.is_none() {
                    return Err(DbmiError::DatabaseNotOpen);
                }
                self.close_all(backend);
                backend.close_database()?;
                if let Some(handle) = self.database.take() {
                    info!("Closed database {}", handle);
                }
            }
            Request::ShutdownDriver => {
                self.close_all(backend);
                if self.database.take().is_some() {
                    backend.close_database()?;
                }
            }
            Request::CreateDatabase(handle) => backend.create_database(&handle)?,
            Request::DeleteDatabase(handle) => backend.delete_database(&handle)?,
            Request::FindDatabase(handle) => match backend.find_database(&handle)? {
                Some(found) => {
                    out.put_bool(true);
                    out.put_handle(&found);
                }
                None => {
                    out.put_bool(false);
                    out.put_handle(&handle);
                }
            },
            Request::ListDatabases(paths) => {
                let handles = backend.list_databases(&paths)?;
                out.put_len(handles.len())?;
                for handle in &handles {
                    out.put_handle(handle);
                }
            }

            Request::OpenSelectCursor { sql, mode } => {
                let (table, cursor) =
                    backend.open_select_cursor(&sql, CursorMode::from_bits(mode))?;
                out.put_str(&self.register(cursor, CursorKind::Readonly, table.clone()));
                out.put_table(&table)?;
            }
            Request::OpenUpdateCursor { table, sql, mode } => {
                let (table, cursor) =
                    backend.open_update_cursor(&table, &sql, CursorMode::from_bits(mode))?;
                out.put_str(&self.register(cursor, CursorKind::Update, table.clone()));
                out.put_table(&table)?;
            }
            Request::OpenInsertCursor { table, mode } => {
                let cursor = backend.open_insert_cursor(&table, CursorMode::from_bits(mode))?;
                out.put_str(&self.register(cursor, CursorKind::Insert, table));
            }
            Request::Fetch { token, position } => {
                let position = Position::from_code(position).ok_or_else(|| {
                    DbmiError::Failed(format!("Unknown fetch position {}", position))
                })?;
                let open = self.cursor_mut(&token)?;
                if open.kind == CursorKind::Insert {
                    return Err(DbmiError::Failed(format!(
                        "Cannot fetch from insert cursor '{}'",
                        token
                    )));
                }
                match backend.fetch(&mut open.cursor, position)? {
                    Some(row) => {
                        open.table.fill_row(&row)?;
                        out.put_bool(true);
                        out.put_table_data(&open.table)?;
                    }
                    None => out.put_bool(false),
                }
            }
            Request::Rows(token) => {
                let open = self.cursor_mut(&token)?;
                out.put_int(backend.num_rows(&open.cursor)?);
            }
            Request::Insert { token, mut row } => {
                let open = self.cursor_mut(&token)?;
                expect_kind(open, CursorKind::Insert, &token)?;
                if !open.insert_columns.is_empty() {
                    for (i, value) in row.iter_mut().enumerate() {
                        if !open.insert_columns.contains(&i) {
                            let column = open.table.column(i)?;
                            *value = column.default_value.clone().unwrap_or_default();
                        }
                    }
                }
                backend.insert(&mut open.cursor, &row)?;
            }
            Request::Update { token, row } => {
                let open = self.cursor_mut(&token)?;
                expect_kind(open, CursorKind::Update, &token)?;
                let columns = if open.update_columns.is_empty() {
                    (0..open.table.column_count()).collect()
                } else {
                    open.update_columns.clone()
                };
                backend.update(&mut open.cursor, &row, &columns)?;
            }
            Request::Delete(token) => {
                let open = self.cursor_mut(&token)?;
                expect_kind(open, CursorKind::Update, &token)?;
                backend.delete(&mut open.cursor)?;
            }
            Request::BindUpdate { token, columns } => {
                let open = self.cursor_mut(&token)?;
                open.update_columns = bound_columns(&columns, open.table.column_count())?;
            }
            Request::BindInsert { token, columns } => {
                let open = self.cursor_mut(&token)?;
                open.insert_columns = bound_columns(&columns, open.table.column_count())?;
            }
            Request::CloseCursor(token) => {
                let open = self
                    .cursors
                    .remove(&token)
                    .ok_or_else(|| DbmiError::Failed(format!("Cursor '{}' not found", token)))?;
                backend.close_cursor(open.cursor)?;
                debug!("Closed cursor '{}'", token);
            }
            Request::SelectCatVal {
                table,
                key,
                column,
                where_clause,
            } => {
                let sql = catval_query(&table, &key, &column, Some(&where_clause));
                let (table, mut cursor) = backend.open_select_cursor(&sql, CursorMode::SEQUENTIAL)?;
                let collected = collect_cat_vals(backend, &table, &mut cursor, &key, &column);
                backend.close_cursor(cursor)?;
                let (sql_type, pairs) = collected?;
                out.put_int(sql_type.code());
                out.put_len(pairs.len())?;
                for (cat, value) in &pairs {
                    out.put_int(*cat);
                    out.put_value(value, sql_type.host_type(), sql_type)?;
                }
            }

            Request::ExecuteImmediate(sql) => backend.execute_immediate(&sql)?,
            Request::BeginTransaction => backend.begin_transaction()?,
            Request::CommitTransaction => backend.commit_transaction()?,

            Request::CreateTable(table) => backend.create_table(&table)?,
            Request::DescribeTable(name) => out.put_table(&backend.describe_table(&name)?)?,
            Request::DropTable(name) => backend.drop_table(&name)?,
            Request::ListTables(system) => out.put_strings(&backend.list_tables(system)?),
            Request::AddColumn { table, column } => backend.add_column(&table, &column)?,
            Request::DropColumn { table, column } => backend.drop_column(&table, &column)?,
            Request::GrantOnTable {
                table,
                privileges,
                to,
            } => backend.grant_on_table(&table, privileges, to)?,

            Request::CreateIndex(index) => out.put_str(&backend.create_index(&index)?),
            Request::ListIndexes(table) => {
                let indexes = backend.list_indexes(&table)?;
                out.put_len(indexes.len())?;
                for index in &indexes {
                    out.put_index(index);
                }
            }
            Request::DropIndex(name) => backend.drop_index(&name)?,
        }
        Ok(out)
    }
}

/// Read every `(key, column)` pair from a select cursor. Null keys are
/// skipped.
fn collect_cat_vals<B: Backend>(
    backend: &mut B,
    table: &Table,
    cursor: &mut B::Cursor,
    key: &str,
    column: &str,
) -> DbmiResult<(SqlType, Vec<(i32, Value)>)> {
    let not_found =
        |name: &str| DbmiError::Failed(format!("Column '{}' not found in '{}'", name, table.name));
    let (key_index, key_column) = table.find_column(key).ok_or_else(|| not_found(key))?;
    if key_column.host_type != HostType::Int {
        return Err(DbmiError::Failed(format!(
            "Key column '{}' is not an integer column",
            key
        )));
    }
    let (value_index, value_column) = table.find_column(column).ok_or_else(|| not_found(column))?;

    let mut pairs = Vec::new();
    while let Some(row) = backend.fetch(cursor, Position::Next)? {
        let cat = row.get(key_index).and_then(Value::as_int);
        let value = row.get(value_index).cloned().unwrap_or_default();
        if let Some(cat) = cat {
            pairs.push((cat, value));
        }
    }
    Ok((value_column.sql_type, pairs))
}
