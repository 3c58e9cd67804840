//! Cursor procedures.

use super::Driver;
use crate::cursor::{Cursor, CursorKind, CursorMode, Position};
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::{Procedure, Status, WireWriter};
use crate::schema::Table;

impl Driver {
    /// Run a SELECT and return a read-only cursor positioned before the
    /// first row.
    pub async fn open_select_cursor(&mut self, sql: &str, mode: CursorMode) -> DbmiResult<Cursor> {
        let mut args = WireWriter::new();
        args.put_str(sql);
        args.put_int(mode.bits());
        guarded!(self, async {
            self.start_call(Procedure::OpenSelectCursor).await?;
            self.send(args).await?;
            self.recv_status().await?;
            let token = self.reader().recv_string().await?;
            let table = self.reader().recv_table().await?;
            Ok(Cursor::open(token, CursorKind::Readonly, mode, table))
        })
    }

    /// Open a cursor whose rows can be updated or deleted in place.
    pub async fn open_update_cursor(
        &mut self,
        table_name: &str,
        sql: &str,
        mode: CursorMode,
    ) -> DbmiResult<Cursor> {
        let mut args = WireWriter::new();
        args.put_str(table_name);
        args.put_str(sql);
        args.put_int(mode.bits());
        guarded!(self, async {
            self.start_call(Procedure::OpenUpdateCursor).await?;
            self.send(args).await?;
            self.recv_status().await?;
            let token = self.reader().recv_string().await?;
            let table = self.reader().recv_table().await?;
            Ok(Cursor::open(token, CursorKind::Update, mode, table))
        })
    }

    /// Open an insert cursor on `table`. Rows are staged with
    /// `Cursor::set_value` and sent with `insert`.
    pub async fn open_insert_cursor(&mut self, table: Table, mode: CursorMode) -> DbmiResult<Cursor> {
        let mut args = WireWriter::new();
        args.put_table(&table)?;
        args.put_int(mode.bits());
        guarded!(self, async {
            self.start_call(Procedure::OpenInsertCursor).await?;
            self.send(args).await?;
            self.recv_status().await?;
            self.reader().recv_string().await
        })
        .map(|token| Cursor::open(token, CursorKind::Insert, mode, table))
    }

    /// Move the cursor and load the row into its table. Returns `false`
    /// once the rows are exhausted; the table then keeps the last row.
    pub async fn fetch(&mut self, cursor: &mut Cursor, position: Position) -> DbmiResult<bool> {
        cursor.ensure_open()?;
        let mut args = WireWriter::new();
        args.put_str(cursor.token());
        args.put_int(position.code());
        guarded!(self, async {
            self.start_call(Procedure::Fetch).await?;
            self.send(args).await?;
            if self.recv_fetch_status().await? == Status::Eof {
                return Ok(false);
            }
            let more = self.reader().recv_bool().await?;
            if more {
                let table = cursor.table_mut()?;
                self.reader().recv_table_data(table).await?;
            }
            Ok(more)
        })
    }

    /// Number of rows the cursor's statement produced.
    pub async fn get_num_rows(&mut self, cursor: &Cursor) -> DbmiResult<i32> {
        cursor.ensure_open()?;
        let mut args = WireWriter::new();
        args.put_str(cursor.token());
        guarded!(self, async {
            self.start_call(Procedure::Rows).await?;
            self.send(args).await?;
            self.recv_status().await?;
            self.reader().recv_int().await
        })
    }

    /// Insert the values staged in the cursor's table.
    pub async fn insert(&mut self, cursor: &Cursor) -> DbmiResult<()> {
        let args = Self::row_args(cursor, CursorKind::Insert)?;
        self.call_simple(Procedure::Insert, args).await
    }

    /// Write the staged values of the flagged columns to the current row.
    pub async fn update(&mut self, cursor: &Cursor) -> DbmiResult<()> {
        let args = Self::row_args(cursor, CursorKind::Update)?;
        self.call_simple(Procedure::Update, args).await
    }

    /// Delete the current row of an update cursor.
    pub async fn delete(&mut self, cursor: &Cursor) -> DbmiResult<()> {
        Self::expect_kind(cursor, CursorKind::Update)?;
        let mut args = WireWriter::new();
        args.put_str(cursor.token());
        self.call_simple(Procedure::Delete, args).await
    }

    /// Tell the driver which columns later `update` calls will touch.
    pub async fn bind_update(&mut self, cursor: &Cursor) -> DbmiResult<()> {
        let args = Self::bind_args(cursor)?;
        self.call_simple(Procedure::BindUpdate, args).await
    }

    /// Tell the driver which columns later `insert` calls will fill.
    pub async fn bind_insert(&mut self, cursor: &Cursor) -> DbmiResult<()> {
        let args = Self::bind_args(cursor)?;
        self.call_simple(Procedure::BindInsert, args).await
    }

    /// Close the cursor on the driver. The local cursor is closed even when
    /// the driver reports a failure.
    pub async fn close_cursor(&mut self, cursor: &mut Cursor) -> DbmiResult<()> {
        cursor.ensure_open()?;
        let mut args = WireWriter::new();
        args.put_str(cursor.token());
        let result = self.call_simple(Procedure::CloseCursor, args).await;
        cursor.close();
        result
    }

    fn expect_kind(cursor: &Cursor, kind: CursorKind) -> DbmiResult<()> {
        cursor.ensure_open()?;
        if cursor.kind() != kind {
            return Err(DbmiError::Failed(format!(
                "Cursor '{}' is {:?}, not {:?}",
                cursor.token(),
                cursor.kind(),
                kind
            )));
        }
        Ok(())
    }

    fn row_args(cursor: &Cursor, kind: CursorKind) -> DbmiResult<WireWriter> {
        Self::expect_kind(cursor, kind)?;
        let mut args = WireWriter::new();
        args.put_str(cursor.token());
        args.put_table_data(cursor.table()?)?;
        Ok(args)
    }

    fn bind_args(cursor: &Cursor) -> DbmiResult<WireWriter> {
        cursor.ensure_open()?;
        let columns = cursor.updated_columns();
        let mut args = WireWriter::new();
        args.put_str(cursor.token());
        args.put_len(columns.len())?;
        for column in columns {
            args.put_len(column)?;
        }
        Ok(args)
    }
}
