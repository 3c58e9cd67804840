//! Bulk category/value selection.

use super::Driver;
use crate::catval::{CatValArray, catval_query};
use crate::cursor::{Cursor, CursorMode, Position};
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::{Procedure, WireWriter};
use crate::types::{HostType, SqlType};
use tracing::debug;

impl Driver {
    /// Collect `(key, column)` pairs from `table` into an array sorted by
    /// category. Rows with a null key are skipped.
    ///
    /// Uses SELECT_CATVAL when the driver has it, otherwise a select
    /// cursor over the same query.
    ///
    /// `where_clause` is sent as-is and lands after `WHERE` in the
    /// driver's query, so quoting literals is up to the caller. How much
    /// SQL it may hold depends on the driver: `MemoryBackend` accepts a
    /// single `column = literal` condition and answers FAILED for
    /// anything else.
    pub async fn select_cat_val_array(
        &mut self,
        table: &str,
        key: &str,
        column: &str,
        where_clause: Option<&str>,
    ) -> DbmiResult<CatValArray> {
        let mut args = WireWriter::new();
        args.put_str(table);
        args.put_str(key);
        args.put_str(column);
        args.put_str(where_clause.unwrap_or(""));
        let result = guarded!(self, async {
            self.start_call(Procedure::SelectCatVal).await?;
            self.send(args).await?;
            self.recv_status().await?;
            let code = self.reader().recv_int().await?;
            let sql_type = SqlType::from_code(code)
                .ok_or_else(|| DbmiError::protocol(format!("unknown SQL type {}", code)))?;
            let host_type = sql_type.host_type();
            let count = self.reader().recv_len().await?;
            let mut array = CatValArray::alloc(host_type, count.min(1 << 16));
            for _ in 0..count {
                let cat = self.reader().recv_int().await?;
                let value = self.reader().recv_value(host_type, sql_type).await?;
                array
                    .push(cat, value)
                    .map_err(|e| DbmiError::protocol(e.to_string()))?;
            }
            array.sort();
            Ok(array)
        });

        match result {
            Err(DbmiError::NoProc(_)) => {
                debug!("{}: selecting category values through a cursor", self.name);
                let sql = catval_query(table, key, column, where_clause);
                let mut cursor = self.open_select_cursor(&sql, CursorMode::SEQUENTIAL).await?;
                let collected = self.collect_cat_vals(&mut cursor, key, column).await;
                let closed = if cursor.is_open() {
                    self.close_cursor(&mut cursor).await
                } else {
                    Ok(())
                };
                let array = collected?;
                closed?;
                Ok(array)
            }
            other => other,
        }
    }

    async fn collect_cat_vals(
        &mut self,
        cursor: &mut Cursor,
        key: &str,
        column: &str,
    ) -> DbmiResult<CatValArray> {
        let (key_index, key_type) = {
            let (i, c) = cursor.column_by_name(key)?;
            (i, c.host_type)
        };
        if key_type != HostType::Int {
            return Err(DbmiError::Failed(format!(
                "Key column '{}' is not an integer column",
                key
            )));
        }
        let (value_index, value_type) = {
            let (i, c) = cursor.column_by_name(column)?;
            (i, c.host_type)
        };

        let mut array = CatValArray::new(value_type);
        while self.fetch(cursor, Position::Next).await? {
            let Some(cat) = cursor.value(key_index)?.as_int() else {
                continue;
            };
            array.push(cat, cursor.value(value_index)?.clone())?;
        }
        array.sort();
        Ok(array)
    }
}
