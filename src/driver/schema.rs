//! Statement, transaction, table and index procedures.

use super::Driver;
use crate::error::DbmiResult;
use crate::protocol::{Procedure, WireWriter};
use crate::schema::{Column, Index, Table};

impl Driver {
    /// Run a statement that returns no rows.
    pub async fn execute_immediate(&mut self, sql: &str) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_str(sql);
        self.call_simple(Procedure::ExecuteImmediate, args).await
    }

    pub async fn begin_transaction(&mut self) -> DbmiResult<()> {
        self.call_simple(Procedure::BeginTransaction, WireWriter::new())
            .await
    }

    pub async fn commit_transaction(&mut self) -> DbmiResult<()> {
        self.call_simple(Procedure::CommitTransaction, WireWriter::new())
            .await
    }

    pub async fn create_table(&mut self, table: &Table) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_table(table)?;
        self.call_simple(Procedure::CreateTable, args).await
    }

    pub async fn describe_table(&mut self, name: &str) -> DbmiResult<Table> {
        let mut args = WireWriter::new();
        args.put_str(name);
        guarded!(self, async {
            self.start_call(Procedure::DescribeTable).await?;
            self.send(args).await?;
            self.recv_status().await?;
            self.reader().recv_table().await
        })
    }

    pub async fn drop_table(&mut self, name: &str) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_str(name);
        self.call_simple(Procedure::DropTable, args).await
    }

    /// Table names in the open database; `system` includes system tables.
    pub async fn list_tables(&mut self, system: bool) -> DbmiResult<Vec<String>> {
        let mut args = WireWriter::new();
        args.put_bool(system);
        guarded!(self, async {
            self.start_call(Procedure::ListTables).await?;
            self.send(args).await?;
            self.recv_status().await?;
            self.reader().recv_strings().await
        })
    }

    pub async fn add_column(&mut self, table_name: &str, column: &Column) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_str(table_name);
        args.put_column(column)?;
        self.call_simple(Procedure::AddColumn, args).await
    }

    pub async fn drop_column(&mut self, table_name: &str, column_name: &str) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_str(table_name);
        args.put_str(column_name);
        self.call_simple(Procedure::DropColumn, args).await
    }

    /// Grant `privileges` (`PRIV_SELECT`) on a table to `to`
    /// (`GRANT_GROUP | GRANT_PUBLIC`).
    pub async fn grant_on_table(
        &mut self,
        table_name: &str,
        privileges: i32,
        to: i32,
    ) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_str(table_name);
        args.put_int(privileges);
        args.put_int(to);
        self.call_simple(Procedure::GrantOnTable, args).await
    }

    /// Create an index and return the name the driver gave it.
    pub async fn create_index(&mut self, index: &Index) -> DbmiResult<String> {
        let mut args = WireWriter::new();
        args.put_index(index);
        guarded!(self, async {
            self.start_call(Procedure::CreateIndex).await?;
            self.send(args).await?;
            self.recv_status().await?;
            self.reader().recv_string().await
        })
    }

    pub async fn list_indexes(&mut self, table_name: &str) -> DbmiResult<Vec<Index>> {
        let mut args = WireWriter::new();
        args.put_str(table_name);
        guarded!(self, async {
            self.start_call(Procedure::ListIndexes).await?;
            self.send(args).await?;
            self.recv_status().await?;
            let count = self.reader().recv_len().await?;
            let mut indexes = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                indexes.push(self.reader().recv_index().await?);
            }
            Ok(indexes)
        })
    }

    pub async fn drop_index(&mut self, name: &str) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_str(name);
        self.call_simple(Procedure::DropIndex, args).await
    }
}
