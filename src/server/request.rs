//! Argument decoding, one arm per procedure.

use super::handler::DriverState;
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::{Procedure, WireReader};
use crate::schema::{Column, Handle, Index, Table};
use crate::types::Value;
use tokio::io::AsyncRead;

/// A decoded procedure call.
#[derive(Debug)]
pub(super) enum Request {
    Version,

    CloseDatabase,
    CreateDatabase(Handle),
    DeleteDatabase(Handle),
    FindDatabase(Handle),
    ListDatabases(Vec<String>),
    OpenDatabase(Handle),
    ShutdownDriver,

    CloseCursor(String),
    Delete(String),
    Fetch { token: String, position: i32 },
    Insert { token: String, row: Vec<Value> },
    OpenInsertCursor { table: Table, mode: i32 },
    OpenSelectCursor { sql: String, mode: i32 },
    OpenUpdateCursor { table: String, sql: String, mode: i32 },
    Update { token: String, row: Vec<Value> },
    Rows(String),
    SelectCatVal {
        table: String,
        key: String,
        column: String,
        where_clause: String,
    },
    BindUpdate { token: String, columns: Vec<i32> },
    BindInsert { token: String, columns: Vec<i32> },

    ExecuteImmediate(String),
    BeginTransaction,
    CommitTransaction,

    CreateTable(Table),
    DescribeTable(String),
    DropTable(String),
    ListTables(bool),
    AddColumn { table: String, column: Column },
    DropColumn { table: String, column: String },
    GrantOnTable { table: String, privileges: i32, to: i32 },

    CreateIndex(Index),
    ListIndexes(String),
    DropIndex(String),
}

/// Read the arguments of `procedure`. Any error leaves the pipe out of
/// step and is fatal.
pub(super) async fn read<R, C>(
    procedure: Procedure,
    r: &mut WireReader<R>,
    state: &DriverState<C>,
) -> DbmiResult<Request>
where
    R: AsyncRead + Unpin,
{
    let request = match procedure {
        Procedure::Version => Request::Version,

        Procedure::CloseDatabase => Request::CloseDatabase,
        Procedure::CreateDatabase => Request::CreateDatabase(r.recv_handle().await?),
        Procedure::DeleteDatabase => Request::DeleteDatabase(r.recv_handle().await?),
        Procedure::FindDatabase => Request::FindDatabase(r.recv_handle().await?),
        Procedure::ListDatabases => Request::ListDatabases(r.recv_strings().await?),
        Procedure::OpenDatabase => Request::OpenDatabase(r.recv_handle().await?),
        Procedure::ShutdownDriver => Request::ShutdownDriver,

        Procedure::CloseCursor => Request::CloseCursor(r.recv_string().await?),
        Procedure::Delete => Request::Delete(r.recv_string().await?),
        Procedure::Fetch => Request::Fetch {
            token: r.recv_string().await?,
            position: r.recv_int().await?,
        },
        Procedure::Insert | Procedure::Update => {
            let token = r.recv_string().await?;
            // The row layout is only known from the cursor's table.
            let table = state.cursor_table(&token).ok_or_else(|| {
                DbmiError::protocol(format!("{} on unknown cursor '{}'", procedure, token))
            })?;
            let row = r.recv_row(table).await?;
            if procedure == Procedure::Insert {
                Request::Insert { token, row }
            } else {
                Request::Update { token, row }
            }
        }
        Procedure::OpenInsertCursor => Request::OpenInsertCursor {
            table: r.recv_table().await?,
            mode: r.recv_int().await?,
        },
        Procedure::OpenSelectCursor => Request::OpenSelectCursor {
            sql: r.recv_string().await?,
            mode: r.recv_int().await?,
        },
        Procedure::OpenUpdateCursor => Request::OpenUpdateCursor {
            table: r.recv_string().await?,
            sql: r.recv_string().await?,
            mode: r.recv_int().await?,
        },
        Procedure::Rows => Request::Rows(r.recv_string().await?),
        Procedure::SelectCatVal => Request::SelectCatVal {
            table: r.recv_string().await?,
            key: r.recv_string().await?,
            column: r.recv_string().await?,
            where_clause: r.recv_string().await?,
        },
        Procedure::BindUpdate | Procedure::BindInsert => {
            let token = r.recv_string().await?;
            let n = r.recv_len().await?;
            let mut columns = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                columns.push(r.recv_int().await?);
            }
            if procedure == Procedure::BindUpdate {
                Request::BindUpdate { token, columns }
            } else {
                Request::BindInsert { token, columns }
            }
        }

        Procedure::ExecuteImmediate => Request::ExecuteImmediate(r.recv_string().await?),
        Procedure::BeginTransaction => Request::BeginTransaction,
        Procedure::CommitTransaction => Request::CommitTransaction,

        Procedure::CreateTable => Request::CreateTable(r.recv_table().await?),
        Procedure::DescribeTable => Request::DescribeTable(r.recv_string().await?),
        Procedure::DropTable => Request::DropTable(r.recv_string().await?),
        Procedure::ListTables => Request::ListTables(r.recv_bool().await?),
        Procedure::AddColumn => Request::AddColumn {
            table: r.recv_string().await?,
            column: r.recv_column().await?,
        },
        Procedure::DropColumn => Request::DropColumn {
            table: r.recv_string().await?,
            column: r.recv_string().await?,
        },
        Procedure::GrantOnTable => Request::GrantOnTable {
            table: r.recv_string().await?,
            privileges: r.recv_int().await?,
            to: r.recv_int().await?,
        },

        Procedure::CreateIndex => Request::CreateIndex(r.recv_index().await?),
        Procedure::ListIndexes => Request::ListIndexes(r.recv_string().await?),
        Procedure::DropIndex => Request::DropIndex(r.recv_string().await?),
    };
    Ok(request)
}
