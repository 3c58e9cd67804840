//! Driver side of the protocol.
//!
//! A driver executable is a `Backend` (the storage engine) plugged into a
//! `Dispatcher`, which owns the request loop:
//!
//! - `request.rs` - decode the arguments of each procedure
//! - `handler.rs` - driver state (open database, cursors) and dispatch
//! - `memory.rs` - in-memory backend used by tests and `dbmi-mem-driver`

mod handler;
pub mod memory;
mod request;

pub use handler::DriverState;
pub use memory::{Fixture, MemoryBackend};

use crate::cursor::{CursorMode, Position};
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::{NOPROC_ACK, PROTOCOL_VERSION, Procedure, Status, WireReader, WireWriter};
use crate::schema::{Column, Handle, Index, Table};
use crate::types::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

fn unsupported(what: &str) -> DbmiError {
    DbmiError::Failed(format!("{} is not supported by this driver", what))
}

/// Storage engine behind a driver.
///
/// Calls are synchronous and strictly sequential. Errors other than
/// protocol errors are reported to the client as FAILED with the error's
/// message.
pub trait Backend: Send {
    /// Backend-side cursor state. The dispatcher keeps cursors in state it
    /// borrows across reads from the pipe, so they must be `Sync`.
    type Cursor: Send + Sync + 'static;

    /// Procedures answered NOPROC return `false` here.
    fn supports(&self, procedure: Procedure) -> bool {
        let _ = procedure;
        true
    }

    fn open_database(&mut self, handle: &Handle) -> DbmiResult<()>;

    fn close_database(&mut self) -> DbmiResult<()>;

    fn create_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        let _ = handle;
        Err(unsupported("CREATE DATABASE"))
    }

    fn delete_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        let _ = handle;
        Err(unsupported("DELETE DATABASE"))
    }

    fn find_database(&mut self, handle: &Handle) -> DbmiResult<Option<Handle>> {
        let _ = handle;
        Err(unsupported("FIND DATABASE"))
    }

    fn list_databases(&mut self, paths: &[String]) -> DbmiResult<Vec<Handle>> {
        let _ = paths;
        Err(unsupported("LIST DATABASES"))
    }

    /// Run a SELECT; the table describes the result columns.
    fn open_select_cursor(&mut self, sql: &str, mode: CursorMode)
    -> DbmiResult<(Table, Self::Cursor)>;

    fn open_update_cursor(
        &mut self,
        table: &str,
        sql: &str,
        mode: CursorMode,
    ) -> DbmiResult<(Table, Self::Cursor)>;

    fn open_insert_cursor(&mut self, table: &Table, mode: CursorMode) -> DbmiResult<Self::Cursor>;

    /// Next row, or `None` once the rows are exhausted.
    fn fetch(
        &mut self,
        cursor: &mut Self::Cursor,
        position: Position,
    ) -> DbmiResult<Option<Vec<Value>>>;

    fn num_rows(&mut self, cursor: &Self::Cursor) -> DbmiResult<i32>;

    fn insert(&mut self, cursor: &mut Self::Cursor, row: &[Value]) -> DbmiResult<()>;

    /// Overwrite `columns` of the current row with the matching values of
    /// `row`.
    fn update(
        &mut self,
        cursor: &mut Self::Cursor,
        row: &[Value],
        columns: &[usize],
    ) -> DbmiResult<()>;

    fn delete(&mut self, cursor: &mut Self::Cursor) -> DbmiResult<()>;

    fn close_cursor(&mut self, cursor: Self::Cursor) -> DbmiResult<()>;

    fn execute_immediate(&mut self, sql: &str) -> DbmiResult<()>;

    fn begin_transaction(&mut self) -> DbmiResult<()> {
        Err(unsupported("Transactions"))
    }

    fn commit_transaction(&mut self) -> DbmiResult<()> {
        Err(unsupported("Transactions"))
    }

    fn create_table(&mut self, table: &Table) -> DbmiResult<()>;

    fn describe_table(&mut self, name: &str) -> DbmiResult<Table>;

    fn drop_table(&mut self, name: &str) -> DbmiResult<()>;

    fn list_tables(&mut self, system: bool) -> DbmiResult<Vec<String>>;

    fn add_column(&mut self, table: &str, column: &Column) -> DbmiResult<()>;

    fn drop_column(&mut self, table: &str, column: &str) -> DbmiResult<()>;

    fn grant_on_table(&mut self, table: &str, privileges: i32, to: i32) -> DbmiResult<()> {
        let _ = (table, privileges, to);
        Err(unsupported("GRANT"))
    }

    /// Create an index, returning its (possibly generated) name.
    fn create_index(&mut self, index: &Index) -> DbmiResult<String> {
        let _ = index;
        Err(unsupported("CREATE INDEX"))
    }

    fn list_indexes(&mut self, table: &str) -> DbmiResult<Vec<Index>> {
        let _ = table;
        Err(unsupported("Indexes"))
    }

    fn drop_index(&mut self, name: &str) -> DbmiResult<()> {
        let _ = name;
        Err(unsupported("DROP INDEX"))
    }
}

/// Request loop of a driver.
pub struct Dispatcher<B: Backend> {
    backend: B,
    state: DriverState<B::Cursor>,
    version: i32,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: DriverState::new(),
            version: PROTOCOL_VERSION,
        }
    }

    /// Announce `version` instead of `PROTOCOL_VERSION` at the handshake.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Serve requests until the client closes the pipe or sends
    /// SHUTDOWN_DRIVER. Returns an error only for protocol failures, after
    /// which the pipe is unusable.
    pub async fn serve<R, W>(mut self, reader: R, mut writer: W) -> DbmiResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = WireReader::new(reader);
        info!("Driver ready, protocol {}", self.version);

        loop {
            let Some(code) = reader.recv_procedure_code().await? else {
                info!("Client closed the pipe");
                self.state.close_all(&mut self.backend);
                return Ok(());
            };

            let mut out = WireWriter::new();
            let procedure = match Procedure::from_code(code) {
                Some(p) if p == Procedure::Version || self.backend.supports(p) => p,
                _ => {
                    debug!("NOPROC for procedure {}", code);
                    out.put_int(NOPROC_ACK);
                    out.flush_to(&mut writer).await?;
                    continue;
                }
            };
            debug!("<- {}", procedure);
            out.put_int(code);
            out.flush_to(&mut writer).await?;

            let request = request::read(procedure, &mut reader, &self.state).await?;
            match self
                .state
                .handle(&mut self.backend, self.version, request)
            {
                Ok(results) => {
                    out.put_int(Status::Ok.code());
                    out.append(results);
                }
                Err(e) if e.is_fatal() => {
                    warn!("{} failed fatally: {}", procedure, e);
                    return Err(e);
                }
                Err(e) => {
                    debug!("{} failed: {}", procedure, e);
                    out.put_int(Status::Failed.code());
                    out.put_str(&failure_message(&e));
                }
            }
            out.flush_to(&mut writer).await?;

            if procedure == Procedure::ShutdownDriver {
                info!("Driver shutting down");
                return Ok(());
            }
        }
    }
}

/// Message sent with a FAILED status.
fn failure_message(e: &DbmiError) -> String {
    match e {
        DbmiError::Failed(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Handle;
    use crate::types::SqlType;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, DuplexStream};

    async fn exchange(client: &mut DuplexStream, request: WireWriter) -> WireReader<&mut DuplexStream> {
        let mut request = request;
        request.flush_to(client).await.unwrap();
        WireReader::new(client)
    }

    fn start() -> DuplexStream {
        let mut backend = MemoryBackend::new();
        backend.add_database(
            "gis",
            vec![(
                Table::new(
                    "rybniky",
                    vec![
                        Column::new("kapri", SqlType::Character),
                        Column::new("pocet", SqlType::Integer),
                    ],
                ),
                vec![vec![Value::string("hodne"), Value::Int(3)]],
            )],
        );
        backend.disable(Procedure::DropIndex);
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (r, w) = tokio::io::split(server);
            Dispatcher::new(backend).serve(r, w).await
        });
        client
    }

    fn assert_send<T: Send>(_: &T) {}

    fn serve_future_is_send<B: Backend + Send + 'static>(backend: B, stream: DuplexStream) {
        let (r, w) = tokio::io::split(stream);
        assert_send(&Dispatcher::new(backend).serve(r, w));
    }

    #[test]
    fn test_dispatcher_can_run_on_any_backend_task() {
        let (_client, server) = tokio::io::duplex(64);
        serve_future_is_send(MemoryBackend::new(), server);
    }

    #[tokio::test]
    async fn test_noproc_keeps_connection() {
        let mut client = start();

        let mut w = WireWriter::new();
        w.put_int(Procedure::DropIndex.code());
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), NOPROC_ACK);

        let mut w = WireWriter::new();
        w.put_int(12345);
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), NOPROC_ACK);

        let mut w = WireWriter::new();
        w.put_int(Procedure::Version.code());
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), Procedure::Version.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Ok.code());
        assert_eq!(r.recv_int().await.unwrap(), PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_cursor_procedure_needs_database() {
        let mut client = start();

        let mut w = WireWriter::new();
        w.put_int(Procedure::ListTables.code());
        w.put_bool(false);
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), Procedure::ListTables.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Failed.code());
        assert_eq!(r.recv_string().await.unwrap(), "Database is not open");

        let mut w = WireWriter::new();
        w.put_int(Procedure::OpenDatabase.code());
        w.put_handle(&Handle::new("gis"));
        w.put_int(Procedure::ListTables.code());
        w.put_bool(false);
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), Procedure::OpenDatabase.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Ok.code());
        assert_eq!(r.recv_int().await.unwrap(), Procedure::ListTables.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Ok.code());
        assert_eq!(r.recv_strings().await.unwrap(), vec!["rybniky".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_token_fails() {
        let mut client = start();

        let mut w = WireWriter::new();
        w.put_int(Procedure::OpenDatabase.code());
        w.put_handle(&Handle::new("gis"));
        w.put_int(Procedure::Fetch.code());
        w.put_str("nope");
        w.put_int(0);
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), Procedure::OpenDatabase.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Ok.code());
        assert_eq!(r.recv_int().await.unwrap(), Procedure::Fetch.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Failed.code());
        assert!(r.recv_string().await.unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop() {
        let mut client = start();

        let mut w = WireWriter::new();
        w.put_int(Procedure::ShutdownDriver.code());
        let mut r = exchange(&mut client, w).await;
        assert_eq!(r.recv_int().await.unwrap(), Procedure::ShutdownDriver.code());
        assert_eq!(r.recv_int().await.unwrap(), Status::Ok.code());

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
