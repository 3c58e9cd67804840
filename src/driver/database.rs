//! Database procedures and driver shutdown.

use super::{Driver, Link};
use crate::error::DbmiResult;
use crate::protocol::{Procedure, WireWriter};
use crate::schema::Handle;
use tracing::info;

impl Driver {
    pub async fn open_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_handle(handle);
        self.call_simple(Procedure::OpenDatabase, args).await?;
        info!("Driver '{}' opened database {}", self.name, handle);
        self.database = Some(handle.clone());
        Ok(())
    }

    pub async fn close_database(&mut self) -> DbmiResult<()> {
        self.call_simple(Procedure::CloseDatabase, WireWriter::new())
            .await?;
        self.database = None;
        Ok(())
    }

    pub async fn create_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_handle(handle);
        self.call_simple(Procedure::CreateDatabase, args).await
    }

    pub async fn delete_database(&mut self, handle: &Handle) -> DbmiResult<()> {
        let mut args = WireWriter::new();
        args.put_handle(handle);
        self.call_simple(Procedure::DeleteDatabase, args).await
    }

    /// Look a database up; the driver may fill in the handle's schema.
    pub async fn find_database(&mut self, handle: &Handle) -> DbmiResult<Option<Handle>> {
        let mut args = WireWriter::new();
        args.put_handle(handle);
        guarded!(self, async {
            self.start_call(Procedure::FindDatabase).await?;
            self.send(args).await?;
            self.recv_status().await?;
            let found = self.reader().recv_bool().await?;
            let handle = self.reader().recv_handle().await?;
            Ok(found.then_some(handle))
        })
    }

    /// Databases available under `paths` (driver-specific locations; empty
    /// for the driver's default).
    pub async fn list_databases(&mut self, paths: &[String]) -> DbmiResult<Vec<Handle>> {
        let mut args = WireWriter::new();
        args.put_strings(paths);
        guarded!(self, async {
            self.start_call(Procedure::ListDatabases).await?;
            self.send(args).await?;
            self.recv_status().await?;
            let count = self.reader().recv_len().await?;
            let mut handles = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                handles.push(self.reader().recv_handle().await?);
            }
            Ok(handles)
        })
    }

    /// Ask the driver to exit, then terminate the transport.
    ///
    /// Safe to call more than once and after a protocol error; only a
    /// healthy link gets the SHUTDOWN_DRIVER request.
    pub async fn shutdown(&mut self) -> DbmiResult<()> {
        let result = if self.link == Link::Ready {
            self.call_simple(Procedure::ShutdownDriver, WireWriter::new())
                .await
        } else {
            Ok(())
        };
        self.teardown().await;
        if self.link != Link::Closed {
            info!("Driver '{}' shut down", self.name);
            self.link = Link::Closed;
        }
        self.database = None;
        result
    }
}
