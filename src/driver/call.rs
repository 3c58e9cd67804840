//! Procedure framing on the client side.
//!
//! Every call is: procedure number, acknowledgement, arguments, status,
//! then results or a failure message. Arguments are always encoded before
//! the procedure number goes out, so an encoding error never leaves a
//! half-sent request on the pipe.

use super::{Driver, DriverTransport, Link};
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::{NOPROC_ACK, Procedure, Status, WireReader, WireWriter};
use tracing::{debug, warn};

impl Driver {
    pub(super) fn reader(&mut self) -> WireReader<&mut Box<dyn DriverTransport>> {
        WireReader::new(&mut self.transport)
    }

    /// Send the procedure number and read the acknowledgement.
    pub(super) async fn start_call(&mut self, procedure: Procedure) -> DbmiResult<()> {
        match self.link {
            Link::Ready => {}
            Link::Broken => {
                return Err(DbmiError::protocol(format!(
                    "driver '{}' is unusable after an earlier protocol error",
                    self.name
                )));
            }
            Link::Closed => {
                return Err(DbmiError::protocol(format!(
                    "driver '{}' has been shut down",
                    self.name
                )));
            }
        }
        self.require_database(procedure)?;
        debug!("{} -> {}", self.name, procedure);

        let mut w = WireWriter::new();
        w.put_int(procedure.code());
        w.flush_to(&mut self.transport).await?;

        let ack = self.reader().recv_int().await?;
        if ack == procedure.code() {
            Ok(())
        } else if ack == NOPROC_ACK {
            debug!("{} does not implement {}", self.name, procedure);
            Err(DbmiError::NoProc(procedure))
        } else {
            Err(DbmiError::protocol(format!(
                "driver acknowledged {} with {}",
                procedure, ack
            )))
        }
    }

    /// Send the encoded arguments of the current call.
    pub(super) async fn send(&mut self, mut args: WireWriter) -> DbmiResult<()> {
        args.flush_to(&mut self.transport).await?;
        Ok(())
    }

    /// Read the status of the current call. A FAILED status is turned into
    /// `DbmiError::Failed` carrying the driver's message.
    pub(super) async fn recv_status(&mut self) -> DbmiResult<()> {
        self.read_status(false).await.map(|_| ())
    }

    /// Status of a FETCH: OK, or EOF once the cursor is exhausted.
    pub(super) async fn recv_fetch_status(&mut self) -> DbmiResult<Status> {
        self.read_status(true).await
    }

    async fn read_status(&mut self, eof_allowed: bool) -> DbmiResult<Status> {
        let code = self.reader().recv_int().await?;
        match Status::from_code(code) {
            Some(Status::Ok) => Ok(Status::Ok),
            Some(Status::Eof) if eof_allowed => Ok(Status::Eof),
            Some(Status::Failed) => {
                let message = self.reader().recv_string().await?;
                debug!("{} failed: {}", self.name, message);
                Err(DbmiError::Failed(message))
            }
            Some(other) => Err(DbmiError::protocol(format!(
                "driver answered with status {}",
                other
            ))),
            None => Err(DbmiError::protocol(format!("unknown status code {}", code))),
        }
    }

    /// Tear the link down when `result` is a fatal error.
    pub(super) async fn settle<T>(&mut self, result: DbmiResult<T>) -> DbmiResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() && self.link == Link::Ready {
                warn!(
                    "Tearing down driver '{}' ({}): {}",
                    self.name,
                    self.transport.describe(),
                    e
                );
                self.teardown().await;
            }
        }
        result
    }

    /// Run a procedure whose only result is the status.
    pub(super) async fn call_simple(
        &mut self,
        procedure: Procedure,
        args: WireWriter,
    ) -> DbmiResult<()> {
        guarded!(self, async {
            self.start_call(procedure).await?;
            self.send(args).await?;
            self.recv_status().await?;
            Ok(())
        })
    }

    /// Fail locally when `procedure` needs a database and none is open.
    fn require_database(&self, procedure: Procedure) -> DbmiResult<()> {
        if procedure.needs_open_database() && self.database.is_none() {
            return Err(DbmiError::DatabaseNotOpen);
        }
        Ok(())
    }
}
