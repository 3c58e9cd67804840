//! DBMI Driver Client (Layer 3: Async I/O)
//!
//! One `Driver` owns one driver process (or in-process dispatcher) and
//! talks to it strictly request/response.
//!
//! Methods are split across modules by procedure family:
//! - `call.rs` - procedure framing, status handling, teardown
//! - `database.rs` - open/close/create/delete/find/list databases, shutdown
//! - `cursor.rs` - open cursors, fetch, insert/update/delete, close
//! - `schema.rs` - execute immediate, transactions, table and index DDL
//! - `catval.rs` - bulk category/value selection
//! - `registry.rs` - `dbmscap` driver registry
//! - `transport.rs` - subprocess and in-process byte transports

/// Run one call under the driver's kill switch, then tear the link down if
/// the call failed fatally.
macro_rules! guarded {
    ($driver:ident, $call:expr) => {{
        let mut kill = $driver.kill_rx.clone();
        let name = $driver.name.clone();
        let result = tokio::select! {
            r = $call => r,
            _ = kill.wait_for(|killed| *killed) => Err($crate::error::DbmiError::Killed(name)),
        };
        $driver.settle(result).await
    }};
}

mod call;
mod catval;
mod cursor;
mod database;
pub mod registry;
mod schema;
pub mod transport;

pub use registry::{Registry, RegistryEntry};
pub use transport::{DriverTransport, InProcessTransport, SubprocessTransport};

use crate::config::DbmiConfig;
use crate::error::{DbmiError, DbmiResult};
use crate::protocol::{PROTOCOL_VERSION, Procedure};
use crate::schema::Handle;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Health of the pipe to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Ready,
    /// A fatal error tore the transport down.
    Broken,
    /// `shutdown` has run.
    Closed,
}

/// Aborts the pending call of a driver from another task.
///
/// The aborted call returns `Killed` and the driver is torn down.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl KillSwitch {
    pub fn kill(&self) {
        self.tx.send_replace(true);
    }
}

/// Client connection to one driver.
pub struct Driver {
    name: String,
    transport: Box<dyn DriverTransport>,
    link: Link,
    kill_tx: Arc<watch::Sender<bool>>,
    kill_rx: watch::Receiver<bool>,
    database: Option<Handle>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name)
            .field("transport", &self.transport.describe())
            .field("link", &self.link)
            .field("database", &self.database)
            .finish()
    }
}

impl Driver {
    /// Start the driver registered as `name`, using the registry named by
    /// the user configuration.
    pub async fn start(name: &str) -> DbmiResult<Self> {
        let config = DbmiConfig::load()?;
        let registry = Registry::load(config.registry_path()?)?;
        Self::start_with_registry(&registry, name).await
    }

    /// Spawn the driver registered as `name` and run the version handshake.
    pub async fn start_with_registry(registry: &Registry, name: &str) -> DbmiResult<Self> {
        let entry = registry.lookup(name)?;
        let transport = SubprocessTransport::spawn(&entry.program, &entry.args)?;
        Self::connect(name, Box::new(transport)).await
    }

    /// Run the version handshake over an existing transport. The transport
    /// is terminated if the handshake fails or the versions differ.
    pub async fn connect(name: &str, transport: Box<dyn DriverTransport>) -> DbmiResult<Self> {
        let (kill_tx, kill_rx) = watch::channel(false);
        let mut driver = Self {
            name: name.to_string(),
            transport,
            link: Link::Ready,
            kill_tx: Arc::new(kill_tx),
            kill_rx,
            database: None,
        };

        let version = match driver.version().await {
            Ok(version) => version,
            Err(e) => {
                driver.teardown().await;
                return Err(e);
            }
        };
        if version != PROTOCOL_VERSION {
            warn!(
                "Driver '{}' speaks protocol {}, expected {}",
                name, version, PROTOCOL_VERSION
            );
            driver.teardown().await;
            return Err(DbmiError::VersionMismatch {
                client: PROTOCOL_VERSION,
                driver: version,
            });
        }
        info!(
            "Connected to driver '{}' ({}), protocol {}",
            name,
            driver.transport.describe(),
            version
        );
        Ok(driver)
    }

    async fn version(&mut self) -> DbmiResult<i32> {
        guarded!(self, async {
            self.start_call(Procedure::Version).await?;
            self.recv_status().await?;
            self.reader().recv_int().await
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database opened by `open_database`, if any.
    pub fn database(&self) -> Option<&Handle> {
        self.database.as_ref()
    }

    /// True until a fatal error or `shutdown`.
    pub fn is_healthy(&self) -> bool {
        self.link == Link::Ready
    }

    /// True while the driver process (or task) is alive.
    pub fn is_running(&mut self) -> bool {
        self.transport.is_running()
    }

    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            tx: Arc::clone(&self.kill_tx),
        }
    }

    /// Mark the link broken and terminate the transport. Safe to repeat.
    async fn teardown(&mut self) {
        if self.link == Link::Ready {
            self.link = Link::Broken;
        }
        if let Err(e) = self.transport.terminate().await {
            warn!("Failed to terminate driver '{}': {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::MemoryBackend;

    #[tokio::test]
    async fn test_handshake_in_process() {
        let transport = InProcessTransport::spawn(MemoryBackend::new());
        let mut driver = Driver::connect("mem", Box::new(transport)).await.unwrap();
        assert!(driver.is_healthy());
        assert!(driver.is_running());
        driver.shutdown().await.unwrap();
        assert!(!driver.is_running());
    }

    #[tokio::test]
    async fn test_version_mismatch_terminates() {
        let transport = InProcessTransport::spawn_with_version(MemoryBackend::new(), 9);
        let err = Driver::connect("old", Box::new(transport)).await.err().unwrap();
        assert!(matches!(
            err,
            DbmiError::VersionMismatch {
                client: 10,
                driver: 9
            }
        ));
    }

    #[tokio::test]
    async fn test_debug_names_driver_and_link() {
        let transport = InProcessTransport::spawn(MemoryBackend::new());
        let mut driver = Driver::connect("mem", Box::new(transport)).await.unwrap();
        let text = format!("{:?}", driver);
        assert!(text.contains("\"mem\""), "{}", text);
        assert!(text.contains("Ready"), "{}", text);
        driver.shutdown().await.unwrap();
        assert!(format!("{:?}", driver).contains("Closed"));
    }

    #[tokio::test]
    async fn test_unknown_registry_entry() {
        let registry = Registry::parse("mem:dbmi-mem-driver").unwrap();
        let err = Driver::start_with_registry(&registry, "pg").await.err().unwrap();
        assert!(matches!(err, DbmiError::DriverNotFound(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let registry = Registry::parse("gone:/nonexistent/dbmi-driver").unwrap();
        let err = Driver::start_with_registry(&registry, "gone").await.err().unwrap();
        assert!(matches!(err, DbmiError::Spawn { .. }));
    }
}
