//! Error types for DBMI.

use crate::protocol::{Procedure, Status};
use thiserror::Error;

/// The main error type for DBMI operations.
#[derive(Debug, Error)]
pub enum DbmiError {
    /// The backend rejected the request; the message comes from the driver.
    #[error("Driver failure: {0}")]
    Failed(String),

    /// The driver does not implement the procedure.
    #[error("Procedure {0} is not supported by the driver")]
    NoProc(Procedure),

    /// A value could not be marshalled; nothing was sent.
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Malformed frame or unexpected reply. The connection is unusable.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The driver reported a different protocol version at startup.
    #[error("Protocol version mismatch: client speaks {client}, driver speaks {driver}")]
    VersionMismatch { client: i32, driver: i32 },

    /// The call was aborted through a kill switch.
    #[error("Driver '{0}' was killed")]
    Killed(String),

    /// No registry entry for the requested driver.
    #[error("Driver '{0}' not found in registry")]
    DriverNotFound(String),

    /// The driver executable could not be started.
    #[error("Cannot start driver '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed registry file entry.
    #[error("Registry error at line {line}: {message}")]
    Registry { line: usize, message: String },

    /// Operation on a cursor that is not open.
    #[error("Cursor is closed")]
    CursorClosed,

    /// Column index outside the table.
    #[error("Column index {index} out of range (table has {count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    /// Value variant does not match the declared host type.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Datetime text that does not match its interval range.
    #[error("Invalid datetime '{0}'")]
    InvalidDatetime(String),

    /// Procedure needs an open database.
    #[error("Database is not open")]
    DatabaseNotOpen,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error on the driver pipe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbmiError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create an encoding error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Status code this error is reported as on the wire.
    pub fn status(&self) -> Status {
        match self {
            Self::NoProc(_) => Status::NoProc,
            Self::Encode(_) => Status::MemoryErr,
            Self::Protocol(_) | Self::Io(_) | Self::VersionMismatch { .. } | Self::Killed(_) => {
                Status::ProtocolErr
            }
            _ => Status::Failed,
        }
    }

    /// True if the connection that produced this error must be torn down.
    pub fn is_fatal(&self) -> bool {
        self.status() == Status::ProtocolErr
    }
}

/// Result type alias for DBMI operations.
pub type DbmiResult<T> = Result<T, DbmiError>;
