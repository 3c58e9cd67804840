//! # DBMI - Database Management Interface
//!
//! > **Keep the database out of your process.**
//!
//! DBMI lets an application run SQL against any storage backend through an
//! isolated driver process. The client talks to the driver over a pair of
//! pipes with a procedure-numbered request/response protocol.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use dbmi::prelude::*;
//!
//! let mut driver = Driver::start("sqlite").await?;
//! driver.open_database(&Handle::new("gis")).await?;
//!
//! let mut cursor = driver
//!     .open_select_cursor("select * from rybniky", CursorMode::SEQUENTIAL)
//!     .await?;
//! while driver.fetch(&mut cursor, Position::Next).await? {
//!     println!("{:?}", cursor.value(0)?);
//! }
//! driver.close_cursor(&mut cursor).await?;
//! driver.close_database().await?;
//! driver.shutdown().await?;
//! ```
//!
//! ## Layers
//!
//! | Module     | Role                                          |
//! |------------|-----------------------------------------------|
//! | `types`    | SQL/host types, `Value`, datetimes             |
//! | `schema`   | `Column`, `Table`, `Index`, `Handle`           |
//! | `protocol` | procedure numbers, status codes, field codec  |
//! | `driver`   | client: process lifecycle, calls, cursors     |
//! | `server`   | driver side: `Backend` trait, `Dispatcher`    |
//! | `catval`   | bulk category/value arrays                    |

pub mod catval;
pub mod config;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod types;

pub mod prelude {
    pub use crate::catval::{CatVal, CatValArray};
    pub use crate::config::DbmiConfig;
    pub use crate::cursor::{Cursor, CursorKind, CursorMode, Position};
    pub use crate::driver::{Driver, InProcessTransport, KillSwitch, Registry, SubprocessTransport};
    pub use crate::error::*;
    pub use crate::protocol::{PROTOCOL_VERSION, Procedure, Status};
    pub use crate::schema::{Column, Handle, Index, Table};
    pub use crate::server::{Backend, Dispatcher, Fixture, MemoryBackend};
    pub use crate::types::{DateTime, HostType, SqlType, Value};
}
