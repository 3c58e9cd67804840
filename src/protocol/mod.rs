//! DBMI Wire Protocol
//!
//! Procedure numbering, status codes and the field codec shared by the
//! client library and driver processes.
//!
//! There is no length prefix around a whole message: each side reads
//! exactly the fields a procedure number implies, one after another.

pub mod codec;
pub mod procedure;
pub mod status;

pub use codec::{WireReader, WireWriter, decode_value, encode_value};
pub use procedure::{Family, Procedure};
pub use status::Status;

/// Protocol version exchanged by the VERSION procedure.
pub const PROTOCOL_VERSION: i32 = 10;

/// Acknowledgement a driver sends for a procedure it does not implement.
pub const NOPROC_ACK: i32 = 0;
