//! Return codes carried in every response.

use std::fmt;

/// Status of a procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Backend failure, a message string follows on the wire.
    Failed,
    NoProc,
    /// End of data. A terminal fetch result, not an error.
    Eof,
    MemoryErr,
    ProtocolErr,
}

impl Status {
    pub const fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Failed => 1,
            Status::NoProc => 2,
            Status::Eof => 3,
            Status::MemoryErr => -1,
            Status::ProtocolErr => -2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Failed),
            2 => Some(Status::NoProc),
            3 => Some(Status::Eof),
            -1 => Some(Status::MemoryErr),
            -2 => Some(Status::ProtocolErr),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Failed => "FAILED",
            Status::NoProc => "NOPROC",
            Status::Eof => "EOF",
            Status::MemoryErr => "MEMORY_ERR",
            Status::ProtocolErr => "PROTOCOL_ERR",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for s in [
            Status::Ok,
            Status::Failed,
            Status::NoProc,
            Status::Eof,
            Status::MemoryErr,
            Status::ProtocolErr,
        ] {
            assert_eq!(Status::from_code(s.code()), Some(s));
        }
        assert_eq!(Status::from_code(42), None);
        assert_eq!(Status::ProtocolErr.to_string(), "PROTOCOL_ERR");
    }
}
