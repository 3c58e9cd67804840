//! Owned, reusable string buffer.

use serde::Serialize;
use std::fmt;

/// A growable text buffer that is rewritten in place when a cursor is
/// refilled, so its allocation survives across rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DbString {
    buf: String,
}

impl DbString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
        }
    }

    /// Replace the contents, keeping the allocation.
    pub fn copy(&mut self, text: &str) {
        self.buf.clear();
        self.buf.push_str(text);
    }

    pub fn append(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Empty the buffer, keeping the allocation.
    pub fn zero(&mut self) {
        self.buf.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl From<&str> for DbString {
    fn from(text: &str) -> Self {
        Self {
            buf: text.to_string(),
        }
    }
}

impl From<String> for DbString {
    fn from(buf: String) -> Self {
        Self { buf }
    }
}

impl AsRef<str> for DbString {
    fn as_ref(&self) -> &str {
        &self.buf
    }
}

impl fmt::Display for DbString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}
