//! Column descriptor.

use crate::error::DbmiResult;
use crate::types::{HostType, SqlType, Value};

/// One column of a table, together with the value slot a cursor refills
/// on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub description: String,
    pub sql_type: SqlType,
    pub host_type: HostType,
    pub value: Value,
    pub length: i32,
    pub precision: i32,
    pub scale: i32,
    pub null_allowed: bool,
    /// `Some` when the column declares a default.
    pub default_value: Option<Value>,
    pub use_default: bool,
    /// Column is part of the cursor's SELECT projection.
    pub select: bool,
    /// Column is part of the cursor's UPDATE projection.
    pub update: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sql_type,
            host_type: sql_type.host_type(),
            value: Value::Null,
            length: 0,
            precision: 0,
            scale: 0,
            null_allowed: true,
            default_value: None,
            use_default: false,
            select: true,
            update: false,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    pub fn precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.null_allowed = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }

    /// Store `value` in the column's slot after checking it against the
    /// host type.
    pub fn set_value(&mut self, value: &Value) -> DbmiResult<()> {
        value.check_type(self.host_type)?;
        self.value.assign(value);
        Ok(())
    }

    /// Text of the current value, formatted for the column's SQL type.
    pub fn value_text(&self) -> String {
        self.value.to_text(self.sql_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_type_follows_sql_type() {
        let col = Column::new("pocet", SqlType::Integer);
        assert_eq!(col.host_type, HostType::Int);
        assert!(col.null_allowed);
        assert!(!col.has_default());
    }

    #[test]
    fn test_set_value_checks_type() {
        let mut col = Column::new("kapri", SqlType::Character).length(20);
        assert!(col.set_value(&Value::Int(1)).is_err());
        col.set_value(&Value::string("hodne")).unwrap();
        assert_eq!(col.value_text(), "hodne");
        col.set_value(&Value::Null).unwrap();
        assert!(col.value.is_null());
    }
}
