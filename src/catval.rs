//! Category-value arrays: bulk (category, value) pairs fetched in one go,
//! typically to join raster or vector categories to an attribute column.

use crate::error::{DbmiError, DbmiResult};
use crate::types::{HostType, Value};
use std::cmp::Ordering;

/// SELECT used to collect `key`/`column` pairs from `table`, optionally
/// restricted by a WHERE clause.
pub fn catval_query(table: &str, key: &str, column: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("SELECT {}, {} FROM {}", key, column, table);
    if let Some(cond) = where_clause.map(str::trim).filter(|c| !c.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(cond);
    }
    sql
}

/// One (category, value) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CatVal {
    pub cat: i32,
    pub value: Value,
}

/// A growable array of (category, value) pairs sharing one host type.
///
/// Every non-null value matches `host_type`, and `capacity() >= len()`
/// after every operation.
#[derive(Debug, Clone)]
pub struct CatValArray {
    host_type: HostType,
    items: Vec<CatVal>,
    sorted_by_cat: bool,
}

impl CatValArray {
    pub fn new(host_type: HostType) -> Self {
        Self {
            host_type,
            items: Vec::new(),
            sorted_by_cat: true,
        }
    }

    /// Array with room for `n` elements.
    pub fn alloc(host_type: HostType, n: usize) -> Self {
        let mut array = Self::new(host_type);
        array.realloc(n);
        array
    }

    /// Ensure room for at least `n` elements. Existing elements are left
    /// untouched and the capacity never shrinks.
    pub fn realloc(&mut self, n: usize) {
        if n > self.items.capacity() {
            self.items.reserve_exact(n - self.items.len());
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatVal> {
        self.items.iter()
    }

    pub fn push(&mut self, cat: i32, value: Value) -> DbmiResult<()> {
        value.check_type(self.host_type)?;
        if let Some(last) = self.items.last() {
            if last.cat > cat {
                self.sorted_by_cat = false;
            }
        }
        self.items.push(CatVal { cat, value });
        Ok(())
    }

    /// Release every element. Returns how many owned string or datetime
    /// payloads were dropped; a second call finds nothing and returns 0.
    pub fn free(&mut self) -> usize {
        let released = if self.host_type.owns_payload() {
            self.items.iter().filter(|cv| !cv.value.is_null()).count()
        } else {
            0
        };
        self.items = Vec::new();
        self.sorted_by_cat = true;
        released
    }

    /// Sort by category so lookups can binary search.
    pub fn sort(&mut self) {
        self.items.sort_by_key(|cv| cv.cat);
        self.sorted_by_cat = true;
    }

    /// Sort by value, nulls last. Datetime arrays cannot be ordered.
    pub fn sort_by_value(&mut self) -> DbmiResult<()> {
        if self.host_type == HostType::DateTime {
            return Err(DbmiError::Failed(
                "Cannot sort datetime category values".to_string(),
            ));
        }
        self.items.sort_by(|a, b| {
            a.value
                .compare(&b.value)
                .unwrap_or(Ordering::Equal)
                .then(a.cat.cmp(&b.cat))
        });
        self.sorted_by_cat = self.items.windows(2).all(|w| w[0].cat <= w[1].cat);
        Ok(())
    }

    /// Element for `cat`. Uses binary search when the array is sorted by
    /// category, a linear scan otherwise.
    pub fn get(&self, cat: i32) -> Option<&CatVal> {
        if self.sorted_by_cat {
            self.items
                .binary_search_by_key(&cat, |cv| cv.cat)
                .ok()
                .map(|i| &self.items[i])
        } else {
            self.items.iter().find(|cv| cv.cat == cat)
        }
    }

    pub fn get_value(&self, cat: i32) -> DbmiResult<&Value> {
        self.get(cat)
            .map(|cv| &cv.value)
            .ok_or_else(|| DbmiError::Failed(format!("No record for category {}", cat)))
    }

    /// Integer value for `cat`; `None` when the value is null.
    pub fn get_value_int(&self, cat: i32) -> DbmiResult<Option<i32>> {
        self.typed(cat, HostType::Int, Value::as_int)
    }

    /// Double value for `cat`; `None` when the value is null.
    pub fn get_value_double(&self, cat: i32) -> DbmiResult<Option<f64>> {
        self.typed(cat, HostType::Double, Value::as_double)
    }

    fn typed<T>(
        &self,
        cat: i32,
        host_type: HostType,
        extract: fn(&Value) -> Option<T>,
    ) -> DbmiResult<Option<T>> {
        if self.host_type != host_type {
            return Err(DbmiError::TypeMismatch {
                expected: self.host_type.name(),
                got: host_type.name(),
            });
        }
        Ok(extract(self.get_value(cat)?))
    }
}
