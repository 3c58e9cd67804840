//! Field codec for the driver pipe.
//!
//! Encoding is pure: fields are appended to a `BytesMut` and flushed with
//! a single write. Decoding reads one field at a time from the stream, so a
//! reader never needs to know a message length up front.
//!
//! Layout:
//! - int: i32 big-endian
//! - double: f64 big-endian
//! - string: i32 byte length + UTF-8 bytes
//! - value: i32 null flag, then the payload of the column's host type;
//!   datetimes travel as text formatted for the SQL type's interval range

use crate::error::{DbmiError, DbmiResult};
use crate::schema::{Column, Handle, Index, Table};
use crate::types::{DateTime, HostType, IntervalRange, SqlType, Value};
use bytes::{BufMut, BytesMut};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest string a peer may announce.
pub const MAX_STRING_LEN: usize = 64 * 1024 * 1024;

/// Largest element count a peer may announce for an array.
pub const MAX_ARRAY_LEN: usize = 16 * 1024 * 1024;

const GRANTED: i32 = 1;
const NOT_GRANTED: i32 = -1;

/// Accumulates the fields of one message direction.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> BytesMut {
        self.buf
    }

    /// Append everything `other` has buffered.
    pub fn append(&mut self, other: WireWriter) {
        self.buf.unsplit(other.buf);
    }

    /// Write everything buffered so far and flush the stream.
    pub async fn flush_to<W>(&mut self, stream: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if !self.buf.is_empty() {
            stream.write_all(&self.buf).await?;
            self.buf.clear();
        }
        stream.flush().await
    }

    pub fn put_int(&mut self, n: i32) {
        self.buf.put_i32(n);
    }

    pub fn put_bool(&mut self, b: bool) {
        self.put_int(b as i32);
    }

    pub fn put_double(&mut self, d: f64) {
        self.buf.put_f64(d);
    }

    pub fn put_str(&mut self, s: &str) {
        self.buf.put_i32(s.len() as i32);
        self.buf.put_slice(s.as_bytes());
    }

    pub fn put_strings<S: AsRef<str>>(&mut self, items: &[S]) {
        self.put_int(items.len() as i32);
        for item in items {
            self.put_str(item.as_ref());
        }
    }

    pub fn put_len(&mut self, n: usize) -> DbmiResult<()> {
        let n = i32::try_from(n).map_err(|_| DbmiError::encode(format!("count {} too large", n)))?;
        self.put_int(n);
        Ok(())
    }

    /// Encode `value` as declared by `host_type` / `sql_type`. A payload of
    /// another host type is rejected before anything is written.
    pub fn put_value(
        &mut self,
        value: &Value,
        host_type: HostType,
        sql_type: SqlType,
    ) -> DbmiResult<()> {
        value
            .check_type(host_type)
            .map_err(|e| DbmiError::encode(e.to_string()))?;
        match value {
            Value::Null => self.put_bool(true),
            Value::Int(n) => {
                self.put_bool(false);
                self.put_int(*n);
            }
            Value::Double(d) => {
                self.put_bool(false);
                self.put_double(*d);
            }
            Value::String(s) => {
                if s.len() > MAX_STRING_LEN {
                    return Err(DbmiError::encode(format!("string of {} bytes", s.len())));
                }
                self.put_bool(false);
                self.put_str(s.as_str());
            }
            Value::DateTime(dt) => {
                let range = sql_type.interval_range().unwrap_or(IntervalRange::FULL);
                self.put_bool(false);
                self.put_str(&dt.format(range));
            }
        }
        Ok(())
    }

    pub fn put_column_value(&mut self, column: &Column) -> DbmiResult<()> {
        self.put_value(&column.value, column.host_type, column.sql_type)
    }

    pub fn put_column(&mut self, column: &Column) -> DbmiResult<()> {
        self.put_str(&column.name);
        self.put_str(&column.description);
        self.put_int(column.sql_type.code());
        self.put_int(column.host_type.code());
        self.put_int(column.precision);
        self.put_int(column.scale);
        self.put_int(column.length);
        self.put_bool(column.null_allowed);
        self.put_bool(column.has_default());
        self.put_bool(column.use_default);
        self.put_bool(column.select);
        self.put_bool(column.update);
        if let Some(default) = &column.default_value {
            self.put_value(default, column.host_type, column.sql_type)?;
        }
        Ok(())
    }

    /// Table definition: columns, then name, description and privileges.
    pub fn put_table(&mut self, table: &Table) -> DbmiResult<()> {
        self.put_len(table.column_count())?;
        for column in table.columns() {
            self.put_column(column)?;
        }
        self.put_str(&table.name);
        self.put_str(&table.description);
        self.put_int(if table.insert_granted { GRANTED } else { NOT_GRANTED });
        self.put_int(if table.delete_granted { GRANTED } else { NOT_GRANTED });
        Ok(())
    }

    /// Current row: one value per column, in column order.
    pub fn put_table_data(&mut self, table: &Table) -> DbmiResult<()> {
        for column in table.columns() {
            self.put_column_value(column)?;
        }
        Ok(())
    }

    pub fn put_handle(&mut self, handle: &Handle) {
        self.put_str(&handle.name);
        self.put_str(&handle.schema);
    }

    pub fn put_index(&mut self, index: &Index) {
        self.put_str(&index.name);
        self.put_str(&index.table_name);
        self.put_strings(&index.columns);
        self.put_bool(index.unique);
    }
}

/// Reads fields from a byte stream.
pub struct WireReader<R> {
    inner: R,
}

impl<R> WireReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one procedure number, or `None` on a clean end of stream.
    /// Used by drivers to detect that the client went away.
    pub async fn recv_procedure_code(&mut self) -> DbmiResult<Option<i32>> {
        match self.inner.read_i32().await {
            Ok(code) => Ok(Some(code)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn recv_int(&mut self) -> DbmiResult<i32> {
        self.inner.read_i32().await.map_err(map_read_error)
    }

    pub async fn recv_bool(&mut self) -> DbmiResult<bool> {
        Ok(self.recv_int().await? != 0)
    }

    pub async fn recv_double(&mut self) -> DbmiResult<f64> {
        self.inner.read_f64().await.map_err(map_read_error)
    }

    /// Read a non-negative count bounded by `MAX_ARRAY_LEN`.
    pub async fn recv_len(&mut self) -> DbmiResult<usize> {
        let n = self.recv_int().await?;
        let len = usize::try_from(n)
            .map_err(|_| DbmiError::protocol(format!("negative count {}", n)))?;
        if len > MAX_ARRAY_LEN {
            return Err(DbmiError::protocol(format!("count {} too large", len)));
        }
        Ok(len)
    }

    pub async fn recv_string(&mut self) -> DbmiResult<String> {
        let n = self.recv_int().await?;
        let len = usize::try_from(n)
            .map_err(|_| DbmiError::protocol(format!("negative string length {}", n)))?;
        if len > MAX_STRING_LEN {
            return Err(DbmiError::protocol(format!("string length {} too large", len)));
        }
        let mut bytes = vec![0u8; len];
        self.inner
            .read_exact(&mut bytes)
            .await
            .map_err(map_read_error)?;
        String::from_utf8(bytes).map_err(|e| DbmiError::protocol(format!("invalid UTF-8: {}", e)))
    }

    pub async fn recv_strings(&mut self) -> DbmiResult<Vec<String>> {
        let n = self.recv_len().await?;
        let mut items = Vec::with_capacity(n.min(1024));
        for _ in 0..n {
            items.push(self.recv_string().await?);
        }
        Ok(items)
    }

    pub async fn recv_value(&mut self, host_type: HostType, sql_type: SqlType) -> DbmiResult<Value> {
        if self.recv_bool().await? {
            return Ok(Value::Null);
        }
        let value = match host_type {
            HostType::Int => Value::Int(self.recv_int().await?),
            HostType::Double => Value::Double(self.recv_double().await?),
            HostType::String => Value::string(self.recv_string().await?),
            HostType::DateTime => {
                let text = self.recv_string().await?;
                let range = sql_type.interval_range().unwrap_or(IntervalRange::FULL);
                let dt = DateTime::parse(&text, range)
                    .map_err(|_| DbmiError::protocol(format!("bad datetime '{}'", text)))?;
                Value::DateTime(dt)
            }
        };
        Ok(value)
    }

    pub async fn recv_column(&mut self) -> DbmiResult<Column> {
        let name = self.recv_string().await?;
        let description = self.recv_string().await?;
        let sql_code = self.recv_int().await?;
        let sql_type = SqlType::from_code(sql_code)
            .ok_or_else(|| DbmiError::protocol(format!("unknown SQL type {}", sql_code)))?;
        let host_code = self.recv_int().await?;
        let host_type = HostType::from_code(host_code)
            .ok_or_else(|| DbmiError::protocol(format!("unknown host type {}", host_code)))?;
        let precision = self.recv_int().await?;
        let scale = self.recv_int().await?;
        let length = self.recv_int().await?;
        let null_allowed = self.recv_bool().await?;
        let has_default = self.recv_bool().await?;
        let use_default = self.recv_bool().await?;
        let select = self.recv_bool().await?;
        let update = self.recv_bool().await?;
        let default_value = if has_default {
            Some(self.recv_value(host_type, sql_type).await?)
        } else {
            None
        };
        Ok(Column {
            name,
            description,
            sql_type,
            host_type,
            value: Value::Null,
            length,
            precision,
            scale,
            null_allowed,
            default_value,
            use_default,
            select,
            update,
        })
    }

    pub async fn recv_table(&mut self) -> DbmiResult<Table> {
        let ncols = self.recv_len().await?;
        let mut columns = Vec::with_capacity(ncols.min(1024));
        for _ in 0..ncols {
            columns.push(self.recv_column().await?);
        }
        let name = self.recv_string().await?;
        let description = self.recv_string().await?;
        let mut table = Table::new(name, columns).description(description);
        table.insert_granted = self.recv_int().await? == GRANTED;
        table.delete_granted = self.recv_int().await? == GRANTED;
        Ok(table)
    }

    /// Refill the column slots of `table` with one row.
    pub async fn recv_table_data(&mut self, table: &mut Table) -> DbmiResult<()> {
        for i in 0..table.column_count() {
            let column = table.column_mut(i)?;
            column.value = self.recv_value(column.host_type, column.sql_type).await?;
        }
        Ok(())
    }

    /// Read one row as declared by `table`, leaving the table untouched.
    pub async fn recv_row(&mut self, table: &Table) -> DbmiResult<Vec<Value>> {
        let mut row = Vec::with_capacity(table.column_count());
        for column in table.columns() {
            row.push(self.recv_value(column.host_type, column.sql_type).await?);
        }
        Ok(row)
    }

    pub async fn recv_handle(&mut self) -> DbmiResult<Handle> {
        let name = self.recv_string().await?;
        let schema = self.recv_string().await?;
        Ok(Handle { name, schema })
    }

    pub async fn recv_index(&mut self) -> DbmiResult<Index> {
        Ok(Index {
            name: self.recv_string().await?,
            table_name: self.recv_string().await?,
            columns: self.recv_strings().await?,
            unique: self.recv_bool().await?,
        })
    }
}

fn map_read_error(e: io::Error) -> DbmiError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DbmiError::protocol("pipe closed by peer")
    } else {
        DbmiError::Io(e)
    }
}

/// Encode a single value as declared by `host_type` / `sql_type`.
pub fn encode_value(value: &Value, host_type: HostType, sql_type: SqlType) -> DbmiResult<BytesMut> {
    let mut w = WireWriter::new();
    w.put_value(value, host_type, sql_type)?;
    Ok(w.into_bytes())
}

/// Decode a single value produced by [`encode_value`].
pub async fn decode_value(bytes: &[u8], host_type: HostType, sql_type: SqlType) -> DbmiResult<Value> {
    WireReader::new(bytes).recv_value(host_type, sql_type).await
}
