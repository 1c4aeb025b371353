//! SQLite storage adapter.

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, trace};

use ormfetch_proto::{Binding, Value};

use super::{Row, RowCursor, Storage, StoreConfig};
use crate::error::Error;
use crate::query::SelectStatement;

/// A store backed by a single SQLite connection.
pub struct SqliteStorage {
    conn: Connection,
    config: StoreConfig,
}

impl SqliteStorage {
    /// Open a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self, Error> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch(if config.foreign_keys {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        })?;

        debug!(
            path = ?config.path,
            foreign_keys = config.foreign_keys,
            "opened sqlite store"
        );

        Ok(Self { conn, config })
    }

    /// Open a private in-memory store.
    pub fn in_memory() -> Result<Self, Error> {
        Self::open(StoreConfig::in_memory())
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying connection, for schema setup and writes.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run one or more statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), Error> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn parameters(statement: &SelectStatement) -> impl Iterator<Item = Option<&str>> {
        statement.bindings.iter().map(Binding::as_text)
    }
}

/// A column read out of a stepped row, decoded when its row is yielded.
enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(Vec<u8>),
    Blob(Vec<u8>),
}

impl RawValue {
    fn read(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => RawValue::Null,
            ValueRef::Integer(i) => RawValue::Integer(i),
            ValueRef::Real(f) => RawValue::Real(f),
            ValueRef::Text(bytes) => RawValue::Text(bytes.to_vec()),
            ValueRef::Blob(bytes) => RawValue::Blob(bytes.to_vec()),
        }
    }

    /// Convert the storage class to a value.
    fn decode(self) -> Result<Value, Error> {
        Ok(match self {
            RawValue::Null => Value::Null,
            RawValue::Integer(i) => Value::Int64(i),
            RawValue::Real(f) => Value::Float64(f),
            RawValue::Text(bytes) => Value::String(
                String::from_utf8(bytes)
                    .map_err(|e| Error::InvalidData(format!("non UTF-8 text column: {}", e)))?,
            ),
            RawValue::Blob(bytes) => Value::Bytes(bytes),
        })
    }
}

fn decode_row(values: Vec<RawValue>) -> Result<Row, Error> {
    values
        .into_iter()
        .map(RawValue::decode)
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}

impl Storage for SqliteStorage {
    fn query(&self, statement: &SelectStatement) -> Result<RowCursor<'_>, Error> {
        let sql = statement.to_sql();
        trace!(sql = %sql, bindings = statement.bindings.len(), "select");

        let mut stmt = self.conn.prepare(&sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(Self::parameters(statement)))?;

        // Stepped to completion before returning; decoded per yielded row.
        let mut stepped = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(RawValue::read(row.get_ref(i)?));
            }
            stepped.push(values);
        }

        Ok(Box::new(stepped.into_iter().map(decode_row)))
    }

    fn count(&self, statement: &SelectStatement) -> Result<u64, Error> {
        let sql = statement.to_count_sql();
        trace!(sql = %sql, "count");

        let count: i64 = self.conn.query_row(
            &sql,
            params_from_iter(Self::parameters(statement)),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}
