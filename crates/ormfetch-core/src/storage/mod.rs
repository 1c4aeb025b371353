//! Storage access for the fetch engine.
//!
//! The engine only issues single-table selects and counts. [`Storage`] is the
//! seam to the SQL engine; [`SqliteStorage`] implements it over `rusqlite`.

mod config;
mod sqlite;

pub use config::StoreConfig;
pub use sqlite::SqliteStorage;

use ormfetch_proto::Value;

use crate::error::Error;
use crate::query::SelectStatement;

/// One fetched row: values for the requested columns, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Value at column position `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the row.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Forward-only cursor over fetched rows.
///
/// Each row is decoded when it is yielded, so a row that fails to decode
/// fails only its own `next()`. An adapter may step the underlying statement
/// before returning the cursor ([`SqliteStorage`] does); dropping the cursor
/// releases whatever it holds.
pub type RowCursor<'a> = Box<dyn Iterator<Item = Result<Row, Error>> + 'a>;

/// SQL engine seen by the fetch engine.
pub trait Storage {
    /// Run a select, returning rows with values in `statement.columns` order.
    fn query(&self, statement: &SelectStatement) -> Result<RowCursor<'_>, Error>;

    /// Count the rows `statement` would return.
    fn count(&self, statement: &SelectStatement) -> Result<u64, Error>;
}
