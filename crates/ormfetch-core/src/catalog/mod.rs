//! Schema catalog for ormfetch.
//!
//! The catalog maps models to tables and properties to columns.

mod registry;
mod schema;

pub use registry::{ModelId, SchemaRegistry};
pub use schema::{EntitySchema, FieldDef, Schema, CONVENTIONAL_PRIMARY_KEY, PRIMARY_KEY_PROPERTY};
