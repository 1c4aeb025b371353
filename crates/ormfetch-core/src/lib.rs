//! ormfetch Core - Predicate compilation, identity mapping and lazy fetches.
//!
//! This crate turns fetch descriptions from [`ormfetch_proto`] into SQL,
//! resolves rows to canonical entities and prefetches relations in bulk.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod query;
pub mod storage;

pub use catalog::{EntitySchema, FieldDef, ModelId, Schema, SchemaRegistry};
pub use entity::{Entity, FetchContext, RelationState};
pub use error::Error;
pub use query::{
    compile_predicate, CompiledPredicate, FetchExecutor, FetchQuery, FetchResults,
    RelationshipPrefetcher, WindowedResultList,
};
pub use storage::{Row, RowCursor, SqliteStorage, Storage, StoreConfig};

// Metrics exports
pub use metrics::{new_shared_metrics, FetchMetrics, Histogram, SharedFetchMetrics};

/// Re-export protocol types.
pub use ormfetch_proto as proto;
