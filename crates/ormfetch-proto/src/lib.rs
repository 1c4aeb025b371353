//! ormfetch fetch-description types.
//!
//! This crate defines the data that describes a fetch, independent of any
//! schema or storage engine.
//!
//! # Modules
//!
//! - [`value`] - Runtime values and their statement bindings
//! - [`predicate`] - Composable filter predicates
//! - [`fetch`] - Fetch descriptions, sort keys and relation descriptors
//! - [`error`] - Error types
//!
//! All types derive `serde::Serialize` and `serde::Deserialize`, so fetch
//! descriptions can be kept in configuration files:
//!
//! ```ignore
//! use ormfetch_proto::{FetchSpec, Predicate, SortKey};
//!
//! let spec = FetchSpec::new("User")
//!     .with_predicate(Predicate::new().gte("age", 18))
//!     .with_sort(SortKey::asc("name"))
//!     .with_batch_size(50);
//!
//! let json = serde_json::to_string(&spec).unwrap();
//! ```

pub mod error;
pub mod fetch;
pub mod predicate;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use fetch::{FetchSpec, RelationDescriptor, RelationKind, SortKey};
pub use predicate::{Combinator, ComparisonOp, Predicate, Term, ValueSet};
pub use value::{Binding, Value};
