//! Fetch execution for ormfetch.
//!
//! A [`FetchSpec`](ormfetch_proto::FetchSpec) is compiled into a
//! [`FetchQuery`], run by the [`FetchExecutor`] and returned either fully
//! loaded or as a [`WindowedResultList`]. Relations named by the fetch are
//! resolved in bulk by the [`RelationshipPrefetcher`].

mod compiler;
mod executor;
mod plan;
mod prefetch;
mod statement;
mod window;

pub use compiler::{compile_predicate, in_clause, CompiledPredicate};
pub use executor::{FetchExecutor, FetchResults};
pub use plan::FetchQuery;
pub use prefetch::RelationshipPrefetcher;
pub use statement::{OrderTerm, SelectStatement};
pub use window::WindowedResultList;
