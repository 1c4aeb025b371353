//! Metrics collection.
//!
//! # Usage
//!
//! ```ignore
//! use ormfetch_core::metrics::new_shared_metrics;
//! use ormfetch_core::query::FetchExecutor;
//!
//! let metrics = new_shared_metrics();
//! let executor = FetchExecutor::new(&storage, &registry).with_metrics(metrics.clone());
//!
//! // ... run fetches ...
//!
//! println!("{}", metrics.to_prometheus());
//! ```

mod histogram;
mod registry;

pub use histogram::Histogram;
pub use registry::{new_shared_metrics, FetchMetrics, SharedFetchMetrics};
