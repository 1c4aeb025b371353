//! Fetch executor.
//!
//! The executor runs compiled fetches against a [`Storage`], turns rows into
//! entities through the caller's [`FetchContext`], and prefetches requested
//! relations over each materialized page.

use std::rc::Rc;
use std::time::{Duration, Instant};

use ormfetch_proto::{FetchSpec, RelationDescriptor, Value};
use tracing::{debug, instrument};

use super::plan::FetchQuery;
use super::prefetch::RelationshipPrefetcher;
use super::statement::SelectStatement;
use super::window::WindowedResultList;
use crate::catalog::{ModelId, Schema, SchemaRegistry};
use crate::entity::{Entity, FetchContext};
use crate::error::Error;
use crate::metrics::SharedFetchMetrics;
use crate::storage::{Row, RowCursor, Storage};

/// Result of a fetch: fully loaded, or materialized lazily in windows.
pub enum FetchResults<'a> {
    /// Every entity, in order.
    Loaded(Vec<Rc<Entity>>),
    /// Entities materialized on access.
    Windowed(WindowedResultList<'a>),
}

impl<'a> FetchResults<'a> {
    /// Number of results.
    pub fn len(&self) -> usize {
        match self {
            FetchResults::Loaded(entities) => entities.len(),
            FetchResults::Windowed(list) => list.len(),
        }
    }

    /// Check if there are no results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entity at `index`; `None` only for an unfulfilled window slot.
    pub fn get(&self, index: usize) -> Result<Option<Rc<Entity>>, Error> {
        match self {
            FetchResults::Loaded(entities) => entities
                .get(index)
                .cloned()
                .map(Some)
                .ok_or(Error::IndexOutOfRange {
                    index,
                    len: entities.len(),
                }),
            FetchResults::Windowed(list) => list.get(index),
        }
    }

    /// Walk the results in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Option<Rc<Entity>>, Error>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Collect every available entity, materializing windows as needed.
    pub fn to_vec(&self) -> Result<Vec<Rc<Entity>>, Error> {
        let mut entities = Vec::with_capacity(self.len());
        for entity in self.iter() {
            entities.extend(entity?);
        }
        Ok(entities)
    }

    /// The window list, if results are lazy.
    pub fn as_windowed(&self) -> Option<&WindowedResultList<'a>> {
        match self {
            FetchResults::Windowed(list) => Some(list),
            FetchResults::Loaded(_) => None,
        }
    }
}

/// Runs fetches against storage.
#[derive(Clone)]
pub struct FetchExecutor<'a> {
    storage: &'a dyn Storage,
    registry: &'a SchemaRegistry,
    metrics: Option<SharedFetchMetrics>,
}

impl<'a> FetchExecutor<'a> {
    /// Create an executor over `storage` for the models in `registry`.
    pub fn new(storage: &'a dyn Storage, registry: &'a SchemaRegistry) -> Self {
        Self {
            storage,
            registry,
            metrics: None,
        }
    }

    /// Record activity in `metrics`.
    pub fn with_metrics(mut self, metrics: SharedFetchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The schema registry.
    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// The metrics registry, if any.
    pub fn metrics(&self) -> Option<&SharedFetchMetrics> {
        self.metrics.as_ref()
    }

    /// Run a fetch.
    ///
    /// Unbatched fetches load every row and prefetch relations over the whole
    /// list. Batched fetches load only the primary keys and return a
    /// [`WindowedResultList`] that materializes rows on access.
    #[instrument(skip(self, spec, ctx), fields(model = %spec.model, batch_size = spec.batch_size))]
    pub fn fetch(&self, spec: &FetchSpec, ctx: &'a FetchContext) -> Result<FetchResults<'a>, Error> {
        let query = FetchQuery::compile(spec, self.registry)?;

        if query.is_batched() {
            let keys = self.keys(&query)?;
            debug!(rows = keys.len(), "fetched primary keys");
            return Ok(FetchResults::Windowed(WindowedResultList::new(
                self.clone(),
                ctx,
                query,
                keys,
            )));
        }

        let entities = self.load(&query, query.statement(), ctx)?;
        debug!(rows = entities.len(), "fetched entities");
        self.prefetch(&entities, query.relations(), ctx)?;
        Ok(FetchResults::Loaded(entities))
    }

    /// Resolve `relations` over `parents`, caching results on each parent.
    pub fn prefetch(
        &self,
        parents: &[Rc<Entity>],
        relations: &[RelationDescriptor],
        ctx: &FetchContext,
    ) -> Result<(), Error> {
        if relations.is_empty() || parents.is_empty() {
            return Ok(());
        }
        RelationshipPrefetcher::new(self, ctx).prefetch(parents, relations)
    }

    /// Count the rows a fetch would return.
    pub fn count(&self, spec: &FetchSpec) -> Result<u64, Error> {
        let query = FetchQuery::compile(spec, self.registry)?;
        let started = Instant::now();
        let count = self.storage.count(query.statement())?;
        self.record_query(query.model_name(), started);
        Ok(count)
    }

    /// First entity of a fetch, if any.
    pub fn first(&self, spec: &FetchSpec, ctx: &FetchContext) -> Result<Option<Rc<Entity>>, Error> {
        let query = FetchQuery::compile(spec, self.registry)?;
        let entities = self.load(&query, &query.first_statement(), ctx)?;
        self.prefetch(&entities, query.relations(), ctx)?;
        Ok(entities.into_iter().next())
    }

    /// Primary keys of a fetch, in fetch order.
    pub fn primary_keys(&self, spec: &FetchSpec) -> Result<Vec<i64>, Error> {
        let query = FetchQuery::compile(spec, self.registry)?;
        self.keys(&query)
    }

    fn keys(&self, query: &FetchQuery) -> Result<Vec<i64>, Error> {
        let cursor = self.run(query.model_name(), &query.key_statement())?;
        cursor
            .map(|row| {
                row?.get(0)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| Error::MissingPrimaryKey {
                        model: query.model_name().to_string(),
                    })
            })
            .collect()
    }

    /// Issue a select, recording it in metrics.
    pub(crate) fn run(
        &self,
        model_name: &str,
        statement: &SelectStatement,
    ) -> Result<RowCursor<'a>, Error> {
        let storage: &'a dyn Storage = self.storage;
        let started = Instant::now();
        let cursor = storage.query(statement)?;
        self.record_query(model_name, started);
        Ok(cursor)
    }

    /// Issue a select and materialize every row.
    pub(crate) fn load(
        &self,
        query: &FetchQuery,
        statement: &SelectStatement,
        ctx: &FetchContext,
    ) -> Result<Vec<Rc<Entity>>, Error> {
        let schema = self.schema(query.model())?;
        let cursor = self.run(query.model_name(), statement)?;

        let mut entities = Vec::new();
        for row in cursor {
            entities.push(self.materialize(query.model(), schema, &statement.columns, &row?, ctx)?);
        }
        Ok(entities)
    }

    /// Resolve one row through the identity map.
    pub(crate) fn materialize(
        &self,
        model: ModelId,
        schema: &dyn Schema,
        columns: &[String],
        row: &Row,
        ctx: &FetchContext,
    ) -> Result<Rc<Entity>, Error> {
        let (entity, cached) = ctx.materialize(model, schema, columns, row)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_rows(1);
            if cached {
                metrics.record_identity_hits(1);
            }
        }
        Ok(entity)
    }

    pub(crate) fn schema(&self, model: ModelId) -> Result<&'a dyn Schema, Error> {
        let registry: &'a SchemaRegistry = self.registry;
        registry
            .get(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))
    }

    fn record_query(&self, model_name: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_query(model_name, micros(started.elapsed()));
        }
    }
}

/// Whole microseconds in `duration`, saturating at `u64::MAX`.
fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_saturates() {
        assert_eq!(micros(Duration::from_millis(3)), 3_000);
        assert_eq!(micros(Duration::MAX), u64::MAX);
    }
}
