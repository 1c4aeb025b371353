//! Per-fetch identity map.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use ormfetch_proto::Value;
use tracing::trace;

use super::Entity;
use crate::catalog::{ModelId, Schema};
use crate::error::Error;
use crate::storage::Row;

/// Identity map shared by every query of one logical fetch.
///
/// At most one entity instance exists per `(model, primary key)`; the first
/// instance registered wins. The context is single-threaded.
#[derive(Debug, Default)]
pub struct FetchContext {
    entities: RefCell<HashMap<(ModelId, i64), Rc<Entity>>>,
    hits: Cell<u64>,
}

impl FetchContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached entity.
    pub fn get(&self, model: ModelId, primary_key: i64) -> Option<Rc<Entity>> {
        self.entities.borrow().get(&(model, primary_key)).cloned()
    }

    /// Register an entity, returning the canonical instance for its key.
    pub fn put(&self, entity: Rc<Entity>) -> Rc<Entity> {
        let mut entities = self.entities.borrow_mut();
        Rc::clone(entities.entry(entity.identity()).or_insert(entity))
    }

    /// Check if an entity is cached.
    pub fn contains(&self, model: ModelId, primary_key: i64) -> bool {
        self.entities.borrow().contains_key(&(model, primary_key))
    }

    /// Number of cached entities.
    pub fn len(&self) -> usize {
        self.entities.borrow().len()
    }

    /// Check if the context is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.borrow().is_empty()
    }

    /// Number of rows resolved to an already cached instance.
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// Resolve a fetched row to its canonical entity.
    ///
    /// `columns` names the row's columns; the first one holds the primary
    /// key. Columns with no backing property are ignored. Returns the entity
    /// and whether it was already cached.
    pub fn materialize(
        &self,
        model: ModelId,
        schema: &dyn Schema,
        columns: &[String],
        row: &Row,
    ) -> Result<(Rc<Entity>, bool), Error> {
        let primary_key = row
            .get(0)
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::MissingPrimaryKey {
                model: schema.name().to_string(),
            })?;

        if let Some(existing) = self.get(model, primary_key) {
            self.hits.set(self.hits.get() + 1);
            trace!(model = schema.name(), primary_key, "identity map hit");
            return Ok((existing, true));
        }

        let fields = columns
            .iter()
            .zip(row.values())
            .skip(1)
            .filter_map(|(column, value)| {
                schema
                    .property_for(column)
                    .map(|property| (property.to_string(), value.clone()))
            })
            .collect();

        let entity = self.put(Rc::new(Entity::new(model, primary_key, fields)));
        Ok((entity, false))
    }
}
