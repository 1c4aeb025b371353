//! Registry of model schemas.

use std::collections::HashMap;
use std::fmt;

use super::schema::Schema;
use crate::error::Error;

/// Compact identifier assigned to a registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The set of models known to the fetch engine.
///
/// Schemas are registered once at startup; each gets a [`ModelId`] in
/// registration order.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: Vec<Box<dyn Schema>>,
    by_name: HashMap<String, ModelId>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, returning its id.
    ///
    /// Registering a name twice replaces the schema and keeps the id.
    pub fn register(&mut self, schema: impl Schema + 'static) -> ModelId {
        if let Some(&id) = self.by_name.get(schema.name()) {
            self.schemas[id.0 as usize] = Box::new(schema);
            return id;
        }

        let id = ModelId(self.schemas.len() as u32);
        self.by_name.insert(schema.name().to_string(), id);
        self.schemas.push(Box::new(schema));
        id
    }

    /// Builder-style registration.
    pub fn with_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.register(schema);
        self
    }

    /// Look up a model id by name.
    pub fn model_id(&self, name: &str) -> Option<ModelId> {
        self.by_name.get(name).copied()
    }

    /// Get the schema for an id.
    pub fn get(&self, id: ModelId) -> Option<&dyn Schema> {
        self.schemas.get(id.0 as usize).map(|s| s.as_ref())
    }

    /// Resolve a model by name.
    pub fn resolve(&self, name: &str) -> Result<(ModelId, &dyn Schema), Error> {
        let id = self
            .model_id(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))?;
        let schema = self
            .get(id)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))?;
        Ok((id, schema))
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check if no model is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.schemas.iter().map(|s| (s.name(), s.table_name())))
            .finish()
    }
}
