//! Materialized entities and the per-fetch identity map.
//!
//! Entities are shared as `Rc<Entity>`. Relations resolved by the prefetcher
//! are cached on the parent; the related entity keeps a weak back reference
//! to its parent so that bidirectional graphs drop cleanly.

mod context;

pub use context::FetchContext;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ormfetch_proto::Value;

use crate::catalog::ModelId;

/// Resolution state of a named relation on an entity.
#[derive(Debug, Clone)]
pub enum RelationState {
    /// The relation was never prefetched.
    Unresolved,
    /// Has-one relation; `None` when no related row exists.
    One(Option<Rc<Entity>>),
    /// Has-many relation, possibly empty.
    Many(Rc<[Rc<Entity>]>),
}

impl RelationState {
    /// Check if the relation has been resolved.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, RelationState::Unresolved)
    }
}

/// A row materialized as an object.
pub struct Entity {
    model: ModelId,
    primary_key: i64,
    fields: Vec<(String, Value)>,
    relations: RefCell<HashMap<String, RelationState>>,
    back_references: RefCell<HashMap<String, Weak<Entity>>>,
}

impl Entity {
    /// Create an entity with the given field values.
    pub fn new(model: ModelId, primary_key: i64, fields: Vec<(String, Value)>) -> Self {
        Self {
            model,
            primary_key,
            fields,
            relations: RefCell::new(HashMap::new()),
            back_references: RefCell::new(HashMap::new()),
        }
    }

    /// Model this entity belongs to.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Primary key.
    pub fn primary_key(&self) -> i64 {
        self.primary_key
    }

    /// Identity map key.
    pub fn identity(&self) -> (ModelId, i64) {
        (self.model, self.primary_key)
    }

    /// Value of a loaded property.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// All loaded properties, in column order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Resolution state of the relation cached under `name`.
    pub fn relation(&self, name: &str) -> RelationState {
        self.relations
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(RelationState::Unresolved)
    }

    /// The has-one relation `name`: `None` if unresolved.
    pub fn has_one(&self, name: &str) -> Option<Option<Rc<Entity>>> {
        match self.relation(name) {
            RelationState::One(related) => Some(related),
            _ => None,
        }
    }

    /// The has-many relation `name`: `None` if unresolved.
    pub fn has_many(&self, name: &str) -> Option<Rc<[Rc<Entity>]>> {
        match self.relation(name) {
            RelationState::Many(related) => Some(related),
            _ => None,
        }
    }

    /// Cache a resolved has-one relation.
    pub fn set_has_one(&self, name: &str, related: Option<Rc<Entity>>) {
        self.relations
            .borrow_mut()
            .insert(name.to_string(), RelationState::One(related));
    }

    /// Cache a resolved has-many relation.
    pub fn set_has_many(&self, name: &str, related: Rc<[Rc<Entity>]>) {
        self.relations
            .borrow_mut()
            .insert(name.to_string(), RelationState::Many(related));
    }

    /// Point the foreign-key property `property` at `parent`.
    pub fn set_back_reference(&self, property: &str, parent: &Rc<Entity>) {
        self.back_references
            .borrow_mut()
            .insert(property.to_string(), Rc::downgrade(parent));
    }

    /// Parent referenced through `property`, if it is still alive.
    pub fn back_reference(&self, property: &str) -> Option<Rc<Entity>> {
        self.back_references
            .borrow()
            .get(property)
            .and_then(Weak::upgrade)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relations: Vec<String> = self.relations.borrow().keys().cloned().collect();
        f.debug_struct("Entity")
            .field("model", &self.model)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("relations", &relations)
            .finish()
    }
}

/// An entity used as a predicate operand is a reference to its primary key.
impl From<&Entity> for Value {
    fn from(entity: &Entity) -> Self {
        Value::Reference(entity.primary_key)
    }
}
