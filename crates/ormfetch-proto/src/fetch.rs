//! Fetch descriptions.
//!
//! A [`FetchSpec`] is pure data: which model to read, how to filter, sort and
//! page it, how many rows to materialize per batch, and which relations to
//! prefetch. It is compiled by the engine and never mutated by it.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::predicate::Predicate;

/// A sort key on an entity property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Property to sort by.
    pub property: String,
    /// Ascending when true.
    pub ascending: bool,
}

impl SortKey {
    /// Create ascending order.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ascending: true,
        }
    }

    /// Create descending order.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ascending: false,
        }
    }
}

/// Cardinality of a prefetched relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// At most one related entity per parent.
    HasOne,
    /// Any number of related entities per parent.
    HasMany,
}

/// A relation to prefetch for the parents of a fetch.
///
/// Every field is optional so that partially configured descriptors (for
/// example ones loaded from a config file) can be represented; the prefetcher
/// skips any descriptor that is not fully configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationDescriptor {
    /// Accessor name under which the parent caches the result.
    pub name: Option<String>,
    /// Name of the related model.
    pub related_model: Option<String>,
    /// Property on the related model holding the parent's primary key.
    pub foreign_key: Option<String>,
    /// Relation cardinality.
    pub kind: Option<RelationKind>,
}

impl RelationDescriptor {
    /// Describe a has-one relation.
    pub fn has_one(
        name: impl Into<String>,
        related_model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            related_model: Some(related_model.into()),
            foreign_key: Some(foreign_key.into()),
            kind: Some(RelationKind::HasOne),
        }
    }

    /// Describe a has-many relation.
    pub fn has_many(
        name: impl Into<String>,
        related_model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            related_model: Some(related_model.into()),
            foreign_key: Some(foreign_key.into()),
            kind: Some(RelationKind::HasMany),
        }
    }

    /// Borrow the configured parts, or `None` if any is missing.
    pub fn parts(&self) -> Option<(&str, &str, &str, RelationKind)> {
        Some((
            self.name.as_deref()?,
            self.related_model.as_deref()?,
            self.foreign_key.as_deref()?,
            self.kind?,
        ))
    }

    /// Check that every field is set.
    pub fn is_configured(&self) -> bool {
        self.parts().is_some()
    }
}

/// Declarative description of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSpec {
    /// Model to fetch.
    pub model: String,
    /// Optional filter.
    pub predicate: Option<Predicate>,
    /// Sort keys, applied in order.
    pub sort: Vec<SortKey>,
    /// Maximum number of rows. `None` means unbounded.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: u64,
    /// Rows materialized per window. Zero means load everything at once.
    pub batch_size: usize,
    /// Select distinct rows.
    pub distinct: bool,
    /// Properties to group by.
    pub group_by: Vec<String>,
    /// Properties to load. Empty means every column.
    pub properties: Vec<String>,
    /// Relations to prefetch for each materialized page.
    pub relations: Vec<RelationDescriptor>,
}

impl Default for FetchSpec {
    fn default() -> Self {
        Self {
            model: String::new(),
            predicate: None,
            sort: Vec::new(),
            limit: None,
            offset: 0,
            batch_size: 0,
            distinct: false,
            group_by: Vec::new(),
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }
}

impl FetchSpec {
    /// Create a fetch of every row of `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the filter.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Add a sort key.
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the window size for lazy materialization.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Select distinct rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a group-by property.
    pub fn with_group_by(mut self, property: impl Into<String>) -> Self {
        self.group_by.push(property.into());
        self
    }

    /// Restrict the loaded properties.
    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }

    /// Add a relation to prefetch.
    pub fn with_relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Check if results are materialized lazily in windows.
    pub fn is_batched(&self) -> bool {
        self.batch_size > 0
    }

    /// Load a fetch description from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Render this fetch description as JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
