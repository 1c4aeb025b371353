//! Relationship prefetching.
//!
//! For each relation descriptor the prefetcher issues one query for the
//! related rows of every parent on the page, ordered by foreign key, and
//! merge-joins the result back onto the parents. Every parent leaves a pass
//! with the relation resolved: a has-one parent without a related row gets
//! `None`, a has-many parent without related rows gets an empty list.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ormfetch_proto::{Predicate, RelationDescriptor, RelationKind};
use tracing::{debug, instrument, warn};

use super::compiler::compile_predicate;
use super::executor::FetchExecutor;
use super::statement::{OrderTerm, SelectStatement};
use crate::catalog::{ModelId, Schema};
use crate::entity::{Entity, FetchContext};
use crate::error::Error;

/// A descriptor resolved against the catalog.
struct ResolvedRelation<'d, 's> {
    name: &'d str,
    foreign_key: &'d str,
    foreign_key_column: &'s str,
    kind: RelationKind,
    model: ModelId,
    schema: &'s dyn Schema,
}

/// Bulk-resolves relations over a page of parents.
pub struct RelationshipPrefetcher<'a> {
    executor: &'a FetchExecutor<'a>,
    context: &'a FetchContext,
}

impl<'a> RelationshipPrefetcher<'a> {
    /// Create a prefetcher sharing `context` with the primary fetch.
    pub fn new(executor: &'a FetchExecutor<'a>, context: &'a FetchContext) -> Self {
        Self { executor, context }
    }

    /// Resolve each descriptor over `parents`.
    ///
    /// Descriptors that are incomplete or that name an unknown model or an
    /// unmapped foreign key are skipped.
    #[instrument(skip_all, fields(parents = parents.len(), relations = relations.len()))]
    pub fn prefetch(
        &self,
        parents: &[Rc<Entity>],
        relations: &[RelationDescriptor],
    ) -> Result<(), Error> {
        if parents.is_empty() {
            return Ok(());
        }

        let keyed: HashMap<i64, &Rc<Entity>> =
            parents.iter().map(|p| (p.primary_key(), p)).collect();
        let mut seen = HashSet::new();
        let keys: Vec<i64> = parents
            .iter()
            .map(|p| p.primary_key())
            .filter(|k| seen.insert(*k))
            .collect();

        for descriptor in relations {
            let Some(relation) = self.resolve(descriptor) else {
                if let Some(metrics) = self.executor.metrics() {
                    metrics.record_relation_skipped();
                }
                continue;
            };

            match relation.kind {
                RelationKind::HasOne => self.prefetch_has_one(&relation, &keys, &keyed)?,
                RelationKind::HasMany => self.prefetch_has_many(&relation, &keys, &keyed)?,
            }

            if let Some(metrics) = self.executor.metrics() {
                metrics.record_prefetch();
            }
        }

        Ok(())
    }

    fn resolve<'d>(&self, descriptor: &'d RelationDescriptor) -> Option<ResolvedRelation<'d, 'a>> {
        let Some((name, related_model, foreign_key, kind)) = descriptor.parts() else {
            debug!(?descriptor, "skipping incomplete relation descriptor");
            return None;
        };

        let registry = self.executor.registry();
        let Some(model) = registry.model_id(related_model) else {
            warn!(relation = name, related_model, "skipping relation to unknown model");
            return None;
        };
        let schema = registry.get(model)?;

        let Some(foreign_key_column) = schema.column_for(foreign_key) else {
            warn!(
                relation = name,
                related_model,
                foreign_key,
                "skipping relation with unmapped foreign key"
            );
            return None;
        };

        Some(ResolvedRelation {
            name,
            foreign_key,
            foreign_key_column,
            kind,
            model,
            schema,
        })
    }

    /// `SELECT <pk, columns> FROM <related> WHERE <fk> IN (...) ORDER BY <fk> ASC`.
    fn statement(relation: &ResolvedRelation<'_, '_>, keys: &[i64]) -> SelectStatement {
        let schema = relation.schema;
        let table = schema.table_name();

        let mut columns = vec![schema.primary_key_column().to_string()];
        columns.extend(schema.all_columns().into_iter().map(str::to_string));

        let compiled = compile_predicate(
            &Predicate::new().is_in(relation.foreign_key, keys.iter().copied()),
            schema,
            table,
        );

        let mut statement = SelectStatement::new(table, columns);
        statement.selection = Some(compiled.clause);
        statement.bindings = compiled.bindings;
        statement.order_by = vec![
            OrderTerm::asc(format!("{}.{}", table, relation.foreign_key_column)),
            OrderTerm::asc(format!("{}.{}", table, schema.primary_key_column())),
        ];
        statement
    }

    /// Run the relation query, yielding each related entity with its foreign key.
    fn related_rows(
        &self,
        relation: &ResolvedRelation<'_, '_>,
        keys: &[i64],
    ) -> Result<Vec<(Option<i64>, Rc<Entity>)>, Error> {
        let statement = Self::statement(relation, keys);
        let fk_index = statement
            .columns
            .iter()
            .position(|c| c == relation.foreign_key_column);

        let cursor = self.executor.run(relation.schema.name(), &statement)?;
        let mut related = Vec::new();
        for row in cursor {
            let row = row?;
            let foreign_id = fk_index
                .and_then(|i| row.get(i))
                .and_then(|v| v.as_i64());
            let entity = self.executor.materialize(
                relation.model,
                relation.schema,
                &statement.columns,
                &row,
                self.context,
            )?;
            related.push((foreign_id, entity));
        }

        debug!(relation = relation.name, rows = related.len(), "loaded related rows");
        Ok(related)
    }

    fn prefetch_has_one(
        &self,
        relation: &ResolvedRelation<'_, '_>,
        keys: &[i64],
        keyed: &HashMap<i64, &Rc<Entity>>,
    ) -> Result<(), Error> {
        let mut remaining = keyed.clone();

        for (foreign_id, entity) in self.related_rows(relation, keys)? {
            let Some(parent) = foreign_id.and_then(|id| remaining.remove(&id)) else {
                continue;
            };
            entity.set_back_reference(relation.foreign_key, parent);
            parent.set_has_one(relation.name, Some(entity));
        }

        for parent in remaining.values() {
            parent.set_has_one(relation.name, None);
        }
        Ok(())
    }

    fn prefetch_has_many(
        &self,
        relation: &ResolvedRelation<'_, '_>,
        keys: &[i64],
        keyed: &HashMap<i64, &Rc<Entity>>,
    ) -> Result<(), Error> {
        let mut remaining = keyed.clone();

        let mut group: Vec<Rc<Entity>> = Vec::new();
        let mut group_key: Option<i64> = None;
        let mut group_parent: Option<&Rc<Entity>> = None;

        for (foreign_id, entity) in self.related_rows(relation, keys)? {
            if group_parent.is_none() || foreign_id != group_key {
                if let Some(parent) = group_parent.take() {
                    parent.set_has_many(relation.name, Rc::from(std::mem::take(&mut group)));
                }
                group_key = foreign_id;
                group_parent = foreign_id.and_then(|id| remaining.remove(&id));
            }

            if let Some(parent) = group_parent {
                entity.set_back_reference(relation.foreign_key, parent);
                group.push(entity);
            }
        }

        if let Some(parent) = group_parent {
            parent.set_has_many(relation.name, Rc::from(group));
        }

        for parent in remaining.values() {
            parent.set_has_many(relation.name, Rc::from(Vec::new()));
        }
        Ok(())
    }
}
