//! Compiled fetches.

use ormfetch_proto::{FetchSpec, RelationDescriptor, Value};
use tracing::trace;

use super::compiler::{compile_predicate, in_clause};
use super::statement::{OrderTerm, SelectStatement};
use crate::catalog::{ModelId, Schema, SchemaRegistry};
use crate::error::Error;

/// A [`FetchSpec`] compiled against its model's schema.
///
/// Compilation reads the `FetchSpec` and never changes it. Cloning a `FetchQuery`
/// is cheap relative to recompiling and yields an independent copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    model: ModelId,
    model_name: String,
    primary_key: String,
    statement: SelectStatement,
    batch_size: usize,
    relations: Vec<RelationDescriptor>,
}

impl FetchQuery {
    /// Compile `spec` using the schemas in `registry`.
    pub fn compile(spec: &FetchSpec, registry: &SchemaRegistry) -> Result<Self, Error> {
        let (model, schema) = registry.resolve(&spec.model)?;
        Ok(Self::compile_with_schema(spec, model, schema))
    }

    /// Compile `spec` against an already resolved schema.
    pub fn compile_with_schema(spec: &FetchSpec, model: ModelId, schema: &dyn Schema) -> Self {
        let table = schema.table_name();
        let primary_key = schema.primary_key_column();

        let mut columns = vec![primary_key.to_string()];
        if spec.properties.is_empty() {
            columns.extend(schema.all_columns().into_iter().map(str::to_string));
        } else {
            columns.extend(
                spec.properties
                    .iter()
                    .filter_map(|p| schema.column_for(p))
                    .filter(|c| *c != primary_key)
                    .map(str::to_string),
            );
        }

        let mut statement = SelectStatement::new(table, columns);
        statement.distinct = spec.distinct;
        statement.limit = spec.limit;
        statement.offset = spec.offset;

        if let Some(predicate) = &spec.predicate {
            let compiled = compile_predicate(predicate, schema, table);
            if !compiled.is_empty() {
                statement.selection = Some(compiled.clause);
                statement.bindings = compiled.bindings;
            }
        }

        statement.group_by = spec
            .group_by
            .iter()
            .filter_map(|p| schema.column_for(p))
            .map(|c| format!("{}.{}", table, c))
            .collect();

        statement.order_by = spec
            .sort
            .iter()
            .filter_map(|key| {
                let column = schema.column_for(&key.property)?;
                let column = format!("{}.{}", table, column);
                Some(if key.ascending {
                    OrderTerm::asc(column)
                } else {
                    OrderTerm::desc(column)
                })
            })
            .collect();
        // Stable tiebreak so equal sort keys keep a deterministic order.
        statement
            .order_by
            .push(OrderTerm::asc(format!("{}.{}", table, primary_key)));

        trace!(model = schema.name(), sql = %statement.to_sql(), "compiled fetch");

        Self {
            model,
            model_name: schema.name().to_string(),
            primary_key: primary_key.to_string(),
            statement,
            batch_size: spec.batch_size,
            relations: spec.relations.clone(),
        }
    }

    /// Model being fetched.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Model name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The full select: primary key plus projected columns.
    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    /// Rows materialized per window; zero when unbatched.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Check if results are materialized in windows.
    pub fn is_batched(&self) -> bool {
        self.batch_size > 0
    }

    /// Relations to prefetch.
    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    /// Select of the primary keys only, with the same filter, order and paging.
    pub fn key_statement(&self) -> SelectStatement {
        let mut statement = self.statement.clone();
        statement.columns = vec![self.primary_key.clone()];
        statement
    }

    /// Select of the rows with the given primary keys, in no particular order.
    pub fn window_statement(&self, keys: &[i64]) -> SelectStatement {
        let keys: Vec<Value> = keys.iter().map(|&k| Value::Int64(k)).collect();
        let compiled = in_clause(&self.statement.table, &self.primary_key, &keys);

        let mut statement = SelectStatement::new(
            self.statement.table.clone(),
            self.statement.columns.clone(),
        );
        statement.selection = Some(compiled.clause);
        statement.bindings = compiled.bindings;
        statement
    }

    /// The full select limited to its first row.
    pub fn first_statement(&self) -> SelectStatement {
        let mut statement = self.statement.clone();
        statement.limit = Some(statement.limit.map_or(1, |limit| limit.min(1)));
        statement
    }
}
