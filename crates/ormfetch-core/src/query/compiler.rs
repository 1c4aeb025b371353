//! Predicate compilation.
//!
//! Turns a [`Predicate`] into a parameterized `WHERE` fragment. Terms whose
//! property has no backing column are dropped without error (the sparse
//! predicate policy), together with their combinator, so the output never
//! contains a dangling `AND`/`OR`. Output is a pure function of the input.

use std::fmt::Write;

use ormfetch_proto::{Binding, Predicate, Term, Value};
use tracing::trace;

use crate::catalog::Schema;

/// A compiled `WHERE` fragment and its ordered bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledPredicate {
    /// SQL fragment, empty when nothing constrains the rows.
    pub clause: String,
    /// One binding per `?` in `clause`, in order.
    pub bindings: Vec<Binding>,
}

impl CompiledPredicate {
    /// Check if the fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    fn push(&mut self, combinator: &str, fragment: &str, bindings: Vec<Binding>) {
        if !self.clause.is_empty() {
            self.clause.push_str(combinator);
        }
        self.clause.push_str(fragment);
        self.bindings.extend(bindings);
    }
}

/// Compile `predicate` against `schema`, qualifying columns with `table`.
pub fn compile_predicate(
    predicate: &Predicate,
    schema: &dyn Schema,
    table: &str,
) -> CompiledPredicate {
    let mut compiled = CompiledPredicate::default();

    for term in predicate.terms() {
        let Some((fragment, bindings)) = compile_term(term, schema, table) else {
            continue;
        };
        compiled.push(term.combinator().as_sql(), &fragment, bindings);
    }

    compiled
}

fn compile_term(term: &Term, schema: &dyn Schema, table: &str) -> Option<(String, Vec<Binding>)> {
    match term {
        Term::Comparison {
            property, op, value, ..
        } => {
            let column = resolve(schema, property)?;
            Some((
                format!("{}.{} {} ?", table, column, op.as_sql()),
                vec![value.to_binding()],
            ))
        }
        Term::In {
            property, values, ..
        } => {
            let column = resolve(schema, property)?;
            let compiled = in_clause(table, column, values.as_slice());
            Some((compiled.clause, compiled.bindings))
        }
        Term::Compound { nested, .. } => {
            let compiled = compile_predicate(nested, schema, table);
            if compiled.is_empty() {
                return None;
            }
            Some((format!("({})", compiled.clause), compiled.bindings))
        }
    }
}

fn resolve<'s>(schema: &'s dyn Schema, property: &str) -> Option<&'s str> {
    let column = schema.column_for(property);
    if column.is_none() {
        trace!(
            model = schema.name(),
            property,
            "dropping predicate term on unmapped property"
        );
    }
    column
}

/// Build `table.column IN (?, ...)` with one binding per value.
///
/// Callers never pass an empty slice; an empty slice yields an empty
/// fragment rather than `IN ()`.
pub fn in_clause(table: &str, column: &str, values: &[Value]) -> CompiledPredicate {
    if values.is_empty() {
        return CompiledPredicate::default();
    }

    let mut clause = String::new();
    let _ = write!(clause, "{}.{} IN (", table, column);
    for i in 0..values.len() {
        if i > 0 {
            clause.push_str(", ");
        }
        clause.push('?');
    }
    clause.push(')');

    CompiledPredicate {
        clause,
        bindings: values.iter().map(Value::to_binding).collect(),
    }
}
