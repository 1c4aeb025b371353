//! Structured single-table select statements.

use std::fmt::Write;

use ormfetch_proto::Binding;

/// One `ORDER BY` term on a qualified column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    /// Qualified column, e.g. `ZUSER.ZNAME`.
    pub column: String,
    /// Ascending when true.
    pub ascending: bool,
}

impl OrderTerm {
    /// Ascending order on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    /// Descending order on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// A select over one table.
///
/// `selection` and `having` are parameterized with `?` placeholders; their
/// values are `bindings`, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Select distinct rows.
    pub distinct: bool,
    /// Table name.
    pub table: String,
    /// Unqualified column names, in result order.
    pub columns: Vec<String>,
    /// `WHERE` clause without the keyword.
    pub selection: Option<String>,
    /// Statement parameters.
    pub bindings: Vec<Binding>,
    /// Qualified `GROUP BY` columns.
    pub group_by: Vec<String>,
    /// `HAVING` clause without the keyword.
    ///
    /// Reserved for statements built directly against a [`Storage`]: a
    /// compiled fetch never sets it, since fetch descriptions carry no
    /// having predicate.
    ///
    /// [`Storage`]: crate::storage::Storage
    pub having: Option<String>,
    /// `ORDER BY` terms.
    pub order_by: Vec<OrderTerm>,
    /// Row limit. `None` is unbounded.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: u64,
}

impl SelectStatement {
    /// Select `columns` from every row of `table`.
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            distinct: false,
            table: table.into(),
            columns,
            selection: None,
            bindings: Vec::new(),
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Render as SQLite SQL.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.columns.join(", "));
        let _ = write!(sql, " FROM {}", self.table);

        if let Some(selection) = self.selection.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(sql, " WHERE {}", selection);
        }

        if !self.group_by.is_empty() {
            let _ = write!(sql, " GROUP BY {}", self.group_by.join(", "));
        }

        if let Some(having) = self.having.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(sql, " HAVING {}", having);
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|t| format!("{} {}", t.column, if t.ascending { "ASC" } else { "DESC" }))
                .collect();
            let _ = write!(sql, " ORDER BY {}", terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), 0) => {
                let _ = write!(sql, " LIMIT {}", limit);
            }
            (Some(limit), offset) => {
                let _ = write!(sql, " LIMIT {} OFFSET {}", limit, offset);
            }
            // SQLite only accepts OFFSET after a LIMIT; -1 is unbounded.
            (None, offset) if offset > 0 => {
                let _ = write!(sql, " LIMIT -1 OFFSET {}", offset);
            }
            (None, _) => {}
        }

        sql
    }

    /// Render a `COUNT(*)` of the rows this statement returns.
    pub fn to_count_sql(&self) -> String {
        let windowed = self.distinct
            || !self.group_by.is_empty()
            || self.having.is_some()
            || self.limit.is_some()
            || self.offset > 0;

        if windowed {
            return format!("SELECT COUNT(*) FROM ({})", self.to_sql());
        }

        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
        if let Some(selection) = self.selection.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(sql, " WHERE {}", selection);
        }
        sql
    }
}
