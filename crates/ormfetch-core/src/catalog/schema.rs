//! Entity schemas: the property to column mapping of a model.

/// Column name of the primary key under the `Z` naming convention.
pub const CONVENTIONAL_PRIMARY_KEY: &str = "Z_ID";

/// Property name the primary key is exposed under.
pub const PRIMARY_KEY_PROPERTY: &str = "id";

/// Mapping between a model's properties and its table columns.
///
/// The primary key column is always selected first and is not part of
/// [`Schema::all_columns`].
pub trait Schema {
    /// Model name.
    fn name(&self) -> &str;

    /// Backing table name.
    fn table_name(&self) -> &str;

    /// Column backing `property`, if any.
    fn column_for(&self, property: &str) -> Option<&str>;

    /// Property backed by `column`, if any.
    fn property_for(&self, column: &str) -> Option<&str>;

    /// Primary key column.
    fn primary_key_column(&self) -> &str;

    /// Every non-key column, in declaration order.
    fn all_columns(&self) -> Vec<&str>;
}

/// A property backed by a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Property name.
    pub name: String,
    /// Column name.
    pub column: String,
}

impl FieldDef {
    /// Map `name` to `column`.
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }

    /// Map `name` to its conventional `Z<NAME>` column.
    pub fn conventional(name: impl Into<String>) -> Self {
        let name = name.into();
        let column = conventional_name(&name);
        Self { name, column }
    }
}

fn conventional_name(name: &str) -> String {
    format!("Z{}", name.to_uppercase())
}

/// Explicit schema descriptor, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    table: String,
    primary_key: String,
    fields: Vec<FieldDef>,
}

impl EntitySchema {
    /// Create a schema with an explicit table and primary key column.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    /// Create a schema following the `Z` naming convention.
    ///
    /// The table is `Z<MODEL>`, every property `p` maps to `Z<P>` and the
    /// primary key lives in `Z_ID`.
    pub fn conventional<I, S>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let table = conventional_name(&name);
        Self::new(name, table, CONVENTIONAL_PRIMARY_KEY)
            .with_fields(properties.into_iter().map(FieldDef::conventional))
    }

    /// Add a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Map `property` to `column`.
    pub fn with_column(self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.with_field(FieldDef::new(property, column))
    }

    /// Field definitions.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

impl Schema for EntitySchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn column_for(&self, property: &str) -> Option<&str> {
        if property == PRIMARY_KEY_PROPERTY {
            return Some(&self.primary_key);
        }
        self.fields
            .iter()
            .find(|f| f.name == property)
            .map(|f| f.column.as_str())
    }

    fn property_for(&self, column: &str) -> Option<&str> {
        if column == self.primary_key {
            return Some(PRIMARY_KEY_PROPERTY);
        }
        self.fields
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.name.as_str())
    }

    fn primary_key_column(&self) -> &str {
        &self.primary_key
    }

    fn all_columns(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }
}
