use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::{HeapDbError, Result};

use super::DataType;

/// Represents a single column in a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    name: String,

    /// Column data type
    data_type: DataType,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the on-disk width of this column.
    pub fn width(&self) -> usize {
        self.data_type.width()
    }
}

/// Represents the schema of a table: an ordered list of typed, named columns.
///
/// All columns are fixed width, so every record of a table occupies exactly
/// [`Schema::record_width`] bytes on a page.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,

    /// Map from column name to column index for fast lookup
    name_to_index: HashMap<String, usize>,

    /// Sum of all column widths
    record_width: usize,
}

impl Schema {
    /// Creates a new schema from a list of columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(HeapDbError::InvalidSchema(
                "a schema needs at least one column".to_string(),
            ));
        }

        let mut name_to_index = HashMap::new();
        let mut record_width = 0;

        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(HeapDbError::InvalidSchema(format!(
                    "column {} has an empty name",
                    i
                )));
            }
            if name_to_index.insert(col.name.clone(), i).is_some() {
                return Err(HeapDbError::InvalidSchema(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
            record_width += col.width();
        }

        Ok(Self {
            columns,
            name_to_index,
            record_width,
        })
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns the number of columns in the schema.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the fixed width of one encoded record.
    pub fn record_width(&self) -> usize {
        self.record_width
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", col.name, col.data_type)?;
        }
        Ok(())
    }
}

/// Builder for constructing schemas fluently.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Result<Schema> {
        Schema::new(self.columns)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Result<Arc<Schema>> {
        self.build().map(Arc::new)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Text(20))
            .column("age", DataType::Integer)
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_creation() {
        let schema = create_test_schema();

        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column(0).unwrap().name(), "id");
        assert_eq!(schema.column(1).unwrap().name(), "name");
        assert_eq!(schema.column(2).unwrap().name(), "age");
        assert_eq!(schema.column_index("age"), Some(2));
        assert_eq!(schema.column_index("nonexistent"), None);
    }

    #[test]
    fn test_record_width() {
        let schema = create_test_schema();
        // id (4) + name (4 + 20) + age (4)
        assert_eq!(schema.record_width(), 32);
    }

    #[test]
    fn test_invalid_schemas() {
        assert!(matches!(
            Schema::builder().build(),
            Err(HeapDbError::InvalidSchema(_))
        ));
        assert!(matches!(
            Schema::builder()
                .column("a", DataType::Integer)
                .column("a", DataType::Integer)
                .build(),
            Err(HeapDbError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_display() {
        let schema = create_test_schema();
        assert_eq!(
            schema.to_string(),
            "id(INT), name(STRING(20)), age(INT)"
        );
    }
}
