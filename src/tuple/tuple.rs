use std::fmt;
use std::sync::Arc;

use crate::common::{HeapDbError, RecordId, Result};

use super::{Schema, Value};

/// Represents a single row/tuple in a table.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | column 0  | column 1  | ... | column n  |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Columns are written back to back in schema order, each exactly
/// `DataType::width()` bytes, so the encoded tuple is always
/// `schema.record_width()` bytes long.
///
/// Once stored, a tuple carries the [`RecordId`] of the slot it lives in;
/// delete uses it to find the page.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each column (in schema order)
    values: Vec<Value>,

    /// Where the tuple is stored, if it has been stored
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple, checking every value against the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(HeapDbError::SchemaMismatch(format!(
                "expected {} values, got {}",
                schema.column_count(),
                values.len()
            )));
        }

        for (col, value) in schema.columns().zip(&values) {
            if !value.fits(col.data_type()) {
                return Err(HeapDbError::SchemaMismatch(format!(
                    "value {:?} does not fit column {} of type {}",
                    value,
                    col.name(),
                    col.data_type()
                )));
            }
        }

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Creates a tuple from exactly `schema.record_width()` raw bytes.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        if data.len() != schema.record_width() {
            return None;
        }

        let mut buf = data;
        let values = schema
            .columns()
            .map(|col| Value::decode(col.data_type(), &mut buf))
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Serializes the tuple to its fixed-width record form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.schema.record_width());
        for (col, value) in self.schema.columns().zip(&self.values) {
            // Values were checked against the schema when the tuple was built
            let written = value.encode(col.data_type(), &mut bytes);
            debug_assert!(written);
        }
        bytes
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value for the given column name.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    /// Returns all values in this tuple.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns/values in this tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this tuple has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

/// Two tuples are equal when their schemas and values are; where they are
/// stored does not matter.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TupleBuilder {
    /// Creates a new tuple builder for the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: Vec::with_capacity(count),
        }
    }

    /// Appends the value for the next column.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Builds the tuple.
    pub fn build(self) -> Result<Tuple> {
        Tuple::new(self.schema, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, SlotId, TableId};
    use crate::tuple::DataType;

    fn test_schema() -> Arc<Schema> {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Text(8))
            .build_arc()
            .unwrap()
    }

    #[test]
    fn test_encoded_width_is_fixed() {
        let schema = test_schema();
        let short = TupleBuilder::new(schema.clone())
            .value(1)
            .value("a")
            .build()
            .unwrap();
        let long = TupleBuilder::new(schema.clone())
            .value(2)
            .value("abcdefgh")
            .build()
            .unwrap();

        assert_eq!(short.to_bytes().len(), schema.record_width());
        assert_eq!(long.to_bytes().len(), schema.record_width());
    }

    #[test]
    fn test_from_bytes() {
        let schema = test_schema();
        let tuple = TupleBuilder::new(schema.clone())
            .value(-7)
            .value("hello")
            .build()
            .unwrap();

        let decoded = Tuple::from_bytes(schema, &tuple.to_bytes()).unwrap();
        assert_eq!(decoded, tuple);
        assert_eq!(decoded.value_by_name("name"), Some(&Value::from("hello")));
        assert_eq!(decoded.record_id(), None);
    }

    #[test]
    fn test_schema_mismatch() {
        let schema = test_schema();
        assert!(Tuple::new(schema.clone(), vec![Value::Integer(1)]).is_err());
        assert!(Tuple::new(schema.clone(), vec![Value::from("x"), Value::from("y")]).is_err());
        assert!(Tuple::new(schema, vec![Value::Integer(1), Value::from("123456789")]).is_err());
    }

    #[test]
    fn test_equality_ignores_record_id() {
        let schema = test_schema();
        let a = TupleBuilder::new(schema.clone())
            .value(1)
            .value("x")
            .build()
            .unwrap();
        let mut b = a.clone();
        b.set_record_id(Some(RecordId::new(
            PageId::new(TableId(1), 0),
            SlotId::new(3),
        )));
        assert_eq!(a, b);
    }
}
