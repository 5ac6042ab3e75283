use super::{DataType, DbError, Result, Value};
use std::sync::Arc;

/// Internal, store-assigned identifier of a record slot inside a collection.
pub type RowId = usize;

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub default: Value,
    pub primary_key: bool,
    pub indexed: bool,
}

impl Field {
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Integer,
            default: Value::Integer(0),
            primary_key: false,
            indexed: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Text,
            default: Value::Text(String::new()),
            primary_key: false,
            indexed: false,
        }
    }

    /// Unique integer key; implies an index.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.indexed = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if !self.data_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Field '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CollectionSchema {
    name: String,
    fields: Vec<Field>,
    primary_key: usize,
}

impl CollectionSchema {
    /// Builds a schema. Exactly one integer primary key is required and
    /// every default must match its field's type.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        let mut keys = fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.primary_key);

        let primary_key = match (keys.next(), keys.next()) {
            (Some((idx, field)), None) if field.data_type == DataType::Integer => idx,
            (Some(_), None) => {
                return Err(DbError::ConstraintViolation(format!(
                    "Primary key of '{}' must be an integer field",
                    name
                )));
            }
            _ => {
                return Err(DbError::ConstraintViolation(format!(
                    "Collection '{}' must declare exactly one primary key",
                    name
                )));
            }
        };

        for field in &fields {
            field.validate(&field.default)?;
        }

        Ok(Self {
            name,
            fields,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn find_field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.find_field_index(name).map(|idx| &self.fields[idx])
    }

    pub fn require_field(&self, name: &str) -> Result<usize> {
        self.find_field_index(name)
            .ok_or_else(|| DbError::FieldNotFound(name.to_string(), self.name.clone()))
    }

    pub fn primary_key(&self) -> &Field {
        &self.fields[self.primary_key]
    }

    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.indexed)
    }

    /// Fresh record populated with every field's default value.
    pub fn new_record(self: &Arc<Self>) -> Record {
        Record {
            schema: Arc::clone(self),
            values: self.fields.iter().map(|f| f.default.clone()).collect(),
        }
    }
}

/// One entity. Stored records are shared as `Arc<Record>` and never mutated
/// in place; writers clone them into a private copy first.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<CollectionSchema>,
    values: Vec<Value>,
}

impl Record {
    pub fn collection(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<CollectionSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        let idx = self.schema.require_field(name)?;
        Ok(&self.values[idx])
    }

    pub fn get_i64(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_i64().ok_or_else(|| {
            DbError::TypeMismatch(format!("Field '{}' is {}, not INTEGER", name, value.type_name()))
        })
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| {
            DbError::TypeMismatch(format!("Field '{}' is {}, not TEXT", name, value.type_name()))
        })
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let idx = self.schema.require_field(name)?;
        let value = value.into();
        self.schema.fields[idx].validate(&value)?;
        self.values[idx] = value;
        Ok(())
    }

    pub fn id(&self) -> Result<i64> {
        self.get_i64(&self.schema.primary_key().name)
    }

    pub(crate) fn value_at(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    /// Projects the named fields into a JSON object, in the given order.
    pub fn to_json(&self, fields: &[&str]) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut object = serde_json::Map::with_capacity(fields.len());
        for name in fields {
            object.insert((*name).to_string(), self.get(name)?.to_json());
        }
        Ok(object)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.collection() == other.collection() && self.values == other.values
    }
}
