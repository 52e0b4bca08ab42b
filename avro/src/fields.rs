// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Explicit field-access tables mapping native structs onto Avro records.
//!
//! A [`FieldTable`] is built once per record type and lists, for every field, a getter producing
//! a [`Value`] and a setter consuming one. Binding the table to a [`RecordSchema`] resolves each
//! schema field to an accessor, either through a tag registered under the configured
//! [`tag_key`](crate::Config::tag_key), through the registered name, or through one of the schema
//! field's aliases.
//!
//! ```
//! # use std::sync::LazyLock;
//! # use avrokit::{AvroRecord, Config, Error, FieldTable, Schema};
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: i32,
//! }
//!
//! static PERSON: LazyLock<FieldTable<Person>> = LazyLock::new(|| {
//!     FieldTable::<Person>::builder()
//!         .field("name", |p: &Person| p.name.clone(), |p, v| p.name = v)
//!         .field("age", |p: &Person| p.age, |p, v| p.age = v)
//!         .tag("avro", "years")
//!         .build()
//! });
//!
//! impl AvroRecord for Person {
//!     fn field_table() -> &'static FieldTable<Self> {
//!         &PERSON
//!     }
//! }
//!
//! let schema = Schema::parse_str(
//!     r#"{"type": "record", "name": "Person", "fields": [
//!         {"name": "name", "type": "string"},
//!         {"name": "years", "type": "int"}
//!     ]}"#,
//! )?;
//! let Schema::Record(record) = &schema else { unreachable!() };
//! let bound = Person::field_table().bind(record, &Config::default())?;
//! let value = bound.to_value(&Person { name: "Ada".into(), age: 36 });
//! assert_eq!(bound.from_value(value)?, Person { name: "Ada".into(), age: 36 });
//! # Ok::<(), Error>(())
//! ```

use crate::{
    AvroResult, Config, Error,
    error::Details,
    schema::{RecordSchema, SchemaKind},
    serde::from_value,
    types::{Value, record_field_value},
};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, fmt};

type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Value) -> AvroResult<()> + Send + Sync>;

struct FieldAccess<T> {
    name: String,
    /// Alternative names keyed by tag key.
    tags: HashMap<String, String>,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> FieldAccess<T> {
    fn tagged_name(&self, tag_key: &str) -> Option<&str> {
        self.tags.get(tag_key).map(String::as_str)
    }
}

/// The accessors of a record type, in registration order.
pub struct FieldTable<T> {
    fields: Vec<FieldAccess<T>>,
}

impl<T> fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|field| (&field.name, &field.tags)))
            .finish()
    }
}

impl<T: 'static> FieldTable<T> {
    pub fn builder() -> FieldTableBuilder<T> {
        FieldTableBuilder { fields: Vec::new() }
    }

    /// Resolve every field of `schema` to an accessor of this table.
    ///
    /// Fails with [`Details::UnboundField`] for a schema field no accessor maps to.
    pub fn bind<'a>(
        &'a self,
        schema: &'a RecordSchema,
        config: &Config,
    ) -> AvroResult<BoundRecord<'a, T>> {
        let tag_key = config.tag_key.as_str();
        let accessors = schema
            .fields
            .iter()
            .map(|field| {
                self.fields
                    .iter()
                    .position(|access| access.tagged_name(tag_key) == Some(field.name.as_str()))
                    .or_else(|| {
                        self.fields.iter().position(|access| {
                            access.tagged_name(tag_key).is_none() && access.name == field.name
                        })
                    })
                    .or_else(|| {
                        self.fields
                            .iter()
                            .position(|access| field.aliases.contains(&access.name))
                    })
                    .ok_or_else(|| Error::from(Details::UnboundField(field.name.clone())))
            })
            .collect::<AvroResult<Vec<_>>>()?;
        Ok(BoundRecord {
            table: self,
            schema,
            accessors,
        })
    }
}

/// Registers the fields of a [`FieldTable`].
pub struct FieldTableBuilder<T> {
    fields: Vec<FieldAccess<T>>,
}

impl<T: 'static> FieldTableBuilder<T> {
    /// Register a field read and written as a native type.
    pub fn field<V, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        V: Into<Value> + DeserializeOwned + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.field_with(
            name,
            move |t| get(t).into(),
            move |t, value| {
                set(t, from_value(value)?);
                Ok(())
            },
        )
    }

    /// Register a field through raw [`Value`] accessors.
    pub fn field_with<G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> AvroResult<()> + Send + Sync + 'static,
    {
        self.fields.push(FieldAccess {
            name: name.to_string(),
            tags: HashMap::new(),
            get: Box::new(get),
            set: Box::new(set),
        });
        self
    }

    /// Name the most recently registered field `value` under the tag `key`.
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.tags.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn build(self) -> FieldTable<T> {
        FieldTable {
            fields: self.fields,
        }
    }
}

/// A [`FieldTable`] resolved against one record schema.
pub struct BoundRecord<'a, T> {
    table: &'a FieldTable<T>,
    schema: &'a RecordSchema,
    /// Accessor index for every schema field, in schema order.
    accessors: Vec<usize>,
}

impl<'a, T: Default> BoundRecord<'a, T> {
    pub fn to_value(&self, record: &T) -> Value {
        Value::Record(
            self.schema
                .fields
                .iter()
                .zip(&self.accessors)
                .map(|(field, &i)| (field.name.clone(), (self.table.fields[i].get)(record)))
                .collect(),
        )
    }

    /// Build a `T` from a decoded record, starting from `T::default()`.
    pub fn from_value(&self, value: Value) -> AvroResult<T> {
        let fields = match value {
            Value::Record(fields) => fields,
            Value::Union(_, inner) => return self.from_value(*inner),
            other => {
                return Err(Details::TypeMismatch {
                    value_type: other.schema_kind().to_string(),
                    schema: SchemaKind::Record,
                }
                .into());
            }
        };
        let mut record = T::default();
        for (field, &i) in self.schema.fields.iter().zip(&self.accessors) {
            let value = record_field_value(&fields, &field.name, &field.aliases)
                .ok_or_else(|| Details::GetField(field.name.clone()))?;
            (self.table.fields[i].set)(&mut record, value.clone()).map_err(|e| {
                Details::FieldTypeMismatch {
                    field: field.name.clone(),
                    source: Box::new(e),
                }
            })?;
        }
        Ok(record)
    }
}

/// A native type with a [`FieldTable`].
pub trait AvroRecord: Default + Sized + 'static {
    fn field_table() -> &'static FieldTable<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        id: i64,
        label: Option<String>,
        weight: f64,
    }

    fn table() -> FieldTable<Item> {
        FieldTable::<Item>::builder()
            .field("id", |i: &Item| i.id, |i, v| i.id = v)
            .field("label", |i: &Item| i.label.clone(), |i, v| i.label = v)
            .tag("avro", "name")
            .tag("json", "title")
            .field("weight", |i: &Item| i.weight, |i, v| i.weight = v)
            .build()
    }

    fn record(text: &str) -> RecordSchema {
        match Schema::parse_str(text) {
            Ok(Schema::Record(record)) => record,
            other => panic!("expected a record, got {other:?}"),
        }
    }

    const SCHEMA: &str = r#"{"type": "record", "name": "Item", "fields": [
        {"name": "name", "type": ["null", "string"]},
        {"name": "id", "type": "long"},
        {"name": "mass", "type": "double", "aliases": ["weight"]}
    ]}"#;

    #[test]
    fn binds_by_tag_name_and_alias() -> TestResult {
        let table = table();
        let schema = record(SCHEMA);
        let bound = table.bind(&schema, &Config::default())?;
        let item = Item {
            id: 3,
            label: Some("box".to_string()),
            weight: 1.5,
        };
        assert_eq!(
            bound.to_value(&item),
            Value::Record(vec![
                ("name".to_string(), Value::String("box".to_string())),
                ("id".to_string(), Value::Long(3)),
                ("mass".to_string(), Value::Double(1.5)),
            ])
        );
        Ok(())
    }

    #[test]
    fn tag_key_follows_the_config() -> TestResult {
        let table = table();
        let schema = record(SCHEMA);
        let config = Config::builder().tag_key("json").build();
        let err = table.bind(&schema, &config).err().unwrap();
        assert!(matches!(err.details(), Details::UnboundField(f) if f == "name"));

        let schema = record(
            r#"{"type": "record", "name": "Item", "fields": [
                {"name": "title", "type": ["null", "string"]}
            ]}"#,
        );
        assert!(table.bind(&schema, &config).is_ok());
        Ok(())
    }

    #[test]
    fn from_value_fills_fields() -> TestResult {
        let table = table();
        let schema = record(SCHEMA);
        let bound = table.bind(&schema, &Config::default())?;
        let value = Value::Record(vec![
            ("id".to_string(), Value::Long(9)),
            ("name".to_string(), Value::Union(0, Box::new(Value::Null))),
            ("mass".to_string(), Value::Double(2.0)),
        ]);
        assert_eq!(
            bound.from_value(value)?,
            Item {
                id: 9,
                label: None,
                weight: 2.0,
            }
        );

        let err = bound
            .from_value(Value::Record(vec![("id".to_string(), Value::Long(1))]))
            .unwrap_err();
        assert!(matches!(err.details(), Details::GetField(f) if f == "name"));
        Ok(())
    }

    #[test]
    fn setter_errors_name_the_field() -> TestResult {
        let table = table();
        let schema = record(SCHEMA);
        let bound = table.bind(&schema, &Config::default())?;
        let value = Value::Record(vec![
            ("id".to_string(), Value::String("x".to_string())),
            ("name".to_string(), Value::Null),
            ("mass".to_string(), Value::Double(2.0)),
        ]);
        let err = bound.from_value(value).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::FieldTypeMismatch { field, .. } if field == "id"
        ));
        Ok(())
    }
}
