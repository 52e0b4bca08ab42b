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

//! Logic handling the intermediate representation of Avro values.

use crate::{
    AvroResult, Config, Error,
    config::default_config,
    error::Details,
    schema::{RecordSchema, Schema, SchemaKind, UnionSchema},
};
use std::collections::HashMap;
use strum_macros::{Display, EnumDiscriminants};

/// Represents any valid Avro value
/// More information about Avro values can be found in the
/// [Avro Specification](https://avro.apache.org/docs/++version++/specification/#schema-declaration)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Display))]
pub enum Value {
    /// A `null` Avro value.
    Null,
    /// A `boolean` Avro value.
    Boolean(bool),
    /// A `int` Avro value.
    Int(i32),
    /// A `long` Avro value.
    Long(i64),
    /// A `float` Avro value.
    Float(f32),
    /// A `double` Avro value.
    Double(f64),
    /// A `bytes` Avro value.
    Bytes(Vec<u8>),
    /// A `string` Avro value.
    String(String),
    /// A `fixed` Avro value.
    /// The size of the fixed value is represented as a `usize`.
    Fixed(usize, Vec<u8>),
    /// An `enum` Avro value.
    ///
    /// An Enum is represented by a symbol and its position in the symbols list
    /// of its corresponding schema.
    /// This allows schema-less encoding, as well as schema resolution while
    /// reading values.
    Enum(u32, String),
    /// An `union` Avro value.
    ///
    /// A Union is represented by the value it holds and its position in the type list
    /// of its corresponding schema
    /// This allows schema-less encoding, as well as schema resolution while
    /// reading values.
    Union(u32, Box<Value>),
    /// An `array` Avro value.
    Array(Vec<Value>),
    /// A `map` Avro value.
    Map(HashMap<String, Value>),
    /// A `record` Avro value.
    ///
    /// A Record is represented by a vector of (`<record name>`, `value`).
    /// This allows schema-less encoding.
    Record(Vec<(String, Value)>),
}

macro_rules! to_value(
    ($type:ty, $variant_constructor:expr) => (
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                $variant_constructor(value)
            }
        }
    );
);

to_value!(bool, Value::Boolean);
to_value!(i32, Value::Int);
to_value!(i64, Value::Long);
to_value!(f32, Value::Float);
to_value!(f64, Value::Double);
to_value!(String, Value::String);
to_value!(Vec<u8>, Value::Bytes);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_owned())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K, V, S> From<HashMap<K, V, S>> for Value
where
    K: Into<String>,
    V: Into<Self>,
{
    fn from(value: HashMap<K, V, S>) -> Self {
        Self::Map(
            value
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl Value {
    /// The schema kind a value of this variant is written as when no widening applies.
    pub fn schema_kind(&self) -> SchemaKind {
        match self {
            Value::Null => SchemaKind::Null,
            Value::Boolean(_) => SchemaKind::Boolean,
            Value::Int(_) => SchemaKind::Int,
            Value::Long(_) => SchemaKind::Long,
            Value::Float(_) => SchemaKind::Float,
            Value::Double(_) => SchemaKind::Double,
            Value::Bytes(_) => SchemaKind::Bytes,
            Value::String(_) => SchemaKind::String,
            Value::Fixed(..) => SchemaKind::Fixed,
            Value::Enum(..) => SchemaKind::Enum,
            Value::Union(..) => SchemaKind::Union,
            Value::Array(_) => SchemaKind::Array,
            Value::Map(_) => SchemaKind::Map,
            Value::Record(_) => SchemaKind::Record,
        }
    }

    /// Validate the value against the given schema, under the process-wide
    /// [default configuration](crate::config::default_config).
    ///
    /// Integers and floats may be widened (`int` to `long`, `float` to `double`), strings may
    /// name enum symbols, and a value that is not a [`Value::Union`] is accepted by a union
    /// schema when one of its variants accepts it. Nothing is written anywhere.
    pub fn validate(&self, schema: &Schema) -> AvroResult<()> {
        self.validate_with_config(schema, &default_config())
    }

    /// Validate the value against the given schema.
    ///
    /// Unless [`Config::union_resolution_error`] is set, a value no union variant accepts as is
    /// may still select a variant it can be promoted to (`int` and `long` to `float` or
    /// `double`, `string` to `bytes` and back).
    pub fn validate_with_config(&self, schema: &Schema, config: &Config) -> AvroResult<()> {
        match (self, schema) {
            (Value::Null, Schema::Null)
            | (Value::Boolean(_), Schema::Boolean)
            | (Value::Int(_), Schema::Int | Schema::Long)
            | (Value::Long(_), Schema::Long)
            | (Value::Float(_), Schema::Float | Schema::Double)
            | (Value::Double(_), Schema::Double)
            | (Value::Bytes(_), Schema::Bytes)
            | (Value::String(_), Schema::String) => Ok(()),
            (Value::Bytes(bytes) | Value::Fixed(_, bytes), Schema::Fixed(fixed)) => {
                if bytes.len() == fixed.size {
                    Ok(())
                } else {
                    Err(Details::FixedSizeMismatch {
                        size: fixed.size,
                        n: bytes.len(),
                    }
                    .into())
                }
            }
            (Value::String(symbol), Schema::Enum(enum_schema)) => enum_schema
                .index_of(symbol)
                .map(|_| ())
                .ok_or_else(|| Details::GetEnumSymbol(symbol.clone()).into()),
            (Value::Enum(index, symbol), Schema::Enum(enum_schema)) => {
                match enum_schema.symbols.get(*index as usize) {
                    Some(s) if s == symbol => Ok(()),
                    Some(_) => Err(Details::GetEnumSymbol(symbol.clone()).into()),
                    None => Err(Details::EnumIndex {
                        index: i64::from(*index),
                        nsymbols: enum_schema.symbols.len(),
                    }
                    .into()),
                }
            }
            (Value::Union(index, inner), Schema::Union(union)) => {
                let variant = union.variants().get(*index as usize).ok_or(
                    Details::GetUnionVariant {
                        index: i64::from(*index),
                        num_variants: union.variants().len(),
                    },
                )?;
                inner.validate_with_config(variant, config)
            }
            (_, Schema::Union(union)) => self.find_union_variant(union, config).map(|_| ()),
            (Value::Array(items), Schema::Array(array)) => items.iter().try_for_each(|item| {
                item.validate_with_config(&array.items, config)
                    .map_err(|e| Details::ItemTypeMismatch(Box::new(e)).into())
            }),
            (Value::Map(entries), Schema::Map(map)) => entries.values().try_for_each(|value| {
                value
                    .validate_with_config(&map.types, config)
                    .map_err(|e| Details::ValueTypeMismatch(Box::new(e)).into())
            }),
            (Value::Record(fields), Schema::Record(record)) => {
                validate_record(fields, record, config)
            }
            _ => Err(Details::TypeMismatch {
                value_type: self.type_name(),
                schema: schema.kind(),
            }
            .into()),
        }
    }

    /// The variant of `union` this value is written as, preferring a variant of the value's own
    /// kind. Promotion applies as described on [`validate_with_config`](Self::validate_with_config).
    pub(crate) fn find_union_variant<'s>(
        &self,
        union: &'s UnionSchema,
        config: &Config,
    ) -> AvroResult<(usize, &'s Schema)> {
        let variants = union.variants();
        let accepts = |s: &Schema| self.validate_with_config(s, config).is_ok();
        if let Some(index) = union
            .index_of_kind(self.schema_kind())
            .filter(|&i| accepts(&variants[i]))
        {
            return Ok((index, &variants[index]));
        }
        union.select_variant(
            config.union_resolution_error,
            &self.type_name(),
            accepts,
            |s| self.promotes_to(s),
        )
    }

    /// Whether the value can be written as `schema` through an Avro type promotion.
    fn promotes_to(&self, schema: &Schema) -> bool {
        matches!(
            (self, schema),
            (Value::Int(_) | Value::Long(_), Schema::Float | Schema::Double)
                | (Value::String(_), Schema::Bytes)
                | (Value::Bytes(_), Schema::String)
        )
    }

    fn type_name(&self) -> String {
        ValueKind::from(self).to_string()
    }
}

/// Look up the value bound to a record field, by name first and then by alias.
pub(crate) fn record_field_value<'v>(
    fields: &'v [(String, Value)],
    name: &str,
    aliases: &[String],
) -> Option<&'v Value> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .or_else(|| fields.iter().find(|(n, _)| aliases.contains(n)))
        .map(|(_, v)| v)
}

fn validate_record(
    fields: &[(String, Value)],
    record: &RecordSchema,
    config: &Config,
) -> AvroResult<()> {
    record.fields.iter().try_for_each(|field| {
        let value = record_field_value(fields, &field.name, &field.aliases)
            .ok_or_else(|| Error::from(Details::GetField(field.name.clone())))?;
        value.validate_with_config(&field.schema, config).map_err(|e| {
            Details::FieldTypeMismatch {
                field: field.name.clone(),
                source: Box::new(e),
            }
            .into()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;

    #[test]
    fn validate_primitives() {
        assert!(Value::Null.validate(&Schema::Null).is_ok());
        assert!(Value::Int(1).validate(&Schema::Long).is_ok());
        assert!(Value::Float(1.0).validate(&Schema::Double).is_ok());
        assert!(Value::Long(1).validate(&Schema::Int).is_err());

        let err = Value::Boolean(true).validate(&Schema::String).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value of type Boolean does not match schema String"
        );
    }

    #[test]
    fn validate_map() {
        let schema = Schema::map(Schema::String);
        let good = Value::from(HashMap::from([("foo", "bar")]));
        assert!(good.validate(&schema).is_ok());

        let bad = Value::from(HashMap::from([("foo", 1)]));
        let err = bad.validate(&schema).unwrap_err();
        assert!(matches!(err.details(), Details::ValueTypeMismatch(_)));

        let err = Value::Array(vec![]).validate(&schema).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::TypeMismatch {
                schema: SchemaKind::Map,
                ..
            }
        ));
    }

    #[test]
    fn validate_array_wraps_item_errors() {
        let schema = Schema::array(Schema::Int);
        let err = Value::Array(vec![Value::Int(1), Value::from("x")])
            .validate(&schema)
            .unwrap_err();
        assert!(matches!(err.details(), Details::ItemTypeMismatch(_)));
    }

    #[test]
    fn validate_record_fields() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": "long", "aliases": ["old_a"]},
                {"name": "b", "type": ["null", "string"]}
            ]}"#,
        )?;
        let by_alias = Value::Record(vec![
            ("old_a".to_string(), Value::Long(1)),
            ("b".to_string(), Value::Null),
        ]);
        by_alias.validate(&schema)?;

        let missing = Value::Record(vec![("a".to_string(), Value::Long(1))]);
        let err = missing.validate(&schema).unwrap_err();
        assert!(matches!(err.details(), Details::GetField(name) if name == "b"));

        let wrong = Value::Record(vec![
            ("a".to_string(), Value::Long(1)),
            ("b".to_string(), Value::Boolean(false)),
        ]);
        let err = wrong.validate(&schema).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::FieldTypeMismatch { field, .. } if field == "b"
        ));
        Ok(())
    }

    #[test]
    fn validate_enum_fixed_and_union() -> TestResult {
        let schema = Schema::parse_str(
            r#"["null", {"type": "enum", "name": "E", "symbols": ["A", "B"]},
                {"type": "fixed", "name": "F", "size": 2}]"#,
        )?;
        Value::Enum(1, "B".into()).validate(&schema)?;
        Value::from("A").validate(&schema)?;
        Value::Fixed(2, vec![0, 1]).validate(&schema)?;
        Value::Union(0, Box::new(Value::Null)).validate(&schema)?;

        let err = Value::Union(3, Box::new(Value::Null))
            .validate(&schema)
            .unwrap_err();
        assert!(matches!(
            err.details(),
            Details::GetUnionVariant {
                index: 3,
                num_variants: 3
            }
        ));

        let err = Value::Long(1).validate(&schema).unwrap_err();
        assert!(matches!(err.details(), Details::UnionResolution { .. }));
        Ok(())
    }

    #[test]
    fn union_prefers_own_kind() -> TestResult {
        let Schema::Union(union) = Schema::parse_str(r#"["long", "int"]"#)? else {
            panic!("expected a union");
        };
        let config = Config::default();
        assert_eq!(Value::Int(1).find_union_variant(&union, &config)?.0, 1);
        assert_eq!(Value::Long(1).find_union_variant(&union, &config)?.0, 0);
        Ok(())
    }

    #[test]
    fn union_promotion_follows_config() -> TestResult {
        let schema = Schema::parse_str(r#"["null", "bytes", "double"]"#)?;
        let lenient = Config::default();
        let strict = Config::builder().union_resolution_error(true).build();

        Value::from("x").validate_with_config(&schema, &lenient)?;
        Value::Long(3).validate_with_config(&schema, &lenient)?;

        let err = Value::from("x")
            .validate_with_config(&schema, &strict)
            .unwrap_err();
        assert!(matches!(
            err.details(),
            Details::UnionResolution { value_type } if value_type == "String"
        ));
        let err = Value::Long(3)
            .validate_with_config(&schema, &strict)
            .unwrap_err();
        assert!(matches!(err.details(), Details::UnionResolution { .. }));

        // Widening is not a promotion and needs no fallback.
        Value::Float(1.5).validate_with_config(&schema, &strict)?;
        Ok(())
    }

    #[test]
    fn promotion_only_applies_to_unions() {
        let lenient = Config::default();
        let err = Value::from("x")
            .validate_with_config(&Schema::Bytes, &lenient)
            .unwrap_err();
        assert!(matches!(err.details(), Details::TypeMismatch { .. }));
    }
}
