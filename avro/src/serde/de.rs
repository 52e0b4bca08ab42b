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

//! Deserializing native types out of decoded [`Value`]s.

use crate::{Error, error::Details, types::Value};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer, MapAccess,
    SeqAccess, Unexpected, VariantAccess, Visitor,
};

/// A [`serde::Deserializer`] that owns the [`Value`] it reads from.
#[derive(Debug)]
pub struct ValueDeserializer(Value);

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The value with any union wrapping removed.
    fn unwrap_union(self) -> Value {
        let mut value = self.0;
        while let Value::Union(_, inner) = value {
            value = *inner;
        }
        value
    }
}

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> Self::Deserializer {
        ValueDeserializer(self)
    }
}

struct SeqAccessor<I> {
    items: I,
}

impl<'de, I> SeqAccess<'de> for SeqAccessor<I>
where
    I: ExactSizeIterator<Item = Value>,
{
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        self.items
            .next()
            .map(|item| seed.deserialize(ValueDeserializer(item)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

/// Map entries and record fields, one key and value at a time.
struct MapAccessor<I> {
    entries: I,
    pending: Option<Value>,
}

impl<'de, I> MapAccess<'de> for MapAccessor<I>
where
    I: Iterator<Item = (String, Value)>,
{
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(ValueDeserializer(Value::String(key)))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self.pending.take().ok_or_else(|| {
            Details::DeserializeValue("map value requested before its key".to_string())
        })?;
        seed.deserialize(ValueDeserializer(value))
    }
}

/// Enums are read from a symbol, or from a single-entry map holding a variant's content.
struct EnumAccessor {
    variant: String,
    content: Option<Value>,
}

impl<'de> EnumAccess<'de> for EnumAccessor {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(ValueDeserializer(Value::String(self.variant.clone())))?;
        Ok((variant, self))
    }
}

impl<'de> VariantAccess<'de> for EnumAccessor {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Self::Error> {
        match self.content {
            None | Some(Value::Null) => Ok(()),
            Some(_) => Err(de::Error::invalid_type(Unexpected::NewtypeVariant, &"unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.content {
            Some(value) => seed.deserialize(ValueDeserializer(value)),
            None => Err(de::Error::invalid_type(Unexpected::UnitVariant, &"newtype variant")),
        }
    }

    fn tuple_variant<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Details::DeserializeValue(format!(
            "tuple variant {} has no Avro representation",
            self.variant
        ))
        .into())
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.content {
            Some(value) => ValueDeserializer(value).deserialize_any(visitor),
            None => Err(de::Error::invalid_type(Unexpected::UnitVariant, &"struct variant")),
        }
    }
}

impl<'de> Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Boolean(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i32(i),
            Value::Long(i) => visitor.visit_i64(i),
            Value::Float(f) => visitor.visit_f32(f),
            Value::Double(d) => visitor.visit_f64(d),
            Value::Bytes(bytes) | Value::Fixed(_, bytes) => visitor.visit_byte_buf(bytes),
            Value::String(s) | Value::Enum(_, s) => visitor.visit_string(s),
            Value::Array(items) => visitor.visit_seq(SeqAccessor {
                items: items.into_iter(),
            }),
            Value::Map(entries) => visitor.visit_map(MapAccessor {
                entries: entries.into_iter(),
                pending: None,
            }),
            Value::Record(fields) => visitor.visit_map(MapAccessor {
                entries: fields.into_iter(),
                pending: None,
            }),
            Value::Union(_, inner) => ValueDeserializer(*inner).deserialize_any(visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.unwrap_union() {
            Value::Null => visitor.visit_none(),
            value => visitor.visit_some(ValueDeserializer(value)),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.unwrap_union() {
            Value::Bytes(bytes) | Value::Fixed(_, bytes) => visitor.visit_seq(SeqAccessor {
                items: bytes.into_iter().map(|b| Value::Int(i32::from(b))),
            }),
            value => ValueDeserializer(value).deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.unwrap_union() {
            Value::String(variant) | Value::Enum(_, variant) => visitor.visit_enum(EnumAccessor {
                variant,
                content: None,
            }),
            Value::Map(entries) => {
                let mut entries = entries.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((variant, content)), None) => visitor.visit_enum(EnumAccessor {
                        variant,
                        content: Some(content),
                    }),
                    _ => Err(Details::DeserializeValue(format!(
                        "enum {name} must be a map with exactly one entry"
                    ))
                    .into()),
                }
            }
            other => Err(Details::DeserializeValue(format!(
                "cannot read enum {name} from {other:?}"
            ))
            .into()),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct tuple
        tuple_struct map struct identifier ignored_any
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// Interpret a [`Value`] as an instance of `T`.
///
/// Numbers convert between widths as long as the value fits, so an Avro `long` can be read into
/// an `i32` or a `u8` field.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    T::deserialize(ValueDeserializer(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[test]
    fn record_into_struct() -> TestResult {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Rec {
            a: i64,
            b: Option<String>,
            c: Vec<i32>,
        }
        let value = Value::Record(vec![
            ("a".to_string(), Value::Long(7)),
            (
                "b".to_string(),
                Value::Union(1, Box::new(Value::String("x".to_string()))),
            ),
            (
                "c".to_string(),
                Value::Array(vec![Value::Int(1), Value::Int(2)]),
            ),
        ]);
        assert_eq!(
            from_value::<Rec>(value)?,
            Rec {
                a: 7,
                b: Some("x".to_string()),
                c: vec![1, 2],
            }
        );
        Ok(())
    }

    #[test]
    fn null_union_is_none() -> TestResult {
        let value = Value::Union(0, Box::new(Value::Null));
        assert_eq!(from_value::<Option<i32>>(value)?, None);
        Ok(())
    }

    #[test]
    fn enums_from_symbols() -> TestResult {
        #[derive(Debug, Deserialize, PartialEq)]
        enum Suit {
            Hearts,
            Spades,
        }
        assert_eq!(from_value::<Suit>(Value::Enum(1, "Spades".to_string()))?, Suit::Spades);
        assert_eq!(from_value::<Suit>(Value::String("Hearts".to_string()))?, Suit::Hearts);
        assert!(from_value::<Suit>(Value::String("Clubs".to_string())).is_err());
        Ok(())
    }

    #[test]
    fn map_and_bytes() -> TestResult {
        let value = Value::Map(HashMap::from([("k".to_string(), Value::Long(1))]));
        assert_eq!(
            from_value::<HashMap<String, i64>>(value)?,
            HashMap::from([("k".to_string(), 1)])
        );

        let bytes: Vec<u8> = from_value(Value::Fixed(2, vec![1, 2]))?;
        assert_eq!(bytes, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn out_of_range_numbers_fail() {
        assert!(from_value::<u8>(Value::Long(300)).is_err());
    }
}
