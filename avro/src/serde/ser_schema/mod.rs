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

//! Serde serialization that writes Avro binary directly, guided by a schema.

mod array;
mod map;
mod record;
mod union;

use crate::{
    Config, Error,
    encode::encode_long,
    error::Details,
    schema::{Schema, SchemaKind, UnionSchema},
};
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeStruct},
};
use std::{
    fmt::{Debug, Formatter},
    io::Write,
};
use union::Scalar;

pub use array::ArraySerializer;
pub use map::MapSerializer;
pub use record::RecordSerializer;

/// Either a map or a record, depending on the schema a map-like value meets.
pub enum MapOrRecordSerializer<'s, 'w, W: Write> {
    Map(MapSerializer<'s, 'w, W>),
    Record(RecordSerializer<'s, 'w, W>),
}

impl<'s, 'w, W: Write> SerializeMap for MapOrRecordSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        match self {
            MapOrRecordSerializer::Map(map) => map.serialize_key(key),
            MapOrRecordSerializer::Record(record) => record.serialize_key(key),
        }
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        match self {
            MapOrRecordSerializer::Map(map) => map.serialize_value(value),
            MapOrRecordSerializer::Record(record) => record.serialize_value(value),
        }
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        match self {
            MapOrRecordSerializer::Map(map) => SerializeMap::end(map),
            MapOrRecordSerializer::Record(record) => SerializeMap::end(record),
        }
    }
}

impl<'s, 'w, W: Write> SerializeStruct for MapOrRecordSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        match self {
            MapOrRecordSerializer::Map(map) => map.serialize_field(key, value),
            MapOrRecordSerializer::Record(record) => record.serialize_field(key, value),
        }
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        match self {
            MapOrRecordSerializer::Map(map) => SerializeStruct::end(map),
            MapOrRecordSerializer::Record(record) => SerializeStruct::end(record),
        }
    }
}

/// Serializes any `Serialize` value as Avro binary for the given schema.
///
/// Every method returns the number of bytes written. Values that do not fit the schema are
/// rejected with the same errors [`crate::types::Value::validate`] reports, but note that a
/// rejected compound value may already have been partially written. Write into a scratch buffer
/// (as [`crate::Encoder`] does) when that matters.
pub struct SchemaAwareSerializer<'s, 'w, W: Write> {
    writer: &'w mut W,
    schema: &'s Schema,
    config: &'s Config,
}

impl<'s, 'w, W: Write> Debug for SchemaAwareSerializer<'s, 'w, W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaAwareSerializer")
            .field("schema", &self.schema)
            .field("config", &self.config)
            .finish()
    }
}

impl<'s, 'w, W: Write> SchemaAwareSerializer<'s, 'w, W> {
    pub fn new(writer: &'w mut W, schema: &'s Schema, config: &'s Config) -> Self {
        Self {
            writer,
            schema,
            config,
        }
    }

    fn mismatch(&self, value_type: &str) -> Error {
        Details::TypeMismatch {
            value_type: value_type.to_string(),
            schema: self.schema.kind(),
        }
        .into()
    }

    fn serialize_scalar(self, scalar: Scalar<'_>) -> Result<usize, Error> {
        match self.schema {
            Schema::Union(union) => {
                let (index, variant) =
                    scalar.select_variant(union, self.config.union_resolution_error)?;
                let mut bytes_written = encode_long(index as i64, &mut *self.writer)?;
                bytes_written += scalar.write(variant, &mut *self.writer)?;
                Ok(bytes_written)
            }
            // Enum and fixed report their own, more precise, errors.
            schema @ (Schema::Enum(_) | Schema::Fixed(_)) => scalar.write(schema, self.writer),
            schema if scalar.fits(schema) => scalar.write(schema, self.writer),
            _ => Err(self.mismatch(scalar.type_name())),
        }
    }

    fn serialize_null(self, value_type: &str) -> Result<usize, Error> {
        match self.schema {
            Schema::Null => Ok(0),
            Schema::Union(union) => match union.index_of_kind(SchemaKind::Null) {
                Some(index) => encode_long(index as i64, &mut *self.writer),
                None => Err(Details::UnionResolution {
                    value_type: value_type.to_string(),
                }
                .into()),
            },
            _ => Err(self.mismatch(value_type)),
        }
    }

    fn into_array(self, value_type: &str) -> Result<ArraySerializer<'s, 'w, W>, Error> {
        match self.schema {
            Schema::Array(array) => ArraySerializer::new(self.writer, array, self.config, 0),
            Schema::Union(union) => {
                if let Some(index) = union.index_of_kind(SchemaKind::Array)
                    && let Schema::Array(array) = &union.variants()[index]
                {
                    let bytes_written = encode_long(index as i64, &mut *self.writer)?;
                    ArraySerializer::new(self.writer, array, self.config, bytes_written)
                } else {
                    Err(Details::UnionResolution {
                        value_type: value_type.to_string(),
                    }
                    .into())
                }
            }
            _ => Err(self.mismatch(value_type)),
        }
    }

    /// Serializer for a map-like value, with `preferred` naming the union variant to try first.
    fn into_map_or_record(
        self,
        value_type: &str,
        preferred: Option<&str>,
        kinds: [SchemaKind; 2],
    ) -> Result<MapOrRecordSerializer<'s, 'w, W>, Error> {
        let mismatch = self.mismatch(value_type);
        match self.schema {
            Schema::Union(union) => {
                let Some(index) = pick_variant(union, preferred, kinds) else {
                    return Err(Details::UnionResolution {
                        value_type: value_type.to_string(),
                    }
                    .into());
                };
                let bytes_written = encode_long(index as i64, &mut *self.writer)?;
                map_or_record(
                    self.writer,
                    &union.variants()[index],
                    self.config,
                    bytes_written,
                    mismatch,
                )
            }
            schema => map_or_record(self.writer, schema, self.config, 0, mismatch),
        }
    }
}

fn pick_variant(union: &UnionSchema, preferred: Option<&str>, kinds: [SchemaKind; 2]) -> Option<usize> {
    preferred
        .and_then(|name| union.index_of_name(name))
        .filter(|&i| matches!(union.variants()[i], Schema::Record(_)))
        .or_else(|| union.index_of_kind(kinds[0]))
        .or_else(|| union.index_of_kind(kinds[1]))
}

fn map_or_record<'s, 'w, W: Write>(
    writer: &'w mut W,
    schema: &'s Schema,
    config: &'s Config,
    bytes_written: usize,
    mismatch: Error,
) -> Result<MapOrRecordSerializer<'s, 'w, W>, Error> {
    match schema {
        Schema::Map(map) => Ok(MapOrRecordSerializer::Map(MapSerializer::new(
            writer,
            map,
            config,
            bytes_written,
        )?)),
        Schema::Record(record) => Ok(MapOrRecordSerializer::Record(RecordSerializer::new(
            writer,
            record,
            config,
            bytes_written,
        ))),
        _ => Err(mismatch),
    }
}

impl<'s, 'w, W: Write> Serializer for SchemaAwareSerializer<'s, 'w, W> {
    /// Amount of bytes written
    type Ok = usize;
    type Error = Error;
    type SerializeSeq = ArraySerializer<'s, 'w, W>;
    type SerializeTuple = ArraySerializer<'s, 'w, W>;
    type SerializeTupleStruct = ArraySerializer<'s, 'w, W>;
    type SerializeTupleVariant = ArraySerializer<'s, 'w, W>;
    type SerializeMap = MapOrRecordSerializer<'s, 'w, W>;
    type SerializeStruct = MapOrRecordSerializer<'s, 'w, W>;
    type SerializeStructVariant = RecordSerializer<'s, 'w, W>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Int(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Int(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Int(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Long(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Self::Ok, Self::Error> {
        Err(Details::SerializeValue(format!("i128 {v} has no Avro representation")).into())
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Int(i32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Int(i32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        match i32::try_from(v) {
            Ok(v) => self.serialize_scalar(Scalar::Int(v)),
            Err(_) => self.serialize_scalar(Scalar::Long(i64::from(v))),
        }
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_scalar(Scalar::Long(v)),
            Err(_) => Err(Details::SerializeValue(format!("u64 {v} does not fit in a long")).into()),
        }
    }

    fn serialize_u128(self, v: u128) -> Result<Self::Ok, Self::Error> {
        Err(Details::SerializeValue(format!("u128 {v} has no Avro representation")).into())
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Float(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        let mut buf = [0u8; 4];
        self.serialize_scalar(Scalar::Str(v.encode_utf8(&mut buf)))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Str(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Bytes(v))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_null("None")
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_null("unit")
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_null("unit")
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_scalar(Scalar::Str(variant))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        match self.schema {
            Schema::Union(union) => match union.index_of_name(variant) {
                // The variant names a member of the union
                Some(index) => {
                    let mut bytes_written = encode_long(index as i64, &mut *self.writer)?;
                    let ser =
                        SchemaAwareSerializer::new(self.writer, &union.variants()[index], self.config);
                    bytes_written += value.serialize(ser)?;
                    Ok(bytes_written)
                }
                // Bare union, the inner value picks the variant
                None => value.serialize(self),
            },
            _ => value.serialize(self),
        }
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        self.into_array("seq")
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.into_array("tuple")
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.into_array("tuple struct")
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(Details::SerializeValue(format!(
            "tuple variant {name}::{variant} has no Avro representation"
        ))
        .into())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        self.into_map_or_record("map", None, [SchemaKind::Map, SchemaKind::Record])
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.into_map_or_record("struct", Some(name), [SchemaKind::Record, SchemaKind::Map])
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        match self.schema {
            Schema::Record(record) => Ok(RecordSerializer::new(self.writer, record, self.config, 0)),
            Schema::Union(union) => {
                if let Some(index) = union.index_of_name(variant)
                    && let Schema::Record(record) = &union.variants()[index]
                {
                    let bytes_written = encode_long(index as i64, &mut *self.writer)?;
                    Ok(RecordSerializer::new(
                        self.writer,
                        record,
                        self.config,
                        bytes_written,
                    ))
                } else {
                    Err(Details::UnionResolution {
                        value_type: variant.to_string(),
                    }
                    .into())
                }
            }
            _ => Err(self.mismatch("struct variant")),
        }
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrokit_test_helper::TestResult;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn serialize<T: Serialize>(value: &T, schema: &Schema, config: &Config) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        let written = value.serialize(SchemaAwareSerializer::new(&mut out, schema, config))?;
        assert_eq!(written, out.len());
        Ok(out)
    }

    fn schema(text: &str) -> Schema {
        Schema::parse_str(text).unwrap()
    }

    #[rstest]
    #[case::none(None, &[0x00])]
    #[case::some(Some(-2), &[0x02, 0x03])]
    fn options_in_nullable_unions(#[case] value: Option<i64>, #[case] expected: &[u8]) -> TestResult {
        let out = serialize(&value, &schema(r#"["null", "long"]"#), &Config::default())?;
        assert_eq!(out, expected);
        Ok(())
    }

    #[test]
    fn widening_and_mismatch() -> TestResult {
        let config = Config::default();
        assert_eq!(serialize(&1u8, &Schema::Long, &config)?, [0x02]);
        assert_eq!(serialize(&1.5f32, &Schema::Double, &config)?, 1.5f64.to_le_bytes());

        let err = serialize(&1i64, &Schema::Int, &config).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::TypeMismatch { value_type, schema: SchemaKind::Int } if value_type == "i64"
        ));
        Ok(())
    }

    #[test]
    fn strict_union_resolution() -> TestResult {
        let union = schema(r#"["null", "double"]"#);
        let lenient = Config::default();
        assert_eq!(serialize(&2i64, &union, &lenient)?, [&[0x02][..], &2.0f64.to_le_bytes()].concat());

        let strict = Config::builder().union_resolution_error(true).build();
        let err = serialize(&2i64, &union, &strict).unwrap_err();
        assert!(matches!(err.details(), Details::UnionResolution { .. }));
        Ok(())
    }

    #[test]
    fn unit_variants_are_enum_symbols() -> TestResult {
        #[derive(Serialize)]
        enum Suit {
            Hearts,
            Spades,
        }
        let suits = schema(r#"{"type": "enum", "name": "Suit", "symbols": ["Spades", "Hearts"]}"#);
        let config = Config::default();
        assert_eq!(serialize(&Suit::Hearts, &suits, &config)?, [0x02]);
        assert_eq!(serialize(&Suit::Spades, &suits, &config)?, [0x00]);

        let err = serialize(&"Clubs", &suits, &config).unwrap_err();
        assert!(matches!(err.details(), Details::GetEnumSymbol(s) if s == "Clubs"));
        Ok(())
    }

    #[test]
    fn structs_pick_union_records_by_name() -> TestResult {
        #[derive(Serialize)]
        struct B {
            x: i32,
        }
        let union = schema(
            r#"[{"type": "record", "name": "A", "fields": [{"name": "x", "type": "string"}]},
                {"type": "record", "name": "B", "fields": [{"name": "x", "type": "int"}]}]"#,
        );
        assert_eq!(serialize(&B { x: 1 }, &union, &Config::default())?, hex!("02 02"));
        Ok(())
    }

    #[test]
    fn newtype_variants_name_the_union_member() -> TestResult {
        #[derive(Serialize)]
        enum Shape {
            Circle(f64),
            Label(String),
        }
        let union = schema(
            r#"["null",
                {"type": "record", "name": "Circle", "fields": [{"name": "r", "type": "double"}]},
                "string"]"#,
        );
        let config = Config::default();
        assert_eq!(
            serialize(&Shape::Label("x".to_string()), &union, &config)?,
            hex!("04 02 78")
        );
        // Circle names a record, so the f64 itself is checked against the record
        let err = serialize(&Shape::Circle(1.0), &union, &config).unwrap_err();
        assert!(matches!(err.details(), Details::TypeMismatch { schema: SchemaKind::Record, .. }));
        Ok(())
    }

    #[test]
    fn unrepresentable_numbers() {
        let config = Config::default();
        let err = serialize(&u64::MAX, &Schema::Long, &config).unwrap_err();
        assert!(matches!(err.details(), Details::SerializeValue(_)));
        assert!(serialize(&1u128, &Schema::Long, &config).is_err());
    }

    #[test]
    fn bytes_need_serde_bytes() -> TestResult {
        let config = Config::default();
        let out = serialize(&serde_bytes::Bytes::new(b"ab"), &Schema::Bytes, &config)?;
        assert_eq!(out, hex!("04 61 62"));

        let err = serialize(&vec![1u8, 2], &Schema::Bytes, &config).unwrap_err();
        assert!(matches!(err.details(), Details::TypeMismatch { value_type, .. } if value_type == "seq"));
        Ok(())
    }

    #[test]
    fn u32_is_an_int_while_it_fits() -> TestResult {
        let config = Config::default();
        assert_eq!(serialize(&7u32, &Schema::Int, &config)?, hex!("0e"));
        assert_eq!(serialize(&7u32, &Schema::Long, &config)?, hex!("0e"));
        assert_eq!(
            serialize(&u32::MAX, &Schema::Long, &config)?,
            hex!("fe ff ff ff 1f")
        );

        let err = serialize(&u32::MAX, &Schema::Int, &config).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::TypeMismatch { value_type, .. } if value_type == "i64"
        ));
        Ok(())
    }
}
