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

use crate::{
    Config, Error,
    block::BlockWriter,
    encode::encode_bytes,
    error::Details,
    schema::MapSchema,
    serde::ser_schema::SchemaAwareSerializer,
};
use serde::{
    Serialize, Serializer,
    ser::{Impossible, SerializeMap, SerializeStruct},
};
use std::io::Write;

/// Writes a map as blocks of `key value` entries.
pub struct MapSerializer<'s, 'w, W: Write> {
    blocks: BlockWriter<'w, W>,
    map: &'s MapSchema,
    config: &'s Config,
    bytes_written: usize,
}

impl<'s, 'w, W: Write> MapSerializer<'s, 'w, W> {
    pub fn new(
        writer: &'w mut W,
        map: &'s MapSchema,
        config: &'s Config,
        bytes_written: usize,
    ) -> Result<Self, Error> {
        Ok(Self {
            blocks: BlockWriter::new(writer, config.block_length)?,
            map,
            config,
            bytes_written,
        })
    }

    fn write_key(&mut self, key: &str) -> Result<(), Error> {
        encode_bytes(key, self.blocks.buffer())?;
        Ok(())
    }
}

impl<'s, 'w, W: Write> SerializeMap for MapSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let key = key.serialize(MapKeySerializer)?;
        self.write_key(&key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let ser = SchemaAwareSerializer::new(self.blocks.buffer(), &self.map.types, self.config);
        value
            .serialize(ser)
            .map_err(|e| Details::ValueTypeMismatch(Box::new(e)))?;
        self.blocks.end_item()
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(self.bytes_written + self.blocks.finish()?)
    }
}

/// A struct written against a map schema becomes a map keyed by its field names.
impl<'s, 'w, W: Write> SerializeStruct for MapSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.write_key(key)?;
        SerializeMap::serialize_value(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        SerializeMap::end(self)
    }
}

/// Accepts only string-like keys.
///
/// Avro map keys are always strings; any other key type is a
/// [`Details::KeyTypeMismatch`].
pub(crate) struct MapKeySerializer;

impl MapKeySerializer {
    fn mismatch(key_type: &str) -> Error {
        Details::KeyTypeMismatch(key_type.to_string()).into()
    }
}

macro_rules! reject_key {
    ($($method:ident($ty:ty) => $name:literal),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<Self::Ok, Self::Error> {
                Err(Self::mismatch($name))
            }
        )*
    };
}

impl Serializer for MapKeySerializer {
    type Ok = String;
    type Error = Error;
    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(v.to_owned())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        Ok(v.to_string())
    }

    reject_key! {
        serialize_bool(bool) => "bool",
        serialize_i8(i8) => "i8",
        serialize_i16(i16) => "i16",
        serialize_i32(i32) => "i32",
        serialize_i64(i64) => "i64",
        serialize_i128(i128) => "i128",
        serialize_u8(u8) => "u8",
        serialize_u16(u16) => "u16",
        serialize_u32(u32) => "u32",
        serialize_u64(u64) => "u64",
        serialize_u128(u128) => "u128",
        serialize_f32(f32) => "f32",
        serialize_f64(f64) => "f64",
        serialize_bytes(&[u8]) => "bytes",
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(Self::mismatch("None"))
    }

    fn serialize_some<T>(self, _value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        Err(Self::mismatch("Option"))
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Err(Self::mismatch("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Self::Ok, Self::Error> {
        Err(Self::mismatch(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(variant.to_owned())
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
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        Err(Self::mismatch(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(Self::mismatch("seq"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(Self::mismatch("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(Self::mismatch(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(Self::mismatch(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(Self::mismatch("map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(Self::mismatch(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(Self::mismatch(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
    enum Color {
        Red,
        Green,
    }

    fn serialize<T: Serialize>(value: &T, schema: &Schema, config: &Config) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        value.serialize(SchemaAwareSerializer::new(&mut out, schema, config))?;
        Ok(out)
    }

    #[test]
    fn keys_must_be_strings() {
        let err = 1i32.serialize(MapKeySerializer).unwrap_err();
        assert!(matches!(err.details(), Details::KeyTypeMismatch(t) if t == "i32"));
        let err = (1, 2).serialize(MapKeySerializer).unwrap_err();
        assert!(matches!(err.details(), Details::KeyTypeMismatch(t) if t == "tuple"));
    }

    #[test]
    fn unit_enum_keys_use_the_variant_name() -> TestResult {
        let map = BTreeMap::from([(Color::Red, 1), (Color::Green, 2)]);
        let out = serialize(&map, &Schema::map(Schema::Int), &Config::default())?;
        assert_eq!(
            out,
            [0x03, 0x18, 0x06, b'R', b'e', b'd', 0x02, 0x0a, b'G', b'r', b'e', b'e', b'n', 0x04, 0x00]
        );
        Ok(())
    }

    #[test]
    fn struct_as_map() -> TestResult {
        #[derive(Serialize)]
        struct Pair {
            a: i64,
            b: i64,
        }
        let config = Config::builder().block_length(1).build();
        let out = serialize(&Pair { a: 1, b: -1 }, &Schema::map(Schema::Long), &config)?;
        assert_eq!(out, [0x01, 0x06, 0x02, b'a', 0x02, 0x01, 0x06, 0x02, b'b', 0x01, 0x00]);
        Ok(())
    }
}
