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
    encode::{encode_long, write_raw},
    error::Details,
    schema::{RecordField, RecordSchema, Schema, SchemaKind},
    serde::ser_schema::{SchemaAwareSerializer, map::MapKeySerializer},
};
use log::debug;
use serde::{
    Serialize,
    ser::{SerializeMap, SerializeStruct, SerializeStructVariant},
};
use std::{cmp::Ordering, collections::HashMap, io::Write};

/// Writes the fields of a struct (or a string-keyed map) in schema order.
pub struct RecordSerializer<'s, 'w, W: Write> {
    writer: &'w mut W,
    schema: &'s RecordSchema,
    config: &'s Config,
    /// Fields received ahead of their position.
    field_cache: HashMap<usize, Vec<u8>>,
    /// The current field name when serializing from a map.
    map_field_name: Option<String>,
    field_position: usize,
    bytes_written: usize,
}

impl<'s, 'w, W: Write> RecordSerializer<'s, 'w, W> {
    pub fn new(
        writer: &'w mut W,
        schema: &'s RecordSchema,
        config: &'s Config,
        bytes_written: usize,
    ) -> Self {
        Self {
            writer,
            schema,
            config,
            field_cache: HashMap::new(),
            map_field_name: None,
            field_position: 0,
            bytes_written,
        }
    }

    fn serialize_named_field<T>(&mut self, name: &str, value: &T) -> Result<(), Error>
    where
        T: ?Sized + Serialize,
    {
        let Some(position) = self.schema.lookup.get(name).copied() else {
            debug!(
                "Ignoring field {name:?}, record {} has no such field",
                self.schema.name
            );
            return Ok(());
        };
        let field = &self.schema.fields[position];
        self.serialize_next_field(field, position, value)
            .map_err(|e| {
                Details::FieldTypeMismatch {
                    field: field.name.clone(),
                    source: Box::new(e),
                }
                .into()
            })
    }

    fn serialize_next_field<T>(
        &mut self,
        field: &RecordField,
        position: usize,
        value: &T,
    ) -> Result<(), Error>
    where
        T: ?Sized + Serialize,
    {
        match self.field_position.cmp(&position) {
            Ordering::Equal => {
                // In order: write straight through, then drain whatever was waiting on it.
                let ser = SchemaAwareSerializer::new(&mut *self.writer, &field.schema, self.config);
                self.bytes_written += value.serialize(ser)?;
                self.field_position += 1;
                while let Some(bytes) = self.field_cache.remove(&self.field_position) {
                    self.bytes_written += write_raw(&bytes, &mut *self.writer)?;
                    self.field_position += 1;
                }
                Ok(())
            }
            Ordering::Less => {
                let mut bytes = Vec::new();
                let ser = SchemaAwareSerializer::new(&mut bytes, &field.schema, self.config);
                value.serialize(ser)?;
                if self.field_cache.insert(position, bytes).is_some() {
                    Err(Details::FieldNameDuplicate(field.name.clone()).into())
                } else {
                    Ok(())
                }
            }
            Ordering::Greater => Err(Details::FieldNameDuplicate(field.name.clone()).into()),
        }
    }

    fn end(mut self) -> Result<usize, Error> {
        while let Some(field) = self.schema.fields.get(self.field_position) {
            if let Some(bytes) = self.field_cache.remove(&self.field_position) {
                self.bytes_written += write_raw(&bytes, &mut *self.writer)?;
            } else {
                self.bytes_written += write_absent_field(field, &mut *self.writer)?;
            }
            self.field_position += 1;
        }
        Ok(self.bytes_written)
    }
}

/// A field the value did not provide is written as null when its schema allows it.
fn write_absent_field<W: Write>(field: &RecordField, writer: &mut W) -> Result<usize, Error> {
    match &field.schema {
        Schema::Null => Ok(0),
        Schema::Union(union) => match union.index_of_kind(SchemaKind::Null) {
            Some(index) => encode_long(index as i64, writer),
            None => Err(Details::GetField(field.name.clone()).into()),
        },
        _ => Err(Details::GetField(field.name.clone()).into()),
    }
}

impl<'s, 'w, W: Write> SerializeStruct for RecordSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.serialize_named_field(key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        RecordSerializer::end(self)
    }
}

impl<'s, 'w, W: Write> SerializeStructVariant for RecordSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.serialize_named_field(key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        RecordSerializer::end(self)
    }
}

impl<'s, 'w, W: Write> SerializeMap for RecordSerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.map_field_name = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let name = self
            .map_field_name
            .take()
            .ok_or_else(|| Details::SerializeValue("map value without a key".to_string()))?;
        self.serialize_named_field(&name, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        RecordSerializer::end(self)
    }
}
