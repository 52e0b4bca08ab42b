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
    Config, Error, block::BlockWriter, error::Details, schema::ArraySchema,
    serde::ser_schema::SchemaAwareSerializer,
};
use serde::{
    Serialize,
    ser::{SerializeSeq, SerializeTuple, SerializeTupleStruct, SerializeTupleVariant},
};
use std::io::Write;

/// Writes sequences and tuples as blocks of items.
pub struct ArraySerializer<'s, 'w, W: Write> {
    blocks: BlockWriter<'w, W>,
    array: &'s ArraySchema,
    config: &'s Config,
    bytes_written: usize,
}

impl<'s, 'w, W: Write> ArraySerializer<'s, 'w, W> {
    pub fn new(
        writer: &'w mut W,
        array: &'s ArraySchema,
        config: &'s Config,
        bytes_written: usize,
    ) -> Result<Self, Error> {
        Ok(Self {
            blocks: BlockWriter::new(writer, config.block_length)?,
            array,
            config,
            bytes_written,
        })
    }

    fn serialize_item<T>(&mut self, value: &T) -> Result<(), Error>
    where
        T: ?Sized + Serialize,
    {
        let ser = SchemaAwareSerializer::new(self.blocks.buffer(), &self.array.items, self.config);
        value
            .serialize(ser)
            .map_err(|e| Details::ItemTypeMismatch(Box::new(e)))?;
        self.blocks.end_item()
    }

    fn finish(self) -> Result<usize, Error> {
        Ok(self.bytes_written + self.blocks.finish()?)
    }
}

impl<'s, 'w, W: Write> SerializeSeq for ArraySerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.serialize_item(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'s, 'w, W: Write> SerializeTuple for ArraySerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.serialize_item(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'s, 'w, W: Write> SerializeTupleStruct for ArraySerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.serialize_item(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'s, 'w, W: Write> SerializeTupleVariant for ArraySerializer<'s, 'w, W> {
    type Ok = usize;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.serialize_item(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}
