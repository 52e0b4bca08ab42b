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

//! Writing and reading single datums, without container framing.

use crate::{
    AvroResult, Config,
    config::{FrozenConfig, default_config},
    decode::{decode, skip},
    encode::{encode, write_raw},
    error::Details,
    fields::AvroRecord,
    schema::{RecordSchema, Schema},
    serde::{SchemaAwareSerializer, from_value},
    types::Value,
};
use serde::{Serialize, de::DeserializeOwned};
use std::io::{Read, Write};

fn record_schema<'s>(schema: &'s Schema) -> AvroResult<&'s RecordSchema> {
    match schema {
        Schema::Record(record) => Ok(record),
        other => Err(Details::TypeMismatch {
            value_type: "record".to_string(),
            schema: other.kind(),
        }
        .into()),
    }
}

/// Writes datums of one schema to a sink.
///
/// The configuration is captured when the encoder is created. Every datum is serialized into a
/// scratch buffer first and only reaches the sink once it has been written completely, so a
/// rejected value leaves the sink untouched.
pub struct Encoder<'s, W: Write> {
    schema: &'s Schema,
    writer: W,
    config: FrozenConfig,
    scratch: Vec<u8>,
}

impl<'s, W: Write> Encoder<'s, W> {
    /// An encoder using the current process-wide default configuration.
    pub fn new(schema: &'s Schema, writer: W) -> Self {
        Self::with_config(schema, writer, default_config())
    }

    pub fn with_config(schema: &'s Schema, writer: W, config: FrozenConfig) -> Self {
        Self {
            schema,
            writer,
            config,
            scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Serialize a native value. Returns the number of bytes written.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> AvroResult<usize> {
        self.scratch.clear();
        value.serialize(SchemaAwareSerializer::new(
            &mut self.scratch,
            self.schema,
            &self.config,
        ))?;
        self.flush_scratch()
    }

    /// Write a [`Value`], validating it first.
    pub fn encode_value(&mut self, value: &Value) -> AvroResult<usize> {
        self.scratch.clear();
        encode(value, self.schema, &self.config, &mut self.scratch)?;
        self.flush_scratch()
    }

    /// Write a record through its [`FieldTable`](crate::FieldTable).
    pub fn encode_record<T: AvroRecord>(&mut self, record: &T) -> AvroResult<usize> {
        let schema = record_schema(self.schema)?;
        let value = T::field_table().bind(schema, &self.config)?.to_value(record);
        self.encode_value(&value)
    }

    fn flush_scratch(&mut self) -> AvroResult<usize> {
        write_raw(&self.scratch, &mut self.writer)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Reads datums of one schema from a source.
pub struct Decoder<'s, R: Read> {
    schema: &'s Schema,
    reader: R,
    config: FrozenConfig,
}

impl<'s, R: Read> Decoder<'s, R> {
    /// A decoder using the current process-wide default configuration.
    pub fn new(schema: &'s Schema, reader: R) -> Self {
        Self::with_config(schema, reader, default_config())
    }

    pub fn with_config(schema: &'s Schema, reader: R, config: FrozenConfig) -> Self {
        Self {
            schema,
            reader,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn decode_value(&mut self) -> AvroResult<Value> {
        decode(self.schema, &self.config, &mut self.reader)
    }

    /// Decode the next datum into a native value.
    pub fn decode<T: DeserializeOwned>(&mut self) -> AvroResult<T> {
        from_value(self.decode_value()?)
    }

    pub fn decode_record<T: AvroRecord>(&mut self) -> AvroResult<T> {
        let schema = record_schema(self.schema)?;
        let value = self.decode_value()?;
        T::field_table().bind(schema, &self.config)?.from_value(value)
    }

    /// Skip the next datum without materializing it.
    pub fn skip(&mut self) -> AvroResult<()> {
        skip(self.schema, &self.config, &mut self.reader)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Encode a value into raw Avro data using the default configuration.
///
/// **NOTE**: This function does **NOT** generate container headers or sync markers; use
/// [`Writer`](crate::Writer) for that.
pub fn to_avro_datum<T: Into<Value>>(schema: &Schema, value: T) -> AvroResult<Vec<u8>> {
    let mut encoder = Encoder::new(schema, Vec::new());
    encoder.encode_value(&value.into())?;
    Ok(encoder.into_inner())
}

/// Decode one raw Avro datum using the default configuration.
pub fn from_avro_datum<R: Read>(schema: &Schema, reader: &mut R) -> AvroResult<Value> {
    Decoder::new(schema, reader).decode_value()
}
