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

use crate::schema::SchemaKind;
use std::{error::Error as _, fmt};

/// Errors encountered by avrokit.
///
/// To inspect the details of the error use [`details`](Self::details) or [`into_details`](Self::into_details)
/// to get a [`Details`] which contains more precise error information.
///
/// See [`Details`] for all possible errors.
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::new(<Details as serde::ser::Error>::custom(msg))
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::new(<Details as serde::de::Error>::custom(msg))
    }
}

#[derive(thiserror::Error)]
pub enum Details {
    #[error("Value of type {value_type} does not match schema {schema}")]
    TypeMismatch {
        value_type: String,
        schema: SchemaKind,
    },

    #[error("Map key is not a string; key type is {0}")]
    KeyTypeMismatch(String),

    #[error("Map value does not match the map's value schema")]
    ValueTypeMismatch(#[source] Box<Error>),

    #[error("Array item does not match the array's item schema")]
    ItemTypeMismatch(#[source] Box<Error>),

    #[error("Record field {field:?} does not match its schema")]
    FieldTypeMismatch {
        field: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Could not find a union variant for a value of type {value_type}")]
    UnionResolution { value_type: String },

    #[error("Union index {index} out of bounds: {num_variants}")]
    GetUnionVariant { index: i64, num_variants: usize },

    #[error("Enum symbol not found {0}")]
    GetEnumSymbol(String),

    #[error("Enum value index {index} is out of bounds {nsymbols}")]
    EnumIndex { index: i64, nsymbols: usize },

    #[error("Fixed size mismatch, expected: {size}, got: {n}")]
    FixedSizeMismatch { size: usize, n: usize },

    #[error("Missing field in record: {0:?}")]
    GetField(String),

    #[error("Record field {0:?} has no registered accessor")]
    UnboundField(String),

    #[error("Malformed variable length integer")]
    Framing(#[source] std::io::Error),

    #[error("Overflow when decoding integer value")]
    IntegerOverflow,

    #[error("Decoded integer out of range for i32: {1}")]
    ZagI32(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert i64 to usize: {1}")]
    ConvertI64ToUsize(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert u64 to usize: {1}")]
    ConvertU64ToUsize(#[source] std::num::TryFromIntError, u64),

    #[error("Cannot convert usize to i64: {1}")]
    ConvertUsizeToI64(#[source] std::num::TryFromIntError, usize),

    #[error("Unable to allocate {desired} bytes (maximum allowed: {maximum})")]
    MemoryAllocation { desired: usize, maximum: usize },

    #[error("Collection of {count} items exceeds the maximum of {maximum}")]
    CollectionLength { count: usize, maximum: usize },

    #[error("Invalid u8 for bool: {0}")]
    BoolValue(u8),

    #[error("Invalid utf-8 string")]
    ConvertToUtf8(#[source] std::string::FromUtf8Error),

    #[error("Failed to read boolean bytes")]
    ReadBoolean(#[source] std::io::Error),

    #[error("Failed to read bytes")]
    ReadBytes(#[source] std::io::Error),

    #[error("Failed to read float")]
    ReadFloat(#[source] std::io::Error),

    #[error("Failed to read double")]
    ReadDouble(#[source] std::io::Error),

    #[error("Failed to read fixed number of bytes '{1}'")]
    ReadFixed(#[source] std::io::Error, usize),

    #[error("Failed to skip {1} bytes")]
    SkipBytes(#[source] std::io::Error, usize),

    #[error("Block length must be a positive number of items, got {0}")]
    InvalidBlockLength(usize),

    #[error("Unknown codec {0:?}")]
    UnknownCodec(String),

    #[error("Block of {0} bytes does not contain a snappy checksum")]
    TruncatedBlock(usize),

    #[error("Failed to decompress with flate")]
    DeflateDecompress(#[source] std::io::Error),

    #[error("Failed to compress with snappy")]
    SnappyCompress(#[source] snap::Error),

    #[error("Failed to get snappy decompression length")]
    GetSnappyDecompressLen(#[source] snap::Error),

    #[error("Failed to decompress with snappy")]
    SnappyDecompress(#[source] snap::Error),

    #[error("Bad Snappy CRC32; expected {expected:x} but got {actual:x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Failed to parse schema from JSON")]
    ParseSchemaJson(#[source] serde_json::Error),

    #[error("Must be a JSON string, object or array")]
    ParseSchemaFromValidJson,

    #[error("Unknown type: {0}")]
    UnknownSchemaType(String),

    #[error("Unknown complex type: {0}")]
    GetComplexType(serde_json::Value),

    #[error("No `type` in complex type")]
    GetComplexTypeField,

    #[error("No `name` field")]
    GetNameField,

    #[error("No `fields` in record")]
    GetRecordFieldsJson,

    #[error("No `name` in record field")]
    GetNameFieldFromRecord,

    #[error("Invalid field name {0}")]
    FieldName(String),

    #[error("Duplicate field name {0}")]
    FieldNameDuplicate(String),

    #[error("No `symbols` field in enum")]
    GetEnumSymbolsField,

    #[error("Unable to parse `symbols` in enum")]
    GetEnumSymbols,

    #[error("Invalid enum symbol name {0}")]
    EnumSymbolName(String),

    #[error("Duplicate enum symbol {0}")]
    EnumSymbolDuplicate(String),

    #[error("No `items` in array")]
    GetArrayItemsField,

    #[error("No `values` in map")]
    GetMapValuesField,

    #[error("Fixed schema has no `size`")]
    GetFixedSizeField,

    #[error("Fixed schema `size` value must be a positive integer: {0}")]
    GetFixedSizeFieldPositive(serde_json::Value),

    #[error("Invalid schema name {0}. It must match the regex '{1}'")]
    InvalidSchemaName(String, &'static str),

    #[error("Invalid namespace {0}. It must match the regex '{1}'")]
    InvalidNamespace(String, &'static str),

    #[error("Two schemas with the same fullname were given: {0:?}")]
    NameCollision(String),

    #[error("Unions may not directly contain a union")]
    GetNestedUnion,

    #[error("Unions cannot contain duplicate types")]
    GetUnionDuplicate,

    #[error("Union type should not be empty")]
    EmptyUnion,

    #[error("Failed to convert JSON to string")]
    ConvertJsonToString(#[source] serde_json::Error),

    #[error("Failed to read header")]
    ReadHeader(#[source] std::io::Error),

    #[error("wrong magic in header")]
    HeaderMagic,

    #[error("no metadata in header")]
    GetHeaderMetadata,

    #[error("Missing or invalid avro.schema key in the header metadata")]
    GetAvroSchemaFromMap,

    #[error("Metadata key {0:?} is reserved for the container format")]
    InvalidMetadataKey(String),

    #[error("Cannot add metadata after the header has been written")]
    FileHeaderAlreadyWritten,

    #[error("Failed to read marker bytes")]
    ReadMarker(#[source] std::io::Error),

    #[error("Failed to read block marker bytes")]
    ReadBlockMarker(#[source] std::io::Error),

    #[error("Read into buffer failed")]
    ReadIntoBuf(#[source] std::io::Error),

    #[error("block marker does not match header marker")]
    GetBlockMarker,

    #[error("Failed to write bytes")]
    WriteBytes(#[source] std::io::Error),

    #[error("Failed to flush inner writer")]
    FlushWriter(#[source] std::io::Error),

    #[error("Failed to write marker")]
    WriteMarker(#[source] std::io::Error),

    #[error("Failed to serialize value into Avro value: {0}")]
    SerializeValue(String),

    #[error("Failed to deserialize Avro value into value: {0}")]
    DeserializeValue(String),
}

impl serde::ser::Error for Details {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Details::SerializeValue(msg.to_string())
    }
}

impl serde::de::Error for Details {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Details::DeserializeValue(msg.to_string())
    }
}

impl fmt::Debug for Details {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut msg = self.to_string();
        if let Some(e) = self.source() {
            msg.extend([": ", &e.to_string()]);
        }
        write!(f, "{msg}")
    }
}
