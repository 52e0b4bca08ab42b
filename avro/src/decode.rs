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
    AvroResult, Config,
    block::{read_blocks, skip_blocks, skip_bytes},
    error::Details,
    schema::Schema,
    types::Value,
    util::{safe_len, zag_i32, zag_i64},
};
use std::{collections::HashMap, io::Read};

#[inline]
pub(crate) fn decode_len<R: Read>(reader: &mut R, max_len: usize) -> AvroResult<usize> {
    let len = zag_i64(reader)?;
    let len = usize::try_from(len).map_err(|e| Details::ConvertI64ToUsize(e, len))?;
    safe_len(len, max_len)
}

fn decode_bytes<R: Read>(reader: &mut R, max_len: usize) -> AvroResult<Vec<u8>> {
    let len = decode_len(reader, max_len)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(Details::ReadBytes)?;
    Ok(buf)
}

fn decode_string<R: Read>(reader: &mut R, max_len: usize) -> AvroResult<String> {
    let bytes = decode_bytes(reader, max_len)?;
    String::from_utf8(bytes).map_err(|e| Details::ConvertToUtf8(e).into())
}

/// Decode a `Value` from avro format given its `Schema`.
pub fn decode<R: Read>(schema: &Schema, config: &Config, reader: &mut R) -> AvroResult<Value> {
    let max_len = config.max_byte_slice_size;
    let max_items = config.max_collection_items;
    match schema {
        Schema::Null => Ok(Value::Null),
        Schema::Boolean => {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf).map_err(Details::ReadBoolean)?;
            match buf[0] {
                0u8 => Ok(Value::Boolean(false)),
                1u8 => Ok(Value::Boolean(true)),
                other => Err(Details::BoolValue(other).into()),
            }
        }
        Schema::Int => zag_i32(reader).map(Value::Int),
        Schema::Long => zag_i64(reader).map(Value::Long),
        Schema::Float => {
            let mut buf = [0u8; size_of::<f32>()];
            reader.read_exact(&mut buf).map_err(Details::ReadFloat)?;
            Ok(Value::Float(f32::from_le_bytes(buf)))
        }
        Schema::Double => {
            let mut buf = [0u8; size_of::<f64>()];
            reader.read_exact(&mut buf).map_err(Details::ReadDouble)?;
            Ok(Value::Double(f64::from_le_bytes(buf)))
        }
        Schema::Bytes => decode_bytes(reader, max_len).map(Value::Bytes),
        Schema::String => decode_string(reader, max_len).map(Value::String),
        Schema::Fixed(fixed) => {
            let mut buf = vec![0u8; safe_len(fixed.size, max_len)?];
            reader
                .read_exact(&mut buf)
                .map_err(|e| Details::ReadFixed(e, fixed.size))?;
            Ok(Value::Fixed(fixed.size, buf))
        }
        Schema::Enum(enum_schema) => {
            let index = zag_i32(reader)?;
            usize::try_from(index)
                .ok()
                .and_then(|i| enum_schema.symbols.get(i))
                .map(|symbol| Value::Enum(index as u32, symbol.clone()))
                .ok_or_else(|| {
                    Details::EnumIndex {
                        index: i64::from(index),
                        nsymbols: enum_schema.symbols.len(),
                    }
                    .into()
                })
        }
        Schema::Union(union) => {
            let index = zag_i64(reader)?;
            let variants = union.variants();
            let variant = usize::try_from(index)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or(Details::GetUnionVariant {
                    index,
                    num_variants: variants.len(),
                })?;
            let value = decode(variant, config, reader)?;
            Ok(Value::Union(index as u32, Box::new(value)))
        }
        Schema::Array(array) => {
            let mut items = Vec::new();
            read_blocks(reader, max_len, max_items, |reader| {
                items.push(decode(&array.items, config, reader)?);
                Ok(())
            })?;
            Ok(Value::Array(items))
        }
        Schema::Map(map) => {
            let mut entries = HashMap::new();
            read_blocks(reader, max_len, max_items, |reader| {
                let key = decode_string(reader, max_len)?;
                let value = decode(&map.types, config, reader)?;
                entries.insert(key, value);
                Ok(())
            })?;
            Ok(Value::Map(entries))
        }
        Schema::Record(record) => {
            let fields = record
                .fields
                .iter()
                .map(|field| Ok((field.name.clone(), decode(&field.schema, config, reader)?)))
                .collect::<AvroResult<Vec<_>>>()?;
            Ok(Value::Record(fields))
        }
    }
}

/// Advance `reader` past one value of the given schema without materializing it.
///
/// Blocks written with a byte size are skipped without looking at their items.
pub fn skip<R: Read>(schema: &Schema, config: &Config, reader: &mut R) -> AvroResult<()> {
    let max_len = config.max_byte_slice_size;
    let max_items = config.max_collection_items;
    match schema {
        Schema::Null => Ok(()),
        Schema::Boolean => skip_bytes(reader, 1),
        Schema::Int | Schema::Long | Schema::Enum(_) => zag_i64(reader).map(drop),
        Schema::Float => skip_bytes(reader, size_of::<f32>()),
        Schema::Double => skip_bytes(reader, size_of::<f64>()),
        Schema::Bytes | Schema::String => {
            let len = decode_len(reader, max_len)?;
            skip_bytes(reader, len)
        }
        Schema::Fixed(fixed) => skip_bytes(reader, fixed.size),
        Schema::Union(union) => {
            let index = zag_i64(reader)?;
            let variant = usize::try_from(index)
                .ok()
                .and_then(|i| union.variants().get(i))
                .ok_or(Details::GetUnionVariant {
                    index,
                    num_variants: union.variants().len(),
                })?;
            skip(variant, config, reader)
        }
        Schema::Array(array) => {
            skip_blocks(reader, max_len, max_items, |reader| {
                skip(&array.items, config, reader)
            })
        }
        Schema::Map(map) => skip_blocks(reader, max_len, max_items, |reader| {
            let len = decode_len(reader, max_len)?;
            skip_bytes(reader, len)?;
            skip(&map.types, config, reader)
        }),
        Schema::Record(record) => record
            .fields
            .iter()
            .try_for_each(|field| skip(&field.schema, config, reader)),
    }
}
