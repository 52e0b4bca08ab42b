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
    block::write_blocks,
    error::Details,
    schema::Schema,
    types::{Value, ValueKind, record_field_value},
    util::{zig_i32, zig_i64},
};
use log::error;
use std::io::Write;

/// Encode a `Value` into avro format.
///
/// The value is validated against the schema first, so a rejected value never reaches `writer`.
/// Maps and arrays are written in blocks of at most `config.block_length` items.
pub fn encode<W: Write>(
    value: &Value,
    schema: &Schema,
    config: &Config,
    writer: &mut W,
) -> AvroResult<usize> {
    value.validate_with_config(schema, config)?;
    encode_internal(value, schema, config, writer)
}

/// Encode a `Value` into a new buffer.
pub fn encode_to_vec(value: &Value, schema: &Schema, config: &Config) -> AvroResult<Vec<u8>> {
    let mut buffer = Vec::new();
    encode(value, schema, config, &mut buffer)?;
    Ok(buffer)
}

pub(crate) fn encode_bytes<B: AsRef<[u8]> + ?Sized, W: Write>(
    s: &B,
    mut writer: W,
) -> AvroResult<usize> {
    let bytes = s.as_ref();
    let len = i64::try_from(bytes.len()).map_err(|e| Details::ConvertUsizeToI64(e, bytes.len()))?;
    let header = encode_long(len, &mut writer)?;
    write_raw(bytes, writer).map(|n| n + header)
}

pub(crate) fn encode_long<W: Write>(i: i64, writer: W) -> AvroResult<usize> {
    zig_i64(i, writer)
}

pub(crate) fn encode_int<W: Write>(i: i32, writer: W) -> AvroResult<usize> {
    zig_i32(i, writer)
}

pub(crate) fn write_raw<W: Write>(bytes: &[u8], mut writer: W) -> AvroResult<usize> {
    writer.write_all(bytes).map_err(Details::WriteBytes)?;
    Ok(bytes.len())
}

/// Encode without validating first.
///
/// A value that does not fit the schema fails once it is reached, possibly after part of it has
/// been written.
pub(crate) fn encode_internal<W: Write>(
    value: &Value,
    schema: &Schema,
    config: &Config,
    writer: &mut W,
) -> AvroResult<usize> {
    match (schema, value) {
        (Schema::Null, Value::Null) => Ok(0),
        (Schema::Boolean, Value::Boolean(b)) => write_raw(&[u8::from(*b)], writer),
        (Schema::Int, Value::Int(i)) => encode_int(*i, writer),
        (Schema::Long, Value::Int(i)) => encode_long(i64::from(*i), writer),
        (Schema::Long, Value::Long(i)) => encode_long(*i, writer),
        (Schema::Float, Value::Float(x)) => write_raw(&x.to_le_bytes(), writer),
        (Schema::Double, Value::Float(x)) => write_raw(&f64::from(*x).to_le_bytes(), writer),
        (Schema::Double, Value::Double(x)) => write_raw(&x.to_le_bytes(), writer),
        // Promotions, reachable through a union variant
        (Schema::Float, Value::Int(i)) => write_raw(&(*i as f32).to_le_bytes(), writer),
        (Schema::Float, Value::Long(i)) => write_raw(&(*i as f32).to_le_bytes(), writer),
        (Schema::Double, Value::Int(i)) => write_raw(&f64::from(*i).to_le_bytes(), writer),
        (Schema::Double, Value::Long(i)) => write_raw(&(*i as f64).to_le_bytes(), writer),
        (Schema::Bytes | Schema::String, Value::Bytes(bytes)) => encode_bytes(bytes, writer),
        (Schema::String | Schema::Bytes, Value::String(s)) => encode_bytes(s, writer),
        (Schema::Fixed(fixed), Value::Fixed(_, bytes) | Value::Bytes(bytes)) => {
            if bytes.len() != fixed.size {
                return Err(Details::FixedSizeMismatch {
                    size: fixed.size,
                    n: bytes.len(),
                }
                .into());
            }
            write_raw(bytes, writer)
        }
        (Schema::Enum(_), Value::Enum(i, _)) => encode_int(*i as i32, writer),
        (Schema::Enum(enum_schema), Value::String(s)) => match enum_schema.index_of(s) {
            Some(index) => encode_int(index as i32, writer),
            None => {
                error!("Invalid symbol string {s:?}.");
                Err(Details::GetEnumSymbol(s.clone()).into())
            }
        },
        (Schema::Union(union), Value::Union(idx, item)) => {
            let inner = union.variants().get(*idx as usize).ok_or(
                Details::GetUnionVariant {
                    index: i64::from(*idx),
                    num_variants: union.variants().len(),
                },
            )?;
            let header = encode_long(i64::from(*idx), &mut *writer)?;
            Ok(header + encode_internal(item, inner, config, writer)?)
        }
        (Schema::Union(union), _) => {
            let (idx, inner) = value.find_union_variant(union, config).inspect_err(|_| {
                error!("No union variant accepts a {} value", ValueKind::from(value));
            })?;
            let header = encode_long(idx as i64, &mut *writer)?;
            Ok(header + encode_internal(value, inner, config, writer)?)
        }
        (Schema::Array(array), Value::Array(items)) => {
            write_blocks(writer, config.block_length, items, |item, buffer| {
                encode_internal(item, &array.items, config, buffer).map(drop)
            })
        }
        (Schema::Map(map), Value::Map(entries)) => {
            write_blocks(writer, config.block_length, entries, |(key, value), buffer| {
                encode_bytes(key, &mut *buffer)?;
                encode_internal(value, &map.types, config, buffer).map(drop)
            })
        }
        (Schema::Record(record), Value::Record(fields)) => {
            let mut written = 0;
            for field in &record.fields {
                let value = record_field_value(fields, &field.name, &field.aliases)
                    .ok_or_else(|| Details::GetField(field.name.clone()))?;
                written += encode_internal(value, &field.schema, config, writer)?;
            }
            Ok(written)
        }
        _ => {
            error!("invalid schema type for {} value: {schema:?}", ValueKind::from(value));
            Err(Details::TypeMismatch {
                value_type: ValueKind::from(value).to_string(),
                schema: schema.kind(),
            }
            .into())
        }
    }
}
