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

//! Choosing the union variant a native value is written as.

use crate::{
    AvroResult,
    encode::{encode_bytes, encode_int, encode_long, write_raw},
    error::Details,
    schema::{Schema, SchemaKind, UnionSchema},
};
use std::io::Write;

/// A primitive native value on its way to the writer.
#[derive(Clone, Copy, Debug)]
pub(super) enum Scalar<'a> {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
}

impl Scalar<'_> {
    pub(super) fn type_name(&self) -> &'static str {
        match self {
            Scalar::Boolean(_) => "bool",
            Scalar::Int(_) => "i32",
            Scalar::Long(_) => "i64",
            Scalar::Float(_) => "f32",
            Scalar::Double(_) => "f64",
            Scalar::Str(_) => "str",
            Scalar::Bytes(_) => "bytes",
        }
    }

    fn own_kind(&self) -> SchemaKind {
        match self {
            Scalar::Boolean(_) => SchemaKind::Boolean,
            Scalar::Int(_) => SchemaKind::Int,
            Scalar::Long(_) => SchemaKind::Long,
            Scalar::Float(_) => SchemaKind::Float,
            Scalar::Double(_) => SchemaKind::Double,
            Scalar::Str(_) => SchemaKind::String,
            Scalar::Bytes(_) => SchemaKind::Bytes,
        }
    }

    /// Whether the value can be written as `schema` as is, or widened without loss.
    pub(super) fn fits(&self, schema: &Schema) -> bool {
        match (self, schema) {
            (Scalar::Boolean(_), Schema::Boolean)
            | (Scalar::Int(_), Schema::Int | Schema::Long)
            | (Scalar::Long(_), Schema::Long)
            | (Scalar::Float(_), Schema::Float | Schema::Double)
            | (Scalar::Double(_), Schema::Double)
            | (Scalar::Str(_), Schema::String)
            | (Scalar::Bytes(_), Schema::Bytes) => true,
            (Scalar::Str(symbol), Schema::Enum(enum_schema)) => {
                enum_schema.index_of(symbol).is_some()
            }
            (Scalar::Bytes(bytes), Schema::Fixed(fixed)) => fixed.size == bytes.len(),
            _ => false,
        }
    }

    /// Whether the value can be written as `schema` through an Avro type promotion.
    fn promotes_to(&self, schema: &Schema) -> bool {
        matches!(
            (self, schema),
            (Scalar::Int(_) | Scalar::Long(_), Schema::Float | Schema::Double)
                | (Scalar::Str(_), Schema::Bytes)
                | (Scalar::Bytes(_), Schema::String)
        )
    }

    pub(super) fn write<W: Write>(self, schema: &Schema, writer: &mut W) -> AvroResult<usize> {
        match (self, schema) {
            (Scalar::Boolean(b), Schema::Boolean) => write_raw(&[u8::from(b)], writer),
            (Scalar::Int(i), Schema::Int) => encode_int(i, writer),
            (Scalar::Int(i), Schema::Long) => encode_long(i64::from(i), writer),
            (Scalar::Int(i), Schema::Float) => write_raw(&(i as f32).to_le_bytes(), writer),
            (Scalar::Int(i), Schema::Double) => write_raw(&f64::from(i).to_le_bytes(), writer),
            (Scalar::Long(i), Schema::Long) => encode_long(i, writer),
            (Scalar::Long(i), Schema::Float) => write_raw(&(i as f32).to_le_bytes(), writer),
            (Scalar::Long(i), Schema::Double) => write_raw(&(i as f64).to_le_bytes(), writer),
            (Scalar::Float(x), Schema::Float) => write_raw(&x.to_le_bytes(), writer),
            (Scalar::Float(x), Schema::Double) => write_raw(&f64::from(x).to_le_bytes(), writer),
            (Scalar::Double(x), Schema::Double) => write_raw(&x.to_le_bytes(), writer),
            (Scalar::Str(s), Schema::String | Schema::Bytes) => encode_bytes(s, writer),
            (Scalar::Str(s), Schema::Enum(enum_schema)) => match enum_schema.index_of(s) {
                Some(index) => encode_int(index as i32, writer),
                None => Err(Details::GetEnumSymbol(s.to_string()).into()),
            },
            (Scalar::Bytes(b), Schema::Bytes | Schema::String) => encode_bytes(b, writer),
            (Scalar::Bytes(b), Schema::Fixed(fixed)) => {
                if fixed.size != b.len() {
                    return Err(Details::FixedSizeMismatch {
                        size: fixed.size,
                        n: b.len(),
                    }
                    .into());
                }
                write_raw(b, writer)
            }
            _ => Err(Details::TypeMismatch {
                value_type: self.type_name().to_string(),
                schema: schema.kind(),
            }
            .into()),
        }
    }

    /// The variant of `union` this value is written as.
    pub(super) fn select_variant<'s>(
        &self,
        union: &'s UnionSchema,
        strict: bool,
    ) -> AvroResult<(usize, &'s Schema)> {
        let variants = union.variants();
        if let Some(index) = union
            .index_of_kind(self.own_kind())
            .filter(|&i| self.fits(&variants[i]))
        {
            return Ok((index, &variants[index]));
        }
        union.select_variant(
            strict,
            self.type_name(),
            |s| self.fits(s),
            |s| self.promotes_to(s),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;

    fn union(text: &str) -> UnionSchema {
        match Schema::parse_str(text) {
            Ok(Schema::Union(union)) => union,
            other => panic!("expected a union, got {other:?}"),
        }
    }

    #[test]
    fn exact_kind_wins_over_widening() -> TestResult {
        let u = union(r#"["long", "int"]"#);
        assert_eq!(Scalar::Int(1).select_variant(&u, true)?.0, 1);
        assert_eq!(Scalar::Long(1).select_variant(&u, true)?.0, 0);
        Ok(())
    }

    #[test]
    fn widening_is_allowed_in_strict_mode() -> TestResult {
        let u = union(r#"["null", "double"]"#);
        assert_eq!(Scalar::Float(1.0).select_variant(&u, true)?.0, 1);
        Ok(())
    }

    #[test]
    fn promotion_only_when_lenient() -> TestResult {
        let u = union(r#"["null", "bytes", "float"]"#);
        assert_eq!(Scalar::Str("x").select_variant(&u, false)?.0, 1);
        assert_eq!(Scalar::Long(3).select_variant(&u, false)?.0, 2);

        let err = Scalar::Str("x").select_variant(&u, true).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::UnionResolution { value_type } if value_type == "str"
        ));
        Ok(())
    }

    #[test]
    fn strings_select_enums_by_symbol() -> TestResult {
        let u = union(
            r#"[{"type": "enum", "name": "A", "symbols": ["X"]},
                {"type": "enum", "name": "B", "symbols": ["Y"]}]"#,
        );
        assert_eq!(Scalar::Str("Y").select_variant(&u, true)?.0, 1);
        Ok(())
    }

    #[test]
    fn promoted_writes() -> TestResult {
        let mut out = Vec::new();
        Scalar::Long(2).write(&Schema::Double, &mut out)?;
        assert_eq!(out, 2.0f64.to_le_bytes());

        out.clear();
        Scalar::Bytes(b"hi").write(&Schema::String, &mut out)?;
        assert_eq!(out, [4, b'h', b'i']);
        Ok(())
    }
}
