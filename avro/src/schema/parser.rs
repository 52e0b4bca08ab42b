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
    AvroResult, Error,
    error::Details,
    schema::{
        EnumSchema, FixedSchema, Name, RecordField, RecordSchema, Schema, UnionSchema,
        validate_name_part,
    },
};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

trait MapHelper {
    fn string(&self, key: &str) -> Option<String>;

    fn doc(&self) -> Option<String> {
        self.string("doc")
    }

    fn aliases(&self) -> Vec<String>;
}

impl MapHelper for Map<String, Value> {
    fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str()).map(|v| v.to_string())
    }

    fn aliases(&self) -> Vec<String> {
        self.get("aliases")
            .and_then(|aliases| aliases.as_array())
            .map(|aliases| {
                aliases
                    .iter()
                    .filter_map(|alias| alias.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Turns JSON schema documents into [`Schema`]s.
///
/// Named types are registered by full name once defined; later references by name are replaced
/// with a copy of the definition.
#[derive(Default)]
pub(crate) struct Parser {
    parsed_schemas: HashMap<String, Schema>,
}

impl Parser {
    pub(crate) fn parse(
        &mut self,
        value: &Value,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        match *value {
            Value::String(ref t) => self.parse_known_schema(t.as_str(), enclosing_namespace),
            Value::Object(ref data) => self.parse_complex(data, enclosing_namespace),
            Value::Array(ref data) => self.parse_union(data, enclosing_namespace),
            _ => Err(Details::ParseSchemaFromValidJson.into()),
        }
    }

    /// Parse a string as a primitive type or a reference to an already parsed named schema.
    fn parse_known_schema(
        &mut self,
        name: &str,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        match name {
            "null" => Ok(Schema::Null),
            "boolean" => Ok(Schema::Boolean),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "double" => Ok(Schema::Double),
            "float" => Ok(Schema::Float),
            "bytes" => Ok(Schema::Bytes),
            "string" => Ok(Schema::String),
            _ => self.fetch_schema_ref(name, enclosing_namespace),
        }
    }

    fn fetch_schema_ref(
        &self,
        name: &str,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let qualified = Name::with_enclosing_namespace(name, enclosing_namespace)
            .map_err(|_| Details::UnknownSchemaType(name.to_string()))?;
        self.parsed_schemas
            .get(&qualified.fullname())
            .or_else(|| self.parsed_schemas.get(name))
            .cloned()
            .ok_or_else(|| Details::UnknownSchemaType(name.to_string()).into())
    }

    fn parse_complex(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        match complex.get("type") {
            Some(Value::String(t)) => match t.as_str() {
                "record" => self.parse_record(complex, enclosing_namespace),
                "enum" => self.parse_enum(complex, enclosing_namespace),
                "array" => {
                    let items = complex.get("items").ok_or(Details::GetArrayItemsField)?;
                    Ok(Schema::array(self.parse(items, enclosing_namespace)?))
                }
                "map" => {
                    let values = complex.get("values").ok_or(Details::GetMapValuesField)?;
                    Ok(Schema::map(self.parse(values, enclosing_namespace)?))
                }
                "fixed" => self.parse_fixed(complex, enclosing_namespace),
                other => self.parse_known_schema(other, enclosing_namespace),
            },
            Some(nested @ (Value::Object(_) | Value::Array(_))) => {
                self.parse(nested, enclosing_namespace)
            }
            Some(other) => Err(Details::GetComplexType(other.clone()).into()),
            None => Err(Details::GetComplexTypeField.into()),
        }
    }

    fn register_parsed_schema(&mut self, name: &Name, schema: &Schema) -> AvroResult<()> {
        let fullname = name.fullname();
        if self
            .parsed_schemas
            .insert(fullname.clone(), schema.clone())
            .is_some()
        {
            return Err(Details::NameCollision(fullname).into());
        }
        Ok(())
    }

    fn parse_name(
        complex: &Map<String, Value>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Name> {
        let name = complex.string("name").ok_or(Details::GetNameField)?;
        let namespace = complex.string("namespace");
        Name::with_enclosing_namespace(&name, namespace.as_deref().or(enclosing_namespace))
    }

    fn parse_record(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let name = Self::parse_name(complex, enclosing_namespace)?;
        debug!("Going to parse record schema: {name}");

        let fields = complex
            .get("fields")
            .and_then(|fields| fields.as_array())
            .ok_or_else(|| Error::new(Details::GetRecordFieldsJson))?
            .iter()
            .filter_map(|field| field.as_object())
            .enumerate()
            .map(|(position, field)| self.parse_field(field, position, name.namespace.as_deref()))
            .collect::<AvroResult<Vec<_>>>()?;

        let mut record = RecordSchema::new(name.clone(), fields)?;
        record.doc = complex.doc();
        let schema = Schema::Record(record);
        self.register_parsed_schema(&name, &schema)?;
        Ok(schema)
    }

    fn parse_field(
        &mut self,
        field: &Map<String, Value>,
        position: usize,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<RecordField> {
        let name = field.string("name").ok_or(Details::GetNameFieldFromRecord)?;
        if validate_name_part(&name).is_err() {
            return Err(Details::FieldName(name).into());
        }
        let ty = field.get("type").ok_or(Details::GetComplexTypeField)?;
        Ok(RecordField {
            schema: self.parse(ty, enclosing_namespace)?,
            doc: field.doc(),
            aliases: field.aliases(),
            name,
            position,
        })
    }

    fn parse_enum(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let name = Self::parse_name(complex, enclosing_namespace)?;
        let symbols: Vec<String> = complex
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::from(Details::GetEnumSymbolsField))?
            .iter()
            .map(|symbol| symbol.as_str().map(|s| s.to_string()))
            .collect::<Option<_>>()
            .ok_or_else(|| Error::from(Details::GetEnumSymbols))?;

        let mut existing_symbols = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            if validate_name_part(symbol).is_err() {
                return Err(Details::EnumSymbolName(symbol.clone()).into());
            }
            if !existing_symbols.insert(symbol) {
                return Err(Details::EnumSymbolDuplicate(symbol.clone()).into());
            }
        }

        let schema = Schema::Enum(EnumSchema {
            name: name.clone(),
            doc: complex.doc(),
            symbols,
        });
        self.register_parsed_schema(&name, &schema)?;
        Ok(schema)
    }

    fn parse_union(
        &mut self,
        items: &[Value],
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let schemas = items
            .iter()
            .map(|v| self.parse(v, enclosing_namespace))
            .collect::<AvroResult<Vec<_>>>()?;
        if schemas.len() == 1 {
            warn!("Union schema with just one member! Consider dropping the union!");
        }
        Ok(Schema::Union(UnionSchema::new(schemas)?))
    }

    fn parse_fixed(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let size = match complex.get("size") {
            Some(size) => size
                .as_u64()
                .filter(|&size| size > 0)
                .ok_or_else(|| Details::GetFixedSizeFieldPositive(size.clone())),
            None => Err(Details::GetFixedSizeField),
        }?;
        let name = Self::parse_name(complex, enclosing_namespace)?;

        let schema = Schema::Fixed(FixedSchema {
            name: name.clone(),
            doc: complex.doc(),
            size: size as usize,
        });
        self.register_parsed_schema(&name, &schema)?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_type_objects_are_unwrapped() -> TestResult {
        let schema = Parser::default().parse(
            &json!({"type": {"type": "array", "items": "string"}}),
            None,
        )?;
        assert_eq!(schema, Schema::array(Schema::String));
        Ok(())
    }

    #[test]
    fn references_use_the_enclosing_namespace() -> TestResult {
        let schema = Parser::default().parse(
            &json!({
                "type": "record",
                "name": "Outer",
                "namespace": "a.b",
                "fields": [
                    {"name": "x", "type": {"type": "enum", "name": "Color", "symbols": ["RED"]}},
                    {"name": "y", "type": "Color"},
                    {"name": "z", "type": "a.b.Color"}
                ]
            }),
            None,
        )?;
        let Schema::Record(record) = schema else {
            panic!("expected a record");
        };
        assert_eq!(record.fields[1].schema, record.fields[0].schema);
        assert_eq!(record.fields[2].schema, record.fields[0].schema);
        Ok(())
    }

    #[test]
    fn redefinition_is_a_name_collision() {
        let err = Parser::default()
            .parse(
                &json!([
                    {"type": "fixed", "name": "F", "size": 2},
                    {"type": "fixed", "name": "F", "size": 3}
                ]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err.details(), Details::NameCollision(name) if name == "F"));
    }

    #[test]
    fn field_errors() {
        let err = Parser::default()
            .parse(
                &json!({"type": "record", "name": "R", "fields": [
                    {"name": "a", "type": "int"},
                    {"name": "a", "type": "long"}
                ]}),
                None,
            )
            .unwrap_err();
        assert!(matches!(err.details(), Details::FieldNameDuplicate(name) if name == "a"));

        let err = Parser::default()
            .parse(&json!({"type": "record", "name": "R"}), None)
            .unwrap_err();
        assert!(matches!(err.details(), Details::GetRecordFieldsJson));

        let err = Parser::default()
            .parse(&json!({"type": "enum", "name": "E", "symbols": ["ok", "not ok"]}), None)
            .unwrap_err();
        assert!(matches!(err.details(), Details::EnumSymbolName(s) if s == "not ok"));
    }

    #[test]
    fn recursive_references_are_unknown() {
        let err = Parser::default()
            .parse(
                &json!({"type": "record", "name": "Node", "fields": [
                    {"name": "next", "type": ["null", "Node"]}
                ]}),
                None,
            )
            .unwrap_err();
        assert!(matches!(err.details(), Details::UnknownSchemaType(name) if name == "Node"));
    }
}
