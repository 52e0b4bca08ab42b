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

//! The in-memory schema model and its JSON form.
//!
//! Schemas are parsed from their JSON text with [`Schema::parse_str`] and can be written back
//! with [`Schema::canonical_form`]. Named types (records, enums and fixed) that are referenced by
//! name after their definition are inlined, so a parsed schema is a plain tree.

mod parser;

use crate::{AvroResult, error::Details};
use log::debug;
use regex_lite::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue, json};
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
    sync::LazyLock,
};
use strum_macros::{Display, EnumDiscriminants};

/// Represents documentation for complex Avro schemas.
pub type Documentation = Option<String>;

/// Represents any valid Avro schema
/// More information about Avro schemas can be found in the
/// [Avro Specification](https://avro.apache.org/docs/++version++/specification/#schema-declaration)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(SchemaKind), derive(Hash, Ord, PartialOrd, Display))]
pub enum Schema {
    /// A `null` Avro schema.
    Null,
    /// A `boolean` Avro schema.
    Boolean,
    /// An `int` Avro schema.
    Int,
    /// A `long` Avro schema.
    Long,
    /// A `float` Avro schema.
    Float,
    /// A `double` Avro schema.
    Double,
    /// A `bytes` Avro schema.
    Bytes,
    /// A `string` Avro schema.
    String,
    /// An `array` Avro schema. All items have the same schema.
    Array(ArraySchema),
    /// A `map` Avro schema. Keys are always strings, all values have the same schema.
    Map(MapSchema),
    /// A `union` Avro schema.
    Union(UnionSchema),
    /// A `record` Avro schema.
    Record(RecordSchema),
    /// An `enum` Avro schema.
    Enum(EnumSchema),
    /// A `fixed` Avro schema.
    Fixed(FixedSchema),
}

static SCHEMA_NAME_R: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static NAMESPACE_R: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?$").unwrap()
});

pub(crate) fn validate_name_part(name: &str) -> AvroResult<()> {
    if SCHEMA_NAME_R.is_match(name) {
        Ok(())
    } else {
        Err(Details::InvalidSchemaName(name.to_string(), SCHEMA_NAME_R.as_str()).into())
    }
}

pub(crate) fn validate_namespace(namespace: &str) -> AvroResult<()> {
    if NAMESPACE_R.is_match(namespace) {
        Ok(())
    } else {
        Err(Details::InvalidNamespace(namespace.to_string(), NAMESPACE_R.as_str()).into())
    }
}

/// The name of a `record`, `enum` or `fixed` schema.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Name {
    pub name: String,
    pub namespace: Option<String>,
}

impl Name {
    /// Create a `Name`, splitting a dotted full name into namespace and name.
    pub fn new(name: &str) -> AvroResult<Self> {
        Self::with_enclosing_namespace(name, None)
    }

    /// Create a `Name`, taking the namespace from `enclosing_namespace` when `name` has none.
    pub fn with_enclosing_namespace(
        name: &str,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Self> {
        let (namespace, name) = match name.rsplit_once('.') {
            Some(("", name)) => (None, name),
            Some((namespace, name)) => (Some(namespace), name),
            None => (enclosing_namespace.filter(|ns| !ns.is_empty()), name),
        };
        validate_name_part(name)?;
        if let Some(namespace) = namespace {
            validate_namespace(namespace)?;
        }
        Ok(Self {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        })
    }

    /// The name qualified with its namespace, if any.
    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}

/// A description of an Array schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ArraySchema {
    pub items: Box<Schema>,
}

/// A description of a Map schema.
#[derive(Clone, Debug, PartialEq)]
pub struct MapSchema {
    pub types: Box<Schema>,
}

/// A description of a Union schema.
#[derive(Clone, Debug)]
pub struct UnionSchema {
    schemas: Vec<Schema>,
    // Index of the first variant of every unnamed kind.
    variant_index: BTreeMap<SchemaKind, usize>,
}

impl UnionSchema {
    /// Creates a new `UnionSchema` from its variants.
    ///
    /// # Errors
    /// Will return an error if `schemas` is empty, directly contains a union, repeats an unnamed
    /// kind or repeats a name.
    pub fn new(schemas: Vec<Schema>) -> AvroResult<Self> {
        if schemas.is_empty() {
            return Err(Details::EmptyUnion.into());
        }
        let mut variant_index = BTreeMap::new();
        let mut names = HashSet::new();
        for (i, schema) in schemas.iter().enumerate() {
            match schema.name() {
                _ if matches!(schema, Schema::Union(_)) => {
                    return Err(Details::GetNestedUnion.into());
                }
                Some(name) => {
                    if !names.insert(name.fullname()) {
                        return Err(Details::GetUnionDuplicate.into());
                    }
                }
                None => {
                    if variant_index.insert(schema.kind(), i).is_some() {
                        return Err(Details::GetUnionDuplicate.into());
                    }
                }
            }
        }
        Ok(UnionSchema {
            schemas,
            variant_index,
        })
    }

    /// Returns a slice to all variants of this schema.
    pub fn variants(&self) -> &[Schema] {
        &self.schemas
    }

    /// Returns true if any of the variants of this `UnionSchema` is `Null`.
    pub fn is_nullable(&self) -> bool {
        self.variant_index.contains_key(&SchemaKind::Null)
    }

    /// The position of the first variant of the given kind.
    pub fn index_of_kind(&self, kind: SchemaKind) -> Option<usize> {
        self.variant_index
            .get(&kind)
            .copied()
            .or_else(|| self.schemas.iter().position(|s| s.kind() == kind))
    }

    /// The position of the named variant whose simple or full name is `name`.
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.schemas.iter().position(|s| {
            s.name()
                .is_some_and(|n| n.name == name || n.fullname() == name)
        })
    }

    /// Pick the first variant accepted by `fits`. Unless `strict`, fall back to the first variant
    /// accepted by `promotes`.
    pub(crate) fn select_variant(
        &self,
        strict: bool,
        value_type: &str,
        fits: impl Fn(&Schema) -> bool,
        promotes: impl Fn(&Schema) -> bool,
    ) -> AvroResult<(usize, &Schema)> {
        if let Some(index) = self.schemas.iter().position(&fits) {
            return Ok((index, &self.schemas[index]));
        }
        if !strict && let Some(index) = self.schemas.iter().position(&promotes) {
            debug!(
                "Promoting {value_type} to union variant {index} ({})",
                self.schemas[index].kind()
            );
            return Ok((index, &self.schemas[index]));
        }
        Err(Details::UnionResolution {
            value_type: value_type.to_string(),
        }
        .into())
    }
}

impl PartialEq for UnionSchema {
    fn eq(&self, other: &UnionSchema) -> bool {
        self.schemas.eq(&other.schemas)
    }
}

/// A field of a `record` schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub doc: Documentation,
    pub aliases: Vec<String>,
    pub schema: Schema,
    /// Position of the field in the record.
    pub position: usize,
}

/// A description of a Record schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordSchema {
    pub name: Name,
    pub doc: Documentation,
    pub fields: Vec<RecordField>,
    /// Field names and aliases mapped to the field's position.
    pub lookup: BTreeMap<String, usize>,
}

impl RecordSchema {
    /// Build a record schema, indexing its fields by name and alias.
    pub fn new(name: Name, fields: Vec<RecordField>) -> AvroResult<Self> {
        let mut lookup = BTreeMap::new();
        let mut fields = fields;
        for (position, field) in fields.iter_mut().enumerate() {
            field.position = position;
            if lookup.insert(field.name.clone(), position).is_some() {
                return Err(Details::FieldNameDuplicate(field.name.clone()).into());
            }
            for alias in &field.aliases {
                lookup.entry(alias.clone()).or_insert(position);
            }
        }
        Ok(RecordSchema {
            name,
            doc: None,
            fields,
            lookup,
        })
    }

    /// Look up a field by name or alias.
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.lookup.get(name).map(|&position| &self.fields[position])
    }
}

/// A description of an Enum schema.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumSchema {
    pub name: Name,
    pub doc: Documentation,
    pub symbols: Vec<String>,
}

impl EnumSchema {
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}

/// A description of a Fixed schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedSchema {
    pub name: Name,
    pub doc: Documentation,
    pub size: usize,
}

impl Schema {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub fn parse_str(input: &str) -> AvroResult<Schema> {
        let value = serde_json::from_str(input).map_err(Details::ParseSchemaJson)?;
        Self::parse(&value)
    }

    /// Create a `Schema` from an already parsed JSON document.
    pub fn parse(value: &JsonValue) -> AvroResult<Schema> {
        parser::Parser::default().parse(value, None)
    }

    /// Returns a `Schema::Map` with the given values type.
    pub fn map(types: Schema) -> Self {
        Schema::Map(MapSchema {
            types: Box::new(types),
        })
    }

    /// Returns a `Schema::Array` with the given items type.
    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            items: Box::new(items),
        })
    }

    pub fn kind(&self) -> SchemaKind {
        SchemaKind::from(self)
    }

    /// The name of a named schema, `None` for every other kind.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. }) => Some(name),
            _ => None,
        }
    }

    pub fn is_named(&self) -> bool {
        self.name().is_some()
    }

    /// The JSON text of this schema, as stored in a container file header.
    pub fn canonical_form(&self) -> String {
        self.to_json(&mut HashSet::new()).to_string()
    }

    fn to_json(&self, defined: &mut HashSet<String>) -> JsonValue {
        let primitive = |name: &str| JsonValue::String(name.to_string());
        match self {
            Schema::Null => primitive("null"),
            Schema::Boolean => primitive("boolean"),
            Schema::Int => primitive("int"),
            Schema::Long => primitive("long"),
            Schema::Float => primitive("float"),
            Schema::Double => primitive("double"),
            Schema::Bytes => primitive("bytes"),
            Schema::String => primitive("string"),
            Schema::Array(array) => json!({"type": "array", "items": array.items.to_json(defined)}),
            Schema::Map(map) => json!({"type": "map", "values": map.types.to_json(defined)}),
            Schema::Union(union) => JsonValue::Array(
                union.variants().iter().map(|s| s.to_json(defined)).collect(),
            ),
            Schema::Record(_) | Schema::Enum(_) | Schema::Fixed(_) => {
                self.named_to_json(defined)
            }
        }
    }

    fn named_to_json(&self, defined: &mut HashSet<String>) -> JsonValue {
        let Some(name) = self.name() else {
            return JsonValue::Null;
        };
        let fullname = name.fullname();
        if !defined.insert(fullname.clone()) {
            return JsonValue::String(fullname);
        }

        let mut object = Map::new();
        let (kind, doc) = match self {
            Schema::Record(record) => ("record", &record.doc),
            Schema::Enum(enum_schema) => ("enum", &enum_schema.doc),
            Schema::Fixed(fixed) => ("fixed", &fixed.doc),
            _ => unreachable!("only named schemas reach here"),
        };
        object.insert("type".into(), kind.into());
        object.insert("name".into(), name.name.clone().into());
        if let Some(namespace) = &name.namespace {
            object.insert("namespace".into(), namespace.clone().into());
        }
        if let Some(doc) = doc {
            object.insert("doc".into(), doc.clone().into());
        }
        match self {
            Schema::Record(record) => {
                let fields = record
                    .fields
                    .iter()
                    .map(|field| {
                        let mut f = Map::new();
                        f.insert("name".into(), field.name.clone().into());
                        f.insert("type".into(), field.schema.to_json(defined));
                        if !field.aliases.is_empty() {
                            f.insert("aliases".into(), field.aliases.clone().into());
                        }
                        JsonValue::Object(f)
                    })
                    .collect();
                object.insert("fields".into(), JsonValue::Array(fields));
            }
            Schema::Enum(enum_schema) => {
                object.insert("symbols".into(), enum_schema.symbols.clone().into());
            }
            Schema::Fixed(fixed) => {
                object.insert("size".into(), fixed.size.into());
            }
            _ => {}
        }
        JsonValue::Object(object)
    }
}

impl FromStr for Schema {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schema::parse_str(s)
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json(&mut HashSet::new()).serialize(serializer)
    }
}
