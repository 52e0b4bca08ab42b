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

//! Everything needed to use this crate with Serde.
//!
//! Avro is a schema-based format: a native value is only meaningful together with the schema it
//! is written with. [`SchemaAwareSerializer`] walks a `Serialize` value and the schema side by
//! side and writes the Avro binary form directly, without building an intermediate [`Value`].
//! Reading goes the other way: decode a [`Value`] and convert it with [`from_value`].
//!
//! ```
//! # use serde::{Deserialize, Serialize};
//! # use avrokit::{Config, Error, Schema, from_avro_datum, serde::from_value};
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Foo {
//!     a: i64,
//!     b: String,
//! }
//!
//! let schema = Schema::parse_str(
//!     r#"{"type": "record", "name": "Foo", "fields": [
//!         {"name": "a", "type": "long"},
//!         {"name": "b", "type": "string"}
//!     ]}"#,
//! )?;
//! let foo = Foo { a: 42, b: "Hello".to_string() };
//!
//! let mut bytes = Vec::new();
//! avrokit::serde::validate(&foo, &schema, &Config::default())?;
//! avrokit::Encoder::new(&schema, &mut bytes).encode(&foo)?;
//!
//! let value = from_avro_datum(&schema, &mut bytes.as_slice())?;
//! assert_eq!(from_value::<Foo>(value)?, foo);
//! # Ok::<(), Error>(())
//! ```
//!
//! [`Value`]: crate::types::Value

mod de;
pub mod ser_schema;

pub use de::{ValueDeserializer, from_value};
pub use ser_schema::SchemaAwareSerializer;

use crate::{AvroResult, Config, Schema};
use serde::Serialize;

/// Check that `value` can be written with `schema` without producing any output.
pub fn validate<T: Serialize + ?Sized>(value: &T, schema: &Schema, config: &Config) -> AvroResult<()> {
    let mut sink = std::io::sink();
    value.serialize(SchemaAwareSerializer::new(&mut sink, schema, config))?;
    Ok(())
}
