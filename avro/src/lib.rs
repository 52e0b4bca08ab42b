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

//! **avrokit** reads and writes the binary encoding of [Apache Avro](https://avro.apache.org/).
//!
//! The crate is built around a small core:
//!
//! - [`util`]: zigzag variable-length integers, the encoding of every `int` and `long`.
//! - [`block`]: maps and arrays written as size-prefixed blocks of at most
//!   [`Config::block_length`] items, closed by an empty block.
//! - [`Codec`]: the `null`, `deflate` and `snappy` block compressions of the container format.
//! - [`config`]: an immutable [`FrozenConfig`] snapshot and a replaceable process-wide default.
//!
//! Around it sit a [`Schema`] model with a JSON parser, the dynamic [`Value`](types::Value) type,
//! a schema-aware [`serde`] serializer, explicit [`FieldTable`]s for mapping structs onto records,
//! the single-datum [`Encoder`] and [`Decoder`], and the container file [`Writer`] and [`Reader`].
//!
//! ```
//! use avrokit::{Decoder, Encoder, Error, Schema};
//! use std::collections::HashMap;
//!
//! let schema = Schema::parse_str(r#"{"type": "map", "values": "string"}"#)?;
//! let mut encoder = Encoder::new(&schema, Vec::new());
//! encoder.encode(&HashMap::from([("foo", "foo")]))?;
//! let bytes = encoder.into_inner();
//! assert_eq!(bytes, [0x01, 0x10, 0x06, b'f', b'o', b'o', 0x06, b'f', b'o', b'o', 0x00]);
//!
//! let mut decoder = Decoder::new(&schema, bytes.as_slice());
//! let map: HashMap<String, String> = decoder.decode()?;
//! assert_eq!(map["foo"], "foo");
//! # Ok::<(), Error>(())
//! ```
//!
//! # MSRV
//!
//! The current MSRV is 1.88.0.

pub mod block;
mod codec;
pub mod config;
mod datum;
pub mod decode;
pub mod encode;
pub mod error;
mod fields;
mod reader;
pub mod schema;
pub mod serde;
pub mod types;
pub mod util;
mod writer;

pub use codec::{Codec, DeflateSettings};
pub use config::{Config, FrozenConfig};
pub use datum::{Decoder, Encoder, from_avro_datum, to_avro_datum};
pub use error::{Details, Error};
pub use fields::{AvroRecord, BoundRecord, FieldTable, FieldTableBuilder};
pub use reader::Reader;
pub use schema::Schema;
pub use crate::serde::{from_value, validate};
pub use writer::Writer;

/// A convenience type alias for `Result`s with `Error`s.
pub type AvroResult<T> = Result<T, Error>;
