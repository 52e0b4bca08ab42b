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

//! Logic handling reading from Avro object container files.
use crate::{
    AvroResult, Codec,
    config::{FrozenConfig, default_config},
    decode::{decode, decode_len},
    error::Details,
    schema::Schema,
    types::Value,
    util::zag_i64,
    writer::{AVRO_OBJECT_HEADER, CODEC_KEY, SCHEMA_KEY},
};
use log::warn;
use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Read},
};

/// Main interface for reading Avro object container files.
///
/// The schema, codec and sync marker are read from the header when the reader is created. The
/// reader is an iterator over the values of the file; it stops after the first error.
///
/// ```
/// # use avrokit::{Codec, Error, Reader, Schema, Writer, types::Value};
/// let schema = Schema::parse_str(r#"{"type": "map", "values": "long"}"#)?;
/// let mut writer = Writer::with_codec(&schema, Vec::new(), Codec::Snappy)?;
/// writer.append_value(Value::Map([("a".to_string(), Value::Long(1))].into()))?;
/// let data = writer.into_inner()?;
///
/// let reader = Reader::new(data.as_slice())?;
/// assert_eq!(reader.codec(), Codec::Snappy);
/// for value in reader {
///     assert_eq!(value?, Value::Map([("a".to_string(), Value::Long(1))].into()));
/// }
/// # Ok::<(), Error>(())
/// ```
pub struct Reader<R: Read> {
    reader: BufReader<R>,
    config: FrozenConfig,
    writer_schema: Schema,
    codec: Codec,
    marker: [u8; 16],
    user_metadata: HashMap<String, Vec<u8>>,
    /// Decompressed contents of the current block.
    buf: Vec<u8>,
    buf_idx: usize,
    /// Number of values left in the current block.
    message_count: usize,
    errored: bool,
}

impl<R: Read> Reader<R> {
    /// Creates a `Reader` given something implementing the `io::Read` trait to read from, using
    /// the process-wide default configuration.
    pub fn new(reader: R) -> AvroResult<Self> {
        Self::with_config(reader, default_config())
    }

    pub fn with_config(reader: R, config: FrozenConfig) -> AvroResult<Self> {
        let mut reader = Reader {
            reader: BufReader::new(reader),
            config,
            writer_schema: Schema::Null,
            codec: Codec::Null,
            marker: [0; 16],
            user_metadata: HashMap::new(),
            buf: Vec::new(),
            buf_idx: 0,
            message_count: 0,
            errored: false,
        };
        reader.read_header()?;
        Ok(reader)
    }

    /// The schema the file was written with.
    pub fn writer_schema(&self) -> &Schema {
        &self.writer_schema
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Metadata stored in the header that is not reserved by the container format.
    pub fn user_metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.user_metadata
    }

    /// Try to read the header and to set the writer `Schema`, the `Codec` and the marker based on
    /// its content.
    fn read_header(&mut self) -> AvroResult<()> {
        let mut buf = [0u8; 4];
        self.reader
            .read_exact(&mut buf)
            .map_err(Details::ReadHeader)?;

        if buf != AVRO_OBJECT_HEADER {
            return Err(Details::HeaderMagic.into());
        }

        let meta_schema = Schema::map(Schema::Bytes);
        let Value::Map(metadata) = decode(&meta_schema, &self.config, &mut self.reader)? else {
            return Err(Details::GetHeaderMetadata.into());
        };

        let mut writer_schema = None;
        for (key, value) in metadata {
            let Value::Bytes(bytes) = value else {
                return Err(Details::GetHeaderMetadata.into());
            };
            match key.as_str() {
                SCHEMA_KEY => {
                    let json: serde_json::Value = serde_json::from_slice(&bytes)
                        .map_err(|_| Details::GetAvroSchemaFromMap)?;
                    writer_schema = Some(Schema::parse(&json)?);
                }
                CODEC_KEY => {
                    let name = String::from_utf8(bytes).map_err(Details::ConvertToUtf8)?;
                    self.codec = Codec::resolve(&name)?;
                }
                _ if key.starts_with("avro.") => warn!("Ignoring unknown metadata key: {key}"),
                _ => {
                    self.user_metadata.insert(key, bytes);
                }
            }
        }
        self.writer_schema = writer_schema.ok_or(Details::GetAvroSchemaFromMap)?;

        self.reader
            .read_exact(&mut self.marker)
            .map_err(|e| Details::ReadMarker(e).into())
    }

    /// Read the next data block. Leaves `message_count` at zero at the end of the file.
    fn read_block_next(&mut self) -> AvroResult<()> {
        let at_end = self
            .reader
            .fill_buf()
            .map_err(Details::ReadIntoBuf)?
            .is_empty();
        if at_end {
            return Ok(());
        }

        let count = zag_i64(&mut self.reader)?;
        let count = usize::try_from(count).map_err(|e| Details::ConvertI64ToUsize(e, count))?;
        let len = decode_len(&mut self.reader, self.config.max_byte_slice_size)?;

        self.buf.resize(len, 0);
        self.reader
            .read_exact(&mut self.buf)
            .map_err(Details::ReadIntoBuf)?;
        self.buf_idx = 0;

        let mut marker = [0u8; 16];
        self.reader
            .read_exact(&mut marker)
            .map_err(Details::ReadBlockMarker)?;
        if marker != self.marker {
            return Err(Details::GetBlockMarker.into());
        }

        self.codec.decompress(&mut self.buf)?;
        self.message_count = count;
        Ok(())
    }

    fn read_next(&mut self) -> AvroResult<Option<Value>> {
        // Blocks may legitimately hold no values
        while self.message_count == 0 {
            let at_end = self
                .reader
                .fill_buf()
                .map_err(Details::ReadIntoBuf)?
                .is_empty();
            if at_end {
                return Ok(None);
            }
            self.read_block_next()?;
        }

        let mut block_bytes = &self.buf[self.buf_idx..];
        let b_original = block_bytes.len();
        let item = decode(&self.writer_schema, &self.config, &mut block_bytes)?;
        self.buf_idx += b_original - block_bytes.len();
        self.message_count -= 1;
        Ok(Some(item))
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = AvroResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        // to prevent continuing to read after the first error occurs
        if self.errored {
            return None;
        };
        match self.read_next() {
            Ok(opt) => opt.map(Ok),
            Err(e) => {
                self.errored = true;
                Some(Err(e))
            }
        }
    }
}
