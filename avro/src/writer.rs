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

//! Logic handling writing Avro object container files.
use crate::{
    AvroResult, Codec,
    block::write_blocks,
    config::{FrozenConfig, default_config},
    encode::{encode, encode_bytes, encode_long},
    error::Details,
    schema::Schema,
    serde::SchemaAwareSerializer,
    types::Value,
};
use log::debug;
use serde::Serialize;
use std::{collections::BTreeMap, io::Write, mem::ManuallyDrop};

const DEFAULT_BLOCK_SIZE: usize = 16000;
pub(crate) const AVRO_OBJECT_HEADER: &[u8] = b"Obj\x01";
pub(crate) const SCHEMA_KEY: &str = "avro.schema";
pub(crate) const CODEC_KEY: &str = "avro.codec";

/// Main interface for writing Avro object container files.
///
/// Values are buffered and written as one compressed data block once the buffer reaches
/// `block_size` bytes. It is critical to call flush before `Writer<W>` is dropped. Though dropping
/// will attempt to flush the contents of the buffer, any errors that happen in the process of
/// dropping will be ignored.
pub struct Writer<'a, W: Write> {
    schema: &'a Schema,
    writer: W,
    config: FrozenConfig,
    codec: Codec,
    block_size: usize,
    buffer: Vec<u8>,
    num_values: usize,
    marker: [u8; 16],
    has_header: bool,
    user_metadata: BTreeMap<String, Vec<u8>>,
}

#[bon::bon]
impl<'a, W: Write> Writer<'a, W> {
    #[builder]
    pub fn builder(
        schema: &'a Schema,
        writer: W,
        #[builder(default)] codec: Codec,
        #[builder(default = DEFAULT_BLOCK_SIZE)] block_size: usize,
        #[builder(default = generate_sync_marker())] marker: [u8; 16],
        /// Configuration used to encode values, the process-wide default when not set.
        #[builder(default = default_config())]
        config: FrozenConfig,
        #[builder(default)] user_metadata: BTreeMap<String, Vec<u8>>,
    ) -> AvroResult<Self> {
        if let Some(key) = user_metadata.keys().find(|key| key.starts_with("avro.")) {
            return Err(Details::InvalidMetadataKey(key.clone()).into());
        }
        Ok(Self {
            schema,
            writer,
            config,
            codec,
            block_size,
            buffer: Vec::with_capacity(block_size),
            num_values: 0,
            marker,
            has_header: false,
            user_metadata,
        })
    }
}

impl<'a, W: Write> Writer<'a, W> {
    /// Creates a `Writer` given a `Schema` and something implementing the `io::Write` trait to write
    /// to.
    /// No compression `Codec` will be used.
    pub fn new(schema: &'a Schema, writer: W) -> AvroResult<Self> {
        Writer::with_codec(schema, writer, Codec::Null)
    }

    pub fn with_codec(schema: &'a Schema, writer: W, codec: Codec) -> AvroResult<Self> {
        Self::builder()
            .schema(schema)
            .writer(writer)
            .codec(codec)
            .build()
    }

    /// Get a reference to the `Schema` associated to a `Writer`.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The sync marker written after the header and after every data block.
    pub fn marker(&self) -> &[u8; 16] {
        &self.marker
    }

    /// Append a value to the `Writer`, also performs schema validation.
    ///
    /// Returns the number of bytes written (it might be 0, see below).
    ///
    /// **NOTE**: This function is not guaranteed to perform any actual write, since it relies on
    /// internal buffering for performance reasons. If you want to be sure the value has been
    /// written, then call [`flush`](Writer::flush).
    pub fn append_value<T: Into<Value>>(&mut self, value: T) -> AvroResult<usize> {
        let value = value.into();
        let n = self.maybe_write_header()?;
        encode(&value, self.schema, &self.config, &mut self.buffer)?;
        self.value_appended(n)
    }

    /// Append anything implementing the `Serialize` trait to a `Writer` for
    /// [`serde`](https://docs.serde.rs/serde/index.html) compatibility.
    ///
    /// A value the schema rejects is discarded from the buffer, nothing of it reaches the file.
    pub fn append_ser<S: Serialize>(&mut self, value: S) -> AvroResult<usize> {
        let n = self.maybe_write_header()?;
        let mark = self.buffer.len();
        let serializer = SchemaAwareSerializer::new(&mut self.buffer, self.schema, &self.config);
        if let Err(e) = value.serialize(serializer) {
            self.buffer.truncate(mark);
            return Err(e);
        }
        self.value_appended(n)
    }

    fn value_appended(&mut self, header_bytes: usize) -> AvroResult<usize> {
        self.num_values += 1;
        if self.buffer.len() >= self.block_size {
            return self.flush().map(|b| b + header_bytes);
        }
        Ok(header_bytes)
    }

    /// Extend a `Writer` with an `Iterator` of values, also performs schema validation.
    ///
    /// Returns the number of bytes written.
    ///
    /// **NOTE**: This function forces the written data to be flushed (an implicit
    /// call to [`flush`](Writer::flush) is performed).
    pub fn extend<I, T: Into<Value>>(&mut self, values: I) -> AvroResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let mut num_bytes = 0;
        for value in values {
            num_bytes += self.append_value(value)?;
        }
        num_bytes += self.flush()?;

        Ok(num_bytes)
    }

    /// Flush the content to the inner `Writer`.
    ///
    /// Call this function to make sure all the content has been written before releasing the `Writer`.
    /// This will also write the header if it wasn't written yet.
    ///
    /// Returns the number of bytes written.
    pub fn flush(&mut self) -> AvroResult<usize> {
        let mut num_bytes = self.maybe_write_header()?;
        if self.num_values == 0 {
            return Ok(num_bytes);
        }

        let raw_len = self.buffer.len();
        self.codec.compress(&mut self.buffer)?;

        let num_values = self.num_values;
        let stream_len = self.buffer.len();

        let mut block_header = Vec::new();
        encode_long(to_long(num_values)?, &mut block_header)?;
        encode_long(to_long(stream_len)?, &mut block_header)?;

        num_bytes += self.append_bytes(&block_header)?;
        self.writer
            .write_all(&self.buffer)
            .map_err(Details::WriteBytes)?;
        num_bytes += stream_len;
        num_bytes += self.append_marker()?;

        self.buffer.clear();
        self.num_values = 0;

        self.writer.flush().map_err(Details::FlushWriter)?;
        debug!(
            "Flushed block of {num_values} values ({raw_len} bytes, {stream_len} with codec {})",
            self.codec.name()
        );

        Ok(num_bytes)
    }

    /// Return what the `Writer` is writing to, consuming the `Writer` itself.
    ///
    /// **NOTE**: This function forces the written data to be flushed (an implicit
    /// call to [`flush`](Writer::flush) is performed).
    pub fn into_inner(mut self) -> AvroResult<W> {
        self.flush()?;

        let mut this = ManuallyDrop::new(self);

        // Extract every member that is not Copy and therefore should be dropped
        let _buffer = std::mem::take(&mut this.buffer);
        let _user_metadata = std::mem::take(&mut this.user_metadata);
        // SAFETY: config is not accessed after this and won't be dropped again because of ManuallyDrop
        unsafe { std::ptr::drop_in_place(&mut this.config) };

        // SAFETY: double-drops are prevented by putting `this` in a ManuallyDrop that is never dropped
        let writer = unsafe { std::ptr::read(&this.writer) };

        Ok(writer)
    }

    /// Gets a reference to the underlying writer.
    ///
    /// **NOTE**: There is likely data still in the buffer. To have all the data
    /// in the writer call [`flush`](Writer::flush) first.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    fn append_marker(&mut self) -> AvroResult<usize> {
        self.writer
            .write_all(&self.marker)
            .map_err(Details::WriteMarker)?;
        Ok(self.marker.len())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> AvroResult<usize> {
        self.writer.write_all(bytes).map_err(Details::WriteBytes)?;
        Ok(bytes.len())
    }

    /// Adds custom metadata to the file.
    /// This method could be used only before adding the first record to the writer.
    pub fn add_user_metadata<T: AsRef<[u8]>>(&mut self, key: String, value: T) -> AvroResult<()> {
        if self.has_header {
            return Err(Details::FileHeaderAlreadyWritten.into());
        }
        if key.starts_with("avro.") {
            return Err(Details::InvalidMetadataKey(key).into());
        }
        self.user_metadata.insert(key, value.as_ref().to_vec());
        Ok(())
    }

    /// Create an Avro header based on schema, codec and sync marker.
    fn header(&self) -> AvroResult<Vec<u8>> {
        let schema = self.schema.canonical_form();
        let codec = self.codec.name();
        let metadata = [
            (SCHEMA_KEY, schema.as_bytes()),
            (CODEC_KEY, codec.as_bytes()),
        ]
        .into_iter()
        .chain(
            self.user_metadata
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_slice())),
        );

        let mut header = Vec::new();
        header.extend_from_slice(AVRO_OBJECT_HEADER);
        write_blocks(
            &mut header,
            self.config.block_length,
            metadata,
            |(key, value), buffer| {
                encode_bytes(key, &mut *buffer)?;
                encode_bytes(value, buffer)?;
                Ok(())
            },
        )?;
        header.extend_from_slice(&self.marker);

        Ok(header)
    }

    fn maybe_write_header(&mut self) -> AvroResult<usize> {
        if !self.has_header {
            let header = self.header()?;
            let n = self.append_bytes(&header)?;
            self.has_header = true;
            Ok(n)
        } else {
            Ok(0)
        }
    }
}

impl<W: Write> Drop for Writer<'_, W> {
    /// Drop the writer, will try to flush ignoring any errors.
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn to_long(n: usize) -> AvroResult<i64> {
    i64::try_from(n).map_err(|e| Details::ConvertUsizeToI64(e, n).into())
}

fn generate_sync_marker() -> [u8; 16] {
    rand::random()
}
