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

//! Compression codecs applied to container file blocks.

use crate::{AvroResult, error::Details, error::Error};
use miniz_oxide::deflate::CompressionLevel;
use std::str::FromStr;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Length of the CRC32 trailer appended to snappy blocks.
const SNAPPY_CHECKSUM_LEN: usize = 4;

/// Settings for the `Deflate` codec.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct DeflateSettings {
    compression_level: CompressionLevel,
}

impl DeflateSettings {
    pub fn new(compression_level: CompressionLevel) -> Self {
        DeflateSettings { compression_level }
    }

    fn compression_level(&self) -> u8 {
        self.compression_level as u8
    }
}

impl Default for DeflateSettings {
    /// Default compression level is `CompressionLevel::BestCompression`.
    fn default() -> Self {
        Self::new(CompressionLevel::BestCompression)
    }
}

/// The compression codec used to compress blocks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab_case")]
pub enum Codec {
    /// The `Null` codec simply passes through data uncompressed.
    #[default]
    Null,
    /// The `Deflate` codec writes the data block using the deflate algorithm
    /// as specified in RFC 1951. Unlike the "zlib format" of RFC 1950 the stream has no checksum.
    Deflate(DeflateSettings),
    /// The `Snappy` codec uses Google's [Snappy](http://google.github.io/snappy/)
    /// compression library. Each compressed block is followed by the 4-byte, big-endian
    /// CRC32 checksum of the uncompressed data in the block.
    Snappy,
}

impl Codec {
    /// Look up a codec by the name stored in a container header.
    ///
    /// An empty name selects [`Codec::Null`].
    pub fn resolve(name: &str) -> AvroResult<Codec> {
        if name.is_empty() {
            return Ok(Codec::Null);
        }
        Codec::from_str(name).map_err(|_| Details::UnknownCodec(name.to_string()).into())
    }

    /// The name written to the container header.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Compress a stream of bytes in-place.
    pub fn compress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        match self {
            Codec::Null => (),
            Codec::Deflate(settings) => {
                *stream = miniz_oxide::deflate::compress_to_vec(stream, settings.compression_level());
            }
            Codec::Snappy => {
                let mut encoded: Vec<u8> = vec![0; snap::raw::max_compress_len(stream.len())];
                let compressed_size = snap::raw::Encoder::new()
                    .compress(&stream[..], &mut encoded[..])
                    .map_err(Details::SnappyCompress)?;

                let checksum = crc32fast::hash(&stream[..]).to_be_bytes();
                encoded.truncate(compressed_size);
                encoded.extend_from_slice(&checksum);

                *stream = encoded;
            }
        };

        Ok(())
    }

    /// Decompress a stream of bytes in-place.
    pub fn decompress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        *stream = match self {
            Codec::Null => return Ok(()),
            Codec::Deflate(_) => {
                miniz_oxide::inflate::decompress_to_vec(stream).map_err(|e| {
                    use miniz_oxide::inflate::TINFLStatus::*;
                    use std::io::{Error as IoError, ErrorKind};
                    let err = match e.status {
                        FailedCannotMakeProgress | NeedsMoreInput => {
                            IoError::from(ErrorKind::UnexpectedEof)
                        }
                        Adler32Mismatch | Failed => IoError::from(ErrorKind::InvalidData),
                        status => IoError::other(format!("inflate stopped with {status:?}")),
                    };
                    Error::new(Details::DeflateDecompress(err))
                })?
            }
            Codec::Snappy => {
                if stream.len() <= SNAPPY_CHECKSUM_LEN {
                    return Err(Details::TruncatedBlock(stream.len()).into());
                }
                let (compressed, checksum) = stream.split_at(stream.len() - SNAPPY_CHECKSUM_LEN);

                let decompressed_size =
                    snap::raw::decompress_len(compressed).map_err(Details::GetSnappyDecompressLen)?;
                let mut decoded = vec![0; decompressed_size];
                snap::raw::Decoder::new()
                    .decompress(compressed, &mut decoded[..])
                    .map_err(Details::SnappyDecompress)?;

                let mut last_four = [0u8; SNAPPY_CHECKSUM_LEN];
                last_four.copy_from_slice(checksum);
                let expected = u32::from_be_bytes(last_four);
                let actual = crc32fast::hash(&decoded);

                if expected != actual {
                    return Err(Details::ChecksumMismatch { expected, actual }.into());
                }
                decoded
            }
        };
        Ok(())
    }

    /// Compress `data` into a new buffer.
    pub fn encode(self, data: &[u8]) -> AvroResult<Vec<u8>> {
        let mut stream = data.to_vec();
        self.compress(&mut stream)?;
        Ok(stream)
    }

    /// Decompress `data` into a new buffer.
    pub fn decode(self, data: &[u8]) -> AvroResult<Vec<u8>> {
        let mut stream = data.to_vec();
        self.decompress(&mut stream)?;
        Ok(stream)
    }
}
