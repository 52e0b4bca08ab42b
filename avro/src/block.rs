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

//! Block framing for `map` and `array` values.
//!
//! A collection is written as a sequence of blocks followed by an empty block:
//!
//! ```text
//! ( zigzag(-count) zigzag(byte_len) items )* zigzag(0)
//! ```
//!
//! Every non-empty block uses the negative count form so a reader can skip it by its byte size
//! without decoding the items. Readers accept both forms.

use crate::{
    AvroResult,
    error::Details,
    util::{safe_len, zag_i64, zig_i64},
};
use std::io::{self, Read, Write};

/// Writes items into size-prefixed blocks of at most `block_length` items.
///
/// Items are encoded into [`buffer`](Self::buffer); every item must be closed with
/// [`end_item`](Self::end_item). [`finish`](Self::finish) writes the last partial block and the
/// terminating empty block.
pub struct BlockWriter<'w, W: Write> {
    writer: &'w mut W,
    buffer: Vec<u8>,
    block_length: usize,
    items_in_block: usize,
    bytes_written: usize,
}

impl<'w, W: Write> BlockWriter<'w, W> {
    /// Fails with [`Details::InvalidBlockLength`] unless `block_length` is positive.
    pub fn new(writer: &'w mut W, block_length: usize) -> AvroResult<Self> {
        if block_length == 0 {
            return Err(Details::InvalidBlockLength(block_length).into());
        }
        Ok(Self {
            writer,
            buffer: Vec::new(),
            block_length,
            items_in_block: 0,
            bytes_written: 0,
        })
    }

    /// The buffer the current item is encoded into.
    pub fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// Mark the bytes appended to the buffer since the last call as one item.
    pub fn end_item(&mut self) -> AvroResult<()> {
        self.items_in_block += 1;
        if self.items_in_block == self.block_length {
            self.write_block()?;
        }
        Ok(())
    }

    fn write_block(&mut self) -> AvroResult<()> {
        if self.items_in_block == 0 {
            return Ok(());
        }
        let count = i64::try_from(self.items_in_block)
            .map_err(|e| Details::ConvertUsizeToI64(e, self.items_in_block))?;
        let len = i64::try_from(self.buffer.len())
            .map_err(|e| Details::ConvertUsizeToI64(e, self.buffer.len()))?;

        self.bytes_written += zig_i64(-count, &mut *self.writer)?;
        self.bytes_written += zig_i64(len, &mut *self.writer)?;
        self.writer
            .write_all(&self.buffer)
            .map_err(Details::WriteBytes)?;
        self.bytes_written += self.buffer.len();

        self.buffer.clear();
        self.items_in_block = 0;
        Ok(())
    }

    /// Flush the pending block, write the terminator and return the number of bytes written.
    pub fn finish(mut self) -> AvroResult<usize> {
        self.write_block()?;
        self.bytes_written += zig_i64(0, &mut *self.writer)?;
        Ok(self.bytes_written)
    }
}

/// Write every item of `items` through `encode_item`, chunked into blocks.
pub fn write_blocks<W, I, F>(
    writer: &mut W,
    block_length: usize,
    items: I,
    mut encode_item: F,
) -> AvroResult<usize>
where
    W: Write,
    I: IntoIterator,
    F: FnMut(I::Item, &mut Vec<u8>) -> AvroResult<()>,
{
    let mut blocks = BlockWriter::new(writer, block_length)?;
    for item in items {
        encode_item(item, blocks.buffer())?;
        blocks.end_item()?;
    }
    blocks.finish()
}

/// The header of a block: its item count and, for the negative count form, its byte size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub count: usize,
    pub byte_size: Option<usize>,
}

impl BlockHeader {
    pub fn is_end(&self) -> bool {
        self.count == 0
    }
}

/// Read a block header, bounding both the count and the byte size by `max_len`.
pub fn read_block_header<R: Read>(reader: &mut R, max_len: usize) -> AvroResult<BlockHeader> {
    let raw = zag_i64(reader)?;
    let count = usize::try_from(raw.unsigned_abs())
        .map_err(|e| Details::ConvertU64ToUsize(e, raw.unsigned_abs()))?;
    let count = safe_len(count, max_len)?;

    let byte_size = if raw < 0 {
        let size = zag_i64(reader)?;
        let size = usize::try_from(size).map_err(|e| Details::ConvertI64ToUsize(e, size))?;
        Some(safe_len(size, max_len)?)
    } else {
        None
    };
    Ok(BlockHeader { count, byte_size })
}

/// Add a block's items to the running total of one collection, bounded by `max_items`.
fn count_items(total: &mut usize, header: &BlockHeader, max_items: usize) -> AvroResult<()> {
    *total = total.saturating_add(header.count);
    if *total > max_items {
        return Err(Details::CollectionLength {
            count: *total,
            maximum: max_items,
        }
        .into());
    }
    Ok(())
}

/// Call `read_item` once per item until the terminating empty block.
///
/// A collection announcing more than `max_items` items in total is rejected before any of the
/// offending block's items are read. Items such as `null` take no bytes on the wire, so this is
/// the only bound on how many values a short input can expand into.
pub fn read_blocks<R, F>(
    reader: &mut R,
    max_len: usize,
    max_items: usize,
    mut read_item: F,
) -> AvroResult<()>
where
    R: Read,
    F: FnMut(&mut R) -> AvroResult<()>,
{
    let mut total = 0;
    loop {
        let header = read_block_header(reader, max_len)?;
        if header.is_end() {
            return Ok(());
        }
        count_items(&mut total, &header, max_items)?;
        for _ in 0..header.count {
            read_item(reader)?;
        }
    }
}

/// Skip a block-framed collection.
///
/// Blocks carrying a byte size are skipped without decoding; the others fall back to
/// `skip_item` for each of their items.
pub fn skip_blocks<R, F>(
    reader: &mut R,
    max_len: usize,
    max_items: usize,
    mut skip_item: F,
) -> AvroResult<()>
where
    R: Read,
    F: FnMut(&mut R) -> AvroResult<()>,
{
    let mut total = 0;
    loop {
        let header = read_block_header(reader, max_len)?;
        if !header.is_end() {
            count_items(&mut total, &header, max_items)?;
        }
        match header {
            BlockHeader { count: 0, .. } => return Ok(()),
            BlockHeader {
                byte_size: Some(size),
                ..
            } => skip_bytes(reader, size)?,
            BlockHeader { count, .. } => {
                for _ in 0..count {
                    skip_item(reader)?;
                }
            }
        }
    }
}

pub(crate) fn skip_bytes<R: Read>(reader: &mut R, len: usize) -> AvroResult<()> {
    let skipped = io::copy(&mut reader.take(len as u64), &mut io::sink())
        .map_err(|e| Details::SkipBytes(e, len))?;
    if skipped as usize == len {
        Ok(())
    } else {
        Err(Details::SkipBytes(io::ErrorKind::UnexpectedEof.into(), len).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DEFAULT_MAX_COLLECTION_ITEMS, error::Details, util::DEFAULT_MAX_ALLOCATION_BYTES,
    };
    use avrokit_test_helper::TestResult;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    fn encode_str_items(items: &[&str], block_length: usize) -> AvroResult<Vec<u8>> {
        let mut out = Vec::new();
        write_blocks(&mut out, block_length, items, |item, buf| {
            buf.extend_from_slice(item.as_bytes());
            Ok(())
        })?;
        Ok(out)
    }

    fn headers(mut bytes: &[u8]) -> AvroResult<Vec<BlockHeader>> {
        let mut headers = Vec::new();
        loop {
            let header = read_block_header(&mut bytes, DEFAULT_MAX_ALLOCATION_BYTES)?;
            headers.push(header);
            match header.byte_size {
                _ if header.is_end() => return Ok(headers),
                Some(size) => bytes = &bytes[size..],
                None => unreachable!("writer always emits byte sizes"),
            }
        }
    }

    #[test]
    fn empty_input_is_one_zero_byte() -> TestResult {
        assert_eq!(encode_str_items(&[], 100)?, [0x00]);
        Ok(())
    }

    #[test]
    fn exact_multiple_has_no_empty_block() -> TestResult {
        let out = encode_str_items(&["a", "b", "c", "d"], 2)?;
        assert_eq!(out, hex!("03 04 61 62 03 04 63 64 00"));
        Ok(())
    }

    #[test]
    fn chunk_counts() -> TestResult {
        let items = vec!["xy"; 7];
        let found = headers(&encode_str_items(&items, 3)?)?;
        assert_eq!(
            found,
            vec![
                BlockHeader { count: 3, byte_size: Some(6) },
                BlockHeader { count: 3, byte_size: Some(6) },
                BlockHeader { count: 1, byte_size: Some(2) },
                BlockHeader { count: 0, byte_size: None },
            ]
        );
        Ok(())
    }

    #[test]
    fn block_writer_reports_bytes_written() -> TestResult {
        let mut out = Vec::new();
        let mut blocks = BlockWriter::new(&mut out, 10)?;
        blocks.buffer().extend_from_slice(b"foo");
        blocks.end_item()?;
        assert_eq!(blocks.finish()?, 6);
        assert_eq!(out, hex!("01 06 66 6f 6f 00"));
        Ok(())
    }

    #[test]
    fn zero_block_length_is_rejected() {
        let mut out: Vec<u8> = Vec::new();
        let err = write_blocks(&mut out, 0, Vec::<u8>::new(), |_, _| Ok(())).unwrap_err();
        assert!(matches!(err.details(), Details::InvalidBlockLength(0)));
        assert!(out.is_empty());
    }

    #[test]
    fn item_errors_abort() {
        let mut out = Vec::new();
        let err = write_blocks(&mut out, 1, [1, 2, 3], |item, buf| {
            if item == 2 {
                return Err(Details::GetField("two".into()).into());
            }
            buf.push(item);
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err.details(), Details::GetField(_)));
        assert_eq!(out, hex!("01 02 01"));
    }

    #[test]
    fn read_both_block_forms() -> TestResult {
        // Positive count without size, then negative count with size.
        let mut input: &[u8] = &hex!("04 0a 14 01 02 1e 00");
        let mut items = Vec::new();
        read_blocks(&mut input, DEFAULT_MAX_ALLOCATION_BYTES, DEFAULT_MAX_COLLECTION_ITEMS, |r| {
            items.push(zag_i64(r)?);
            Ok(())
        })?;
        assert_eq!(items, [5, 10, 15]);
        assert!(input.is_empty());
        Ok(())
    }

    #[test]
    fn skip_uses_byte_size_when_present() -> TestResult {
        let mut input: &[u8] = &hex!("03 04 61 62 03 04 63 64 02 02 00 ff");
        let mut skipped_items = 0;
        skip_blocks(&mut input, DEFAULT_MAX_ALLOCATION_BYTES, DEFAULT_MAX_COLLECTION_ITEMS, |r| {
            skipped_items += 1;
            zag_i64(r).map(|_| ())
        })?;
        assert_eq!(skipped_items, 1);
        assert_eq!(input, [0xff]);
        Ok(())
    }

    #[test]
    fn skip_past_end_of_input() {
        let mut input: &[u8] = &hex!("01 0a 61");
        let err = skip_blocks(
            &mut input,
            DEFAULT_MAX_ALLOCATION_BYTES,
            DEFAULT_MAX_COLLECTION_ITEMS,
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err.details(), Details::SkipBytes(_, 5)));
    }

    #[test]
    fn header_lengths_are_bounded() {
        let mut input: &[u8] = &hex!("01 c8 01");
        let err = read_block_header(&mut input, 10).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::MemoryAllocation {
                desired: 100,
                maximum: 10
            }
        ));
    }

    #[test]
    fn negative_byte_size_is_rejected() {
        let mut input: &[u8] = &hex!("01 01");
        let err = read_block_header(&mut input, DEFAULT_MAX_ALLOCATION_BYTES).unwrap_err();
        assert!(matches!(err.details(), Details::ConvertI64ToUsize(_, -1)));
    }

    #[test]
    fn item_count_is_bounded_across_blocks() {
        // Two blocks of 3 and 2 zero-byte items, more than the 4 allowed.
        let mut input: &[u8] = &hex!("06 04 00");
        let mut read = 0;
        let err = read_blocks(&mut input, DEFAULT_MAX_ALLOCATION_BYTES, 4, |_| {
            read += 1;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(
            err.details(),
            Details::CollectionLength {
                count: 5,
                maximum: 4
            }
        ));
        assert_eq!(read, 3);
    }

    #[test]
    fn zero_byte_items_cannot_expand_a_short_input() {
        // 5 bytes announcing ten million items that take no bytes each.
        let mut input: &[u8] = &hex!("80 da c4 09 00");
        let mut read = 0;
        let err = read_blocks(&mut input, 10_000_000, 1000, |_| {
            read += 1;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(
            err.details(),
            Details::CollectionLength {
                count: 10_000_000,
                maximum: 1000
            }
        ));
        assert_eq!(read, 0);

        let mut input: &[u8] = &hex!("80 da c4 09 00");
        let err = skip_blocks(&mut input, 10_000_000, 1000, |_| Ok(())).unwrap_err();
        assert!(matches!(err.details(), Details::CollectionLength { .. }));
    }
}
