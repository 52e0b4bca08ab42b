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

//! Variable-length integer framing shared by every encoder and decoder.
//!
//! Avro writes `int` and `long` values, lengths and block counts as
//! [zigzag](https://avro.apache.org/docs/++version++/specification/#primitive-types-1) mapped
//! integers, stored as little-endian base-128 varints: seven bits per byte, with the high bit set
//! on every byte but the last.

use crate::{AvroResult, error::Details};
use std::io::{Read, Write};

/// Maximum number of bytes that can be allocated when decoding
/// Avro-encoded values. This is a protection against ill-formed
/// data, whose length field might be interpreted as enormous.
/// See [`Config::max_byte_slice_size`](crate::Config::max_byte_slice_size) to change this limit.
pub const DEFAULT_MAX_ALLOCATION_BYTES: usize = 512 * 1024 * 1024;

/// A `u64` never needs more than ten 7-bit groups.
const MAX_VARINT_LEN: usize = 10;

pub(crate) fn safe_len(len: usize, maximum: usize) -> AvroResult<usize> {
    if len <= maximum {
        Ok(len)
    } else {
        Err(Details::MemoryAllocation {
            desired: len,
            maximum,
        }
        .into())
    }
}

pub fn zig_i32<W: Write>(n: i32, writer: W) -> AvroResult<usize> {
    zig_i64(i64::from(n), writer)
}

/// Zigzag maps `n` (0, -1, 1, -2, ... become 0, 1, 2, 3, ...) and writes it as a varint.
pub fn zig_i64<W: Write>(n: i64, writer: W) -> AvroResult<usize> {
    encode_variable(((n << 1) ^ (n >> 63)) as u64, writer)
}

pub fn zag_i32<R: Read>(reader: &mut R) -> AvroResult<i32> {
    let i = zag_i64(reader)?;
    i32::try_from(i).map_err(|e| Details::ZagI32(e, i).into())
}

pub fn zag_i64<R: Read>(reader: &mut R) -> AvroResult<i64> {
    let z = decode_variable(reader)?;
    Ok(if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    })
}

/// Write `z` as an unsigned base-128 varint and return the number of bytes written.
pub fn encode_variable<W: Write>(mut z: u64, mut writer: W) -> AvroResult<usize> {
    let mut buffer = [0u8; MAX_VARINT_LEN];
    let mut i: usize = 0;
    loop {
        if z <= 0x7F {
            buffer[i] = (z & 0x7F) as u8;
            i += 1;
            break;
        } else {
            buffer[i] = (0x80 | (z & 0x7F)) as u8;
            i += 1;
            z >>= 7;
        }
    }
    writer
        .write_all(&buffer[..i])
        .map_err(Details::WriteBytes)?;
    Ok(i)
}

/// Read an unsigned base-128 varint.
///
/// Running out of input before the final byte is a [`Details::Framing`] error, more than ten
/// bytes (or a tenth byte that would overflow) is [`Details::IntegerOverflow`].
pub fn decode_variable<R: Read>(reader: &mut R) -> AvroResult<u64> {
    let mut i = 0u64;
    let mut buf = [0u8; 1];

    for j in 0..MAX_VARINT_LEN {
        reader.read_exact(&mut buf).map_err(Details::Framing)?;
        let byte = buf[0];
        if j == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(Details::IntegerOverflow.into());
        }
        i |= u64::from(byte & 0x7F) << (j * 7);
        if (byte >> 7) == 0 {
            return Ok(i);
        }
    }

    Err(Details::IntegerOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Details;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_zigzag() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        zig_i32(42i32, &mut a).unwrap();
        zig_i64(42i64, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zig_i64() {
        let mut s = Vec::new();

        zig_i64(0, &mut s).unwrap();
        assert_eq!(s, [0]);

        s.clear();
        zig_i64(-1, &mut s).unwrap();
        assert_eq!(s, [1]);

        s.clear();
        zig_i64(1, &mut s).unwrap();
        assert_eq!(s, [2]);

        s.clear();
        zig_i64(-64, &mut s).unwrap();
        assert_eq!(s, [127]);

        s.clear();
        zig_i64(64, &mut s).unwrap();
        assert_eq!(s, [128, 1]);

        s.clear();
        zig_i64(i32::MAX as i64, &mut s).unwrap();
        assert_eq!(s, [254, 255, 255, 255, 15]);

        s.clear();
        zig_i64(i32::MIN as i64, &mut s).unwrap();
        assert_eq!(s, [255, 255, 255, 255, 15]);

        s.clear();
        zig_i64(i64::MAX, &mut s).unwrap();
        assert_eq!(s, [254, 255, 255, 255, 255, 255, 255, 255, 255, 1]);

        s.clear();
        zig_i64(i64::MIN, &mut s).unwrap();
        assert_eq!(s, [255, 255, 255, 255, 255, 255, 255, 255, 255, 1]);
    }

    #[test]
    fn test_block_counts_are_negative_zigzag() {
        let mut s = Vec::new();
        zig_i64(-1, &mut s).unwrap();
        zig_i64(8, &mut s).unwrap();
        zig_i64(-2, &mut s).unwrap();
        assert_eq!(s, [0x01, 0x10, 0x03]);
    }

    #[test]
    fn test_encode_variable_returns_length() -> TestResult {
        let mut s = Vec::new();
        assert_eq!(encode_variable(0, &mut s)?, 1);
        assert_eq!(encode_variable(300, &mut s)?, 2);
        assert_eq!(encode_variable(u64::MAX, &mut s)?, 10);
        assert_eq!(&s[..3], &[0x00, 0xAC, 0x02]);
        Ok(())
    }

    #[test]
    fn test_zag_round_trip() -> TestResult {
        for n in [0, 1, -1, 63, -64, 64, i32::MAX as i64, i64::MIN, i64::MAX] {
            let mut s = Vec::new();
            zig_i64(n, &mut s)?;
            assert_eq!(zag_i64(&mut s.as_slice())?, n);
        }
        Ok(())
    }

    #[test]
    fn test_zag_i32_out_of_range() -> TestResult {
        let mut s = Vec::new();
        zig_i64(i64::from(i32::MAX) + 1, &mut s)?;
        let err = zag_i32(&mut s.as_slice()).unwrap_err();
        assert!(matches!(err.details(), Details::ZagI32(_, _)));
        Ok(())
    }

    #[test]
    fn test_truncated_varint_is_framing_error() {
        let truncated: &[u8] = &[0x80, 0x80];
        let err = decode_variable(&mut &*truncated).unwrap_err();
        assert!(matches!(err.details(), Details::Framing(_)));

        let empty: &[u8] = &[];
        let err = decode_variable(&mut &*empty).unwrap_err();
        assert!(matches!(err.details(), Details::Framing(_)));
    }

    #[test]
    fn test_overflow() {
        let too_long: &[u8] = &[0xe1; 11];
        let err = decode_variable(&mut &*too_long).unwrap_err();
        assert!(matches!(err.details(), Details::IntegerOverflow));

        let tenth_byte_overflows: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        let err = decode_variable(&mut &*tenth_byte_overflows).unwrap_err();
        assert!(matches!(err.details(), Details::IntegerOverflow));
    }

    #[test]
    fn test_safe_len() -> TestResult {
        assert_eq!(42usize, safe_len(42usize, DEFAULT_MAX_ALLOCATION_BYTES)?);
        assert!(safe_len(1024 * 1024 * 1024, DEFAULT_MAX_ALLOCATION_BYTES).is_err());

        Ok(())
    }
}
