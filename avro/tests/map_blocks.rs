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

use avrokit::{
    Config, Decoder, Encoder, Schema,
    error::Details,
    types::Value,
};
use avrokit_test_helper::TestResult;
use hex_literal::hex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::HashMap;

fn encode_with<T: serde::Serialize>(value: &T, schema: &Schema, config: Config) -> avrokit::AvroResult<Vec<u8>> {
    let mut encoder = Encoder::with_config(schema, Vec::new(), config.freeze()?);
    encoder.encode(value)?;
    Ok(encoder.into_inner())
}

#[test]
fn empty_map_is_a_single_terminator() -> TestResult {
    let schema = Schema::map(Schema::String);
    let empty: HashMap<String, String> = HashMap::new();
    assert_eq!(encode_with(&empty, &schema, Config::default())?, [0x00]);
    assert_eq!(
        encode_with(&Vec::<String>::new(), &Schema::array(Schema::String), Config::default())?,
        [0x00]
    );
    Ok(())
}

#[test]
fn single_entry_map() -> TestResult {
    let schema = Schema::map(Schema::String);
    let map = HashMap::from([("foo", "foo")]);
    let expected = hex!("01 10 06 66 6F 6F 06 66 6F 6F 00");
    assert_eq!(encode_with(&map, &schema, Config::default())?, expected);

    let value = Value::Map(HashMap::from([("foo".to_string(), Value::from("foo"))]));
    let mut encoder = Encoder::with_config(&schema, Vec::new(), Config::default().freeze()?);
    encoder.encode_value(&value)?;
    assert_eq!(encoder.into_inner(), expected);
    Ok(())
}

#[test]
fn one_entry_per_block() -> TestResult {
    let schema = Schema::map(Schema::Int);
    let map = HashMap::from([("foo", 1), ("bar", 2)]);
    let config = Config::builder().block_length(1).build();
    let out = encode_with(&map, &schema, config)?;

    let foo = hex!("01 0a 06 66 6f 6f 02");
    let bar = hex!("01 0a 06 62 61 72 04");
    let either = [[&foo[..], &bar[..], &[0x00]].concat(), [&bar[..], &foo[..], &[0x00]].concat()];
    assert!(either.contains(&out), "unexpected encoding {out:02x?}");
    Ok(())
}

#[test]
fn non_map_against_map_schema() {
    let schema = Schema::map(Schema::String);
    let err = encode_with(&"not a map", &schema, Config::default()).unwrap_err();
    assert!(matches!(
        err.details(),
        Details::TypeMismatch { value_type, .. } if value_type == "str"
    ));

    let err = avrokit::encode::encode_to_vec(&Value::Long(1), &schema, &Config::default())
        .unwrap_err();
    assert!(matches!(err.details(), Details::TypeMismatch { .. }));
}

#[test]
fn non_string_keys() {
    let schema = Schema::map(Schema::String);
    let map = HashMap::from([(1, "one".to_string())]);
    let err = encode_with(&map, &schema, Config::default()).unwrap_err();
    assert!(matches!(err.details(), Details::KeyTypeMismatch(_)));
}

#[test]
fn values_of_the_wrong_type() {
    let schema = Schema::map(Schema::String);
    let map = HashMap::from([("a".to_string(), 1)]);
    let err = encode_with(&map, &schema, Config::default()).unwrap_err();
    assert!(matches!(err.details(), Details::ValueTypeMismatch(_)));

    let value = Value::Map(HashMap::from([("a".to_string(), Value::Int(1))]));
    let err = avrokit::encode::encode_to_vec(&value, &schema, &Config::default()).unwrap_err();
    assert!(matches!(err.details(), Details::ValueTypeMismatch(_)));
}

/// Splits an encoded `array<long>` of single-byte items into its declared block counts.
fn block_counts(mut bytes: &[u8]) -> avrokit::AvroResult<Vec<i64>> {
    let mut counts = Vec::new();
    loop {
        let count = avrokit::util::zag_i64(&mut bytes)?;
        if count == 0 {
            assert!(bytes.is_empty(), "bytes after the terminator");
            return Ok(counts);
        }
        let size = avrokit::util::zag_i64(&mut bytes)?;
        assert_eq!(size, -count);
        bytes = &bytes[size as usize..];
        counts.push(-count);
    }
}

#[rstest]
#[case(0, 3, vec![])]
#[case(1, 3, vec![1])]
#[case(6, 3, vec![3, 3])]
#[case(7, 3, vec![3, 3, 1])]
#[case(5, 100, vec![5])]
#[case(4, 1, vec![1, 1, 1, 1])]
fn blocks_hold_at_most_block_length_items(
    #[case] n: i64,
    #[case] block_length: usize,
    #[case] expected: Vec<i64>,
) -> TestResult {
    let items: Vec<i64> = (0..n).collect();
    let config = Config::builder().block_length(block_length).build();
    let schema = Schema::array(Schema::Long);
    let bytes = encode_with(&items, &schema, config.clone())?;
    assert_eq!(bytes.last(), Some(&0x00));
    assert_eq!(block_counts(&bytes)?, expected);

    let mut decoder = Decoder::with_config(&schema, bytes.as_slice(), config.freeze()?);
    assert_eq!(decoder.decode::<Vec<i64>>()?, items);
    Ok(())
}

#[test]
fn maps_round_trip_through_blocks() -> TestResult {
    let schema = Schema::map(Schema::array(Schema::String));
    let map: HashMap<String, Vec<String>> = (0..25)
        .map(|i| (format!("key{i}"), vec![i.to_string(); i % 4]))
        .collect();
    let config = Config::builder().block_length(4).build();
    let bytes = encode_with(&map, &schema, config.clone())?;

    let mut decoder = Decoder::with_config(&schema, bytes.as_slice(), config.freeze()?);
    assert_eq!(decoder.decode::<HashMap<String, Vec<String>>>()?, map);
    Ok(())
}
