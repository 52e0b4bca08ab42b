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

//! Tunables consulted by every encode and decode operation.
//!
//! A [`Config`] is a plain, mutable value. Freezing it produces a [`FrozenConfig`], an immutable
//! snapshot that is cheap to clone and safe to share between threads. Encoders, decoders, readers
//! and writers capture a snapshot when they are constructed, by default the process-wide one
//! returned by [`default_config`].
//!
//! ```
//! use avrokit::{Config, config};
//!
//! let frozen = Config::builder().block_length(1).build().freeze()?;
//! config::set_default_config(frozen);
//! assert_eq!(config::default_config().block_length, 1);
//! # config::reset_default_config();
//! # Ok::<(), avrokit::Error>(())
//! ```

use crate::{AvroResult, error::Details, util::DEFAULT_MAX_ALLOCATION_BYTES};
use arc_swap::ArcSwap;
use log::debug;
use std::{
    ops::Deref,
    sync::{Arc, LazyLock},
};

/// The tag key looked up by [`FieldTable`](crate::fields::FieldTable) when no other is configured.
pub const DEFAULT_TAG_KEY: &str = "avro";

/// The number of map entries or array items written per block when no other is configured.
pub const DEFAULT_BLOCK_LENGTH: usize = 100;

/// The number of items a single decoded map or array may hold when no other is configured.
pub const DEFAULT_MAX_COLLECTION_ITEMS: usize = 16 * 1024 * 1024;

static DEFAULT_CONFIG: LazyLock<ArcSwap<Config>> =
    LazyLock::new(|| ArcSwap::from_pointee(Config::default()));

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
pub struct Config {
    /// The tag key used to map registered record fields to schema field names.
    #[builder(into, default = DEFAULT_TAG_KEY.to_string())]
    pub tag_key: String,
    /// Maximum number of items written in one map or array block.
    #[builder(default = DEFAULT_BLOCK_LENGTH)]
    pub block_length: usize,
    /// Fail when a value matches no union variant exactly instead of falling back to a variant
    /// the value can be promoted to.
    #[builder(default = false)]
    pub union_resolution_error: bool,
    /// Maximum length accepted for any length-prefixed allocation while decoding.
    #[builder(default = DEFAULT_MAX_ALLOCATION_BYTES)]
    pub max_byte_slice_size: usize,
    /// Maximum number of items accepted in one map or array while decoding.
    #[builder(default = DEFAULT_MAX_COLLECTION_ITEMS)]
    pub max_collection_items: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

impl Config {
    /// Validate the configuration and turn it into an immutable snapshot.
    pub fn freeze(self) -> AvroResult<FrozenConfig> {
        if self.block_length == 0 {
            return Err(Details::InvalidBlockLength(self.block_length).into());
        }
        Ok(FrozenConfig(Arc::new(self)))
    }
}

/// An immutable, shareable [`Config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrozenConfig(Arc<Config>);

impl Deref for FrozenConfig {
    type Target = Config;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for FrozenConfig {
    fn default() -> Self {
        FrozenConfig(Arc::new(Config::default()))
    }
}

/// The current process-wide configuration snapshot.
pub fn default_config() -> FrozenConfig {
    FrozenConfig(DEFAULT_CONFIG.load_full())
}

/// Replace the process-wide configuration.
///
/// Only encoders and decoders constructed afterwards see the new snapshot.
pub fn set_default_config(config: FrozenConfig) {
    debug!("Replacing the default configuration with {:?}", *config);
    DEFAULT_CONFIG.store(config.0);
}

/// Restore the process-wide configuration to [`Config::default`].
pub fn reset_default_config() {
    set_default_config(FrozenConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrokit_test_helper::TestResult;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn builder_defaults() {
        let config = Config::builder().build();
        assert_eq!(config.tag_key, "avro");
        assert_eq!(config.block_length, 100);
        assert!(!config.union_resolution_error);
        assert_eq!(config.max_byte_slice_size, DEFAULT_MAX_ALLOCATION_BYTES);
        assert_eq!(config.max_collection_items, DEFAULT_MAX_COLLECTION_ITEMS);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn freeze_rejects_zero_block_length() {
        let err = Config::builder().block_length(0).build().freeze().unwrap_err();
        assert!(matches!(err.details(), Details::InvalidBlockLength(0)));
    }

    #[test]
    fn frozen_clones_share_the_snapshot() -> TestResult {
        let frozen = Config::builder().tag_key("json").build().freeze()?;
        let clone = frozen.clone();
        assert!(Arc::ptr_eq(&frozen.0, &clone.0));
        assert_eq!(clone.tag_key, "json");
        Ok(())
    }

    #[test]
    #[serial(default_config)]
    fn replacing_the_default_does_not_touch_captured_snapshots() -> TestResult {
        let captured = default_config();
        set_default_config(Config::builder().block_length(7).build().freeze()?);

        assert_eq!(default_config().block_length, 7);
        assert_eq!(captured.block_length, DEFAULT_BLOCK_LENGTH);

        reset_default_config();
        assert_eq!(default_config().block_length, DEFAULT_BLOCK_LENGTH);
        Ok(())
    }
}
