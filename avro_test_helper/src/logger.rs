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

//! A `log` implementation that keeps the messages of the current thread so tests can assert on
//! them.

use log::{LevelFilter, Log, Metadata, Record};
use std::{cell::RefCell, sync::Once};

thread_local! {
    static LOG_MESSAGES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

struct TestLogger;

impl Log for TestLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let message = format!("{}", record.args());
        LOG_MESSAGES.with(|messages| messages.borrow_mut().push(message));
    }

    fn flush(&self) {}
}

static LOGGER: TestLogger = TestLogger;
static INSTALL: Once = Once::new();

pub(crate) fn install() {
    INSTALL.call_once(|| {
        // Another logger may already be installed by the test binary; ours is then a no-op.
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Removes all messages captured on the current thread.
pub fn clear_log_messages() {
    LOG_MESSAGES.with(|messages| messages.borrow_mut().clear());
}

/// Panics unless `expected` was logged on the current thread. The message is consumed.
#[track_caller]
pub fn assert_logged(expected: &str) {
    let found = LOG_MESSAGES.with(|messages| {
        let mut messages = messages.borrow_mut();
        match messages.iter().position(|m| m == expected) {
            Some(index) => {
                messages.remove(index);
                true
            }
            None => false,
        }
    });
    assert!(found, "Expected log message not found: '{expected}'");
}

/// Panics if `unexpected` was logged on the current thread.
#[track_caller]
pub fn assert_not_logged(unexpected: &str) {
    LOG_MESSAGES.with(|messages| {
        if messages.borrow().iter().any(|m| m == unexpected) {
            panic!("The following log message should not have been logged: '{unexpected}'");
        }
    });
}
