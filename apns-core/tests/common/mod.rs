// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for the delivery tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use apns_core::{ClientConfig, EncodeError, Notification, PushNotification};

pub const TOKEN: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Alert notification whose text is `n{index}`.
pub fn notification(index: usize) -> Arc<dyn Notification> {
    Arc::new(PushNotification::alert(TOKEN, &format!("n{}", index)).unwrap())
}

/// Alert text of a frame written by [`notification`].
pub fn alert_of(payload: &serde_json::Value) -> String {
    payload["aps"]["alert"].as_str().unwrap_or_default().to_string()
}

/// Config with small, test-friendly limits.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        replay_capacity: 100,
        sequence_bound: 10_000,
        write_timeout_ms: 2_000,
        connect_timeout_ms: 2_000,
        ..Default::default()
    }
}

/// Awaits a future, failing the test if it takes longer than [`WAIT`].
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting")
}

/// A notification that never encodes.
#[derive(Debug)]
pub struct Unencodable;

impl Notification for Unencodable {
    fn encode(&self, _sequence: i32) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::PayloadTooLarge(usize::MAX))
    }
}
