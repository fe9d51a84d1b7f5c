// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delivery Error Types
//!
//! Unified error type for sending notifications through the gateway.

use thiserror::Error;

use crate::notification::EncodeError;

/// Errors surfaced to callers of the delivery client.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The client has been closed.
    #[error("client is not running")]
    NotRunning,

    /// Client certificate or key could not be loaded or parsed.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Dialing the gateway or the TLS handshake failed.
    #[error("connect error: {0}")]
    Connect(String),

    /// Writing to the gateway socket failed or timed out.
    #[error("write error: {0}")]
    Write(String),

    /// The notification could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] EncodeError),

    /// The client configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
