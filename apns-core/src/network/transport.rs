// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Dialer Trait
//!
//! Abstraction over how a gateway stream is opened, so the delivery engine
//! can run against TLS in production and in-memory pipes in tests.

use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::DeliveryError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, DeliveryError>;

/// A bidirectional byte stream to the gateway.
pub trait GatewayIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> GatewayIo for T {}

/// Boxed gateway stream as returned by a [`Dialer`].
pub type GatewayStream = Box<dyn GatewayIo>;

/// Identity of one opened connection.
///
/// Ids are never reused within a client, so a reader can tell whether the
/// connection it was bound to is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opens connections to the gateway.
///
/// Implementations load key material lazily and keep it for their
/// lifetime. Errors must be [`DeliveryError::Certificate`] for bad key
/// material and [`DeliveryError::Connect`] for dial or handshake failures.
///
/// # Example
///
/// ```ignore
/// use apns_core::network::{Dialer, TlsDialer};
///
/// let mut dialer = TlsDialer::new(&config);
/// let stream = dialer.dial().await?;
/// ```
#[async_trait]
pub trait Dialer: Send + 'static {
    /// Opens a fresh, fully handshaken stream.
    async fn dial(&mut self) -> TransportResult<GatewayStream>;
}
