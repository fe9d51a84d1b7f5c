// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Layer
//!
//! Connection lifecycle for the gateway.
//!
//! # Architecture
//!
//! The network layer consists of:
//! - **Dialer trait**: opens a fresh gateway stream (TLS in production, pipes in tests)
//! - **Connection manager**: caches one connection, reconnects once on write failure
//! - **Error-frame reader**: one single-shot listener per connection
//!
//! # Example
//!
//! ```ignore
//! use apns_core::network::{MockDialer, ScriptedDial};
//!
//! let (dialer, mut listener) = MockDialer::new();
//! dialer.script(ScriptedDial::Dead); // first connection fails on write
//! let client = Client::new(config, dialer.clone(), sink)?;
//! client.send(notification).await?;
//!
//! let mut gateway = listener.accept().await.unwrap();
//! let frame = gateway.read_frame().await?;
//! gateway.send_error(Status::InvalidToken, frame.sequence().unwrap()).await?;
//! ```

mod connection;
mod mock;
mod reader;
mod tls;
mod transport;

pub use connection::ConnectionManager;
pub use mock::{MockDialer, MockFrame, MockGateway, MockGatewayListener, ScriptedDial};
pub use reader::{ErrorFrameReader, ReadOutcome, ReaderExit, ReaderState};
pub use tls::{build_tls_config, load_key_pair, KeyPair, TlsDialer};
pub use transport::{ConnectionId, Dialer, GatewayIo, GatewayStream, TransportResult};
