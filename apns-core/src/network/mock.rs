// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Dialer
//!
//! In-memory [`Dialer`] for testing. Each accepted dial creates a duplex
//! pipe; the gateway end is handed to a [`MockGatewayListener`] so a test
//! can play the gateway: read notification frames and write error frames.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use super::transport::{Dialer, GatewayStream, TransportResult};
use crate::error::DeliveryError;
use crate::frame::{FailureReport, Status};
use crate::notification::{
    frame_identifier, frame_item, frame_length, FRAME_HEADER_SIZE, ITEM_PAYLOAD,
};

pub(crate) const PIPE_CAPACITY: usize = 64 * 1024;

/// What the next dial should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedDial {
    /// Open a connection and hand the gateway end to the listener.
    Accept,
    /// Open a connection whose gateway end is already closed.
    Dead,
    /// Fail with [`DeliveryError::Connect`].
    FailConnect(String),
    /// Fail with [`DeliveryError::Certificate`].
    FailCertificate(String),
}

struct MockShared {
    script: VecDeque<ScriptedDial>,
    dials: usize,
}

/// Scriptable in-memory dialer. Clones share state.
///
/// Unscripted dials accept.
#[derive(Clone)]
pub struct MockDialer {
    shared: Arc<Mutex<MockShared>>,
    gateways: mpsc::UnboundedSender<MockGateway>,
}

impl MockDialer {
    /// Creates a dialer and the listener receiving its gateway ends.
    pub fn new() -> (Self, MockGatewayListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dialer = MockDialer {
            shared: Arc::new(Mutex::new(MockShared {
                script: VecDeque::new(),
                dials: 0,
            })),
            gateways: tx,
        };
        (dialer, MockGatewayListener { rx })
    }

    /// Queues the behaviour of a future dial.
    pub fn script(&self, dial: ScriptedDial) {
        self.shared.lock().script.push_back(dial);
    }

    /// Number of dial attempts so far.
    pub fn dial_count(&self) -> usize {
        self.shared.lock().dials
    }
}

impl std::fmt::Debug for MockDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("MockDialer")
            .field("dials", &shared.dials)
            .field("script", &shared.script)
            .finish()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&mut self) -> TransportResult<GatewayStream> {
        let (number, next) = {
            let mut shared = self.shared.lock();
            shared.dials += 1;
            let next = shared.script.pop_front().unwrap_or(ScriptedDial::Accept);
            (shared.dials, next)
        };

        match next {
            ScriptedDial::Accept => {
                let (client, gateway) = tokio::io::duplex(PIPE_CAPACITY);
                // A dropped listener leaves the connection dead
                let _ = self.gateways.send(MockGateway {
                    stream: gateway,
                    number,
                });
                Ok(Box::new(client))
            }
            ScriptedDial::Dead => {
                let (client, _gateway) = tokio::io::duplex(PIPE_CAPACITY);
                Ok(Box::new(client))
            }
            ScriptedDial::FailConnect(reason) => Err(DeliveryError::Connect(reason)),
            ScriptedDial::FailCertificate(reason) => Err(DeliveryError::Certificate(reason)),
        }
    }
}

/// Receives the gateway ends of accepted mock connections.
#[derive(Debug)]
pub struct MockGatewayListener {
    rx: mpsc::UnboundedReceiver<MockGateway>,
}

impl MockGatewayListener {
    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MockGateway> {
        self.rx.recv().await
    }

    /// Returns an already accepted connection without waiting.
    pub fn try_accept(&mut self) -> Option<MockGateway> {
        self.rx.try_recv().ok()
    }
}

/// A notification frame read by the mock gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFrame {
    pub command: u8,
    pub body: Vec<u8>,
}

impl MockFrame {
    /// Identifier item (the sequence number the client assigned).
    pub fn sequence(&self) -> Option<i32> {
        frame_identifier(&self.body)
    }

    /// Payload item parsed as JSON.
    pub fn payload(&self) -> Option<serde_json::Value> {
        frame_item(&self.body, ITEM_PAYLOAD).and_then(|data| serde_json::from_slice(data).ok())
    }
}

/// Gateway side of one mock connection. Dropping it closes the connection.
#[derive(Debug)]
pub struct MockGateway {
    stream: DuplexStream,
    number: usize,
}

impl MockGateway {
    /// Which dial (1-based) produced this connection.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Reads one notification frame.
    pub async fn read_frame(&mut self) -> io::Result<MockFrame> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.stream.read_exact(&mut header).await?;
        let mut body = vec![0u8; frame_length(&header)];
        self.stream.read_exact(&mut body).await?;
        Ok(MockFrame {
            command: header[0],
            body,
        })
    }

    /// Reads exactly `len` raw bytes.
    pub async fn read_exact(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Writes an error-response frame.
    pub async fn send_error(&mut self, status: Status, sequence: i32) -> io::Result<()> {
        self.send_raw(&FailureReport::new(status, sequence).to_bytes())
            .await
    }

    /// Writes arbitrary bytes to the client.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }
}
