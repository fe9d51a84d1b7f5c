// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Manager
//!
//! Keeps at most one live gateway connection, opening it lazily and
//! replacing it after failures.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::reader::{ErrorFrameReader, ReaderExit};
use super::transport::{ConnectionId, Dialer, GatewayStream, TransportResult};
use crate::error::DeliveryError;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

struct LiveConnection {
    id: ConnectionId,
    writer: WriteHalf<GatewayStream>,
    reader: JoinHandle<()>,
}

impl LiveConnection {
    /// Shuts the write half down in the background and hands back the
    /// reader, which keeps running until it has read its frame or the
    /// gateway closes the socket.
    fn retire(self) -> JoinHandle<()> {
        let mut writer = self.writer;
        tokio::spawn(async move {
            let _ = timeout(CLOSE_TIMEOUT, writer.shutdown()).await;
        });
        self.reader
    }
}

/// Owner of the single cached gateway connection.
///
/// Wraps a [`Dialer`] and adds:
/// - Lazy connection on first use
/// - One reconnect-and-retry on write failure
/// - A spawned [`ErrorFrameReader`] per connection, left running after
///   its connection is replaced so a pending error frame is still reported
/// - Compare-and-clear invalidation by [`ConnectionId`]
///
/// # Example
///
/// ```ignore
/// use apns_core::network::{ConnectionManager, TlsDialer};
///
/// let (tx, rx) = tokio::sync::mpsc::channel(10);
/// let mut conn = ConnectionManager::new(TlsDialer::new(&config), config.write_timeout(), tx);
/// conn.write_with_retry(&payload).await?;
/// ```
pub struct ConnectionManager<D: Dialer> {
    dialer: D,
    current: Option<LiveConnection>,
    retired: Vec<JoinHandle<()>>,
    next_id: u64,
    write_timeout: Duration,
    events: Option<mpsc::Sender<ReaderExit>>,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Creates a manager. Readers report their exit on `events`.
    pub fn new(dialer: D, write_timeout: Duration, events: mpsc::Sender<ReaderExit>) -> Self {
        ConnectionManager {
            dialer,
            current: None,
            retired: Vec::new(),
            next_id: 0,
            write_timeout,
            events: Some(events),
        }
    }

    /// Returns true if a connection is cached.
    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    /// Id of the cached connection, if any.
    pub fn current_id(&self) -> Option<ConnectionId> {
        self.current.as_ref().map(|c| c.id)
    }

    /// Returns the cached connection, dialing a new one if there is none.
    pub async fn ensure_connected(&mut self) -> TransportResult<ConnectionId> {
        if let Some(conn) = &self.current {
            return Ok(conn.id);
        }

        let events = self.events.clone().ok_or(DeliveryError::NotRunning)?;
        let stream = self.dialer.dial().await.inspect_err(|e| {
            tracing::warn!(error = %e, "failed to open gateway connection");
        })?;

        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = tokio::spawn(ErrorFrameReader::new(id).run(read_half, events));

        tracing::info!(connection = %id, "gateway connection opened");
        self.current = Some(LiveConnection {
            id,
            writer: write_half,
            reader,
        });
        Ok(id)
    }

    /// Writes and flushes a payload on the cached connection.
    pub async fn write(&mut self, payload: &[u8]) -> TransportResult<()> {
        let conn = self
            .current
            .as_mut()
            .ok_or_else(|| DeliveryError::Write("not connected".into()))?;

        let write = async {
            conn.writer.write_all(payload).await?;
            conn.writer.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        timeout(self.write_timeout, write)
            .await
            .map_err(|_| DeliveryError::Write("write timed out".into()))?
            .map_err(|e| DeliveryError::Write(e.to_string()))
    }

    /// Writes a payload, reconnecting and retrying once if the write fails.
    pub async fn write_with_retry(&mut self, payload: &[u8]) -> TransportResult<()> {
        self.ensure_connected().await?;

        match self.write(payload).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "write failed, reconnecting");
                self.discard();
                self.ensure_connected().await?;
                self.write(payload).await
            }
        }
    }

    /// Clears the cached connection if it is still `id`.
    ///
    /// Returns false when `id` was already superseded.
    pub fn invalidate(&mut self, id: ConnectionId) -> bool {
        if self.current_id() != Some(id) {
            return false;
        }
        tracing::debug!(connection = %id, "invalidating gateway connection");
        self.discard();
        true
    }

    /// Drops the cached connection, if any.
    ///
    /// Only the write half is closed. The connection's reader still reports
    /// an error frame the gateway sent before the drop.
    pub fn discard(&mut self) {
        if let Some(conn) = self.current.take() {
            tracing::debug!(connection = %conn.id, "discarding gateway connection");
            self.retired.retain(|reader| !reader.is_finished());
            self.retired.push(conn.retire());
        }
    }

    /// Discards the connection, stops every reader and refuses to open new
    /// connections.
    pub fn shutdown(&mut self) {
        self.discard();
        for reader in self.retired.drain(..) {
            reader.abort();
        }
        self.events = None;
    }

    /// Returns a reference to the underlying dialer.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }
}

impl<D: Dialer> Drop for ConnectionManager<D> {
    fn drop(&mut self) {
        if let Some(conn) = self.current.take() {
            conn.reader.abort();
        }
        for reader in self.retired.drain(..) {
            reader.abort();
        }
    }
}
