// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delivery Client
//!
//! Public entry point. Assigns sequence numbers, writes notifications
//! through the [`ConnectionManager`], remembers them in the
//! [`ReplayQueue`], and replays the tail of the queue when the gateway
//! reports a failure.
//!
//! # Locking
//!
//! One async mutex per client serializes sends, reconnects, invalidation,
//! failure handling and sequence assignment. Error-frame readers never take
//! it: they post [`ReaderExit`] events on a bounded channel drained by a
//! single dispatcher task. Resends are independent tasks that contend for
//! the same mutex as fresh sends.
//!
//! # Acknowledgment
//!
//! A failure report clears the whole replay queue. Entries older than the
//! failed one are treated as delivered; the gateway never confirms success,
//! so this is the only acknowledgment the protocol allows.

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::{DeliveryError, DeliveryResult};
use crate::frame::{FailureReport, ERROR_RESPONSE_COMMAND};
use crate::network::{ConnectionManager, Dialer, ReaderExit, TlsDialer};
use crate::notification::Notification;
use crate::replay::ReplayQueue;
use crate::sink::{DeliveryFailure, FailureSink};

struct State<D: Dialer> {
    running: bool,
    counter: i32,
    sequence_bound: i32,
    connections: ConnectionManager<D>,
    queue: ReplayQueue<Arc<dyn Notification>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl<D: Dialer> State<D> {
    fn next_sequence(&mut self) -> i32 {
        let sequence = self.counter;
        self.counter = (self.counter + 1) % self.sequence_bound;
        sequence
    }
}

struct Inner<D: Dialer> {
    state: Mutex<State<D>>,
    sink: Arc<dyn FailureSink>,
}

/// Delivery client for the binary gateway protocol.
///
/// Cheap to clone; clones share the same connection and replay queue.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use apns_core::{CertificateSource, ChannelSink, Client, ClientConfig, PushNotification};
///
/// let config = ClientConfig::production(CertificateSource::files("cert.pem", "key.pem"));
/// let (sink, mut failures) = ChannelSink::new();
/// let client = Client::tls(config, sink)?;
///
/// let pn = PushNotification::alert(token, "Hello")?;
/// let sequence = client.send(Arc::new(pn)).await?;
///
/// while let Some(failure) = failures.recv().await {
///     // log, drop the device token, ...
/// }
/// ```
pub struct Client<D: Dialer> {
    inner: Arc<Inner<D>>,
}

impl<D: Dialer> Clone for Client<D> {
    fn clone(&self) -> Self {
        Client {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client<TlsDialer> {
    /// Creates a client that dials the gateway over TLS.
    ///
    /// Must be called from within a tokio runtime.
    pub fn tls(config: ClientConfig, sink: impl FailureSink) -> DeliveryResult<Self> {
        config.validate_for_tls()?;
        let dialer = TlsDialer::new(&config);
        Self::new(config, dialer, sink)
    }
}

impl<D: Dialer> Client<D> {
    /// Creates a client over any dialer.
    ///
    /// Must be called from within a tokio runtime: the failure dispatcher
    /// is spawned immediately.
    pub fn new(config: ClientConfig, dialer: D, sink: impl FailureSink) -> DeliveryResult<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(config.failure_channel_capacity);
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<D>>| {
            let dispatcher = tokio::spawn(dispatch(weak.clone(), events_rx));
            Inner {
                state: Mutex::new(State {
                    running: true,
                    counter: 0,
                    sequence_bound: config.sequence_bound,
                    connections: ConnectionManager::new(
                        dialer,
                        config.write_timeout(),
                        events_tx,
                    ),
                    queue: ReplayQueue::new(config.replay_capacity),
                    dispatcher: Some(dispatcher),
                }),
                sink: Arc::new(sink),
            }
        });

        tracing::debug!(gateway = %config.gateway, "delivery client created");
        Ok(Client { inner })
    }

    /// Sends a notification and returns the sequence number it was sent under.
    ///
    /// Success only means the bytes were written; the gateway reports
    /// failures later, through the sink.
    pub async fn send(&self, notification: Arc<dyn Notification>) -> DeliveryResult<i32> {
        self.inner.send(notification).await
    }

    /// Handles a failure report as if the gateway had sent it.
    pub async fn report_failure(&self, report: FailureReport) {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            return;
        }
        self.inner.handle_report(&mut state, report);
    }

    /// Opens the gateway connection now instead of on the next send.
    pub async fn connect(&self) -> DeliveryResult<()> {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            return Err(DeliveryError::NotRunning);
        }
        state.connections.ensure_connected().await.map(|_| ())
    }

    /// Stops the client and closes the connection. Idempotent.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            return;
        }

        state.running = false;
        state.queue.clear();
        state.connections.shutdown();
        if let Some(dispatcher) = state.dispatcher.take() {
            dispatcher.abort();
        }
        tracing::info!("delivery client closed");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.connections.is_connected()
    }

    /// Number of notifications retained for replay.
    pub async fn in_flight(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    /// Sequence numbers retained for replay, oldest first.
    pub async fn in_flight_sequences(&self) -> Vec<i32> {
        self.inner.state.lock().await.queue.sequences()
    }

    /// Sequence number the next send will use.
    pub async fn next_sequence(&self) -> i32 {
        self.inner.state.lock().await.counter
    }
}

impl<D: Dialer> Inner<D> {
    async fn send(self: &Arc<Self>, notification: Arc<dyn Notification>) -> DeliveryResult<i32> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Err(DeliveryError::NotRunning);
        }

        let sequence = state.next_sequence();
        let payload = notification.encode(sequence)?;

        match state.connections.write_with_retry(&payload).await {
            Ok(()) => {
                state.queue.push(sequence, notification);
                Ok(sequence)
            }
            Err(err) => {
                tracing::error!(sequence, error = %err, "failed to send notification");
                state.connections.discard();
                self.sink.deliver(DeliveryFailure {
                    notification,
                    sequence,
                    report: None,
                });
                Err(err)
            }
        }
    }

    async fn handle_reader_exit(self: &Arc<Self>, exit: ReaderExit) {
        let mut state = self.state.lock().await;
        if !state.running {
            return;
        }

        // The gateway closes the socket after an error frame, so the
        // connection is dropped before any resend is issued.
        state.connections.invalidate(exit.connection);
        if let Some(report) = exit.report {
            self.handle_report(&mut state, report);
        }
    }

    fn handle_report(self: &Arc<Self>, state: &mut State<D>, report: FailureReport) {
        if report.command != ERROR_RESPONSE_COMMAND {
            tracing::debug!(command = report.command, "ignoring non-error response");
            return;
        }

        let Some(drained) = state.queue.drain_from(report.sequence) else {
            tracing::warn!(
                sequence = report.sequence,
                capacity = state.queue.capacity(),
                "failed notification already evicted, replay capacity is too small"
            );
            return;
        };

        tracing::info!(
            sequence = report.sequence,
            status = %report.status,
            resend = drained.resend.len(),
            "replaying notifications after gateway failure"
        );
        self.sink.deliver(DeliveryFailure {
            notification: drained.failed.item,
            sequence: drained.failed.sequence,
            report: Some(report),
        });
        state.queue.clear();

        for entry in drained.resend {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = inner.send(entry.item).await {
                    tracing::warn!(previous = entry.sequence, error = %err, "resend failed");
                }
            });
        }
    }
}

/// Serializes reader exits into the client, one at a time.
async fn dispatch<D: Dialer>(inner: Weak<Inner<D>>, mut events: mpsc::Receiver<ReaderExit>) {
    while let Some(exit) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_reader_exit(exit).await;
    }
}
