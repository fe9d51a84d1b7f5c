// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Failure Sink
//!
//! Where the client hands notifications it could not deliver.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::frame::FailureReport;
use crate::notification::Notification;

/// A notification that failed, with the gateway's report if there was one.
///
/// `report` is `None` when the failure was local (certificate, dial or
/// write error) rather than an error frame from the gateway.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub notification: Arc<dyn Notification>,
    pub sequence: i32,
    pub report: Option<FailureReport>,
}

/// Consumer of delivery failures.
///
/// `deliver` runs inline on the client's send path with the client lock
/// held. Every send and resend waits for it to return, so an
/// implementation must only hand the failure off (a channel send, a
/// spawned task) and return. Blocking I/O inside `deliver` stalls the
/// client, and calling back into the client from it deadlocks.
///
/// [`ChannelSink`] never blocks: its channel is unbounded, and failures
/// queue up even while nobody is receiving.
pub trait FailureSink: Send + Sync + 'static {
    fn deliver(&self, failure: DeliveryFailure);
}

impl<F> FailureSink for F
where
    F: Fn(DeliveryFailure) + Send + Sync + 'static,
{
    fn deliver(&self, failure: DeliveryFailure) {
        self(failure)
    }
}

/// Sink forwarding failures into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DeliveryFailure>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes its failures.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeliveryFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl FailureSink for ChannelSink {
    fn deliver(&self, failure: DeliveryFailure) {
        if self.tx.send(failure).is_err() {
            tracing::debug!("failure receiver dropped, discarding delivery failure");
        }
    }
}
