// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error-Frame Reader
//!
//! One reader runs per connection. The gateway writes at most one error
//! frame per connection and then closes it, so the reader is single-shot:
//! it performs one read of [`ERROR_RESPONSE_LEN`] bytes, moves from
//! [`ReaderState::Waiting`] to [`ReaderState::Done`], reports, and exits.
//!
//! Every exit tells the client the connection is finished. The client
//! clears its cached connection only if it still has the same
//! [`ConnectionId`].

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use super::transport::ConnectionId;
use crate::frame::{FailureReport, FrameError, ERROR_RESPONSE_LEN};

/// Sent to the client when a reader terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderExit {
    pub connection: ConnectionId,
    /// The parsed failure, if a recognized frame was read.
    pub report: Option<FailureReport>,
}

/// How a read ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A recognized error frame.
    Report(FailureReport),
    /// A full frame that could not be recognized.
    Discarded(FrameError),
    /// The socket closed or failed before a full frame arrived.
    Closed(io::ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Waiting,
    Done(ReadOutcome),
}

/// Single-shot listener for the gateway's error frame.
#[derive(Debug)]
pub struct ErrorFrameReader {
    connection: ConnectionId,
    state: ReaderState,
}

impl ErrorFrameReader {
    pub fn new(connection: ConnectionId) -> Self {
        ErrorFrameReader {
            connection,
            state: ReaderState::Waiting,
        }
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Reads one frame. Does nothing once the reader is done.
    pub async fn advance<R: AsyncRead + Unpin>(&mut self, stream: &mut R) {
        if self.state != ReaderState::Waiting {
            return;
        }

        let mut frame = [0u8; ERROR_RESPONSE_LEN];
        let outcome = match stream.read_exact(&mut frame).await {
            Ok(_) => match FailureReport::parse(&frame) {
                Ok(report) => ReadOutcome::Report(report),
                Err(e) => ReadOutcome::Discarded(e),
            },
            Err(e) => ReadOutcome::Closed(e.kind()),
        };
        self.state = ReaderState::Done(outcome);
    }

    /// Runs the reader to completion and notifies the client.
    ///
    /// The stream is dropped before the exit is sent.
    pub async fn run<R: AsyncRead + Unpin>(mut self, mut stream: R, events: mpsc::Sender<ReaderExit>) {
        self.advance(&mut stream).await;
        drop(stream);

        let report = match &self.state {
            ReaderState::Done(ReadOutcome::Report(report)) => {
                tracing::info!(
                    connection = %self.connection,
                    sequence = report.sequence,
                    status = %report.status,
                    "gateway reported failure"
                );
                Some(*report)
            }
            ReaderState::Done(ReadOutcome::Discarded(e)) => {
                tracing::warn!(connection = %self.connection, error = %e, "discarding error frame");
                None
            }
            ReaderState::Done(ReadOutcome::Closed(kind)) => {
                tracing::debug!(connection = %self.connection, ?kind, "gateway connection closed");
                None
            }
            ReaderState::Waiting => None,
        };

        let exit = ReaderExit {
            connection: self.connection,
            report,
        };
        if events.send(exit).await.is_err() {
            tracing::debug!(connection = %self.connection, "client closed, dropping reader exit");
        }
    }
}
