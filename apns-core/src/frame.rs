// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error Frames
//!
//! The gateway answers a bad notification with a single 6-byte frame and
//! then closes the connection:
//!
//! ```text
//! +---------+--------+---------------------------+
//! | command | status | sequence (i32, big-endian) |
//! |  1 byte | 1 byte |          4 bytes           |
//! +---------+--------+---------------------------+
//! ```

use std::fmt;

use thiserror::Error;

/// Command byte of an error-response frame.
pub const ERROR_RESPONSE_COMMAND: u8 = 8;

/// Length of an error-response frame.
pub const ERROR_RESPONSE_LEN: usize = 6;

/// Reasons a frame was not turned into a [`FailureReport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown error response command: {0}")]
    UnknownCommand(u8),

    #[error("unknown error response status: {0}")]
    UnknownStatus(u8),
}

/// Status codes the gateway reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NoErrors,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    InvalidFrameItemId,
    Unknown,
}

impl Status {
    /// Looks up a status code; `None` for codes outside the table.
    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => Status::NoErrors,
            1 => Status::ProcessingError,
            2 => Status::MissingDeviceToken,
            3 => Status::MissingTopic,
            4 => Status::MissingPayload,
            5 => Status::InvalidTokenSize,
            6 => Status::InvalidTopicSize,
            7 => Status::InvalidPayloadSize,
            8 => Status::InvalidToken,
            10 => Status::Shutdown,
            128 => Status::InvalidFrameItemId,
            255 => Status::Unknown,
            _ => return None,
        };
        Some(status)
    }

    /// Wire code of this status.
    pub fn code(self) -> u8 {
        match self {
            Status::NoErrors => 0,
            Status::ProcessingError => 1,
            Status::MissingDeviceToken => 2,
            Status::MissingTopic => 3,
            Status::MissingPayload => 4,
            Status::InvalidTokenSize => 5,
            Status::InvalidTopicSize => 6,
            Status::InvalidPayloadSize => 7,
            Status::InvalidToken => 8,
            Status::Shutdown => 10,
            Status::InvalidFrameItemId => 128,
            Status::Unknown => 255,
        }
    }

    /// Human-readable reason.
    pub fn reason(self) -> &'static str {
        match self {
            Status::NoErrors => "No errors encountered",
            Status::ProcessingError => "Processing error",
            Status::MissingDeviceToken => "Missing device token",
            Status::MissingTopic => "Missing topic",
            Status::MissingPayload => "Missing payload",
            Status::InvalidTokenSize => "Invalid token size",
            Status::InvalidTopicSize => "Invalid topic size",
            Status::InvalidPayloadSize => "Invalid payload size",
            Status::InvalidToken => "Invalid token",
            Status::Shutdown => "Shutdown",
            Status::InvalidFrameItemId => "Invalid frame item id",
            Status::Unknown => "None (unknown)",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason(), self.code())
    }
}

/// A failure reported by the gateway for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureReport {
    pub command: u8,
    pub status: Status,
    /// Sequence number of the first notification the gateway rejected.
    pub sequence: i32,
}

impl FailureReport {
    /// Creates a report with the standard error-response command.
    pub fn new(status: Status, sequence: i32) -> Self {
        FailureReport {
            command: ERROR_RESPONSE_COMMAND,
            status,
            sequence,
        }
    }

    /// Parses a raw error-response frame.
    pub fn parse(frame: &[u8; ERROR_RESPONSE_LEN]) -> Result<Self, FrameError> {
        let command = frame[0];
        if command != ERROR_RESPONSE_COMMAND {
            return Err(FrameError::UnknownCommand(command));
        }
        let status = Status::from_code(frame[1]).ok_or(FrameError::UnknownStatus(frame[1]))?;
        let sequence = i32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]);

        Ok(FailureReport {
            command,
            status,
            sequence,
        })
    }

    /// Encodes the report as a wire frame.
    pub fn to_bytes(&self) -> [u8; ERROR_RESPONSE_LEN] {
        let seq = self.sequence.to_be_bytes();
        [self.command, self.status.code(), seq[0], seq[1], seq[2], seq[3]]
    }
}
