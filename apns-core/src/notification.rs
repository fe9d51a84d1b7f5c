// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Notifications
//!
//! The [`Notification`] trait is the seam between the delivery engine and
//! payload encoding. [`PushNotification`] implements the binary "frame"
//! format (command 2) accepted by the gateway.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Command byte opening a notification frame.
pub const FRAME_COMMAND: u8 = 2;

/// Size of the frame header (command + big-endian length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Length of a binary device token.
pub const DEVICE_TOKEN_SIZE: usize = 32;

/// Largest JSON payload the gateway accepts.
pub const MAX_PAYLOAD_SIZE: usize = 2048;

pub const ITEM_DEVICE_TOKEN: u8 = 1;
pub const ITEM_PAYLOAD: u8 = 2;
pub const ITEM_IDENTIFIER: u8 = 3;
pub const ITEM_EXPIRATION: u8 = 4;
pub const ITEM_PRIORITY: u8 = 5;

/// Notification encoding errors.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// Device token is not 32 bytes of hex.
    #[error("invalid device token: {0}")]
    InvalidDeviceToken(String),

    /// Encoded JSON payload exceeds [`MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Payload could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A notification that can be written to the gateway.
///
/// The delivery client assigns the sequence number; implementations embed
/// it in the encoded bytes so that error frames can be correlated.
pub trait Notification: Send + Sync + fmt::Debug + 'static {
    /// Encodes the notification with the given sequence number.
    fn encode(&self, sequence: i32) -> Result<Vec<u8>, EncodeError>;
}

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Deliver immediately.
    #[default]
    Immediate,
    /// Deliver at a time that conserves power on the device.
    PowerConserving,
}

impl Priority {
    fn as_byte(self) -> u8 {
        match self {
            Priority::Immediate => 10,
            Priority::PowerConserving => 5,
        }
    }
}

/// A push notification in the binary frame format.
///
/// # Example
///
/// ```ignore
/// use apns_core::PushNotification;
///
/// let pn = PushNotification::alert(device_token_hex, "Hello")?
///     .with_expiry(1_700_000_000);
/// client.send(Arc::new(pn)).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PushNotification {
    device_token: [u8; DEVICE_TOKEN_SIZE],
    payload: Value,
    expiry: u32,
    priority: Priority,
}

impl PushNotification {
    /// Creates a notification for a hex-encoded device token.
    pub fn new(device_token: &str, payload: Value) -> Result<Self, EncodeError> {
        let bytes = hex::decode(device_token.trim())
            .map_err(|e| EncodeError::InvalidDeviceToken(e.to_string()))?;
        let device_token: [u8; DEVICE_TOKEN_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            EncodeError::InvalidDeviceToken(format!("expected 32 bytes, got {}", b.len()))
        })?;

        Ok(PushNotification {
            device_token,
            payload,
            expiry: 0,
            priority: Priority::default(),
        })
    }

    /// Creates a notification carrying a plain alert text.
    pub fn alert(device_token: &str, text: &str) -> Result<Self, EncodeError> {
        Self::new(device_token, serde_json::json!({ "aps": { "alert": text } }))
    }

    /// Sets the expiration date (unix seconds, 0 means "do not store").
    pub fn with_expiry(mut self, expiry: u32) -> Self {
        self.expiry = expiry;
        self
    }

    /// Sets the delivery priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the device token as lowercase hex.
    pub fn device_token_hex(&self) -> String {
        hex::encode(self.device_token)
    }

    /// Returns the JSON payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

impl Notification for PushNotification {
    fn encode(&self, sequence: i32) -> Result<Vec<u8>, EncodeError> {
        let payload = serde_json::to_vec(&self.payload)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(EncodeError::PayloadTooLarge(payload.len()));
        }

        let mut items = Vec::with_capacity(DEVICE_TOKEN_SIZE + payload.len() + 32);
        push_item(&mut items, ITEM_DEVICE_TOKEN, &self.device_token);
        push_item(&mut items, ITEM_PAYLOAD, &payload);
        push_item(&mut items, ITEM_IDENTIFIER, &sequence.to_be_bytes());
        push_item(&mut items, ITEM_EXPIRATION, &self.expiry.to_be_bytes());
        push_item(&mut items, ITEM_PRIORITY, &[self.priority.as_byte()]);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + items.len());
        frame.push(FRAME_COMMAND);
        frame.extend_from_slice(&(items.len() as u32).to_be_bytes());
        frame.extend_from_slice(&items);
        Ok(frame)
    }
}

// Item data is bounded by MAX_PAYLOAD_SIZE, so the length always fits in u16.
fn push_item(buf: &mut Vec<u8>, id: u8, data: &[u8]) {
    buf.push(id);
    buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
    buf.extend_from_slice(data);
}

/// Reads the body length from a frame header.
pub fn frame_length(header: &[u8; FRAME_HEADER_SIZE]) -> usize {
    u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize
}

/// Returns the data of the first item with `id` in a frame body.
pub fn frame_item(body: &[u8], id: u8) -> Option<&[u8]> {
    let mut rest = body;
    while rest.len() >= 3 {
        let len = u16::from_be_bytes([rest[1], rest[2]]) as usize;
        let data = rest.get(3..3 + len)?;
        if rest[0] == id {
            return Some(data);
        }
        rest = &rest[3 + len..];
    }
    None
}

/// Extracts the identifier item from a frame body (the bytes after the header).
pub fn frame_identifier(body: &[u8]) -> Option<i32> {
    let data = frame_item(body, ITEM_IDENTIFIER)?;
    Some(i32::from_be_bytes(data.try_into().ok()?))
}
