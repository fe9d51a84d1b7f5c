// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! apns-core
//!
//! Delivery client for the legacy binary push-notification protocol.
//! The gateway never confirms success and reports at most one failure per
//! connection, so the client keeps a bounded replay queue of what it has
//! written and resubmits everything after a reported failure.

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod network;
pub mod notification;
pub mod replay;
pub mod sink;

pub use client::Client;
pub use config::{CertificateSource, ClientConfig, PRODUCTION_GATEWAY, SANDBOX_GATEWAY};
pub use error::{DeliveryError, DeliveryResult};
pub use frame::{FailureReport, FrameError, Status, ERROR_RESPONSE_COMMAND, ERROR_RESPONSE_LEN};
pub use network::{Dialer, MockDialer, ScriptedDial, TlsDialer};
pub use notification::{EncodeError, Notification, Priority, PushNotification};
pub use replay::{Drained, InFlight, ReplayQueue, DEFAULT_REPLAY_CAPACITY};
pub use sink::{ChannelSink, DeliveryFailure, FailureSink};
