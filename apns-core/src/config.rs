// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client Configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::replay::DEFAULT_REPLAY_CAPACITY;

/// Production gateway address.
pub const PRODUCTION_GATEWAY: &str = "gateway.push.apple.com:2195";

/// Sandbox gateway address.
pub const SANDBOX_GATEWAY: &str = "gateway.sandbox.push.apple.com:2195";

/// Where the client certificate and private key come from.
///
/// Raw PEM blocks take the place of files; files are only read when no
/// blocks were given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CertificateSource {
    /// PEM files on disk.
    Files { cert: PathBuf, key: PathBuf },
    /// PEM-encoded certificate chain and key held in memory.
    Pem { cert: String, key: String },
}

impl CertificateSource {
    /// Certificate and key PEM files.
    pub fn files(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        CertificateSource::Files {
            cert: cert.into(),
            key: key.into(),
        }
    }

    /// Certificate and key PEM blocks.
    pub fn pem(cert: impl Into<String>, key: impl Into<String>) -> Self {
        CertificateSource::Pem {
            cert: cert.into(),
            key: key.into(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            CertificateSource::Files { cert, key } => {
                cert.as_os_str().is_empty() || key.as_os_str().is_empty()
            }
            CertificateSource::Pem { cert, key } => cert.is_empty() || key.is_empty(),
        }
    }
}

impl Default for CertificateSource {
    fn default() -> Self {
        CertificateSource::Files {
            cert: PathBuf::new(),
            key: PathBuf::new(),
        }
    }
}

/// Configuration for the delivery client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway address (`host:port`).
    pub gateway: String,
    /// Client certificate and key.
    pub certificate: CertificateSource,
    /// Additional PEM root certificates trusted for the gateway.
    pub extra_root_pem: Option<String>,
    /// Dial and TLS handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Write timeout in milliseconds.
    pub write_timeout_ms: u64,
    /// Number of in-flight notifications retained for replay.
    pub replay_capacity: usize,
    /// Sequence numbers wrap to 0 on reaching this bound.
    pub sequence_bound: i32,
    /// Buffer size of the internal error-report channel.
    pub failure_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            gateway: SANDBOX_GATEWAY.to_string(),
            certificate: CertificateSource::default(),
            extra_root_pem: None,
            connect_timeout_ms: 60_000,
            write_timeout_ms: 60_000,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            sequence_bound: i32::MAX,
            failure_channel_capacity: 10,
        }
    }
}

impl ClientConfig {
    /// Creates a config for a gateway address.
    pub fn new(gateway: &str, certificate: CertificateSource) -> Self {
        ClientConfig {
            gateway: gateway.to_string(),
            certificate,
            ..Default::default()
        }
    }

    /// Creates a config for the production gateway.
    pub fn production(certificate: CertificateSource) -> Self {
        Self::new(PRODUCTION_GATEWAY, certificate)
    }

    /// Creates a config for the sandbox gateway.
    pub fn sandbox(certificate: CertificateSource) -> Self {
        Self::new(SANDBOX_GATEWAY, certificate)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Host part of the gateway address, used as the TLS server name.
    pub fn server_name(&self) -> &str {
        let gateway = self.gateway.as_str();
        if let Some(rest) = gateway.strip_prefix('[') {
            // [v6]:port
            return rest.split(']').next().unwrap_or(rest);
        }
        match gateway.rsplit_once(':') {
            Some((host, _port)) => host,
            None => gateway,
        }
    }

    /// Checks the settings the delivery engine relies on.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.gateway.trim().is_empty() {
            return Err(DeliveryError::Configuration("gateway is empty".into()));
        }
        if self.replay_capacity == 0 {
            return Err(DeliveryError::Configuration(
                "replay capacity must be at least 1".into(),
            ));
        }
        if self.sequence_bound <= 0 {
            return Err(DeliveryError::Configuration(
                "sequence bound must be positive".into(),
            ));
        }
        // Sequence numbers must stay unique across the retained window
        if self.replay_capacity >= self.sequence_bound as usize {
            return Err(DeliveryError::Configuration(format!(
                "replay capacity {} must be below sequence bound {}",
                self.replay_capacity, self.sequence_bound
            )));
        }
        if self.failure_channel_capacity == 0 {
            return Err(DeliveryError::Configuration(
                "failure channel capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), and also requires certificate material.
    pub fn validate_for_tls(&self) -> Result<(), DeliveryError> {
        self.validate()?;
        if self.certificate.is_empty() {
            return Err(DeliveryError::Certificate(
                "no certificate or key configured".into(),
            ));
        }
        Ok(())
    }
}
