// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! TLS Dialer
//!
//! Production [`Dialer`]: TCP with a bounded dial timeout, then a rustls
//! handshake presenting the client certificate, pinned to the gateway's
//! host name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::{ClientConfig as TlsConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use super::transport::{Dialer, GatewayStream, TransportResult};
use crate::config::{CertificateSource, ClientConfig};
use crate::error::DeliveryError;

/// Certificate chain and private key for client authentication.
pub type KeyPair = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

/// Loads the client certificate chain and key.
pub fn load_key_pair(source: &CertificateSource) -> Result<KeyPair, DeliveryError> {
    let (certs, key) = match source {
        CertificateSource::Pem { cert, key } => {
            let certs = CertificateDer::pem_slice_iter(cert.as_bytes())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DeliveryError::Certificate(format!("invalid certificate: {}", e)))?;
            let key = PrivateKeyDer::from_pem_slice(key.as_bytes())
                .map_err(|e| DeliveryError::Certificate(format!("invalid key: {}", e)))?;
            (certs, key)
        }
        CertificateSource::Files { cert, key } => {
            let certs = CertificateDer::pem_file_iter(cert)
                .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
                .map_err(|e| {
                    DeliveryError::Certificate(format!("{}: {}", cert.display(), e))
                })?;
            let key = PrivateKeyDer::from_pem_file(key)
                .map_err(|e| DeliveryError::Certificate(format!("{}: {}", key.display(), e)))?;
            (certs, key)
        }
    };

    if certs.is_empty() {
        return Err(DeliveryError::Certificate(
            "no certificate found in PEM input".into(),
        ));
    }
    Ok((certs, key))
}

/// Builds the rustls client config: TLS 1.2 minimum, webpki roots plus any
/// extra PEM roots, client certificate attached.
pub fn build_tls_config(
    key_pair: KeyPair,
    extra_root_pem: Option<&str>,
) -> Result<TlsConfig, DeliveryError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    if let Some(pem) = extra_root_pem {
        for cert in CertificateDer::pem_slice_iter(pem.as_bytes()) {
            let cert = cert
                .map_err(|e| DeliveryError::Certificate(format!("invalid root: {}", e)))?;
            roots
                .add(cert)
                .map_err(|e| DeliveryError::Certificate(format!("invalid root: {}", e)))?;
        }
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let (certs, key) = key_pair;
    TlsConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| DeliveryError::Certificate(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| DeliveryError::Certificate(format!("invalid key pair: {}", e)))
}

/// Dials the gateway over TLS with a client certificate.
pub struct TlsDialer {
    gateway: String,
    server_name: String,
    certificate: CertificateSource,
    extra_root_pem: Option<String>,
    connect_timeout: Duration,
    connector: Option<TlsConnector>,
}

impl TlsDialer {
    /// Creates a dialer. Key material is loaded on the first dial.
    pub fn new(config: &ClientConfig) -> Self {
        TlsDialer {
            gateway: config.gateway.clone(),
            server_name: config.server_name().to_string(),
            certificate: config.certificate.clone(),
            extra_root_pem: config.extra_root_pem.clone(),
            connect_timeout: config.connect_timeout(),
            connector: None,
        }
    }

    /// Returns true once the certificate has been loaded successfully.
    pub fn has_certificate(&self) -> bool {
        self.connector.is_some()
    }

    fn connector(&mut self) -> Result<TlsConnector, DeliveryError> {
        if let Some(connector) = &self.connector {
            return Ok(connector.clone());
        }

        let key_pair = load_key_pair(&self.certificate).inspect_err(|e| {
            tracing::error!(error = %e, "failed to load client certificate");
        })?;
        let config = build_tls_config(key_pair, self.extra_root_pem.as_deref())?;
        let connector = TlsConnector::from(Arc::new(config));
        self.connector = Some(connector.clone());
        Ok(connector)
    }
}

impl std::fmt::Debug for TlsDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsDialer")
            .field("gateway", &self.gateway)
            .field("server_name", &self.server_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("has_certificate", &self.has_certificate())
            .finish()
    }
}

#[async_trait]
impl Dialer for TlsDialer {
    async fn dial(&mut self) -> TransportResult<GatewayStream> {
        let connector = self.connector()?;
        let server_name = ServerName::try_from(self.server_name.clone()).map_err(|e| {
            DeliveryError::Connect(format!("invalid server name {}: {}", self.server_name, e))
        })?;

        tracing::debug!(gateway = %self.gateway, "dialing gateway");
        let tcp = timeout(self.connect_timeout, TcpStream::connect(&self.gateway))
            .await
            .map_err(|_| DeliveryError::Connect(format!("dial {} timed out", self.gateway)))?
            .map_err(|e| DeliveryError::Connect(format!("dial {} failed: {}", self.gateway, e)))?;

        let tls = timeout(self.connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| DeliveryError::Connect("TLS handshake timed out".into()))?
            .map_err(|e| DeliveryError::Connect(format!("TLS handshake failed: {}", e)))?;

        tracing::debug!(gateway = %self.gateway, "TLS handshake complete");
        Ok(Box::new(tls))
    }
}
