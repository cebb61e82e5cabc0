use async_trait::async_trait;
use certwatch_common::types::secure_url_of;
use chrono::{DateTime, Utc};
use reqwest::Url;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use crate::config::ProbeConfig;

/// Failure to read a certificate expiry from one endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("'{0}' is not an HTTP(S) endpoint")]
    InvalidTarget(String),

    #[error("TCP connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe of {host} timed out after {secs}s")]
    Timeout { host: String, secs: u64 },

    #[error("{0} presented no peer certificate")]
    NoCertificate(String),

    #[error("failed to parse certificate from {host}: {reason}")]
    Certificate { host: String, reason: String },

    #[error("TLS client configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

/// Reads the expiry of the certificate an endpoint presents.
#[async_trait]
pub trait CertificateProbe: Send + Sync {
    /// Connects to `url` on the secure scheme and returns the leaf
    /// certificate's `notAfter`.
    async fn probe(&self, url: &str) -> Result<DateTime<Utc>, ProbeError>;
}

/// Host and port a probe connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    /// Derives the TLS target from a monitor URL, upgrading `http` to
    /// `https` first.
    pub fn from_url(url: &str) -> Result<Self, ProbeError> {
        let invalid = || ProbeError::InvalidTarget(url.to_string());
        let secure = secure_url_of(url).ok_or_else(invalid)?;
        let parsed = Url::parse(&secure).map_err(|_| invalid())?;
        let host = parsed
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(invalid)?;
        let port = parsed.port_or_known_default().unwrap_or(443);
        Ok(Self { host, port })
    }
}

/// [`CertificateProbe`] backed by a rustls handshake.
pub struct TlsProbe {
    connector: TlsConnector,
    timeout_secs: u64,
}

impl TlsProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let tls_config = if config.skip_chain_validation {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(ExpiryOnlyVerifier { provider }))
                .with_no_client_auth()
        } else {
            let mut root_store = RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
            timeout_secs: config.timeout_secs,
        })
    }

    async fn fetch_expiry(&self, target: &ProbeTarget) -> Result<DateTime<Utc>, ProbeError> {
        let addr = format!("{}:{}", target.host, target.port);
        let server_name = ServerName::try_from(target.host.clone())
            .map_err(|_| ProbeError::InvalidTarget(target.host.clone()))?;

        let tcp = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(|source| ProbeError::Connect { addr, source })?;

        let tls_stream = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|source| ProbeError::Handshake {
                host: target.host.clone(),
                source,
            })?;

        let (_io, conn) = tls_stream.get_ref();
        let leaf = conn
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| ProbeError::NoCertificate(target.host.clone()))?;

        not_after(leaf.as_ref()).map_err(|reason| ProbeError::Certificate {
            host: target.host.clone(),
            reason,
        })
    }
}

/// Extracts `notAfter` from a DER-encoded certificate.
pub fn not_after(der: &[u8]) -> Result<DateTime<Utc>, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
    let secs = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("notAfter out of range: {secs}"))
}

#[async_trait]
impl CertificateProbe for TlsProbe {
    async fn probe(&self, url: &str) -> Result<DateTime<Utc>, ProbeError> {
        let target = ProbeTarget::from_url(url)?;
        tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.fetch_expiry(&target),
        )
        .await
        .map_err(|_| ProbeError::Timeout {
            host: target.host.clone(),
            secs: self.timeout_secs,
        })?
    }
}

/// Accepts any certificate chain but still checks the handshake signatures,
/// so the probe can read expiry from expired or self-signed endpoints.
#[derive(Debug)]
struct ExpiryOnlyVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for ExpiryOnlyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
