//! Reading certificate chains from TLS endpoints.
//!
//! Verified reads use a rustls `ClientConfig` that:
//!
//! 1. Loads system CA certificates (e.g. `/etc/ssl/certs`), which picks up
//!    private CAs mounted into the container.
//! 2. Always includes Mozilla's bundled root certificates as a baseline,
//!    so public issuers work even in minimal containers with no system
//!    cert store.
//!
//! Unverified reads still complete a full handshake, including the
//! signature checks, but accept whatever chain and server name the peer
//! presents. Either way the chain returned is the one the peer sent.
//!
//! We use `ring` as the cryptography backend instead of the default
//! `aws-lc-rs`. The provider is passed to the config builder explicitly, so
//! no process-wide default has to be installed.

use crate::aws::Metered;
use crate::error::Error;
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fmt;
use std::io;
use std::sync::{Arc, LazyLock};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

const DEFAULT_HTTPS_PORT: u16 = 443;

/// Peer certificates in the order received, leaf first.
pub type CertificateChain = Vec<CertificateDer<'static>>;

/// A validated `https` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP literal, without IPv6 brackets.
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse an issuer URL. Only `https` is accepted; the port defaults to 443.
    pub fn parse(endpoint_url: &str) -> Result<Self, Error> {
        let url = Url::parse(endpoint_url)
            .map_err(|err| Error::InvalidUrl(format!("{endpoint_url}: {err}")))?;

        if url.scheme() != "https" {
            return Err(Error::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(Error::InvalidUrl(format!("{endpoint_url}: missing host"))),
        };

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_HTTPS_PORT),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Performs one TLS handshake and returns the peer's certificate chain.
#[async_trait]
pub trait TlsDialer: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint, verify: bool) -> Result<CertificateChain, Error>;
}

/// Read the certificate chain served at `endpoint_url`.
///
/// The URL is validated before anything touches the network.
pub async fn read_chain(
    dialer: &dyn TlsDialer,
    endpoint_url: &str,
    verify: bool,
) -> Result<CertificateChain, Error> {
    let endpoint = Endpoint::parse(endpoint_url)?;
    tracing::debug!(%endpoint, verify, "Reading certificates from endpoint");
    dialer.dial(&endpoint, verify).await
}

/// Dials over TCP with rustls.
#[derive(Debug, Default)]
pub struct RustlsDialer;

#[async_trait]
impl TlsDialer for RustlsDialer {
    async fn dial(&self, endpoint: &Endpoint, verify: bool) -> Result<CertificateChain, Error> {
        let connection_error = |source: io::Error| Error::Connection {
            endpoint: endpoint.to_string(),
            source,
        };

        let config = client_config(verify).map_err(|err| connection_error(io::Error::other(err)))?;
        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|err| connection_error(io::Error::new(io::ErrorKind::InvalidInput, err)))?;

        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(connection_error)?;

        // The stream is dropped when this function returns, whatever the outcome.
        let mut stream = TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await
            .map_err(connection_error)?;

        let chain = stream
            .get_ref()
            .1
            .peer_certificates()
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        if let Err(err) = stream.shutdown().await {
            tracing::debug!(%endpoint, %err, "TLS shutdown failed");
        }

        if chain.is_empty() {
            return Err(connection_error(io::Error::new(
                io::ErrorKind::InvalidData,
                "peer presented no certificates",
            )));
        }

        tracing::debug!(%endpoint, certificates = chain.len(), "Read certificate chain");
        Ok(chain)
    }
}

#[async_trait]
impl<T: TlsDialer> TlsDialer for Metered<T> {
    async fn dial(&self, endpoint: &Endpoint, verify: bool) -> Result<CertificateChain, Error> {
        self.observe("tls", "dial", self.inner.dial(endpoint, verify))
            .await
    }
}

/// Build a rustls `ClientConfig`.
///
/// With `verify` the chain and hostname are checked against system + bundled
/// Mozilla CA roots; without it any chain is accepted.
pub fn client_config(verify: bool) -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder =
        ClientConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

    let builder = if verify {
        builder.with_root_certificates(ROOTS.clone())
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
    };

    Ok(builder.with_no_client_auth())
}

static ROOTS: LazyLock<Arc<RootCertStore>> = LazyLock::new(|| Arc::new(root_cert_store()));

fn root_cert_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();

    // System certs — picks up private CAs mounted into the container.
    let native = rustls_native_certs::load_native_certs();

    if let Some(err) = native.errors.first() {
        tracing::warn!(
            %err,
            "Error loading some system certs, bundled Mozilla roots will fill gaps"
        );
    }

    let (added, failed) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, failed, "Loaded system CA certificates");

    // Bundled Mozilla roots — always present as a baseline.
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    roots
}

/// Skips path and hostname validation. Handshake signatures are still
/// checked against the provider's algorithms.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
