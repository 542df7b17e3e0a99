use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::{Result, TransportError};

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side TLS settings for a secure channel.
#[derive(Clone)]
pub struct TlsConfig {
    roots: RootCertStore,
    /// Skip server certificate verification. Test and development use only.
    pub danger_accept_invalid_certs: bool,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
}

impl TlsConfig {
    /// Empty trust store; add roots before connecting.
    pub fn new() -> Self {
        Self {
            roots: RootCertStore::empty(),
            danger_accept_invalid_certs: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Trust a DER-encoded root certificate.
    pub fn add_root_certificate(&mut self, cert: CertificateDer<'static>) -> Result<()> {
        self.roots.add(cert)?;
        Ok(())
    }

    /// Trust every certificate found in a PEM bundle.
    pub fn add_pem_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let certs = CertificateDer::pem_file_iter(path)
            .map_err(|err| pem_error(path, err))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| pem_error(path, err))?;

        let mut added = 0usize;
        for cert in certs {
            self.add_root_certificate(cert)?;
            added += 1;
        }
        if added == 0 {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("no certificates found in {}", path.display()),
            )));
        }
        Ok(added)
    }

    /// Number of trusted roots.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Build the rustls client configuration.
    pub fn client_config(&self) -> Result<Arc<rustls::ClientConfig>> {
        let provider = Arc::new(ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?;

        let config = if self.danger_accept_invalid_certs {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(self.roots.clone())
                .with_no_client_auth()
        };

        Ok(Arc::new(config))
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("roots", &self.roots.len())
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn pem_error(path: &Path, err: rustls::pki_types::pem::Error) -> TransportError {
    TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("failed reading certificates from {}: {err}", path.display()),
    ))
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
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
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_roots() {
        let config = TlsConfig::default();
        assert_eq!(config.root_count(), 0);
        assert!(!config.danger_accept_invalid_certs);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn builds_client_config_with_generated_root() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let mut config = TlsConfig::new();
        config
            .add_root_certificate(cert.cert.der().clone())
            .unwrap();
        assert_eq!(config.root_count(), 1);
        assert!(config.client_config().is_ok());
    }

    #[test]
    fn loads_roots_from_pem_file() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let dir = std::env::temp_dir().join(format!("kvlink-pem-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ca.pem");
        std::fs::write(&path, cert.cert.pem()).unwrap();

        let mut config = TlsConfig::new();
        assert_eq!(config.add_pem_file(&path).unwrap(), 1);
        assert_eq!(config.root_count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_pem_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("kvlink-pem-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.pem");
        std::fs::write(&path, b"").unwrap();

        let mut config = TlsConfig::new();
        assert!(matches!(
            config.add_pem_file(&path),
            Err(TransportError::Io(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn insecure_config_builds() {
        let config = TlsConfig {
            danger_accept_invalid_certs: true,
            ..TlsConfig::default()
        };
        assert!(config.client_config().is_ok());
    }
}
