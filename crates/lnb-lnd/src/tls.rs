//! TLS trust for the node's own certificate.
//!
//! LND generates a self-signed certificate that is marked `CA:TRUE` and served
//! as the leaf. Path validation rejects a CA used as an end entity, so the
//! connection instead pins the exact certificate read from `tls.cert`.

use std::{sync::Arc, time::SystemTime};

use rustls::{
    client::{ServerCertVerified, ServerCertVerifier},
    Certificate, CertificateError, ClientConfig, ServerName,
};

use lnb_core::{errors::Error, Result};

/// Accepts the server only when it presents exactly the pinned certificate.
#[derive(Debug)]
pub struct PinnedCert {
    der: Vec<u8>,
}

impl PinnedCert {
    /// First certificate found in a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let mut reader = pem;
        let der = rustls_pemfile::certs(&mut reader)
            .map_err(|e| Error::Connect(format!("invalid TLS certificate: {e}")))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::Connect("invalid TLS certificate: no PEM certificate found".to_string())
            })?;
        Ok(Self { der })
    }
}

impl ServerCertVerifier for PinnedCert {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if end_entity.0 == self.der {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }
}

/// Client config that trusts only `cert_pem`. Handshake signatures are still
/// checked by the default verifier methods.
pub fn pinned_client_config(cert_pem: &[u8]) -> Result<ClientConfig> {
    let pinned = PinnedCert::from_pem(cert_pem)?;
    Ok(ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(pinned))
        .with_no_client_auth())
}
