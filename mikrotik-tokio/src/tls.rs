//! TLS transport (L6, `tls` feature): wraps a connected [`TcpStream`] in a
//! `rustls` client session built from a [`ConnectConfig`].

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::{ConnectConfig, TlsConfig};
use crate::error::{DeviceError, DeviceResult};

/// Negotiates TLS over an already-connected socket.
pub(crate) async fn connect(tcp: TcpStream, config: &ConnectConfig) -> DeviceResult<TlsStream<TcpStream>> {
    let client_config = build_client_config(&config.tls)?;
    let connector = TlsConnector::from(Arc::new(client_config));
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| DeviceError::Tls(format!("invalid server name {:?}: {e}", config.host)))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| DeviceError::Tls(e.to_string()))
}

fn build_client_config(tls: &TlsConfig) -> DeviceResult<ClientConfig> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().certs {
        // Malformed platform roots are skipped rather than failing the
        // whole connection; a handful of bad entries in the OS store is
        // common and shouldn't take down every TLS connection.
        let _ = roots.add(cert);
    }

    if let Some(bundle) = &tls.ca_bundle {
        for cert in rustls_pemfile::certs(&mut bundle.as_slice()) {
            let cert = cert.map_err(|e| DeviceError::Tls(format!("invalid CA bundle: {e}")))?;
            roots
                .add(cert)
                .map_err(|e| DeviceError::Tls(format!("invalid CA certificate: {e}")))?;
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);

    let mut client_config = if let Some((cert_pem, key_pem)) = &tls.client_cert {
        let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
            .collect::<Result<Vec<CertificateDer<'static>>, _>>()
            .map_err(|e| DeviceError::Tls(format!("invalid client certificate: {e}")))?;
        let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|e| DeviceError::Tls(format!("invalid client private key: {e}")))?
            .ok_or_else(|| DeviceError::Tls("no private key found in client_cert".to_string()))?;
        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| DeviceError::Tls(format!("invalid client certificate/key pair: {e}")))?
    } else {
        builder.with_no_client_auth()
    };

    if !tls.verify_hostname {
        client_config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoVerify));
    }

    Ok(client_config)
}

/// Accepts any server certificate. Only reachable via
/// [`TlsConfig::verify_hostname`] set to `false`, a deliberate footgun for
/// lab routers with self-signed certs and no SAN.
#[derive(Debug)]
struct NoVerify;

impl ServerCertVerifier for NoVerify {
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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

