//! Builds a `rustls::ClientConfig` (for the outbound sink connection) and a
//! `rustls::ServerConfig` (for the health server listener) from
//! [`TlsSettings`].

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use tailpost_domain::config::TlsSettings;
use tailpost_domain::TailPostError;

/// The subset of `(min_version, max_version)` rustls actually lets us pin;
/// rustls 0.23 negotiates TLS 1.2/1.3 only, so `tls10`/`tls11` are accepted
/// as configuration values but rejected at build time with a clear error
/// rather than silently downgrading.
fn parse_version(value: &str) -> Result<&'static str, TailPostError> {
    match value.to_ascii_lowercase().as_str() {
        "tls10" | "tls11" => Err(TailPostError::config(format!(
            "{value}: TLS 1.0/1.1 are not supported by this agent's TLS stack"
        ))),
        "tls12" => Ok("tls12"),
        "tls13" => Ok("tls13"),
        other => Err(TailPostError::config(format!("unknown TLS version: {other}"))),
    }
}

fn version_rank(v: &str) -> u8 {
    match v {
        "tls12" => 0,
        "tls13" => 1,
        _ => unreachable!("parse_version only ever returns tls12/tls13"),
    }
}

/// Resolves `min_version`/`max_version` into the concrete rustls version
/// list passed to `builder_with_protocol_versions`, the one API that
/// actually constrains the negotiated handshake.
fn resolve_protocol_versions(
    settings: &TlsSettings,
) -> Result<Vec<&'static rustls::SupportedProtocolVersion>, TailPostError> {
    let min_rank = match &settings.min_version {
        Some(v) => version_rank(parse_version(v)?),
        None => 0,
    };
    let max_rank = match &settings.max_version {
        Some(v) => version_rank(parse_version(v)?),
        None => 1,
    };
    if min_rank > max_rank {
        return Err(TailPostError::config(format!(
            "min_version {:?} is newer than max_version {:?}",
            settings.min_version, settings.max_version
        )));
    }

    let mut versions: Vec<&'static rustls::SupportedProtocolVersion> = Vec::new();
    if min_rank <= 0 && max_rank >= 0 {
        versions.push(&rustls::version::TLS12);
    }
    if min_rank <= 1 && max_rank >= 1 {
        versions.push(&rustls::version::TLS13);
    }
    Ok(versions)
}

pub struct TlsContext {
    pub client_config: Option<Arc<ClientConfig>>,
    pub server_config: Option<Arc<ServerConfig>>,
    pub server_name_override: Option<String>,
}

impl TlsContext {
    pub fn build(settings: &TlsSettings) -> Result<Self, TailPostError> {
        if !settings.enabled {
            return Ok(Self {
                client_config: None,
                server_config: None,
                server_name_override: None,
            });
        }

        if settings.cert_file.is_some() && settings.key_file.is_none() {
            return Err(TailPostError::config("cert_file supplied without key_file"));
        }

        let client_config = build_client_config(settings)?;
        let server_config = build_server_config(settings)?;

        Ok(Self {
            client_config: Some(Arc::new(client_config)),
            server_config,
            server_name_override: settings.server_name.clone(),
        })
    }

    /// Reads the same settings from a fixed `TAILPOST_TLS_*` environment
    /// prefix. A non-boolean `TAILPOST_TLS_ENABLED` is a fatal error.
    pub fn from_env() -> Result<Self, TailPostError> {
        let enabled = match std::env::var("TAILPOST_TLS_ENABLED") {
            Ok(v) => v
                .parse::<bool>()
                .map_err(|_| TailPostError::config(format!("TAILPOST_TLS_ENABLED must be true/false, got {v}")))?,
            Err(_) => false,
        };

        let settings = TlsSettings {
            enabled,
            cert_file: std::env::var("TAILPOST_TLS_CERT_FILE").ok(),
            key_file: std::env::var("TAILPOST_TLS_KEY_FILE").ok(),
            ca_file: std::env::var("TAILPOST_TLS_CA_FILE").ok(),
            server_name: std::env::var("TAILPOST_TLS_SERVER_NAME").ok(),
            insecure_skip_verify: std::env::var("TAILPOST_TLS_INSECURE_SKIP_VERIFY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            min_version: std::env::var("TAILPOST_TLS_MIN_VERSION").ok(),
            max_version: std::env::var("TAILPOST_TLS_MAX_VERSION").ok(),
            prefer_server_cipher_suites: false,
        };
        Self::build(&settings)
    }
}

fn build_client_config(settings: &TlsSettings) -> Result<ClientConfig, TailPostError> {
    let versions = resolve_protocol_versions(settings)?;
    let builder = ClientConfig::builder_with_protocol_versions(&versions);

    let mut roots = RootCertStore::empty();
    if let Some(ca_file) = &settings.ca_file {
        load_certs(ca_file)?.into_iter().try_for_each(|cert| {
            roots
                .add(cert)
                .map_err(|e| TailPostError::config(format!("invalid CA certificate in {ca_file}: {e}")))
        })?;
    } else {
        roots.extend(webpki_roots_certs());
    }

    if settings.insecure_skip_verify {
        let config = builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
            .with_no_client_auth();
        return Ok(config);
    }

    let builder = builder.with_root_certificates(roots);

    let config = if let (Some(cert_file), Some(key_file)) = (&settings.cert_file, &settings.key_file) {
        let certs = load_certs(cert_file)?;
        let key = load_private_key(key_file)?;
        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| TailPostError::config(format!("invalid mTLS client identity: {e}")))?
    } else {
        builder.with_no_client_auth()
    };

    Ok(config)
}

fn build_server_config(settings: &TlsSettings) -> Result<Option<Arc<ServerConfig>>, TailPostError> {
    let (Some(cert_file), Some(key_file)) = (&settings.cert_file, &settings.key_file) else {
        return Ok(None);
    };
    let versions = resolve_protocol_versions(settings)?;
    let certs = load_certs(cert_file)?;
    let key = load_private_key(key_file)?;
    let config = ServerConfig::builder_with_protocol_versions(&versions)
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TailPostError::config(format!("invalid server TLS identity: {e}")))?;
    Ok(Some(Arc::new(config)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TailPostError> {
    let file = File::open(path).map_err(|e| TailPostError::config(format!("cannot open {path}: {e}")))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TailPostError::config(format!("invalid certificate in {path}: {e}")))
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, TailPostError> {
    let file = File::open(path).map_err(|e| TailPostError::config(format!("cannot open {path}: {e}")))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| TailPostError::config(format!("invalid private key in {path}: {e}")))?
        .ok_or_else(|| TailPostError::config(format!("no private key found in {path}")))
}

fn webpki_roots_certs() -> impl Iterator<Item = CertificateDer<'static>> {
    rustls_native_certs::load_native_certs()
        .certs
        .into_iter()
}

#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
