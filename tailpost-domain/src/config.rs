//! The core's validated configuration, plus the as-loaded shape it is built
//! from. `RawAgentConfig` mirrors the on-disk YAML schema field-for-field;
//! `Config` is what the core actually depends on, with every invariant
//! (`batch_size >= 1`, `flush_interval > 0`, a concrete `SourceKind`)
//! already enforced. The boundary between the two is `Config::from_raw`,
//! the only place these coercions happen.

use std::time::Duration;

use serde::Deserialize;

use crate::error::TailPostError;
use crate::value_objects::SourceKind;

/// TLS settings for both the outbound sink connection and the inbound
/// health server listener.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub ca_file: Option<String>,
    pub server_name: Option<String>,
    pub insecure_skip_verify: bool,
    pub min_version: Option<String>,
    pub max_version: Option<String>,
    pub prefer_server_cipher_suites: bool,
}

/// Credential scheme attached to outbound sink requests (and, for `Basic`
/// and `CustomHeaders`, used to gate the health server too).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSettings {
    None,
    Basic {
        user: String,
        pass: String,
    },
    #[serde(rename = "token")]
    Bearer {
        token_file: String,
    },
    Oauth2 {
        client_id: String,
        client_secret: String,
        token_url: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
    #[serde(rename = "header")]
    CustomHeaders {
        #[serde(default)]
        headers: std::collections::BTreeMap<String, String>,
    },
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings::None
    }
}

/// Payload encryption scheme. `key_file`/`key_env` are mutually exclusive —
/// exactly one must be set, enforced by the infrastructure layer that loads
/// the actual key bytes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncryptionSettings {
    None,
    #[serde(rename = "aes")]
    Aes256Gcm(EncryptionKeySource),
    ChaCha20Poly1305(EncryptionKeySource),
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        EncryptionSettings::None
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionKeySource {
    pub key_file: Option<String>,
    pub key_env: Option<String>,
    pub key_id: Option<String>,
    pub rotation_days: Option<u32>,
}

/// The as-loaded configuration, field-for-field matching the YAML schema.
/// Nothing here is validated yet — `Config::from_raw` is the only
/// conversion allowed to happen, and it's where every coercion in this
/// document takes effect.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAgentConfig {
    pub server_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: f64,
    pub log_source_type: String,
    pub log_path: Option<String>,
    pub namespace: Option<String>,
    pub pod_name: Option<String>,
    pub container_name: Option<String>,
    pub windows_event_log_name: Option<String>,
    pub windows_event_log_level: Option<String>,
    pub macos_log_query: Option<String>,
    #[serde(default)]
    pub security: RawSecurity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSecurity {
    #[serde(default)]
    pub tls: TlsSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub encryption: EncryptionSettings,
}

fn default_batch_size() -> i64 {
    10
}

fn default_flush_interval_secs() -> f64 {
    5.0
}

/// The validated configuration the core depends on. Every field here has
/// already satisfied its invariant; nothing downstream re-checks them.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub source: SourceKind,
    pub tls: TlsSettings,
    pub auth: AuthSettings,
    pub encryption: EncryptionSettings,
}

impl Config {
    /// Builds the validated `Config` from the as-loaded shape, applying the
    /// coercions named in the data model: a non-positive `batch_size`
    /// becomes `1`; a non-positive `flush_interval` becomes `1s`.
    pub fn from_raw(raw: RawAgentConfig) -> Result<Self, TailPostError> {
        if raw.server_url.is_empty() {
            return Err(TailPostError::config("server_url is required"));
        }
        if !raw.server_url.starts_with("http://") && !raw.server_url.starts_with("https://") {
            return Err(TailPostError::config("server_url must use http or https scheme"));
        }

        let batch_size = if raw.batch_size < 1 { 1 } else { raw.batch_size as usize };

        let flush_interval = if raw.flush_interval_secs <= 0.0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs_f64(raw.flush_interval_secs)
        };

        let source = source_from_raw(&raw)?;

        Ok(Self {
            server_url: raw.server_url,
            batch_size,
            flush_interval,
            source,
            tls: raw.security.tls,
            auth: raw.security.auth,
            encryption: raw.security.encryption,
        })
    }
}

fn source_from_raw(raw: &RawAgentConfig) -> Result<SourceKind, TailPostError> {
    match raw.log_source_type.as_str() {
        "file" => {
            let path = raw
                .log_path
                .clone()
                .ok_or_else(|| TailPostError::config("log_path is required for log_source_type: file"))?;
            Ok(SourceKind::File { path })
        }
        "container" => {
            let namespace = raw
                .namespace
                .clone()
                .ok_or_else(|| TailPostError::config("namespace is required for log_source_type: container"))?;
            let pod = raw
                .pod_name
                .clone()
                .ok_or_else(|| TailPostError::config("pod_name is required for log_source_type: container"))?;
            let container = raw
                .container_name
                .clone()
                .ok_or_else(|| TailPostError::config("container_name is required for log_source_type: container"))?;
            Ok(SourceKind::Container {
                namespace,
                pod,
                container,
            })
        }
        "windows_event" => {
            let log_name = raw.windows_event_log_name.clone().unwrap_or_else(|| "Application".to_string());
            let min_level = raw.windows_event_log_level.clone().unwrap_or_else(|| "info".to_string());
            Ok(SourceKind::WindowsEvent { log_name, min_level })
        }
        "macos_asl" => {
            let predicate = raw.macos_log_query.clone().unwrap_or_default();
            Ok(SourceKind::MacOsUnified { predicate })
        }
        other => Err(TailPostError::config(format!("unknown log_source_type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw(log_source_type: &str) -> RawAgentConfig {
        RawAgentConfig {
            server_url: "https://sink.example".to_string(),
            batch_size: 10,
            flush_interval_secs: 5.0,
            log_source_type: log_source_type.to_string(),
            log_path: Some("/var/log/app.log".to_string()),
            namespace: None,
            pod_name: None,
            container_name: None,
            windows_event_log_name: None,
            windows_event_log_level: None,
            macos_log_query: None,
            security: RawSecurity::default(),
        }
    }

    #[test]
    fn batch_size_zero_coerces_to_one() {
        let mut raw = minimal_raw("file");
        raw.batch_size = 0;
        let cfg = Config::from_raw(raw).unwrap();
        assert_eq!(cfg.batch_size, 1);
    }

    #[test]
    fn negative_flush_interval_coerces_to_one_second() {
        let mut raw = minimal_raw("file");
        raw.flush_interval_secs = -3.0;
        let cfg = Config::from_raw(raw).unwrap();
        assert_eq!(cfg.flush_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let mut raw = minimal_raw("file");
        raw.server_url = "ftp://sink.example".to_string();
        assert!(Config::from_raw(raw).is_err());
    }

    #[test]
    fn file_source_requires_log_path() {
        let mut raw = minimal_raw("file");
        raw.log_path = None;
        assert!(Config::from_raw(raw).is_err());
    }
}
