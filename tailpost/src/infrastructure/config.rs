//! Loads the on-disk YAML configuration into the validated
//! [`tailpost_domain::Config`], expanding `${OS_DEFAULT}/<suffix>` path
//! tokens along the way. This module is the only place the core's raw YAML
//! shape is ever parsed — everything downstream only ever sees `Config`.

use tailpost_domain::config::RawAgentConfig;
use tailpost_domain::{Config, TailPostError};

/// Platform-specific default log directory substituted for the
/// `${OS_DEFAULT}` token in `log_path`.
#[cfg(target_os = "windows")]
const OS_DEFAULT_LOG_DIR: &str = r"C:\ProgramData\tailpost\logs";
#[cfg(not(target_os = "windows"))]
const OS_DEFAULT_LOG_DIR: &str = "/var/log";

pub fn load_from_path(path: &str) -> Result<Config, TailPostError> {
    let settings = ::config::Config::builder()
        .add_source(::config::File::with_name(path))
        .build()
        .map_err(|e| TailPostError::config(format!("failed to load {path}: {e}")))?;

    let mut raw: RawAgentConfig = settings
        .try_deserialize()
        .map_err(|e| TailPostError::config(format!("invalid configuration in {path}: {e}")))?;

    if let Some(log_path) = raw.log_path.take() {
        raw.log_path = Some(expand_os_default(&log_path));
    }

    Config::from_raw(raw)
}

/// Expands a leading `${OS_DEFAULT}/<suffix>` token; any other value passes
/// through untouched.
fn expand_os_default(value: &str) -> String {
    const TOKEN: &str = "${OS_DEFAULT}";
    match value.strip_prefix(TOKEN) {
        Some(suffix) => format!("{OS_DEFAULT_LOG_DIR}{suffix}"),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_os_default_prefix() {
        let expanded = expand_os_default("${OS_DEFAULT}/app.log");
        assert!(expanded.ends_with("/app.log") || expanded.ends_with(r"\app.log"));
        assert!(!expanded.contains("${OS_DEFAULT}"));
    }

    #[test]
    fn leaves_other_paths_untouched() {
        assert_eq!(expand_os_default("/custom/path.log"), "/custom/path.log");
    }
}
