//! macOS Unified Log source. Shells out to `log stream` since macOS unified
//! logging has no stable Rust FFI binding in this corpus — the async
//! analogue of [`super::windows_event`]'s platform-native poll, implemented
//! as a subprocess instead of an FFI call.

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use tailpost_domain::services::{BoxLineSequence, LineSource};
use tailpost_domain::{LogLine, TailPostError};

const CHANNEL_CAPACITY: usize = 1000;

pub struct MacOsUnifiedLineStream {
    predicate: String,
    child: Option<Child>,
    join_handle: Option<tokio::task::JoinHandle<()>>,
    rx: Option<mpsc::Receiver<LogLine>>,
}

impl MacOsUnifiedLineStream {
    /// Fails with `PlatformUnsupported` unless running on macOS.
    pub fn new(predicate: impl Into<String>) -> Result<Self, TailPostError> {
        if !cfg!(target_os = "macos") {
            return Err(TailPostError::PlatformUnsupported(
                "macos_unified source requires macOS".to_string(),
            ));
        }
        Ok(Self {
            predicate: predicate.into(),
            child: None,
            join_handle: None,
            rx: None,
        })
    }
}

#[async_trait]
impl LineSource for MacOsUnifiedLineStream {
    async fn start(&mut self) -> Result<(), TailPostError> {
        let mut command = Command::new("log");
        command
            .args(["stream", "--style", "ndjson"])
            .arg("--predicate")
            .arg(&self.predicate)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|e| TailPostError::source_open(format!("failed to spawn `log stream`: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TailPostError::source_open("log stream child has no stdout"))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let source_id = format!("macos_unified:{}", self.predicate);

        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(raw)) => {
                        let content = parse_ndjson_line(&raw).unwrap_or(raw);
                        let line = LogLine::new(content, source_id.clone(), Utc::now());
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "error reading log stream output");
                        return;
                    }
                }
            }
        });

        self.child = Some(child);
        self.join_handle = Some(handle);
        self.rx = Some(rx);
        Ok(())
    }

    fn lines(&mut self) -> BoxLineSequence {
        let rx = self.rx.take().expect("lines() called before start()");
        Box::pin(ReceiverStream::new(rx))
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

/// Extracts the `eventMessage` field from one `log stream --style ndjson`
/// record, flattening embedded newlines the same way the Windows event
/// source does for its `Message` field.
fn parse_ndjson_line(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let message = value.get("eventMessage")?.as_str()?;
    Some(message.replace('\n', " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_message_from_ndjson_record() {
        let raw = r#"{"eventMessage":"hello\nworld","timestamp":"2026-01-01"}"#;
        assert_eq!(parse_ndjson_line(raw).as_deref(), Some("hello world"));
    }

    #[test]
    fn falls_back_to_raw_line_on_malformed_json() {
        assert_eq!(parse_ndjson_line("not json"), None);
    }

    #[test]
    fn rejects_construction_on_non_macos() {
        if !cfg!(target_os = "macos") {
            assert!(MacOsUnifiedLineStream::new("subsystem == 'com.test'").is_err());
        }
    }
}
