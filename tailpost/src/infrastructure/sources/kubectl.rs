//! Default [`OrchestratorLogApi`] implementation: shells out to `kubectl`,
//! the same "no stable Rust client in this corpus, so drive the platform's
//! own CLI" pattern [`super::macos_unified`] uses for the unified log.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use tailpost_domain::TailPostError;

use super::container::OrchestratorLogApi;

const CHANNEL_CAPACITY: usize = 1000;

/// Drives `kubectl logs -f` / `kubectl get pod` against whatever cluster
/// the ambient kubeconfig points at. Requires `kubectl` on `PATH`.
pub struct KubectlLogApi {
    /// Extra arguments inserted before the subcommand, e.g. `["--context",
    /// "prod"]`. Empty by default (uses the current context).
    extra_args: Vec<String>,
}

impl KubectlLogApi {
    pub fn new() -> Self {
        Self { extra_args: Vec::new() }
    }

    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            extra_args: vec!["--context".to_string(), context.into()],
        }
    }
}

impl Default for KubectlLogApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrchestratorLogApi for KubectlLogApi {
    async fn follow_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: usize,
    ) -> Result<mpsc::Receiver<String>, TailPostError> {
        let mut command = Command::new("kubectl");
        command
            .args(&self.extra_args)
            .args(["logs", "-f", "-n", namespace, pod, "-c", container, "--tail"])
            .arg(tail_lines.to_string())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|e| TailPostError::source_open(format!("failed to spawn `kubectl logs`: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TailPostError::source_open("kubectl logs child has no stdout"))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            // `Child` doesn't kill on drop (kill_on_drop isn't set on
            // `command`), so every exit path below must kill it explicitly,
            // the same way `MacOsUnifiedLineStream::stop` does.
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
            let _ = child.kill().await;
        });

        Ok(rx)
    }

    async fn pod_exists(&self, namespace: &str, pod: &str) -> Result<bool, TailPostError> {
        let status = Command::new("kubectl")
            .args(&self.extra_args)
            .args(["get", "pod", "-n", namespace, pod])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| TailPostError::source_transient(format!("failed to run `kubectl get pod`: {e}")))?;
        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_has_no_extra_args() {
        let api = KubectlLogApi::new();
        assert!(api.extra_args.is_empty());
    }

    #[test]
    fn with_context_sets_the_context_flag() {
        let api = KubectlLogApi::with_context("prod");
        assert_eq!(api.extra_args, vec!["--context".to_string(), "prod".to_string()]);
    }
}
