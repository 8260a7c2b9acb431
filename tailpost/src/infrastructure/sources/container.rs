use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use tailpost_domain::services::{BoxLineSequence, LineSource};
use tailpost_domain::{LogLine, TailPostError};

const CHANNEL_CAPACITY: usize = 1000;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const TAIL_LINES: usize = 10;

/// Abstraction over the local orchestrator's log-follow API, kept separate
/// from [`ContainerLineStream`] so tests can substitute a fake without
/// standing up a real cluster.
#[async_trait]
pub trait OrchestratorLogApi: Send + Sync {
    /// Opens a follow-mode log stream for the given container, with an
    /// initial tail of `tail_lines`. Returns a channel of raw lines; the
    /// channel closes when the underlying stream ends or errors.
    async fn follow_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: usize,
    ) -> Result<mpsc::Receiver<String>, TailPostError>;

    /// Whether the named pod still exists in the cluster.
    async fn pod_exists(&self, namespace: &str, pod: &str) -> Result<bool, TailPostError>;
}

/// Streams the log of a named container in a pod, reconnecting while the
/// pod exists. Reconnection may duplicate or gap the tail, which is
/// acceptable for log shipping.
pub struct ContainerLineStream {
    namespace: String,
    pod: String,
    container: String,
    api: std::sync::Arc<dyn OrchestratorLogApi>,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    join_handle: Option<tokio::task::JoinHandle<()>>,
    rx: Option<mpsc::Receiver<LogLine>>,
}

impl ContainerLineStream {
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>, container: impl Into<String>, api: std::sync::Arc<dyn OrchestratorLogApi>) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
            api,
            stop_tx: None,
            join_handle: None,
            rx: None,
        }
    }
}

#[async_trait]
impl LineSource for ContainerLineStream {
    async fn start(&mut self) -> Result<(), TailPostError> {
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let namespace = self.namespace.clone();
        let pod = self.pod.clone();
        let container = self.container.clone();
        let api = self.api.clone();
        let source_id = format!("{namespace}/{pod}/{container}");

        let handle = tokio::spawn(async move {
            loop {
                let follow = tokio::select! {
                    biased;
                    _ = &mut stop_rx => return,
                    result = api.follow_logs(&namespace, &pod, &container, TAIL_LINES) => result,
                };
                let mut raw_rx = match follow {
                    Ok(rx) => rx,
                    Err(e) => {
                        warn!(source = %source_id, error = %e, "failed to open container log stream");
                        if !wait_or_stop(&mut stop_rx, RECONNECT_DELAY).await {
                            return;
                        }
                        continue;
                    }
                };

                loop {
                    tokio::select! {
                        biased;
                        _ = &mut stop_rx => return,
                        maybe_line = raw_rx.recv() => {
                            match maybe_line {
                                Some(content) => {
                                    let line = LogLine::new(content, source_id.clone(), Utc::now());
                                    if out_tx.send(line).await.is_err() {
                                        return;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                }

                match api.pod_exists(&namespace, &pod).await {
                    Ok(false) => {
                        debug!(source = %source_id, "pod no longer exists, ending stream");
                        return;
                    }
                    Ok(true) => {
                        if !wait_or_stop(&mut stop_rx, RECONNECT_DELAY).await {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(source = %source_id, error = %e, "failed to query pod existence, retrying");
                        if !wait_or_stop(&mut stop_rx, RECONNECT_DELAY).await {
                            return;
                        }
                    }
                }
            }
        });

        self.stop_tx = Some(stop_tx);
        self.join_handle = Some(handle);
        self.rx = Some(out_rx);
        Ok(())
    }

    fn lines(&mut self) -> BoxLineSequence {
        let rx = self.rx.take().expect("lines() called before start()");
        Box::pin(ReceiverStream::new(rx))
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

/// Waits for `delay`, or returns early (with `false`) if a stop signal
/// arrives first.
async fn wait_or_stop(stop_rx: &mut tokio::sync::oneshot::Receiver<()>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = &mut *stop_rx => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
