use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use tailpost_domain::services::{BoxLineSequence, LineSource};
use tailpost_domain::{LogLine, TailPostError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REOPEN_INTERVAL: Duration = Duration::from_secs(1);
const CHANNEL_CAPACITY: usize = 1000;

/// Tails a regular file from its current end, surviving rotation (rename or
/// truncate). At most one file descriptor is open at any time; the byte
/// offset only moves backward when a rotation is detected.
pub struct FileLineStream {
    path: PathBuf,
    stopped: Arc<AtomicBool>,
    join_handle: Option<tokio::task::JoinHandle<()>>,
    rx: Option<mpsc::Receiver<LogLine>>,
}

impl FileLineStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stopped: Arc::new(AtomicBool::new(false)),
            join_handle: None,
            rx: None,
        }
    }
}

#[async_trait]
impl LineSource for FileLineStream {
    async fn start(&mut self) -> Result<(), TailPostError> {
        // Fail fast if the file cannot be opened at all — a missing path at
        // startup is a configuration problem, not a transient one.
        let mut file = File::open(&self.path).map_err(|e| {
            TailPostError::source_open(format!("cannot open {}: {e}", self.path.display()))
        })?;
        let offset = file
            .seek(SeekFrom::End(0))
            .map_err(|e| TailPostError::source_open(format!("cannot seek {}: {e}", self.path.display())))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let path = self.path.clone();
        let stopped = self.stopped.clone();

        // FileLineStream is the one source that does real blocking syscalls
        // (read/reopen); everything else in this crate runs on ordinary
        // tokio tasks.
        let handle = tokio::task::spawn_blocking(move || {
            tail_loop(path, file, offset, tx, stopped);
        });
        self.join_handle = Some(handle);
        self.rx = Some(rx);
        Ok(())
    }

    fn lines(&mut self) -> BoxLineSequence {
        let rx = self.rx.take().expect("lines() called before start()");
        Box::pin(ReceiverStream::new(rx))
    }

    async fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

fn tail_loop(
    path: PathBuf,
    mut file: File,
    mut offset: u64,
    tx: mpsc::Sender<LogLine>,
    stopped: Arc<AtomicBool>,
) {
    let source_id = path.display().to_string();
    let mut pending = Vec::new();
    let mut read_buf = [0u8; 8192];
    let mut identity = file_identity(&file);

    while !stopped.load(Ordering::SeqCst) {
        match file.read(&mut read_buf) {
            Ok(0) => {
                // At EOF a rename-and-recreate at `path` leaves this fd
                // reading the old (unlinked) inode forever with no read
                // error, so idle polls double as the rotation check.
                if let Ok((new_file, new_offset)) = reopen_if_rotated(&path, &identity) {
                    file = new_file;
                    offset = new_offset;
                    identity = file_identity(&file);
                    continue;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Ok(n) => {
                pending.extend_from_slice(&read_buf[..n]);
                offset += n as u64;
                emit_complete_lines(&mut pending, &tx, &source_id, &stopped);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "file read error, will reopen");
                std::thread::sleep(REOPEN_INTERVAL);
                match reopen(&path, offset) {
                    Ok((new_file, new_offset)) => {
                        file = new_file;
                        offset = new_offset;
                        identity = file_identity(&file);
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "reopen failed, retrying");
                    }
                }
            }
        }
    }
}

/// Identity of an open file, used to detect rename-and-recreate rotation
/// that a still-open fd would otherwise never observe as a read error.
#[cfg(unix)]
type FileIdentity = (u64, u64); // (dev, ino)
#[cfg(not(unix))]
type FileIdentity = (u64, std::time::SystemTime); // (len, created) best-effort fallback

#[cfg(unix)]
fn file_identity(file: &File) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    file.metadata().ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
fn file_identity(file: &File) -> Option<FileIdentity> {
    let meta = file.metadata().ok()?;
    Some((meta.len(), meta.created().ok()?))
}

/// Re-opens `path` only if the file it currently names is not the one
/// `current` identifies. Returns `Err` (meaning "nothing to do") both when
/// the path is unchanged and when it can't be stat'd yet.
fn reopen_if_rotated(path: &PathBuf, current: &Option<FileIdentity>) -> std::io::Result<(File, u64)> {
    let candidate = File::open(path)?;
    let candidate_id = file_identity(&candidate);
    if candidate_id.is_none() || candidate_id == *current {
        return Err(std::io::Error::new(std::io::ErrorKind::Other, "no rotation"));
    }
    Ok((candidate, 0))
}

fn reopen(path: &PathBuf, last_offset: u64) -> std::io::Result<(File, u64)> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let offset = if len < last_offset {
        0 // rotation: the new file is smaller than where we left off
    } else {
        file.seek(SeekFrom::Start(last_offset))?;
        last_offset
    };
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
    }
    Ok((file, offset))
}

fn emit_complete_lines(pending: &mut Vec<u8>, tx: &mpsc::Sender<LogLine>, source_id: &str, stopped: &AtomicBool) {
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
        let content = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).into_owned();
        let line = LogLine::new(content, source_id, Utc::now());
        // A full channel applies backpressure to the read loop, per the
        // "default: block" channel contract.
        if stopped.load(Ordering::SeqCst) {
            return;
        }
        if tx.blocking_send(line).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    async fn next_line(stream: &mut BoxLineSequence, timeout: Duration) -> Option<LogLine> {
        tokio::time::timeout(timeout, stream.next()).await.ok().flatten()
    }

    #[tokio::test]
    async fn tails_appended_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut reader = FileLineStream::new(file.path());
        reader.start().await.unwrap();
        let mut lines = reader.lines();

        writeln!(file.reopen().unwrap(), "hello").unwrap();
        let line = next_line(&mut lines, Duration::from_secs(2)).await.unwrap();
        assert_eq!(line.content, "hello");

        reader.stop().await;
    }

    #[tokio::test]
    async fn survives_rename_and_recreate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"").unwrap();

        let mut reader = FileLineStream::new(&path);
        reader.start().await.unwrap();
        let mut lines = reader.lines();

        writeln!(std::fs::OpenOptions::new().append(true).open(&path).unwrap(), "L1").unwrap();
        let first = next_line(&mut lines, Duration::from_secs(2)).await.unwrap();
        assert_eq!(first.content, "L1");

        std::fs::rename(&path, dir.path().join("app.log.1")).unwrap();
        std::fs::write(&path, b"").unwrap();
        writeln!(std::fs::OpenOptions::new().append(true).open(&path).unwrap(), "L2").unwrap();

        let second = next_line(&mut lines, Duration::from_secs(2)).await.unwrap();
        assert_eq!(second.content, "L2");

        reader.stop().await;
    }
}
