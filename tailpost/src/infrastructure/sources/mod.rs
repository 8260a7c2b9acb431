pub mod container;
pub mod file;
pub mod kubectl;
#[cfg(target_os = "macos")]
pub mod macos_unified;
#[cfg(windows)]
pub mod windows_event;

use async_trait::async_trait;
use std::sync::Arc;

use tailpost_domain::services::{BoxLineSequence, LineSource};
use tailpost_domain::{SourceKind, TailPostError};

use container::{ContainerLineStream, OrchestratorLogApi};
use file::FileLineStream;

/// The polymorphic source reader the supervisor constructs from
/// `SourceKind`. One variant per platform/protocol; foreign-OS variants are
/// compiled out entirely rather than carried as always-failing stubs.
pub enum LineStream {
    File(FileLineStream),
    Container(ContainerLineStream),
    #[cfg(windows)]
    WindowsEvent(windows_event::WindowsEventLineStream),
    #[cfg(target_os = "macos")]
    MacOsUnified(macos_unified::MacOsUnifiedLineStream),
}

impl LineStream {
    pub fn from_source_kind(source: &SourceKind, orchestrator: Arc<dyn OrchestratorLogApi>) -> Result<Self, TailPostError> {
        if !source.is_supported_on_host() {
            return Err(TailPostError::PlatformUnsupported(format!(
                "{} source is not supported on this host platform",
                source.label()
            )));
        }

        match source {
            SourceKind::File { path } => Ok(LineStream::File(FileLineStream::new(path))),
            SourceKind::Container {
                namespace,
                pod,
                container,
            } => Ok(LineStream::Container(ContainerLineStream::new(
                namespace,
                pod,
                container,
                orchestrator,
            ))),
            SourceKind::WindowsEvent { log_name, min_level } => {
                #[cfg(windows)]
                {
                    Ok(LineStream::WindowsEvent(windows_event::WindowsEventLineStream::new(
                        log_name, min_level,
                    )?))
                }
                #[cfg(not(windows))]
                {
                    let _ = (log_name, min_level);
                    unreachable!("is_supported_on_host already rejected this source on a non-Windows host")
                }
            }
            SourceKind::MacOsUnified { predicate } => {
                #[cfg(target_os = "macos")]
                {
                    Ok(LineStream::MacOsUnified(macos_unified::MacOsUnifiedLineStream::new(predicate)?))
                }
                #[cfg(not(target_os = "macos"))]
                {
                    let _ = predicate;
                    unreachable!("is_supported_on_host already rejected this source on a non-macOS host")
                }
            }
        }
    }
}

#[async_trait]
impl LineSource for LineStream {
    async fn start(&mut self) -> Result<(), TailPostError> {
        match self {
            LineStream::File(s) => s.start().await,
            LineStream::Container(s) => s.start().await,
            #[cfg(windows)]
            LineStream::WindowsEvent(s) => s.start().await,
            #[cfg(target_os = "macos")]
            LineStream::MacOsUnified(s) => s.start().await,
        }
    }

    fn lines(&mut self) -> BoxLineSequence {
        match self {
            LineStream::File(s) => s.lines(),
            LineStream::Container(s) => s.lines(),
            #[cfg(windows)]
            LineStream::WindowsEvent(s) => s.lines(),
            #[cfg(target_os = "macos")]
            LineStream::MacOsUnified(s) => s.lines(),
        }
    }

    async fn stop(&mut self) {
        match self {
            LineStream::File(s) => s.stop().await,
            LineStream::Container(s) => s.stop().await,
            #[cfg(windows)]
            LineStream::WindowsEvent(s) => s.stop().await,
            #[cfg(target_os = "macos")]
            LineStream::MacOsUnified(s) => s.stop().await,
        }
    }
}
