/// The log source an agent was configured to read from. Chosen once at
/// startup from `Config::source` and immutable thereafter — switching
/// sources requires a restart, not a runtime reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File {
        path: String,
    },
    Container {
        namespace: String,
        pod: String,
        container: String,
    },
    WindowsEvent {
        log_name: String,
        min_level: String,
    },
    MacOsUnified {
        predicate: String,
    },
}

impl SourceKind {
    /// Stable label value for the `source_type` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::File { .. } => "file",
            SourceKind::Container { .. } => "container",
            SourceKind::WindowsEvent { .. } => "windows_event",
            SourceKind::MacOsUnified { .. } => "macos_unified",
        }
    }

    /// Whether this variant can be constructed on the host the process is
    /// currently running on. `WindowsEvent` and `MacOsUnified` are gated to
    /// their native OS; `File` and `Container` are portable.
    pub fn is_supported_on_host(&self) -> bool {
        match self {
            SourceKind::File { .. } | SourceKind::Container { .. } => true,
            SourceKind::WindowsEvent { .. } => cfg!(windows),
            SourceKind::MacOsUnified { .. } => cfg!(target_os = "macos"),
        }
    }
}
