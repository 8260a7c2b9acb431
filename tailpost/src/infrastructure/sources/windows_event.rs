//! Windows Event Log source, polling the Win32 Event Log API (`EvtQuery`/
//! `EvtNext`/`EvtRender`) directly by FFI against `wevtapi.dll`, the same
//! direct-`extern "system"` style `platform/windows.rs` uses for
//! `IsUserAnAdmin` rather than pulling in a bindings crate. Only
//! constructible on Windows; attempting to build one elsewhere fails with
//! [`TailPostError::PlatformUnsupported`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use tailpost_domain::services::{BoxLineSequence, LineSource};
use tailpost_domain::{LogLine, TailPostError};

const CHANNEL_CAPACITY: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct WindowsEventLineStream {
    log_name: String,
    min_level: String,
    join_handle: Option<tokio::task::JoinHandle<()>>,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    rx: Option<mpsc::Receiver<LogLine>>,
}

impl WindowsEventLineStream {
    /// Fails with `PlatformUnsupported` unless running on Windows.
    pub fn new(log_name: impl Into<String>, min_level: impl Into<String>) -> Result<Self, TailPostError> {
        if !cfg!(windows) {
            return Err(TailPostError::PlatformUnsupported(
                "windows_event source requires Windows".to_string(),
            ));
        }
        Ok(Self {
            log_name: log_name.into(),
            min_level: min_level.into(),
            join_handle: None,
            stop_tx: None,
            rx: None,
        })
    }
}

#[async_trait]
impl LineSource for WindowsEventLineStream {
    async fn start(&mut self) -> Result<(), TailPostError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let log_name = self.log_name.clone();
        let min_level = self.min_level.clone();

        #[cfg(windows)]
        {
            let handle = tokio::task::spawn_blocking(move || {
                platform::poll_event_log(log_name, min_level, tx, stop_rx, POLL_INTERVAL);
            });
            self.join_handle = Some(handle);
        }
        #[cfg(not(windows))]
        {
            let _ = (log_name, min_level, tx, stop_rx);
            return Err(TailPostError::PlatformUnsupported(
                "windows_event source requires Windows".to_string(),
            ));
        }

        self.stop_tx = Some(stop_tx);
        self.rx = Some(rx);
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

/// Formats a record the same deterministic way on every platform so the
/// dispatch loop and downstream sinks never need to branch on OS.
fn format_event(
    timestamp: &str,
    source: &str,
    event_id: u32,
    computer: &str,
    provider: &str,
    level: &str,
    record_id: u64,
    message: &str,
) -> String {
    let single_line_message = message.replace('\n', " ").replace('\r', "");
    format!(
        "[{timestamp}] {source} EventID={event_id} Computer={computer} Provider={provider} Level={level} RecordID={record_id} Message={single_line_message}"
    )
}

#[cfg(windows)]
mod platform {
    use super::*;
    use std::ffi::{c_void, OsStr};
    use std::os::windows::ffi::OsStrExt;
    use std::ptr;

    type EvtHandle = *mut c_void;

    const EVT_QUERY_CHANNEL_PATH: u32 = 0x1;
    const EVT_RENDER_EVENT_XML: u32 = 1;
    const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    const ERROR_NO_MORE_ITEMS: u32 = 259;

    #[link(name = "wevtapi")]
    extern "system" {
        fn EvtQuery(session: EvtHandle, path: *const u16, query: *const u16, flags: u32) -> EvtHandle;
        fn EvtNext(
            result_set: EvtHandle,
            events_size: u32,
            event_array: *mut EvtHandle,
            timeout: u32,
            flags: u32,
            returned: *mut u32,
        ) -> i32;
        fn EvtRender(
            context: EvtHandle,
            fragment: EvtHandle,
            flags: u32,
            buffer_size: u32,
            buffer: *mut c_void,
            buffer_used: *mut u32,
            property_count: *mut u32,
        ) -> i32;
        fn EvtClose(object: EvtHandle) -> i32;
    }

    /// Closes the handle on drop, covering every early-return path through
    /// `fetch_new_events` without a matching `EvtClose` at each one.
    struct EvtHandleGuard(EvtHandle);

    impl Drop for EvtHandleGuard {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe {
                    EvtClose(self.0);
                }
            }
        }
    }

    fn to_wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
    }

    /// Renders one event handle to its XML form via `EvtRender`, growing the
    /// buffer once after the size-query call reports how big it needs to be.
    fn render_event_xml(event: EvtHandle) -> Result<String, String> {
        unsafe {
            let mut buffer_used: u32 = 0;
            let mut property_count: u32 = 0;
            let sized = EvtRender(
                ptr::null_mut(),
                event,
                EVT_RENDER_EVENT_XML,
                0,
                ptr::null_mut(),
                &mut buffer_used,
                &mut property_count,
            );
            if sized == 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error().map(|c| c as u32) != Some(ERROR_INSUFFICIENT_BUFFER) {
                    return Err(format!("EvtRender (size query) failed: {err}"));
                }
            }
            if buffer_used == 0 {
                return Err("EvtRender reported a zero-size buffer".to_string());
            }

            let mut buffer: Vec<u16> = vec![0; (buffer_used as usize).div_ceil(2)];
            let rendered = EvtRender(
                ptr::null_mut(),
                event,
                EVT_RENDER_EVENT_XML,
                buffer_used,
                buffer.as_mut_ptr() as *mut c_void,
                &mut buffer_used,
                &mut property_count,
            );
            if rendered == 0 {
                return Err(format!("EvtRender failed: {}", std::io::Error::last_os_error()));
            }

            Ok(String::from_utf16_lossy(&buffer).trim_end_matches('\0').to_string())
        }
    }

    /// Pulls the text content of the first `<tag>...</tag>` in `xml`. Good
    /// enough for the flat, single-occurrence fields the system event XML
    /// schema renders; not a general-purpose XML parser.
    fn extract_tag(xml: &str, tag: &str) -> Option<String> {
        let open = format!("<{tag}");
        let start = xml.find(&open)?;
        let tag_close = xml[start..].find('>')? + start;
        if xml.as_bytes().get(tag_close.wrapping_sub(1)) == Some(&b'/') {
            return None; // self-closing, no text content
        }
        let content_start = tag_close + 1;
        let close = format!("</{tag}>");
        let content_end = xml[content_start..].find(&close)? + content_start;
        Some(xml[content_start..content_end].to_string())
    }

    fn extract_attr(xml: &str, tag: &str, attr: &str) -> Option<String> {
        let open = format!("<{tag}");
        let start = xml.find(&open)?;
        let tag_close = xml[start..].find('>')? + start;
        let tag_text = &xml[start..tag_close];
        let pat = format!("{attr}=\"");
        let attr_start = tag_text.find(&pat)? + pat.len();
        let attr_end = tag_text[attr_start..].find('"')? + attr_start;
        Some(tag_text[attr_start..attr_end].to_string())
    }

    /// Win32 event levels: 1 Critical, 2 Error, 3 Warning, 4 Information, 5
    /// Verbose. Lower is more severe.
    fn level_rank(level: &str) -> u8 {
        level.trim().parse::<u8>().unwrap_or(4)
    }

    fn level_name(level: &str) -> &'static str {
        match level_rank(level) {
            1 => "Critical",
            2 => "Error",
            3 => "Warning",
            5 => "Verbose",
            _ => "Information",
        }
    }

    fn rank_from_name(level_name: &str) -> u8 {
        match level_name {
            "Critical" => 1,
            "Error" => 2,
            "Warning" => 3,
            "Verbose" => 5,
            _ => 4,
        }
    }

    /// Maps the configured `min_level` to the numeric rank threshold: events
    /// at or more severe than this rank (numerically `<=`) pass the filter.
    fn min_level_rank(min_level: &str) -> u8 {
        match min_level.to_ascii_lowercase().as_str() {
            "critical" => 1,
            "error" => 2,
            "warning" => 3,
            "verbose" => 5,
            _ => 4,
        }
    }

    fn parse_event_xml(xml: &str) -> Option<RawEvent> {
        let record_id = extract_tag(xml, "EventRecordID")?.trim().parse().ok()?;
        let event_id = extract_tag(xml, "EventID")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let level = extract_tag(xml, "Level").unwrap_or_else(|| "4".to_string());
        Some(RawEvent {
            record_id,
            timestamp: extract_attr(xml, "TimeCreated", "SystemTime").unwrap_or_default(),
            event_id,
            computer: extract_tag(xml, "Computer").unwrap_or_default(),
            provider: extract_attr(xml, "Provider", "Name").unwrap_or_default(),
            level: level_name(&level).to_string(),
            // Full message-table formatting needs EvtFormatMessage plus a
            // publisher metadata handle; the raw EventData fragment is what
            // gets surfaced instead.
            message: extract_tag(xml, "EventData").unwrap_or_default(),
        })
    }

    /// One `EvtQuery`/`EvtNext` pass over `log_name`, rendering and filtering
    /// each event handle before closing it. Returns once `EvtNext` reports
    /// `ERROR_NO_MORE_ITEMS`.
    fn fetch_new_events(log_name: &str, min_level: &str, after_record_id: u64) -> Result<Vec<RawEvent>, String> {
        let channel = to_wide(log_name);
        let query_handle = unsafe { EvtQuery(ptr::null_mut(), channel.as_ptr(), ptr::null(), EVT_QUERY_CHANNEL_PATH) };
        if query_handle.is_null() {
            return Err(format!("EvtQuery({log_name}) failed: {}", std::io::Error::last_os_error()));
        }
        let query = EvtHandleGuard(query_handle);
        let min_rank = min_level_rank(min_level);

        let mut events = Vec::new();
        let mut batch: [EvtHandle; 16] = [ptr::null_mut(); 16];

        loop {
            let mut returned: u32 = 0;
            let ok = unsafe { EvtNext(query.0, batch.len() as u32, batch.as_mut_ptr(), 0, 0, &mut returned) };
            if ok == 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error().map(|c| c as u32) == Some(ERROR_NO_MORE_ITEMS) {
                    break;
                }
                return Err(format!("EvtNext failed: {err}"));
            }

            for &handle in &batch[..returned as usize] {
                let event = EvtHandleGuard(handle);
                match render_event_xml(event.0) {
                    Ok(xml) => {
                        if let Some(parsed) = parse_event_xml(&xml) {
                            if parsed.record_id > after_record_id && rank_from_name(&parsed.level) <= min_rank {
                                events.push(parsed);
                            }
                        }
                    }
                    Err(e) => tracing::warn!(log_name = %log_name, error = %e, "failed to render Windows event"),
                }
            }

            if returned < batch.len() as u32 {
                break;
            }
        }

        Ok(events)
    }

    /// Polls the Win32 Event Log API on a timer, tracking the last-seen
    /// record id so repeated polls never re-emit an event.
    pub(super) fn poll_event_log(
        log_name: String,
        min_level: String,
        tx: mpsc::Sender<LogLine>,
        mut stop_rx: tokio::sync::oneshot::Receiver<()>,
        interval: Duration,
    ) {
        let mut last_record_id: u64 = 0;
        loop {
            if stop_rx.try_recv().is_ok() {
                return;
            }
            match fetch_new_events(&log_name, &min_level, last_record_id) {
                Ok(events) => {
                    for event in events {
                        last_record_id = last_record_id.max(event.record_id);
                        let line = format_event(
                            &event.timestamp,
                            &log_name,
                            event.event_id,
                            &event.computer,
                            &event.provider,
                            &event.level,
                            event.record_id,
                            &event.message,
                        );
                        let observed_at = Utc::now();
                        if tx
                            .blocking_send(LogLine::new(line, log_name.clone(), observed_at))
                            .is_err()
                        {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(log_name = %log_name, error = %e, "windows event log query failed");
                }
            }
            std::thread::sleep(interval);
        }
    }

    pub(super) struct RawEvent {
        pub record_id: u64,
        pub timestamp: String,
        pub event_id: u32,
        pub computer: String,
        pub provider: String,
        pub level: String,
        pub message: String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_event_as_single_line_with_embedded_newlines_stripped() {
        let formatted = format_event("2026-01-01T00:00:00Z", "App", 42, "HOST", "Prov", "Error", 7, "line one\nline two");
        assert_eq!(
            formatted,
            "[2026-01-01T00:00:00Z] App EventID=42 Computer=HOST Provider=Prov Level=Error RecordID=7 Message=line one line two"
        );
    }

    #[test]
    fn rejects_construction_on_non_windows() {
        if !cfg!(windows) {
            let result = WindowsEventLineStream::new("Application", "info");
            assert!(result.is_err());
        }
    }
}
