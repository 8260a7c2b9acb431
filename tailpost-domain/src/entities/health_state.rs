use std::time::Instant;

/// Readiness state exposed to the HTTP health handlers. The supervisor is
/// the sole writer; handlers read it concurrently, so callers wrap this in
/// an `Arc<RwLock<HealthState>>` rather than sharing it by value.
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    ready: bool,
    started_at: Instant,
}

impl HealthState {
    pub fn new(started_at: Instant) -> Self {
        Self {
            ready: false,
            started_at,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
