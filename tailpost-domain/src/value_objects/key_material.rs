use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte symmetric key plus its short identifier. Loaded once at startup
/// from a file or environment variable and held for the process lifetime.
///
/// The key bytes zeroize on drop. `Debug` is implemented by hand so a stray
/// `{:?}` in a log statement never leaks key material — only the `key_id`
/// is shown.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; 32],
    #[zeroize(skip)]
    key_id: String,
}

impl KeyMaterial {
    pub fn new(key: [u8; 32], key_id: impl Into<String>) -> Self {
        Self {
            key,
            key_id: key_id.into(),
        }
    }

    /// Generates a key identifier of the `key-<unix_seconds>` form used
    /// when no explicit `key_id` is configured. The caller supplies the
    /// timestamp so this value object stays free of wall-clock access.
    pub fn generated_id(unix_seconds: u64) -> String {
        format!("key-{unix_seconds}")
    }

    pub fn key_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .finish()
    }
}
