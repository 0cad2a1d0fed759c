//! Writer defaults and the library version string.

use std::sync::LazyLock;

use super::stream::DEFAULT_BUFFER_CAPACITY;
use crate::ogawa::layout::LIBRARY_VERSION;

/// Archive metadata key naming the producing application.
pub const APPLICATION_KEY: &str = "_ai_Application";

/// Archive metadata key holding a free-form description.
pub const DESCRIPTION_KEY: &str = "_ai_Description";

/// Archive metadata key holding [`library_version_string`].
pub const ALEMBIC_VERSION_KEY: &str = "_ai_AlembicVersion";

static VERSION_STRING: LazyLock<String> = LazyLock::new(|| {
    let major = LIBRARY_VERSION / 10000;
    let minor = (LIBRARY_VERSION / 100) % 100;
    let patch = LIBRARY_VERSION % 100;
    let date = option_env!("ALEMBIC_BUILD_DATE").unwrap_or("unknown");
    let time = option_env!("ALEMBIC_BUILD_TIME").unwrap_or("unknown");
    format!("Alembic {major}.{minor}.{patch} (built {date} {time})")
});

/// Human-readable library version, e.g. `Alembic 1.8.10 (built Oct 16 2026 10:00:00)`.
pub fn library_version_string() -> &'static str {
    &VERSION_STRING
}

/// Options for creating an archive.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Store identical sample payloads once and share the blob.
    pub dedup: bool,
    /// Stored as `_ai_Application` when not empty.
    pub application_writer: String,
    /// Stored as `_ai_Description` when not empty.
    pub description: String,
    /// Write buffer size for file-backed archives.
    pub buffer_capacity: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            dedup: true,
            application_writer: String::new(),
            description: String::new(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl WriteOptions {
    pub fn with_application(mut self, name: impl Into<String>) -> Self {
        self.application_writer = name.into();
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        let v = library_version_string();
        assert!(v.starts_with("Alembic 1.8.10 (built "));
        assert!(std::ptr::eq(v, library_version_string()));
    }
}
