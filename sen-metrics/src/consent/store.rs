//! Persistence of the consent decision
//!
//! No locking: concurrent runs may read a stale record, which is harmless
//! because writes are rare, interactive and idempotent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{record_file_name, ConsentDecision, ConsentError};

/// What the store holds for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentRecord {
    /// No record yet; a normal state, not an error.
    Absent,
    Decided(ConsentDecision),
    /// Present but not `0` or `1`.
    Corrupted,
}

impl ConsentRecord {
    /// Interpret raw record contents. Trailing whitespace is ignored.
    pub fn parse(bytes: &[u8]) -> Self {
        let end = bytes
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);
        match &bytes[..end] {
            [byte] => ConsentDecision::from_byte(*byte)
                .map(ConsentRecord::Decided)
                .unwrap_or(ConsentRecord::Corrupted),
            _ => ConsentRecord::Corrupted,
        }
    }
}

/// Storage for the consent decision.
pub trait ConsentStore: Send + Sync {
    fn load(&self) -> Result<ConsentRecord, ConsentError>;

    fn save(&self, decision: ConsentDecision) -> Result<(), ConsentError>;
}

// ============================================================================
// File-based Consent Store
// ============================================================================

/// One-byte record file.
///
/// Default location: `<config-dir>/.<app>-metrics-optin`.
#[derive(Debug, Clone)]
pub struct FileConsentStore {
    path: PathBuf,
}

impl FileConsentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Record for `app_name` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, app_name: &str) -> Self {
        Self::new(dir.as_ref().join(record_file_name(app_name)))
    }

    /// Record for `app_name` in the user config directory.
    pub fn default_for_app(app_name: &str) -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        Self::in_dir(config_dir, app_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConsentStore for FileConsentStore {
    fn load(&self) -> Result<ConsentRecord, ConsentError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(ConsentRecord::parse(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ConsentRecord::Absent),
            Err(source) => Err(ConsentError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, decision: ConsentDecision) -> Result<(), ConsentError> {
        let save_error = |source| ConsentError::Save {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(save_error)?;
        }
        fs::write(&self.path, [decision.as_byte()]).map_err(save_error)
    }
}

// ============================================================================
// In-Memory Consent Store
// ============================================================================

#[derive(Debug)]
struct MemoryState {
    record: ConsentRecord,
    fail_loads: bool,
    fail_saves: bool,
}

/// In-memory store for tests or session-only consent.
///
/// Clones share the same record.
#[derive(Debug, Clone)]
pub struct MemoryConsentStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::with_record(ConsentRecord::Absent)
    }

    pub fn with_record(record: ConsentRecord) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                record,
                fail_loads: false,
                fail_saves: false,
            })),
        }
    }

    /// Store whose every load fails, as an unreadable file would.
    pub fn failing() -> Self {
        let store = Self::new();
        store.lock().fail_loads = true;
        store
    }

    /// Make every subsequent save fail.
    pub fn fail_saves(self) -> Self {
        self.lock().fail_saves = true;
        self
    }

    pub fn record(&self) -> ConsentRecord {
        self.lock().record
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryConsentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentStore for MemoryConsentStore {
    fn load(&self) -> Result<ConsentRecord, ConsentError> {
        let state = self.lock();
        if state.fail_loads {
            return Err(ConsentError::Read {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "load disabled"),
            });
        }
        Ok(state.record)
    }

    fn save(&self, decision: ConsentDecision) -> Result<(), ConsentError> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(ConsentError::Save {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "save disabled"),
            });
        }
        state.record = ConsentRecord::Decided(decision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        assert_eq!(
            ConsentRecord::parse(b"1"),
            ConsentRecord::Decided(ConsentDecision::OptedIn)
        );
        assert_eq!(
            ConsentRecord::parse(b"0\n"),
            ConsentRecord::Decided(ConsentDecision::OptedOut)
        );
        assert_eq!(ConsentRecord::parse(b""), ConsentRecord::Corrupted);
        assert_eq!(ConsentRecord::parse(b"yes"), ConsentRecord::Corrupted);
        assert_eq!(ConsentRecord::parse(b"2"), ConsentRecord::Corrupted);
    }

    #[test]
    fn test_file_store_absent_then_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConsentStore::in_dir(dir.path(), "myapp");

        assert_eq!(store.path(), dir.path().join(".myapp-metrics-optin"));
        assert_eq!(store.load().unwrap(), ConsentRecord::Absent);

        store.save(ConsentDecision::OptedIn).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), b"1");

        let reopened = FileConsentStore::in_dir(dir.path(), "myapp");
        assert_eq!(
            reopened.load().unwrap(),
            ConsentRecord::Decided(ConsentDecision::OptedIn)
        );
    }

    #[test]
    fn test_file_store_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConsentStore::in_dir(dir.path().join("nested/config"), "myapp");

        store.save(ConsentDecision::OptedOut).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), b"0");
    }

    #[test]
    fn test_file_store_read_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the record should be cannot be read as a file.
        let path = dir.path().join(".myapp-metrics-optin");
        fs::create_dir(&path).unwrap();

        let store = FileConsentStore::new(&path);
        assert!(matches!(store.load(), Err(ConsentError::Read { .. })));
    }

    #[test]
    fn test_memory_store_shares_state() {
        let store = MemoryConsentStore::new();
        let clone = store.clone();
        clone.save(ConsentDecision::OptedOut).unwrap();
        assert_eq!(
            store.load().unwrap(),
            ConsentRecord::Decided(ConsentDecision::OptedOut)
        );
    }
}
