//! Persistence for [`CalibrationState`].

use crate::error::ColorSenseError;
use crate::state::CalibrationState;

use log::{debug, info};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

// =============================================================================
// Settings Store Trait
// =============================================================================

/// Trait for persistent calibration storage.
///
/// This allows the tuning session to be driven against an in-memory store in
/// tests and a file on disk in the tool.
pub trait SettingsStore: Send + Sync {
    /// Load the stored calibration.
    fn load(&self) -> Result<CalibrationState, ColorSenseError>;

    /// Persist `state`, replacing whatever was stored.
    fn save(&self, state: &CalibrationState) -> Result<(), ColorSenseError>;
}

// =============================================================================
// JSON File Store
// =============================================================================

/// Calibration kept as pretty-printed JSON on disk.
///
/// A missing file loads as [`CalibrationState::default`]; fields absent from
/// the file take their default values.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path`. Nothing is read until [`load`](SettingsStore::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<CalibrationState, ColorSenseError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let state = serde_json::from_str(&text)?;
                debug!("loaded calibration from {}", self.path.display());
                Ok(state)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("no calibration at {}, using defaults", self.path.display());
                Ok(CalibrationState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &CalibrationState) -> Result<(), ColorSenseError> {
        let mut text = serde_json::to_string_pretty(state)?;
        text.push('\n');

        // Same directory as the target so the rename stays atomic.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(text.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        info!("saved calibration to {}", self.path.display());
        Ok(())
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// An in-memory store for tests and demos.
///
/// # Example
///
/// ```
/// use colorsense_core::{CalibrationState, MemoryStore, SettingsStore};
///
/// let store = MemoryStore::new();
/// let mut state = store.load().unwrap();
/// state.threshold = 9000;
/// store.save(&state).unwrap();
/// assert_eq!(store.load().unwrap().threshold, 9000);
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<CalibrationState>,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemoryStore {
    /// Create a store holding the default calibration.
    pub fn new() -> Self {
        Self::with_state(CalibrationState::default())
    }

    /// Create a store holding `state`.
    pub fn with_state(state: CalibrationState) -> Self {
        Self {
            state: Mutex::new(state),
            saves: AtomicUsize::new(0),
            fail_saves: false,
        }
    }

    /// A store whose every save fails with an I/O error.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::new()
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of what is currently stored.
    pub fn snapshot(&self) -> CalibrationState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<CalibrationState, ColorSenseError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &CalibrationState) -> Result<(), ColorSenseError> {
        if self.fail_saves {
            return Err(std::io::Error::other("store is read-only").into());
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
