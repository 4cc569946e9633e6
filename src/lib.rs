//! Color reference tables, nearest-color matching and sensor calibration.
//!
//! This crate implements the pipeline behind a handheld paint-color sensor:
//! a raw tristimulus sample is calibrated into RGB, and the RGB is matched
//! against a compact binary table of named reference colors.
//!
//! - [`encode`] / [`Database`]: the `DULX` binary table format, with a lazy,
//!   restartable decoder that skips damaged records instead of failing.
//! - [`find_best_match`] / [`find_top_matches`]: single-pass nearest-color search,
//!   by squared RGB distance or, through the `_by` variants, CIEDE2000.
//! - [`transform`]: IR compensation plus a brightness-switched calibration matrix;
//!   [`CalibrationMatrix::solve`] fits a matrix to reference points.
//! - [`TuningSession`]: the operator loop that nudges matrix coefficients
//!   toward a reference tile, persisted through a [`SettingsStore`].
//!
//! # Example
//!
//! ```
//! use colorsense_core::{
//!     encode, find_best_match, transform, CalibrationState, ColorRecord, Database, Lrv, Rgb,
//!     SensorSample,
//! };
//!
//! fn main() -> Result<(), colorsense_core::ColorSenseError> {
//!     let table = encode(&[
//!         ColorRecord::new("Vivid White", "W01", Rgb::new(247, 248, 244), Lrv(9120), 1),
//!         ColorRecord::new("Grey Port", "G12", Rgb::new(168, 160, 147), Lrv(3870), 2),
//!     ])?;
//!     let db = Database::new(table.bytes)?;
//!
//!     let state = CalibrationState::default();
//!     let output = transform(&SensorSample::new(9000, 9400, 8000, 150, 120), &state);
//!
//!     let best = find_best_match(output.rgb, db.records())?;
//!     println!("{} looks like {} ({})", output.rgb, best.record.name, best.record.code);
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Use [`MemoryStore`] to drive a tuning session without touching disk:
//!
//! ```
//! use colorsense_core::{CalibrationState, MemoryStore, ReferenceTarget, SensorSample, TuningSession};
//!
//! let store = MemoryStore::new();
//! let mut state = CalibrationState::default();
//! let mut session = TuningSession::new(ReferenceTarget::VividWhite);
//!
//! session.read(SensorSample::new(100, 100, 100, 0, 0), &state).unwrap();
//! session.propose().unwrap();
//! session.cancel().unwrap();
//! assert_eq!(store.save_count(), 0);
//! ```

#![warn(missing_docs)]

mod codec;
pub mod constants;
mod error;
mod matcher;
mod record;
mod state;
mod store;
mod transform;
mod tuning;

// Re-export public API
pub use codec::{
    Database, EncodeWarning, Encoded, HEADER_LEN, Header, MAGIC, MAX_RECORD_LEN,
    MAX_STRING_LEN, MIN_RECORD_LEN, Records, VERSION, decode, encode, encode_sources, record_from_source,
    truncate_utf8,
};
pub use error::ColorSenseError;
pub use matcher::{
    Match, Metric, ciede2000, distance_sq, find_best_match, find_best_match_by, find_top_matches,
    find_top_matches_by,
};
pub use record::{ColorRecord, ColorSource, Lrv, LrvValue, Rgb};
pub use state::{
    CalibrationMatrix, CalibrationState, LinearScaling, MatrixKind, SettingKey, SettingValue,
};
pub use store::{JsonFileStore, MemoryStore, SettingsStore};
pub use transform::{
    ColorReading, SensorSample, TransformOutput, TransformPath, compensate, select_path, transform,
};
pub use tuning::{
    AppliedChange, ApplyReport, Channel, Proposal, ReferenceTarget, TuningConfig, TuningPhase,
    TuningReading, TuningSession, apply_proposal,
};
