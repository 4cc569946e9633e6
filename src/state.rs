//! Calibration state consumed by the transform engine.

use crate::constants::{defaults, solver};
use crate::error::ColorSenseError;
use crate::record::Rgb;
use crate::transform::SensorSample;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two calibration matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixKind {
    /// Used above the brightness threshold.
    Bright,
    /// Used at or below the brightness threshold.
    Dark,
}

impl MatrixKind {
    /// Both kinds, bright first.
    pub const ALL: [MatrixKind; 2] = [MatrixKind::Bright, MatrixKind::Dark];

    /// Prefix used by the flat setting keys, e.g. `darkMatrix`.
    pub fn key_prefix(self) -> &'static str {
        match self {
            MatrixKind::Bright => "brightMatrix",
            MatrixKind::Dark => "darkMatrix",
        }
    }
}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixKind::Bright => f.write_str("bright"),
            MatrixKind::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for MatrixKind {
    type Err = ColorSenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bright" => Ok(MatrixKind::Bright),
            "dark" => Ok(MatrixKind::Dark),
            _ => Err(ColorSenseError::InvalidSettingValue {
                key: "matrix".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A row-major 3x3 matrix mapping `(X', Y', Z')` to `(R, G, B)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationMatrix(pub [f64; 9]);

impl CalibrationMatrix {
    /// Coefficient at `row`, `col`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * 3 + col]
    }

    /// Multiply a column vector.
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let row = |r: usize| self.get(r, 0) * v[0] + self.get(r, 1) * v[1] + self.get(r, 2) * v[2];
        [row(0), row(1), row(2)]
    }

    /// Fit a matrix to reference points by least squares.
    ///
    /// Each point pairs a sample with the color it should produce. The fit
    /// runs on raw `X, Y, Z`: IR compensation is not applied, so either fit
    /// with both IR coefficients at zero or let the matrix absorb the leakage.
    ///
    /// # Errors
    /// [`ColorSenseError::Solve`] with fewer than three points, a point that
    /// reads zero on X, Y and Z, or points that do not span three dimensions.
    pub fn solve(points: &[(SensorSample, Rgb)]) -> Result<Self, ColorSenseError> {
        if points.len() < solver::MIN_POINTS {
            return Err(ColorSenseError::solve(format!(
                "need at least {} reference points, got {}",
                solver::MIN_POINTS,
                points.len()
            )));
        }
        if let Some(i) = points.iter().position(|(s, _)| s.x == 0 && s.y == 0 && s.z == 0) {
            return Err(ColorSenseError::solve(format!("point {i} reads zero on X, Y and Z")));
        }
        for (i, (a, _)) in points.iter().enumerate() {
            if let Some(j) = points[i + 1..].iter().position(|(b, _)| (a.x, a.y, a.z) == (b.x, b.y, b.z)) {
                warn!("reference points {} and {} have the same X, Y, Z", i, i + 1 + j);
            }
        }

        let inputs: Vec<[f64; 3]> = points
            .iter()
            .map(|(s, _)| [s.x, s.y, s.z].map(|c| f64::from(c) / solver::SENSOR_FULL_SCALE))
            .collect();

        // Normal equations (AᵀA) m = Aᵀb; AᵀA is shared by all three rows.
        let mut ata = [[0.0; 3]; 3];
        for a in &inputs {
            for (i, row) in ata.iter_mut().enumerate() {
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell += a[i] * a[j];
                }
            }
        }
        let inverse = invert3(&ata)
            .ok_or_else(|| ColorSenseError::solve("reference points do not span three dimensions"))?;

        let mut m = [0.0; 9];
        for row in 0..3 {
            let mut atb = [0.0; 3];
            for (a, (_, rgb)) in inputs.iter().zip(points) {
                let target = f64::from(rgb.channels()[row]) / solver::CHANNEL_FULL_SCALE;
                for (acc, x) in atb.iter_mut().zip(a) {
                    *acc += x * target;
                }
            }
            for col in 0..3 {
                let coefficient: f64 = inverse[col].iter().zip(&atb).map(|(inv, b)| inv * b).sum();
                // Undo the input and target normalisation.
                m[row * 3 + col] = coefficient * solver::CHANNEL_FULL_SCALE / solver::SENSOR_FULL_SCALE;
            }
        }

        let matrix = CalibrationMatrix(m);
        debug!("solved matrix {:?} from {} reference points", matrix.0, points.len());
        Ok(matrix)
    }
}

/// Inverse of a 3x3 matrix by its adjugate, or `None` if it is singular.
fn invert3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let adj = [
        [
            m[1][1] * m[2][2] - m[1][2] * m[2][1],
            m[0][2] * m[2][1] - m[0][1] * m[2][2],
            m[0][1] * m[1][2] - m[0][2] * m[1][1],
        ],
        [
            m[1][2] * m[2][0] - m[1][0] * m[2][2],
            m[0][0] * m[2][2] - m[0][2] * m[2][0],
            m[0][2] * m[1][0] - m[0][0] * m[1][2],
        ],
        [
            m[1][0] * m[2][1] - m[1][1] * m[2][0],
            m[0][1] * m[2][0] - m[0][0] * m[2][1],
            m[0][0] * m[1][1] - m[0][1] * m[1][0],
        ],
    ];
    let det = m[0][0] * adj[0][0] + m[0][1] * adj[1][0] + m[0][2] * adj[2][0];
    let scale = m.iter().flatten().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || det.abs() <= solver::SINGULAR_EPSILON * scale.powi(3) {
        return None;
    }
    Some(adj.map(|row| row.map(|v| v / det)))
}

/// Per-channel gain and offset used when matrix calibration is off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearScaling {
    /// Red gain on X'.
    pub r_slope: f64,
    /// Red offset.
    pub r_offset: f64,
    /// Green gain on Y'.
    pub g_slope: f64,
    /// Green offset.
    pub g_offset: f64,
    /// Blue gain on Z'.
    pub b_slope: f64,
    /// Blue offset.
    pub b_offset: f64,
}

impl Default for LinearScaling {
    fn default() -> Self {
        Self {
            r_slope: defaults::R_SLOPE,
            r_offset: defaults::R_OFFSET,
            g_slope: defaults::G_SLOPE,
            g_offset: defaults::G_OFFSET,
            b_slope: defaults::B_SLOPE,
            b_offset: defaults::B_OFFSET,
        }
    }
}

impl LinearScaling {
    /// Apply gain and offset channel by channel.
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        [
            self.r_slope * v[0] + self.r_offset,
            self.g_slope * v[1] + self.g_offset,
            self.b_slope * v[2] + self.b_offset,
        ]
    }
}

/// Everything the transform engine needs besides the sample itself.
///
/// Loaded once at start-up through a [`SettingsStore`](crate::SettingsStore)
/// and written back only by the tuning apply step or [`CalibrationState::set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationState {
    /// Matrix used above the threshold.
    pub bright_matrix: CalibrationMatrix,
    /// Matrix used at or below the threshold.
    pub dark_matrix: CalibrationMatrix,
    /// Y-channel count separating bright from dark.
    #[serde(alias = "dynamicThreshold")]
    pub threshold: u32,
    /// Use matrix calibration instead of linear scaling.
    pub use_matrix_calibration: bool,
    /// Switch between bright and dark by the threshold.
    pub enable_dynamic_calibration: bool,
    /// IR1 leakage subtracted from X.
    pub ir1_comp: f64,
    /// IR2 leakage subtracted from Z.
    pub ir2_comp: f64,
    /// Fallback scaling.
    pub linear: LinearScaling,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            bright_matrix: CalibrationMatrix(defaults::BRIGHT_MATRIX),
            dark_matrix: CalibrationMatrix(defaults::DARK_MATRIX),
            threshold: defaults::THRESHOLD,
            use_matrix_calibration: true,
            enable_dynamic_calibration: true,
            ir1_comp: defaults::IR1_COMP,
            ir2_comp: defaults::IR2_COMP,
            linear: LinearScaling::default(),
        }
    }
}

impl CalibrationState {
    /// The matrix of the given kind.
    pub fn matrix(&self, kind: MatrixKind) -> &CalibrationMatrix {
        match kind {
            MatrixKind::Bright => &self.bright_matrix,
            MatrixKind::Dark => &self.dark_matrix,
        }
    }

    /// Mutable access to the matrix of the given kind.
    pub fn matrix_mut(&mut self, kind: MatrixKind) -> &mut CalibrationMatrix {
        match kind {
            MatrixKind::Bright => &mut self.bright_matrix,
            MatrixKind::Dark => &mut self.dark_matrix,
        }
    }

    /// Read a setting by its flat key.
    ///
    /// # Errors
    /// [`ColorSenseError::UnknownSetting`] if the key does not exist.
    pub fn get(&self, key: &str) -> Result<SettingValue, ColorSenseError> {
        Ok(self.value_of(key.parse()?))
    }

    /// Write a setting by its flat key, parsing `value` for the key's type.
    ///
    /// Booleans accept `true`, `false`, `1` and `0`.
    ///
    /// # Errors
    /// [`ColorSenseError::UnknownSetting`] for an unknown key,
    /// [`ColorSenseError::InvalidSettingValue`] if `value` does not parse
    /// or is not a finite number.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ColorSenseError> {
        let setting: SettingKey = key.parse()?;
        let invalid = || ColorSenseError::InvalidSettingValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let raw = value.trim();

        let number = || raw.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(invalid);
        let flag = || match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(invalid()),
        };

        match setting {
            SettingKey::Matrix(kind, index) => self.matrix_mut(kind).0[index] = number()?,
            SettingKey::Threshold => self.threshold = raw.parse().map_err(|_| invalid())?,
            SettingKey::UseMatrixCalibration => self.use_matrix_calibration = flag()?,
            SettingKey::EnableDynamicCalibration => self.enable_dynamic_calibration = flag()?,
            SettingKey::Ir1Comp => self.ir1_comp = number()?,
            SettingKey::Ir2Comp => self.ir2_comp = number()?,
            SettingKey::RSlope => self.linear.r_slope = number()?,
            SettingKey::ROffset => self.linear.r_offset = number()?,
            SettingKey::GSlope => self.linear.g_slope = number()?,
            SettingKey::GOffset => self.linear.g_offset = number()?,
            SettingKey::BSlope => self.linear.b_slope = number()?,
            SettingKey::BOffset => self.linear.b_offset = number()?,
        }
        Ok(())
    }

    /// Every setting as `(key, value)`, in a stable order.
    pub fn entries(&self) -> Vec<(SettingKey, SettingValue)> {
        SettingKey::all().map(|key| (key, self.value_of(key))).collect()
    }

    fn value_of(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::Matrix(kind, index) => SettingValue::Number(self.matrix(kind).0[index]),
            SettingKey::Threshold => SettingValue::Count(self.threshold),
            SettingKey::UseMatrixCalibration => SettingValue::Flag(self.use_matrix_calibration),
            SettingKey::EnableDynamicCalibration => SettingValue::Flag(self.enable_dynamic_calibration),
            SettingKey::Ir1Comp => SettingValue::Number(self.ir1_comp),
            SettingKey::Ir2Comp => SettingValue::Number(self.ir2_comp),
            SettingKey::RSlope => SettingValue::Number(self.linear.r_slope),
            SettingKey::ROffset => SettingValue::Number(self.linear.r_offset),
            SettingKey::GSlope => SettingValue::Number(self.linear.g_slope),
            SettingKey::GOffset => SettingValue::Number(self.linear.g_offset),
            SettingKey::BSlope => SettingValue::Number(self.linear.b_slope),
            SettingKey::BOffset => SettingValue::Number(self.linear.b_offset),
        }
    }
}

/// A flat, individually addressable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// `brightMatrix0..8` / `darkMatrix0..8`.
    Matrix(MatrixKind, usize),
    /// `threshold` (also accepted as `dynamicThreshold`).
    Threshold,
    /// `useMatrixCalibration`.
    UseMatrixCalibration,
    /// `enableDynamicCalibration`.
    EnableDynamicCalibration,
    /// `ir1Comp`.
    Ir1Comp,
    /// `ir2Comp`.
    Ir2Comp,
    /// `rSlope`.
    RSlope,
    /// `rOffset`.
    ROffset,
    /// `gSlope`.
    GSlope,
    /// `gOffset`.
    GOffset,
    /// `bSlope`.
    BSlope,
    /// `bOffset`.
    BOffset,
}

impl SettingKey {
    const SCALARS: [SettingKey; 11] = [
        SettingKey::Threshold,
        SettingKey::UseMatrixCalibration,
        SettingKey::EnableDynamicCalibration,
        SettingKey::Ir1Comp,
        SettingKey::Ir2Comp,
        SettingKey::RSlope,
        SettingKey::ROffset,
        SettingKey::GSlope,
        SettingKey::GOffset,
        SettingKey::BSlope,
        SettingKey::BOffset,
    ];

    /// All keys: both matrices, then the scalar settings.
    pub fn all() -> impl Iterator<Item = SettingKey> {
        MatrixKind::ALL
            .into_iter()
            .flat_map(|kind| (0..9).map(move |i| SettingKey::Matrix(kind, i)))
            .chain(Self::SCALARS)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingKey::Matrix(kind, index) => return write!(f, "{}{}", kind.key_prefix(), index),
            SettingKey::Threshold => "threshold",
            SettingKey::UseMatrixCalibration => "useMatrixCalibration",
            SettingKey::EnableDynamicCalibration => "enableDynamicCalibration",
            SettingKey::Ir1Comp => "ir1Comp",
            SettingKey::Ir2Comp => "ir2Comp",
            SettingKey::RSlope => "rSlope",
            SettingKey::ROffset => "rOffset",
            SettingKey::GSlope => "gSlope",
            SettingKey::GOffset => "gOffset",
            SettingKey::BSlope => "bSlope",
            SettingKey::BOffset => "bOffset",
        };
        f.write_str(name)
    }
}

impl FromStr for SettingKey {
    type Err = ColorSenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for kind in MatrixKind::ALL {
            if let Some(index) = s.strip_prefix(kind.key_prefix()) {
                return match index.parse::<usize>() {
                    Ok(i) if i < 9 && index.len() == 1 => Ok(SettingKey::Matrix(kind, i)),
                    _ => Err(ColorSenseError::UnknownSetting(s.to_string())),
                };
            }
        }
        if s == "dynamicThreshold" {
            return Ok(SettingKey::Threshold);
        }
        Self::SCALARS
            .into_iter()
            .find(|key| key.to_string() == s)
            .ok_or_else(|| ColorSenseError::UnknownSetting(s.to_string()))
    }
}

/// The value of a flat setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    /// A coefficient.
    Number(f64),
    /// A sensor count.
    Count(u32),
    /// A switch.
    Flag(bool),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Number(v) => write!(f, "{v}"),
            SettingValue::Count(v) => write!(f, "{v}"),
            SettingValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = CalibrationState::default();
        assert_eq!(state.threshold, 8000);
        assert!(state.use_matrix_calibration);
        assert!(state.enable_dynamic_calibration);
        assert_eq!(state.bright_matrix.0[0], 0.1054);
        assert_eq!(state.dark_matrix.0[8], 0.058);
    }

    #[test]
    fn test_matrix_apply_row_major() {
        let m = CalibrationMatrix([1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0]);
        assert_eq!(m.apply([1.0, 1.0, 1.0]), [6.0, 1.0, 2.0]);
        assert_eq!(m.get(0, 2), 3.0);
    }

    fn exact_points(m: &CalibrationMatrix, samples: &[[u16; 3]]) -> Vec<(SensorSample, Rgb)> {
        samples
            .iter()
            .map(|&[x, y, z]| {
                let rgb = m.apply([x, y, z].map(f64::from)).map(|v| v.round() as u8);
                (SensorSample::new(x, y, z, 0, 0), Rgb::from(rgb))
            })
            .collect()
    }

    #[test]
    fn test_solve_recovers_known_matrix() {
        // Every sample is a multiple of 1000 so the targets are exact integers.
        let known = CalibrationMatrix([0.02, 0.001, 0.0, 0.0, 0.025, -0.002, 0.001, 0.0, 0.03]);
        let points = exact_points(
            &known,
            &[[5000, 4000, 3000], [8000, 6000, 2000], [2000, 7000, 6000], [3000, 3000, 8000], [9000, 2000, 1000]],
        );
        assert_eq!(points[0].1, Rgb::new(104, 94, 95));

        let solved = CalibrationMatrix::solve(&points).unwrap();
        for (got, want) in solved.0.iter().zip(known.0) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn test_solved_matrix_drives_transform() {
        let known = CalibrationMatrix([0.02, 0.001, 0.0, 0.0, 0.025, -0.002, 0.001, 0.0, 0.03]);
        let points = exact_points(&known, &[[5000, 4000, 3000], [8000, 6000, 2000], [2000, 7000, 6000]]);

        let mut state = CalibrationState {
            ir1_comp: 0.0,
            ir2_comp: 0.0,
            enable_dynamic_calibration: false,
            ..Default::default()
        };
        *state.matrix_mut("bright".parse().unwrap()) = CalibrationMatrix::solve(&points).unwrap();
        for (sample, rgb) in &points {
            assert_eq!(crate::transform::transform(sample, &state).rgb, *rgb);
        }
    }

    #[test]
    fn test_solve_rejects_too_few_points() {
        let points = vec![
            (SensorSample::new(5000, 4000, 3000, 0, 0), Rgb::new(104, 94, 95)),
            (SensorSample::new(8000, 6000, 2000, 0, 0), Rgb::new(166, 146, 68)),
        ];
        assert!(matches!(CalibrationMatrix::solve(&points), Err(ColorSenseError::Solve { .. })));
        assert!(matches!(CalibrationMatrix::solve(&[]), Err(ColorSenseError::Solve { .. })));
    }

    #[test]
    fn test_solve_rejects_degenerate_points() {
        // All samples lie on one line through the origin.
        let collinear: Vec<_> = (1..=4u16)
            .map(|k| (SensorSample::new(1000 * k, 1000 * k, 1000 * k, 0, 0), Rgb::new(10, 10, 10)))
            .collect();
        assert!(matches!(CalibrationMatrix::solve(&collinear), Err(ColorSenseError::Solve { .. })));

        // Two distinct directions only.
        let planar = vec![
            (SensorSample::new(1000, 2000, 500, 0, 0), Rgb::new(10, 10, 10)),
            (SensorSample::new(2000, 4000, 1000, 0, 0), Rgb::new(20, 20, 20)),
            (SensorSample::new(3000, 1000, 3000, 0, 0), Rgb::new(30, 30, 30)),
        ];
        assert!(matches!(CalibrationMatrix::solve(&planar), Err(ColorSenseError::Solve { .. })));

        let mut dark = planar.clone();
        dark[1].0 = SensorSample::new(0, 0, 0, 40, 40);
        match CalibrationMatrix::solve(&dark) {
            Err(ColorSenseError::Solve { reason }) => assert!(reason.contains("point 1")),
            other => panic!("expected solve error, got {other:?}"),
        }
    }

    #[test]
    fn test_set_and_get_flat_keys() {
        let mut state = CalibrationState::default();

        state.set("darkMatrix4", "0.05").unwrap();
        state.set("threshold", "9000").unwrap();
        state.set("useMatrixCalibration", "0").unwrap();
        state.set("ir2Comp", " 0.31 ").unwrap();
        state.set("dynamicThreshold", "7000").unwrap();

        assert_eq!(state.dark_matrix.0[4], 0.05);
        assert_eq!(state.get("darkMatrix4").unwrap(), SettingValue::Number(0.05));
        assert_eq!(state.get("threshold").unwrap(), SettingValue::Count(7000));
        assert_eq!(state.get("useMatrixCalibration").unwrap(), SettingValue::Flag(false));
        assert_eq!(state.ir2_comp, 0.31);
    }

    #[test]
    fn test_set_rejects_unknown_and_invalid() {
        let mut state = CalibrationState::default();
        let before = state.clone();

        assert!(matches!(state.set("brightMatrix9", "1"), Err(ColorSenseError::UnknownSetting(_))));
        assert!(matches!(state.set("brightMatrix01", "1"), Err(ColorSenseError::UnknownSetting(_))));
        assert!(matches!(state.set("gain", "1"), Err(ColorSenseError::UnknownSetting(_))));
        assert!(matches!(
            state.set("brightMatrix0", "abc"),
            Err(ColorSenseError::InvalidSettingValue { .. })
        ));
        assert!(matches!(
            state.set("ir1Comp", "NaN"),
            Err(ColorSenseError::InvalidSettingValue { .. })
        ));
        assert!(matches!(
            state.set("enableDynamicCalibration", "maybe"),
            Err(ColorSenseError::InvalidSettingValue { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_entries_cover_every_key_once() {
        let entries = CalibrationState::default().entries();
        assert_eq!(entries.len(), 18 + 11);
        assert_eq!(entries[0].0.to_string(), "brightMatrix0");
        assert_eq!(entries[17].0.to_string(), "darkMatrix8");

        for (key, _) in &entries {
            let parsed: SettingKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, *key);
        }
    }

    #[test]
    fn test_json_uses_device_names() {
        let json = serde_json::to_value(CalibrationState::default()).unwrap();
        assert!(json.get("brightMatrix").is_some());
        assert!(json.get("useMatrixCalibration").is_some());
        assert!(json.get("ir1Comp").is_some());
        assert_eq!(json["linear"]["rSlope"], 0.01352);

        // Partial documents fall back to defaults.
        let state: CalibrationState = serde_json::from_str(r#"{"dynamicThreshold": 6000}"#).unwrap();
        assert_eq!(state.threshold, 6000);
        assert_eq!(state.dark_matrix, CalibrationState::default().dark_matrix);
    }
}
