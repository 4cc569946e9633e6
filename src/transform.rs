//! Raw sensor sample to RGB.

use crate::record::Rgb;
use crate::state::{CalibrationState, MatrixKind};

use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw reading from the tristimulus sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSample {
    /// X channel count.
    pub x: u16,
    /// Y channel count.
    pub y: u16,
    /// Z channel count.
    pub z: u16,
    /// First infrared channel count.
    pub ir1: u16,
    /// Second infrared channel count.
    pub ir2: u16,
}

impl SensorSample {
    /// Create a sample from channel counts.
    pub const fn new(x: u16, y: u16, z: u16, ir1: u16, ir2: u16) -> Self {
        Self { x, y, z, ir1, ir2 }
    }
}

/// How a sample was turned into RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformPath {
    /// Through one of the calibration matrices.
    Matrix(MatrixKind),
    /// Through the linear fallback scaling.
    Linear,
}

impl TransformPath {
    /// The matrix used, if any.
    pub fn matrix(self) -> Option<MatrixKind> {
        match self {
            TransformPath::Matrix(kind) => Some(kind),
            TransformPath::Linear => None,
        }
    }
}

impl fmt::Display for TransformPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformPath::Matrix(kind) => write!(f, "{kind} matrix"),
            TransformPath::Linear => f.write_str("linear scaling"),
        }
    }
}

/// Result of a transform, with the intermediate values kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// Estimated color.
    pub rgb: Rgb,
    /// Matrix or fallback used.
    pub path: TransformPath,
    /// `(X', Y', Z')` after IR compensation, the exact multiply inputs.
    pub compensated: [f64; 3],
}

/// Subtract IR leakage: `X' = X - ir1Comp*IR1`, `Z' = Z - ir2Comp*IR2`, `Y' = Y`.
pub fn compensate(sample: &SensorSample, state: &CalibrationState) -> [f64; 3] {
    [
        f64::from(sample.x) - state.ir1_comp * f64::from(sample.ir1),
        f64::from(sample.y),
        f64::from(sample.z) - state.ir2_comp * f64::from(sample.ir2),
    ]
}

/// Choose the transform for a sample with brightness `y`.
///
/// `y == threshold` selects the dark matrix.
pub fn select_path(state: &CalibrationState, y: u16) -> TransformPath {
    if !state.use_matrix_calibration {
        TransformPath::Linear
    } else if state.enable_dynamic_calibration && u32::from(y) <= state.threshold {
        TransformPath::Matrix(MatrixKind::Dark)
    } else {
        TransformPath::Matrix(MatrixKind::Bright)
    }
}

impl CalibrationState {
    /// Method form of [`select_path`].
    pub fn select_path(&self, y: u16) -> TransformPath {
        select_path(self, y)
    }
}

fn to_channel(v: f64) -> u8 {
    // NaN saturates to 0 in the cast.
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert a raw sample to RGB with the given calibration.
///
/// Pure: the same sample and state always give the same output.
pub fn transform(sample: &SensorSample, state: &CalibrationState) -> TransformOutput {
    let compensated = compensate(sample, state);
    let path = select_path(state, sample.y);
    let values = match path {
        TransformPath::Matrix(kind) => state.matrix(kind).apply(compensated),
        TransformPath::Linear => state.linear.apply(compensated),
    };
    let rgb = Rgb::new(to_channel(values[0]), to_channel(values[1]), to_channel(values[2]));

    trace!(
        "transform {:?} -> compensated {:?} via {} -> {:?} -> {}",
        sample, compensated, path, values, rgb
    );
    TransformOutput {
        rgb,
        path,
        compensated,
    }
}

/// A reading as reported to collaborators: raw counts plus derived RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorReading {
    /// Derived red.
    pub r: u8,
    /// Derived green.
    pub g: u8,
    /// Derived blue.
    pub b: u8,
    /// Raw X.
    pub x: u16,
    /// Raw Y.
    pub y: u16,
    /// Raw Z.
    pub z: u16,
    /// Raw IR1.
    pub ir1: u16,
    /// Raw IR2.
    pub ir2: u16,
}

impl ColorReading {
    /// Combine a raw sample with its derived color.
    pub fn new(sample: &SensorSample, rgb: Rgb) -> Self {
        Self {
            r: rgb.r,
            g: rgb.g,
            b: rgb.b,
            x: sample.x,
            y: sample.y,
            z: sample.z,
            ir1: sample.ir1,
            ir2: sample.ir2,
        }
    }

    /// The raw part of the reading.
    pub fn sample(&self) -> SensorSample {
        SensorSample::new(self.x, self.y, self.z, self.ir1, self.ir2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CalibrationMatrix;

    const IDENTITY: CalibrationMatrix = CalibrationMatrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    fn dynamic_state() -> CalibrationState {
        CalibrationState {
            threshold: 8000,
            use_matrix_calibration: true,
            enable_dynamic_calibration: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_boundary_selects_dark() {
        let state = dynamic_state();
        assert_eq!(select_path(&state, 8001), TransformPath::Matrix(MatrixKind::Bright));
        assert_eq!(select_path(&state, 8000), TransformPath::Matrix(MatrixKind::Dark));
        assert_eq!(state.select_path(0), TransformPath::Matrix(MatrixKind::Dark));
    }

    #[test]
    fn test_static_calibration_always_bright() {
        let state = CalibrationState {
            enable_dynamic_calibration: false,
            ..dynamic_state()
        };
        assert_eq!(select_path(&state, 10), TransformPath::Matrix(MatrixKind::Bright));
        assert_eq!(select_path(&state, 60000), TransformPath::Matrix(MatrixKind::Bright));
    }

    #[test]
    fn test_matrix_off_uses_linear() {
        let state = CalibrationState {
            use_matrix_calibration: false,
            ..dynamic_state()
        };
        let out = transform(&SensorSample::new(5000, 4000, 3000, 0, 0), &state);
        assert_eq!(out.path, TransformPath::Linear);
        assert_eq!(out.path.matrix(), None);

        // 0.01352*5000+59.18 = 126.78, 0.01535*4000+34.92 = 96.32, 0.02065*3000+85.94 = 147.89
        assert_eq!(out.rgb, Rgb::new(127, 96, 148));
    }

    #[test]
    fn test_ir_compensation_precedes_multiply() {
        let state = CalibrationState {
            ir1_comp: 0.30,
            ir2_comp: 0.10,
            bright_matrix: IDENTITY,
            dark_matrix: IDENTITY,
            ..dynamic_state()
        };
        let sample = SensorSample::new(5000, 200, 3000, 100, 50);
        let out = transform(&sample, &state);

        assert!((out.compensated[0] - 4970.0).abs() < 1e-9);
        assert_eq!(out.compensated[1], 200.0);
        assert!((out.compensated[2] - 2995.0).abs() < 1e-9);

        // The output must equal the matrix applied to exactly those inputs.
        let expected = state.dark_matrix.apply(out.compensated);
        assert_eq!(out.rgb, Rgb::new(to_channel(expected[0]), to_channel(expected[1]), to_channel(expected[2])));
    }

    #[test]
    fn test_matrix_multiply_and_rounding() {
        let state = CalibrationState {
            ir1_comp: 0.0,
            ir2_comp: 0.0,
            dark_matrix: CalibrationMatrix([0.035, 0.0, 0.0, 0.0, 0.02, 0.0, 0.0, 0.001, 0.0294]),
            ..dynamic_state()
        };
        let out = transform(&SensorSample::new(5000, 8000, 5000, 0, 0), &state);
        assert_eq!(out.path, TransformPath::Matrix(MatrixKind::Dark));
        // Blue: 0.001*8000 + 0.0294*5000 = 155
        assert_eq!(out.rgb, Rgb::new(175, 160, 155));
    }

    #[test]
    fn test_output_clamped() {
        let state = CalibrationState {
            bright_matrix: CalibrationMatrix([1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0]),
            ..dynamic_state()
        };
        let out = transform(&SensorSample::new(60000, 9000, 0, 0, 0), &state);
        assert_eq!(out.rgb, Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_transform_is_pure() {
        let state = CalibrationState::default();
        let sample = SensorSample::new(12000, 9500, 8000, 300, 280);
        assert_eq!(transform(&sample, &state), transform(&sample, &state));
    }

    #[test]
    fn test_color_reading_json_shape() {
        let sample = SensorSample::new(1, 2, 3, 4, 5);
        let reading = ColorReading::new(&sample, Rgb::new(7, 8, 9));
        let json = serde_json::to_value(reading).unwrap();
        assert_eq!(json["r"], 7);
        assert_eq!(json["ir2"], 5);
        assert_eq!(reading.sample(), sample);
    }
}
