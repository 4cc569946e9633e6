//! Default calibration values and tuning reference constants.

/// Factory calibration used when no persisted settings exist.
pub mod defaults {
    /// Matrix tuned against the Vivid White tile.
    pub const BRIGHT_MATRIX: [f64; 9] = [
        0.1054, -0.017, -0.026, -0.017, 0.0785, 0.0017, 0.0052, -0.01, 0.1268,
    ];

    /// Matrix tuned against the Grey Port tile.
    pub const DARK_MATRIX: [f64; 9] = [
        0.037, -0.012, -0.008, -0.012, 0.032, 0.002, 0.002, -0.004, 0.058,
    ];

    /// Y-channel count above which the bright matrix is used.
    pub const THRESHOLD: u32 = 8000;

    /// IR1 leakage subtracted from X.
    pub const IR1_COMP: f64 = 0.20;
    /// IR2 leakage subtracted from Z.
    pub const IR2_COMP: f64 = 0.20;

    /// Linear fallback gain for red (applied to X').
    pub const R_SLOPE: f64 = 0.01352;
    /// Linear fallback offset for red.
    pub const R_OFFSET: f64 = 59.18;
    /// Linear fallback gain for green (applied to Y').
    pub const G_SLOPE: f64 = 0.01535;
    /// Linear fallback offset for green.
    pub const G_OFFSET: f64 = 34.92;
    /// Linear fallback gain for blue (applied to Z').
    pub const B_SLOPE: f64 = 0.02065;
    /// Linear fallback offset for blue.
    pub const B_OFFSET: f64 = 85.94;
}

/// Closed-loop tuning knobs.
pub mod tuning {
    /// Channels with `|error| <= DEADBAND` get no proposal.
    pub const DEADBAND: i32 = 2;

    /// Fixed coefficient step per proposal.
    pub const STEP: f64 = 0.001;

    /// Coefficients may never leave `[-SAFETY_BOUND, SAFETY_BOUND]`.
    pub const SAFETY_BOUND: f64 = 1.0;
}

/// Physical reference tiles and their expected RGB.
pub mod targets {
    /// Vivid White tile, read through the bright matrix.
    pub const VIVID_WHITE: [u8; 3] = [247, 248, 244];
    /// Grey Port tile, read through the dark matrix.
    pub const GREY_PORT: [u8; 3] = [168, 160, 147];
}

/// Least-squares matrix fitting.
pub mod solver {
    /// Fewest reference points that determine a 3x3 matrix.
    pub const MIN_POINTS: usize = 3;

    /// Full-scale sensor count; inputs are normalised by it before fitting.
    pub const SENSOR_FULL_SCALE: f64 = 65535.0;

    /// Full-scale channel value; targets are normalised by it before fitting.
    pub const CHANNEL_FULL_SCALE: f64 = 255.0;

    /// Normal equations with `|det| <= SINGULAR_EPSILON * max|a_ij|^3` are rejected.
    pub const SINGULAR_EPSILON: f64 = 1e-10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_diagonals_within_safety_bound() {
        for m in [defaults::BRIGHT_MATRIX, defaults::DARK_MATRIX] {
            assert!(m.iter().all(|c| c.abs() <= tuning::SAFETY_BOUND));
        }
    }

    #[test]
    fn test_tuning_step_smaller_than_bound() {
        assert!(tuning::STEP > 0.0 && tuning::STEP < tuning::SAFETY_BOUND);
        assert!(tuning::DEADBAND >= 0);
    }
}
