//! Reference color entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An 8-bit RGB triplet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a new triplet.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array, red first.
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Hex representation, e.g. `#F7F8F4`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Light reflectance value in hundredths of a percent.
///
/// Stored exactly as it appears on disk so records survive an
/// encode/decode cycle bit for bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lrv(pub u16);

impl Lrv {
    /// Largest representable value, 655.35.
    pub const MAX: Lrv = Lrv(u16::MAX);

    /// Convert a percentage to fixed point, clamping into `[0, 655.35]`.
    ///
    /// Returns the value and whether clamping was needed. `NaN` maps to 0.
    pub fn from_percent(percent: f64) -> (Self, bool) {
        if percent.is_nan() {
            return (Lrv(0), true);
        }
        let scaled = (percent * 100.0).round();
        if scaled < 0.0 {
            (Lrv(0), true)
        } else if scaled > f64::from(u16::MAX) {
            (Lrv::MAX, true)
        } else {
            (Lrv(scaled as u16), false)
        }
    }

    /// The value as a percentage.
    pub fn percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Lrv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// One entry in the reference color table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRecord {
    /// Display name, at most 255 bytes once encoded.
    pub name: String,
    /// Manufacturer code, at most 255 bytes once encoded.
    pub code: String,
    /// Reference color.
    pub rgb: Rgb,
    /// Light reflectance value.
    pub lrv: Lrv,
    /// Identifier; unique by convention only.
    pub id: u32,
    /// Whether overlay text on this color should render light.
    pub light_text: bool,
}

impl ColorRecord {
    /// Convenience constructor used by tools and tests.
    pub fn new(name: impl Into<String>, code: impl Into<String>, rgb: Rgb, lrv: Lrv, id: u32) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            rgb,
            lrv,
            id,
            light_text: false,
        }
    }

    /// Set the light text hint.
    pub fn with_light_text(mut self, light_text: bool) -> Self {
        self.light_text = light_text;
        self
    }
}

/// LRV as found in authoring JSON: either a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LrvValue {
    /// `"lrv": 79.4`
    Number(f64),
    /// `"lrv": "79.40"`
    Text(String),
}

impl LrvValue {
    /// Parse to a percentage; `None` when the text is not numeric.
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            LrvValue::Number(n) => Some(*n),
            LrvValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl Default for LrvValue {
    fn default() -> Self {
        LrvValue::Number(0.0)
    }
}

/// A color as written by the offline authoring tools.
///
/// Channels are wide integers so that out-of-range values can be
/// reported instead of silently wrapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSource {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Manufacturer code.
    #[serde(default)]
    pub code: String,
    /// Red channel.
    pub r: i64,
    /// Green channel.
    pub g: i64,
    /// Blue channel.
    pub b: i64,
    /// Light reflectance value in percent.
    #[serde(default)]
    pub lrv: LrvValue,
    /// Identifier.
    #[serde(default)]
    pub id: u32,
    /// Light text hint.
    #[serde(default)]
    pub light_text: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lrv_from_percent_rounds() {
        assert_eq!(Lrv::from_percent(79.4), (Lrv(7940), false));
        assert_eq!(Lrv::from_percent(12.34), (Lrv(1234), false));
        assert_eq!(Lrv::from_percent(655.35), (Lrv(65535), false));
    }

    #[test]
    fn test_lrv_clamps_out_of_range() {
        assert_eq!(Lrv::from_percent(-3.0), (Lrv(0), true));
        assert_eq!(Lrv::from_percent(700.0), (Lrv::MAX, true));
        assert_eq!(Lrv::from_percent(f64::NAN), (Lrv(0), true));
    }

    #[test]
    fn test_lrv_display() {
        assert_eq!(Lrv(7940).to_string(), "79.40");
        assert_eq!(Lrv(5).to_string(), "0.05");
        assert!((Lrv(7940).percent() - 79.4).abs() < 1e-9);
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::new(247, 248, 244).to_hex(), "#F7F8F4");
        assert_eq!(Rgb::from([1, 2, 3]).channels(), [1, 2, 3]);
    }

    #[test]
    fn test_color_source_accepts_string_and_number_lrv() {
        let json = r#"[
            {"name": "Vivid White", "code": "W01", "r": 247, "g": 248, "b": 244,
             "lrv": "91.20", "id": 7, "lightText": false},
            {"name": "Night Jewels", "r": 30, "g": 28, "b": 60, "lrv": 3.5, "lightText": true}
        ]"#;
        let sources: Vec<ColorSource> = serde_json::from_str(json).unwrap();

        assert_eq!(sources[0].lrv.as_percent(), Some(91.2));
        assert_eq!(sources[0].id, 7);
        assert_eq!(sources[1].lrv.as_percent(), Some(3.5));
        assert!(sources[1].light_text);
        assert_eq!(sources[1].code, "");
    }
}
