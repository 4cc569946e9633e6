//! Nearest-color search over a record stream.
//!
//! Both searches make one pass and never buffer the table: the best-match
//! scan keeps a single candidate, the top-K scan a heap of at most K.
//! Squared RGB distance is the default; CIEDE2000 is available through the
//! `_by` variants.

use crate::error::ColorSenseError;
use crate::record::{ColorRecord, Rgb};

use log::debug;
use palette::color_difference::Ciede2000;
use palette::white_point::D65;
use palette::{FromColor, Lab, Srgb};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

/// Squared Euclidean distance in RGB space.
pub fn distance_sq(a: Rgb, b: Rgb) -> u32 {
    let d = |x: u8, y: u8| {
        let diff = i32::from(x) - i32::from(y);
        (diff * diff) as u32
    };
    d(a.r, b.r) + d(a.g, b.g) + d(a.b, b.b)
}

fn to_lab(rgb: Rgb) -> Lab<D65, f64> {
    Lab::from_color(Srgb::new(rgb.r, rgb.g, rgb.b).into_format::<f64>())
}

/// CIEDE2000 color difference, with both colors read as sRGB under D65.
pub fn ciede2000(a: Rgb, b: Rgb) -> f64 {
    to_lab(a).difference(to_lab(b))
}

/// How closeness between two colors is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance on the 8-bit channels.
    #[default]
    RgbSquared,
    /// Perceptual CIEDE2000 difference in CIE L*a*b*.
    Ciede2000,
}

impl Metric {
    /// Distance between `a` and `b` under this metric.
    pub fn distance(self, a: Rgb, b: Rgb) -> f64 {
        match self {
            Metric::RgbSquared => f64::from(distance_sq(a, b)),
            Metric::Ciede2000 => ciede2000(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::RgbSquared => f.write_str("rgb"),
            Metric::Ciede2000 => f.write_str("ciede2000"),
        }
    }
}

impl FromStr for Metric {
    type Err = ColorSenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" | "rgbsquared" => Ok(Metric::RgbSquared),
            "ciede2000" | "de2000" => Ok(Metric::Ciede2000),
            _ => Err(ColorSenseError::InvalidSettingValue {
                key: "metric".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// The query color, with its Lab form computed once per search.
struct Query {
    rgb: Rgb,
    lab: Option<Lab<D65, f64>>,
}

impl Query {
    fn new(rgb: Rgb, metric: Metric) -> Self {
        let lab = (metric == Metric::Ciede2000).then(|| to_lab(rgb));
        Self { rgb, lab }
    }

    fn distance(&self, other: Rgb) -> f64 {
        match self.lab {
            Some(lab) => lab.difference(to_lab(other)),
            None => f64::from(distance_sq(self.rgb, other)),
        }
    }
}

/// A record together with how close it is to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The matched reference color.
    pub record: ColorRecord,
    /// Distance to the query under the metric searched with.
    pub distance: f64,
    /// Position of the record among those the stream yielded.
    pub index: usize,
}

impl Match {
    fn rank(&self, distance: f64, index: usize) -> Ordering {
        self.distance.total_cmp(&distance).then(self.index.cmp(&index))
    }
}

impl Eq for Match {}

// Heap order: larger (distance, index) is "greater" so the heap top is the
// worst candidate kept, ready to be evicted.
impl Ord for Match {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank(other.distance, other.index)
    }
}

impl PartialOrd for Match {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the record closest to `rgb` by squared RGB distance.
///
/// Ties go to the earliest record in the stream.
///
/// # Errors
/// [`ColorSenseError::NotFound`] if the stream yields no records.
pub fn find_best_match<I>(rgb: Rgb, records: I) -> Result<Match, ColorSenseError>
where
    I: IntoIterator<Item = ColorRecord>,
{
    find_best_match_by(rgb, records, Metric::RgbSquared)
}

/// Find the record closest to `rgb` under `metric`.
///
/// # Errors
/// [`ColorSenseError::NotFound`] if the stream yields no records.
pub fn find_best_match_by<I>(rgb: Rgb, records: I, metric: Metric) -> Result<Match, ColorSenseError>
where
    I: IntoIterator<Item = ColorRecord>,
{
    let query = Query::new(rgb, metric);
    let mut best: Option<Match> = None;

    for (index, record) in records.into_iter().enumerate() {
        let distance = query.distance(record.rgb);
        // Strictly-less keeps the earlier record on ties.
        if best.as_ref().is_none_or(|b| distance < b.distance) {
            let exact = distance == 0.0;
            best = Some(Match {
                record,
                distance,
                index,
            });
            if exact {
                // Nothing later can beat an exact hit at a lower index.
                break;
            }
        }
    }

    let best = best.ok_or(ColorSenseError::NotFound)?;
    debug!(
        "best {} match for {}: {} {} (distance {}, index {})",
        metric, rgb, best.record.code, best.record.name, best.distance, best.index
    );
    Ok(best)
}

/// Find up to `k` records closest to `rgb` by squared RGB distance, nearest first.
///
/// Ordering is by distance, then by stream position.
///
/// # Errors
/// [`ColorSenseError::NotFound`] if the stream yields no records.
pub fn find_top_matches<I>(rgb: Rgb, records: I, k: usize) -> Result<Vec<Match>, ColorSenseError>
where
    I: IntoIterator<Item = ColorRecord>,
{
    find_top_matches_by(rgb, records, k, Metric::RgbSquared)
}

/// Find up to `k` records closest to `rgb` under `metric`, nearest first.
///
/// # Errors
/// [`ColorSenseError::NotFound`] if the stream yields no records.
pub fn find_top_matches_by<I>(
    rgb: Rgb,
    records: I,
    k: usize,
    metric: Metric,
) -> Result<Vec<Match>, ColorSenseError>
where
    I: IntoIterator<Item = ColorRecord>,
{
    let query = Query::new(rgb, metric);
    let mut heap: BinaryHeap<Match> = BinaryHeap::with_capacity(k.saturating_add(1));
    let mut seen = 0usize;

    for (index, record) in records.into_iter().enumerate() {
        seen += 1;
        if k == 0 {
            continue;
        }
        let distance = query.distance(record.rgb);
        let full = heap.len() == k;
        if full && heap.peek().is_some_and(|worst| worst.rank(distance, index).is_le()) {
            continue;
        }
        heap.push(Match {
            record,
            distance,
            index,
        });
        if heap.len() > k {
            heap.pop();
        }
    }

    if seen == 0 {
        return Err(ColorSenseError::NotFound);
    }
    Ok(heap.into_sorted_vec())
}
