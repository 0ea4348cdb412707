//! Statistics engine: descriptive summaries and histogram bins for one series.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

/// Descriptive statistics of a value sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n−1); exactly 0 for a single value.
    pub std_dev: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarise `values`. Returns `None` for an empty slice.
    ///
    /// Every field stays finite for finite input; a sample deviation whose
    /// exact value exceeds the `f64` range saturates at `f64::MAX`.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let count = values.len();
        if count == 0 {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let min = sorted[0];
        let max = sorted[count - 1];
        let mid = count / 2;
        let median = if count % 2 == 1 {
            sorted[mid]
        } else {
            midpoint(sorted[mid - 1], sorted[mid])
        };

        let (mean, std_dev) = moments(values);
        Some(Self {
            count,
            mean: within(mean, min, max),
            std_dev,
            median,
            min,
            max,
        })
    }
}

/// Magnitude above which values are rescaled before summing squares.
const RESCALE_ABOVE_EXP: i32 = 400;
/// Power-of-two rescale factor; multiplying by it is exact.
const RESCALE_EXP: i32 = 624;

/// Mean and sample standard deviation.
///
/// Large magnitudes are scaled down by an exact power of two first, so
/// neither the sum nor the squares overflow.
fn moments(values: &[f64]) -> (f64, f64) {
    let largest = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let (down, up) = if largest > 2.0_f64.powi(RESCALE_ABOVE_EXP) {
        (2.0_f64.powi(-RESCALE_EXP), 2.0_f64.powi(RESCALE_EXP))
    } else {
        (1.0, 1.0)
    };

    let count = values.len() as f64;
    let mean = compensated_sum(values.iter().map(|v| v * down)) / count;
    let std_dev = if values.len() > 1 {
        let squares = compensated_sum(values.iter().map(|v| (v * down - mean).powi(2)));
        (squares / (count - 1.0)).sqrt()
    } else {
        0.0
    };

    (mean * up, (std_dev * up).min(f64::MAX))
}

/// Midpoint of `a <= b` without overflowing.
fn midpoint(a: f64, b: f64) -> f64 {
    within(a / 2.0 + b / 2.0, a, b)
}

/// Pull `x` back into `[lo, hi]` after rounding. Unlike `f64::clamp` this
/// never panics on NaN bounds.
#[allow(clippy::manual_clamp)]
fn within(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Neumaier summation; keeps means of long sensor series stable.
fn compensated_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

// ──────────────────── histogram ────────────────────

/// One histogram bin covering `[lower, upper)` (the last bin is closed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width frequency table over the value range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<Bin>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width buckets spanning `[min, max]`.
    ///
    /// A degenerate range is widened to `[v − 0.5, v + 0.5]`. Returns `None`
    /// for empty input or zero bins.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn compute(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }

        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = hi / bins as f64 - lo / bins as f64;
        let mut out: Vec<Bin> = (0..bins)
            .map(|i| Bin {
                lower: lo + width * i as f64,
                upper: if i + 1 == bins {
                    hi
                } else {
                    lo + width * (i + 1) as f64
                },
                count: 0,
            })
            .collect();

        for &v in values {
            let idx = ((v / width - lo / width).floor() as usize).min(bins - 1);
            out[idx].count += 1;
        }

        Some(Self { bins: out })
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}
