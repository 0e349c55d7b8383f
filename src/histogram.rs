//! 256-bin luminance distribution with multilevel Otsu thresholding.
//!
//! A histogram is read-only after construction. The O(256²) threshold
//! lookup tables are built once on first use, and per-range statistics
//! are memoized; both caches live for the life of the histogram and are
//! discarded with it.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;

use log::warn;

use crate::error::TraceError;

const LEVELS: usize = 256;

/// Statistics over a level range of a histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Total pixels in the range.
    pub pixels: u64,
    pub levels: LevelStats,
    pub pixels_per_level: PixelsPerLevel,
}

/// Distribution of pixel *values* within a range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelStats {
    pub mean: f64,
    /// Smallest level whose cumulative in-range count reaches half the
    /// range's pixels.
    pub median: u8,
    pub std_dev: f64,
    /// Number of distinct levels with at least one pixel.
    pub unique: u32,
}

/// Distribution of pixel *counts* within a range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelsPerLevel {
    /// Pixels divided by the inclusive range width.
    pub mean: f64,
    /// Pixels divided by the number of occupied levels.
    pub median: f64,
    /// Largest single-bin count.
    pub peak: u32,
}

pub struct Histogram {
    bins: [u32; LEVELS],
    pixels: u64,
    /// Otsu lookup table H[i,j] = S[i,j]² / P[i,j], flattened 256x256.
    lookup_h: OnceCell<Vec<f64>>,
    stats_cache: RefCell<HashMap<(u8, u8), Stats>>,
}

impl Histogram {
    pub(crate) fn from_pixels(data: &[u8]) -> Self {
        let mut bins = [0u32; LEVELS];
        for &v in data {
            bins[v as usize] += 1;
        }
        Self {
            bins,
            pixels: data.len() as u64,
            lookup_h: OnceCell::new(),
            stats_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Total number of pixels counted.
    pub fn pixels(&self) -> u64 {
        self.pixels
    }

    /// Count in a single bin.
    pub fn count(&self, level: u8) -> u32 {
        self.bins[level as usize]
    }

    /// Statistics over the inclusive level range `min..=max`.
    pub fn stats(&self, min: u8, max: u8) -> Result<Stats, TraceError> {
        if min > max {
            return Err(TraceError::InvalidRange { min, max });
        }
        if let Some(cached) = self.stats_cache.borrow().get(&(min, max)) {
            return Ok(*cached);
        }

        let mut pixels = 0u64;
        let mut value_sum = 0u64;
        let mut unique = 0u32;
        let mut peak = 0u32;
        for level in min..=max {
            let count = self.bins[level as usize];
            pixels += count as u64;
            value_sum += count as u64 * level as u64;
            if count > 0 {
                unique += 1;
            }
            peak = peak.max(count);
        }

        let mean = if pixels == 0 {
            0.0
        } else {
            value_sum as f64 / pixels as f64
        };

        let mut median = min;
        let mut deviation_sum = 0.0;
        let mut seen = 0u64;
        let target = pixels.div_ceil(2);
        let mut median_found = pixels == 0;
        for level in min..=max {
            let count = self.bins[level as usize] as u64;
            seen += count;
            deviation_sum += (level as f64 - mean).powi(2) * count as f64;
            if !median_found && seen >= target {
                median = level;
                median_found = true;
            }
        }
        let std_dev = if pixels == 0 {
            0.0
        } else {
            (deviation_sum / pixels as f64).sqrt()
        };

        let width = max as u64 - min as u64 + 1;
        let stats = Stats {
            pixels,
            levels: LevelStats {
                mean,
                median,
                std_dev,
                unique,
            },
            pixels_per_level: PixelsPerLevel {
                mean: pixels as f64 / width as f64,
                median: if unique == 0 {
                    0.0
                } else {
                    pixels as f64 / unique as f64
                },
                peak,
            },
        };
        self.stats_cache.borrow_mut().insert((min, max), stats);
        Ok(stats)
    }

    /// Level with the highest windowed count in `min..=max`.
    ///
    /// For each level, counts in a window of `tolerance` bins centered on
    /// it (shifted down for even sizes) are summed; the level with the
    /// largest sum wins. Ties go to the larger own-bin count, then the
    /// lower level. Returns -1 when the range holds no pixels.
    pub fn dominant_color(&self, min: u8, max: u8, tolerance: u32) -> Result<i32, TraceError> {
        if min > max {
            return Err(TraceError::InvalidRange { min, max });
        }
        let tolerance = tolerance.max(1) as i32;
        if min == max {
            return Ok(if self.bins[min as usize] > 0 {
                min as i32
            } else {
                -1
            });
        }

        let mut dominant_index = -1i32;
        let mut dominant_sum = -1i64;
        for level in min as i32..=max as i32 {
            let lo = level - tolerance / 2;
            let mut sum = 0i64;
            for offset in 0..tolerance {
                let bin = lo + offset;
                if (0..LEVELS as i32).contains(&bin) {
                    sum += self.bins[bin as usize] as i64;
                }
            }
            let bigger = sum > dominant_sum;
            let tie_on_own_bin = sum == dominant_sum
                && (dominant_index < 0
                    || self.bins[level as usize] > self.bins[dominant_index as usize]);
            if bigger || tie_on_own_bin {
                dominant_index = level;
                dominant_sum = sum;
            }
        }
        Ok(if dominant_sum <= 0 { -1 } else { dominant_index })
    }

    /// Otsu thresholds partitioning `min..=max` into `amount + 1` classes
    /// with maximal between-class variance.
    ///
    /// The effective count is clamped to `max - min - 2` and to one less
    /// than the number of occupied levels; when that leaves no room (or
    /// the histogram is empty) an empty vector is returned. Thresholds
    /// come back strictly increasing within `[min+1, max-1]`; among
    /// equally scoring tuples the lexicographically smallest wins.
    pub fn multilevel_thresholding(
        &self,
        amount: u32,
        min: u8,
        max: u8,
    ) -> Result<Vec<u8>, TraceError> {
        if min > max {
            return Err(TraceError::InvalidRange { min, max });
        }
        let min = min as usize;
        let max = max as usize;

        let mut limit = (max as i64 - min as i64 - 2).min(amount as i64);
        let unique = (min..=max).filter(|&l| self.bins[l] > 0).count() as i64;
        limit = limit.min(unique - 1);
        if limit < 1 || self.pixels == 0 {
            return Ok(Vec::new());
        }
        let amount = limit as usize;
        if amount > 4 {
            warn!(
                "computing {} thresholds; the search is exponential and may be slow",
                amount
            );
        }

        let h = self.lookup_h();
        let mut search = ThresholdSearch {
            h,
            max,
            amount,
            tuple: vec![0usize; amount],
            best: None,
            best_sig: 0.0,
        };
        search.descend(min, 0.0, 0);
        Ok(search
            .best
            .map(|tuple| tuple.into_iter().map(|t| t as u8).collect())
            .unwrap_or_default())
    }

    /// Single automatic threshold over `min..=max`, if one exists.
    pub fn auto_threshold(&self, min: u8, max: u8) -> Result<Option<u8>, TraceError> {
        Ok(self.multilevel_thresholding(1, min, max)?.first().copied())
    }

    /// Build (once) the P/S/H tables used by the threshold search.
    ///
    /// `P[i,j]` and `S[i,j]` are the probability mass and first moment of
    /// levels `i..=j`; `H[i,j] = S²/P` is the between-class variance
    /// contribution of that segment. Tables start at level 1, the classic
    /// formulation: level 0 mass is implicitly folded into the first
    /// class, whose own contribution every candidate shares.
    fn lookup_h(&self) -> &[f64] {
        self.lookup_h.get_or_init(|| {
            let total = self.pixels as f64;
            let mut p = vec![0.0f64; LEVELS * LEVELS];
            let mut s = vec![0.0f64; LEVELS * LEVELS];
            let mut h = vec![0.0f64; LEVELS * LEVELS];

            for i in 1..LEVELS {
                let mass = self.bins[i] as f64 / total;
                p[LEVELS * i + i] = mass;
                s[LEVELS * i + i] = i as f64 * mass;
            }
            for i in 1..LEVELS - 1 {
                let mass = self.bins[i + 1] as f64 / total;
                let idx = LEVELS + i;
                p[idx + 1] = p[idx] + mass;
                s[idx + 1] = s[idx] + (i + 1) as f64 * mass;
            }
            for i in 2..LEVELS {
                for j in i + 1..LEVELS {
                    p[LEVELS * i + j] = p[LEVELS + j] - p[LEVELS + i - 1];
                    s[LEVELS * i + j] = s[LEVELS + j] - s[LEVELS + i - 1];
                }
            }
            for i in 1..LEVELS {
                for j in i..LEVELS {
                    let idx = LEVELS * i + j;
                    h[idx] = if p[idx] != 0.0 {
                        s[idx] * s[idx] / p[idx]
                    } else {
                        0.0
                    };
                }
            }
            h
        })
    }
}

/// Recursive enumeration state for the threshold search.
struct ThresholdSearch<'a> {
    h: &'a [f64],
    max: usize,
    amount: usize,
    tuple: Vec<usize>,
    best: Option<Vec<usize>>,
    best_sig: f64,
}

impl ThresholdSearch<'_> {
    /// Try every value for threshold number `depth`, accumulating the
    /// variance of the classes closed so far.
    fn descend(&mut self, previous: usize, sigma: f64, depth: usize) {
        // Leave room for the remaining thresholds below `max`.
        let upper = self.max - self.amount + depth;
        for t in previous + 1..=upper {
            let sigma = sigma + self.h[LEVELS * (previous + 1) + t];
            self.tuple[depth] = t;
            if depth + 1 == self.amount {
                let total = sigma + self.h[LEVELS * (t + 1) + self.max];
                if total > self.best_sig {
                    self.best_sig = total;
                    self.best = Some(self.tuple.clone());
                }
            } else {
                self.descend(t, sigma, depth + 1);
            }
        }
    }
}
