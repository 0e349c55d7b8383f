//! Tracing and posterizing parameters.
//!
//! All records are plain structs with `Default` impls matching the
//! documented defaults. Enumerated parameters are real enums, so most
//! invalid states are unrepresentable; the remaining numeric ranges are
//! checked by `validate()` when parameters are set.

use crate::error::TraceError;

/// Upper bound for `alpha_max` (4/3, rounded the way the option is
/// conventionally documented).
pub const ALPHA_MAX_LIMIT: f64 = 1.3334;

/// Rule for resolving ambiguous turns during contour decomposition,
/// i.e. where the boundary crosses itself diagonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPolicy {
    /// Always turn into the foreground region.
    Black,
    /// Always turn into the background region.
    White,
    /// Always turn left.
    Left,
    /// Always turn right.
    Right,
    /// Turn towards the locally less common color.
    Minority,
    /// Turn towards the locally more common color.
    Majority,
}

/// Binarization cutoff: a fixed luminance level or Otsu auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Pick the threshold from the image histogram.
    Auto,
    /// Fixed luminance cutoff.
    Fixed(u8),
}

/// A fill or background color in SVG output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Color {
    /// Resolve from `black_on_white`: black foreground on white, or the
    /// inverse. As a background this behaves like `Transparent`.
    Auto,
    /// Omit the element (no background rect is emitted).
    Transparent,
    /// Any CSS color expression, passed through verbatim.
    Css(String),
}

/// Parameters for a single-threshold trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerOptions {
    /// How to resolve ambiguous turns while following contours.
    pub turn_policy: TurnPolicy,
    /// Contours enclosing at most this many pixels are discarded.
    pub turd_size: u32,
    /// Corner threshold for smoothing; vertices whose curvature parameter
    /// reaches this value become corners instead of curves. 0 turns every
    /// vertex into a corner, values towards 4/3 smooth aggressively.
    pub alpha_max: f64,
    /// Run the curve optimization pass that merges runs of curve segments
    /// into single fitted Beziers.
    pub opt_curve: bool,
    /// Permitted fitting error (in pixels) during curve optimization.
    pub opt_tolerance: f64,
    /// Binarization cutoff.
    pub threshold: Threshold,
    /// Trace dark pixels (true) or light pixels (false).
    pub black_on_white: bool,
    /// Path fill in SVG documents.
    pub color: Color,
    /// Background rect fill in SVG documents.
    pub background: Color,
    /// Output width; `None` uses the source width.
    pub width: Option<u32>,
    /// Output height; `None` uses the source height.
    pub height: Option<u32>,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            turn_policy: TurnPolicy::Minority,
            turd_size: 2,
            alpha_max: 1.0,
            opt_curve: true,
            opt_tolerance: 0.2,
            threshold: Threshold::Auto,
            black_on_white: true,
            color: Color::Auto,
            background: Color::Transparent,
            width: None,
            height: None,
        }
    }
}

impl TracerOptions {
    pub(crate) fn validate(&self) -> Result<(), TraceError> {
        if !self.alpha_max.is_finite() || !(0.0..=ALPHA_MAX_LIMIT).contains(&self.alpha_max) {
            return Err(TraceError::InvalidParameter {
                field: "alpha_max",
                reason: format!("expected a number in 0..={}", ALPHA_MAX_LIMIT),
            });
        }
        if !self.opt_tolerance.is_finite() || self.opt_tolerance <= 0.0 {
            return Err(TraceError::InvalidParameter {
                field: "opt_tolerance",
                reason: "expected a positive number".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `other` produces the same geometry. Rendering-only fields
    /// (color, background, output size) are ignored.
    pub(crate) fn geometry_eq(&self, other: &Self) -> bool {
        self.turn_policy == other.turn_policy
            && self.turd_size == other.turd_size
            && self.alpha_max == other.alpha_max
            && self.opt_curve == other.opt_curve
            && self.opt_tolerance == other.opt_tolerance
            && self.threshold == other.threshold
            && self.black_on_white == other.black_on_white
    }
}

/// Number of tonal layers a posterization uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Steps {
    /// Derive a step count from the usable color range (3 or 4).
    Auto,
    /// Explicit layer count, clamped to the usable color range.
    Count(u32),
    /// Explicit threshold stops. Duplicates are dropped; an empty list
    /// falls back to the effective global threshold.
    Manual(Vec<u8>),
}

/// Rule selecting the representative color of a tonal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    /// Linear ramp towards the saturated end of the palette.
    Spread,
    /// Windowed histogram peak of the range.
    Dominant,
    /// Mean luminance of the range.
    Mean,
    /// Median luminance of the range.
    Median,
}

/// How thresholds are distributed over the usable color range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDistribution {
    /// Otsu multilevel thresholding over the usable range.
    Auto,
    /// Evenly spaced thresholds.
    Equal,
}

/// Parameters for a multi-layer posterization. Embeds the tracer record;
/// every trace pass inherits it with only the threshold overridden.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterizerOptions {
    pub tracer: TracerOptions,
    pub steps: Steps,
    pub fill_strategy: FillStrategy,
    pub range_distribution: RangeDistribution,
}

impl Default for PosterizerOptions {
    fn default() -> Self {
        Self {
            tracer: TracerOptions::default(),
            steps: Steps::Auto,
            fill_strategy: FillStrategy::Dominant,
            range_distribution: RangeDistribution::Auto,
        }
    }
}

impl PosterizerOptions {
    pub(crate) fn validate(&self) -> Result<(), TraceError> {
        self.tracer.validate()?;
        if let Steps::Count(n) = self.steps {
            if !(1..=255).contains(&n) {
                return Err(TraceError::InvalidParameter {
                    field: "steps",
                    reason: "expected a count in 1..=255".to_string(),
                });
            }
        }
        Ok(())
    }
}
