//! svgtrace: bitmap image → smooth SVG bezier paths.
//!
//! Traces the silhouettes of a raster image into closed cubic bezier
//! curves and renders them as compact SVG, either as a single-threshold
//! trace or as a stack of posterized tonal layers.
//!
//! # Example
//!
//! ```
//! use svgtrace::{Bitmap, Tracer, TracerOptions};
//!
//! // 2x2 transparent image: composites to white, traces to nothing.
//! let bitmap = Bitmap::from_rgba(2, 2, &[0u8; 16])?;
//! let mut tracer = Tracer::new(TracerOptions::default())?;
//! tracer.load_image(bitmap);
//! let svg = tracer.get_svg()?;
//! assert!(svg.starts_with("<svg"));
//! # Ok::<(), svgtrace::TraceError>(())
//! ```
//!
//! The pipeline: luminance bitmap → binary bitmap (fixed or Otsu
//! threshold) → closed integer contours (edge following with turn
//! policies) → optimal polygons (dynamic programming) → smoothed,
//! optionally optimized bezier curves → SVG text.

#![forbid(unsafe_code)]

mod bitmap;
mod config;
mod error;
mod geom;
mod histogram;
mod posterizer;
mod svg;
mod tracer;
mod vectorize;

pub use bitmap::Bitmap;
pub use config::{
    Color, FillStrategy, PosterizerOptions, RangeDistribution, Steps, Threshold, TracerOptions,
    TurnPolicy, ALPHA_MAX_LIMIT,
};
pub use error::TraceError;
pub use histogram::{Histogram, LevelStats, PixelsPerLevel, Stats};
pub use posterizer::Posterizer;
pub use tracer::{LoadToken, Tracer};

use image::RgbaImage;

/// Trace a decoded RGBA image straight to an SVG document.
pub fn trace(image: &RgbaImage, options: &TracerOptions) -> Result<String, TraceError> {
    let mut tracer = Tracer::new(options.clone())?;
    tracer.load_image(Bitmap::from(image));
    tracer.get_svg()
}

/// Posterize a decoded RGBA image straight to a layered SVG document.
pub fn posterize(image: &RgbaImage, options: &PosterizerOptions) -> Result<String, TraceError> {
    let mut posterizer = Posterizer::new(options.clone())?;
    posterizer.load_image(Bitmap::from(image));
    posterizer.get_svg()
}
