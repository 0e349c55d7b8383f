use thiserror::Error;

/// Errors surfaced by the tracing and posterizing facades.
///
/// Geometric and numeric degeneracies inside the analyzer are handled
/// locally (a bad curve fit is simply declined); they never show up here.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A parameter failed validation in `set_parameters` or a constructor.
    #[error("invalid value for '{field}': {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// A histogram operation was given a range with `min > max`.
    #[error("invalid level range {min}..{max}")]
    InvalidRange { min: u8, max: u8 },

    /// SVG, path or symbol output was requested before an image was loaded.
    #[error("no image loaded")]
    NotLoaded,

    /// The external image decoder failed or handed over inconsistent data.
    #[error("image decoding failed: {0}")]
    DecodeFailed(String),

    /// A later `load_image` invalidated this in-flight load.
    #[error("load superseded by a newer image")]
    Superseded,
}
