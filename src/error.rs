//! Error type for image, display and configuration failures.
//!
//! Bus failures never show up here: a missing bus degrades the controller
//! to display-only mode instead of failing the caller.

use crate::Geometry;
use std::path::PathBuf;

/// Everything the controller and its concrete collaborators can report.
///
/// # Rust concept: `thiserror`
/// The derive writes `Display` from each `#[error]` string and wires
/// `source()` to the field marked `#[source]` or `#[from]`. `#[from]` also
/// generates the `From` impl, so `?` converts io and json errors for free.
#[derive(Debug, thiserror::Error)]
pub enum ProjectorError {
    /// An image file could not be opened or decoded.
    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// The staged image is smaller than the display.
    #[error(
        "image is {}x{}, display needs at least {}x{}",
        .actual.0,
        .actual.1,
        .expected.width,
        .expected.height
    )]
    Geometry {
        expected: Geometry,
        actual: (u32, u32),
    },
    /// `draw` was called before any image was attached.
    #[error("no image attached to the display")]
    NothingStaged,
    /// Framebuffer device or settings file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Settings or register table JSON was malformed.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
    /// Opaque failure from a surface implementation outside this crate.
    #[error("display surface error: {0}")]
    Surface(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, ProjectorError>;
