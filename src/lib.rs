//! Controller for a DLP light engine (projector) in an embedded device.
//!
//! The crate sits between an application and two pieces of hardware:
//! - a register-addressed control bus driving the LED (enable, current,
//!   gamma, PWM polarity), see [`bus`]
//! - a pixel framebuffer the images are rendered onto, see [`surface`]
//!
//! [`projector::Projector`] composes them. It works with or without a
//! responding control bus, always turns the LED off before swapping in a
//! dark frame, and forces black with the LED off when dropped.

pub mod bus;
pub mod error;
pub mod projector;
pub mod settings;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::{ControlBus, LedDriver, Registers};
pub use error::{ProjectorError, Result};
pub use projector::{DisplayState, Projector, ProjectorStatus};
pub use settings::{ConfigurationStore, JsonSettings, PROJECTOR_LED_CURRENT};
pub use surface::{DisplaySurface, FrameBufferDevice};

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

// ── Display geometry ───────────────────────────────────────────────

/// Pixel dimensions of a display surface.
///
/// Fixed for the lifetime of a surface; every generated frame (black,
/// white) is built to exactly this size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels on the display.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Number of bytes in one packed RGB frame (3 bytes per pixel).
    ///
    /// `None` when the frame would not fit in `usize`, which on a 32-bit
    /// target happens well before `u32::MAX` pixels.
    pub fn frame_byte_count(&self) -> Option<usize> {
        usize::try_from(self.pixel_count())
            .ok()
            .and_then(|pixels| pixels.checked_mul(3))
    }
}

// ── Monochrome fills ───────────────────────────────────────────────

/// The two solid frames the controller generates itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Black,
    White,
}

impl Fill {
    fn pixel(self) -> Rgb<u8> {
        match self {
            Self::Black => Rgb([0, 0, 0]),
            Self::White => Rgb([255, 255, 255]),
        }
    }

    /// A solid image covering the whole display.
    pub fn frame(self, geometry: Geometry) -> RgbImage {
        RgbImage::from_pixel(geometry.width, geometry.height, self.pixel())
    }
}

// ── Logging ────────────────────────────────────────────────────────

/// Install the compact fmt subscriber used on the device.
///
/// Filtering follows `RUST_LOG` (default `info`). ANSI colours are off
/// because output ends up in journald. Returns an error instead of
/// panicking when a global subscriber is already set.
pub fn init_tracing() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init()
}

// ── Tests ──────────────────────────────────────────────────────────
