//! The projector controller: LED switching composed with image display.
//!
//! Ordering rules the controller keeps on every transition:
//! - going dark turns the LED off *before* the black frame is drawn, so the
//!   previous image never flashes at full brightness
//! - anything bright is drawn first and the LED switched on afterwards
//! - dropping the controller forces black with the LED off, and nothing
//!   that goes wrong during that escapes the destructor
//!
//! Bus trouble never reaches the caller (see [`crate::bus`]). Image and
//! display errors always do.

use crate::bus::{ControlBus, LedDriver, Registers};
use crate::settings::{ConfigurationStore, PROJECTOR_LED_CURRENT};
use crate::surface::DisplaySurface;
use crate::{Fill, ProjectorError, Result};
use image::{ImageReader, RgbImage};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

// ── Status ───────────────────────────────────────────────────────────

/// What the projector last put on the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Black,
    White,
    Image,
}

/// Snapshot of the controller's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectorStatus {
    pub state: DisplayState,
    /// Path of the displayed image when it came from a file
    pub current_media: Option<String>,
    /// Last commanded LED state (always false without bus control)
    pub led_on: bool,
    /// Whether the control bus answered at start-up
    pub bus_control: bool,
    pub version: String,
}

// ── Controller ───────────────────────────────────────────────────────

/// Drives the light engine's LED and display.
///
/// The bus, surface and settings are borrowed for the controller's whole
/// life and never owned. The controller itself is single-writer: every
/// operation is a blocking sequence of bus and display calls.
///
/// # Rust concept: lifetimes on borrowed collaborators
/// The `'a` says "the controller cannot outlive the bus, surface or
/// settings it was given". The borrow checker rejects any code that drops
/// the framebuffer while a `Projector` still points at it, which is the
/// guarantee a C++ reference member only promises in a comment.
pub struct Projector<'a, B, S, C>
where
    B: ControlBus,
    S: DisplaySurface,
    C: ConfigurationStore,
{
    leds: LedDriver<&'a B>,
    surface: &'a S,
    settings: &'a C,
    state: DisplayState,
    current_media: Option<String>,
    led_on: bool,
}

impl<'a, B, S, C> Projector<'a, B, S, C>
where
    B: ControlBus,
    S: DisplaySurface,
    C: ConfigurationStore,
{
    /// Set up a projector on the DLPC350 register map.
    pub fn new(bus: &'a B, surface: &'a S, settings: &'a C) -> Result<Self> {
        Self::with_registers(bus, surface, settings, Registers::default())
    }

    /// Probe the bus, disable gamma correction if it answered, then show
    /// black with the LED off.
    ///
    /// The bus is probed once here and never again. A failure drawing the
    /// initial black frame is returned.
    pub fn with_registers(
        bus: &'a B,
        surface: &'a S,
        settings: &'a C,
        registers: Registers,
    ) -> Result<Self> {
        let mut projector = Self {
            leds: LedDriver::probe(bus, registers),
            surface,
            settings,
            state: DisplayState::Black,
            current_media: None,
            led_on: false,
        };

        projector.show_black()?;
        Ok(projector)
    }

    pub fn has_bus_control(&self) -> bool {
        self.leds.is_connected()
    }

    pub fn status(&self) -> ProjectorStatus {
        ProjectorStatus {
            state: self.state,
            current_media: self.current_media.clone(),
            led_on: self.led_on,
            bus_control: self.has_bus_control(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Stage an image without drawing it. Nothing changes on screen and
    /// the LED is left alone.
    pub fn set_image(&mut self, image: RgbImage) {
        self.surface.attach(image);
    }

    /// Draw the staged image, then switch the LED on.
    pub fn show_current_image(&mut self) -> Result<()> {
        self.surface.draw()?;
        self.turn_led_on();
        self.state = DisplayState::Image;
        self.current_media = None;
        Ok(())
    }

    /// Stage and show `image` in one step.
    pub fn show_image(&mut self, image: RgbImage) -> Result<()> {
        self.set_image(image);
        self.show_current_image()
    }

    /// LED off first, then draw an all-black frame.
    pub fn show_black(&mut self) -> Result<()> {
        self.turn_led_off();
        self.surface.attach(Fill::Black.frame(self.surface.geometry()));
        self.surface.draw()?;
        self.state = DisplayState::Black;
        self.current_media = None;
        Ok(())
    }

    /// Draw an all-white frame, then switch the LED on.
    pub fn show_white(&mut self) -> Result<()> {
        self.surface.attach(Fill::White.frame(self.surface.geometry()));
        self.surface.draw()?;
        self.turn_led_on();
        self.state = DisplayState::White;
        self.current_media = None;
        Ok(())
    }

    /// Decode the image at `path`, draw it, then switch the LED on.
    ///
    /// Open and decode failures are returned as [`ProjectorError::Decode`];
    /// the display and LED are left as they were.
    pub fn show_image_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = decode_image(path)?;

        self.surface.attach(image);
        self.surface.draw()?;
        self.turn_led_on();

        tracing::info!("Displaying image: {}", path.display());
        self.state = DisplayState::Image;
        self.current_media = Some(path.display().to_string());
        Ok(())
    }

    /// Switch the LED off. Does nothing without bus control.
    pub fn turn_led_off(&mut self) {
        self.leds.turn_off();
        self.led_on = false;
    }

    /// Program the configured LED current and switch the LED on.
    ///
    /// The current setting is re-read on every call. Does nothing without
    /// bus control.
    pub fn turn_led_on(&mut self) {
        let current = self.settings.get_int(PROJECTOR_LED_CURRENT);
        self.leds.turn_on(current);
        self.led_on = self.leds.is_connected();
    }
}

impl<B, S, C> Drop for Projector<'_, B, S, C>
where
    B: ControlBus,
    S: DisplaySurface,
    C: ConfigurationStore,
{
    /// # Rust concept: `catch_unwind` at the destructor boundary
    /// A panic escaping `drop` would unwind into whatever code let the
    /// controller go out of scope. Catching it here keeps teardown best
    /// effort: LED-off and the black frame are attempted, and whatever goes
    /// wrong is logged.
    fn drop(&mut self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.show_black())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to force black on shutdown: {}", e),
            Err(_) => tracing::error!("Panic while forcing black on shutdown"),
        }
    }
}

fn decode_image(path: &Path) -> Result<RgbImage> {
    let decode_error = |source| ProjectorError::Decode {
        path: path.to_path_buf(),
        source,
    };

    // format comes from the file's magic bytes, not its extension
    let image = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| decode_error(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)?;
    Ok(image.to_rgb8())
}

// ── Tests ────────────────────────────────────────────────────────────
