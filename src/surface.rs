//! Display surface contract and a framebuffer-device implementation.
//!
//! A surface holds one staged image. `attach` replaces it without any
//! visible effect; `draw` pushes it to the physical display.

use crate::{Geometry, ProjectorError, Result};
use image::RgbImage;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// The pixel output the projector renders onto.
///
/// Like [`crate::ControlBus`], a surface is shared and owned elsewhere,
/// so every method takes `&self`.
///
/// # Rust concept: interior mutability
/// `attach` changes state through `&self`. Implementations wrap that state
/// in a `Mutex` (or `RefCell` when single-threaded), which moves the
/// "only one writer" check from compile time to run time and lets several
/// owners hold plain shared references.
pub trait DisplaySurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn geometry(&self) -> Geometry {
        Geometry::new(self.width(), self.height())
    }

    /// Stage `image` for the next [`draw`](Self::draw), replacing any
    /// previously staged image. Nothing changes on screen.
    fn attach(&self, image: RgbImage);

    /// Render the staged image to the display.
    fn draw(&self) -> Result<()>;
}

impl<S: DisplaySurface + ?Sized> DisplaySurface for &S {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn attach(&self, image: RgbImage) {
        (**self).attach(image)
    }

    fn draw(&self) -> Result<()> {
        (**self).draw()
    }
}

// ── Framebuffer device ─────────────────────────────────────────────

/// A framebuffer device node (e.g. `/dev/fb0`) set up for packed 24-bit RGB.
///
/// Every draw rewinds the device and writes one whole frame. A staged image
/// larger than the display is cropped to its top-left corner; a smaller
/// one is rejected.
pub struct FrameBufferDevice {
    path: PathBuf,
    geometry: Geometry,
    device: Mutex<File>,
    staged: Mutex<Option<RgbImage>>,
}

impl FrameBufferDevice {
    pub fn open(path: impl AsRef<Path>, geometry: Geometry) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let device = OpenOptions::new().write(true).open(&path)?;
        tracing::info!(
            "Framebuffer {} opened ({}x{})",
            path.display(),
            geometry.width,
            geometry.height
        );

        Ok(Self {
            path,
            geometry,
            device: Mutex::new(device),
            staged: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySurface for FrameBufferDevice {
    fn width(&self) -> u32 {
        self.geometry.width
    }

    fn height(&self) -> u32 {
        self.geometry.height
    }

    fn attach(&self, image: RgbImage) {
        *self.staged.lock().unwrap_or_else(PoisonError::into_inner) = Some(image);
    }

    fn draw(&self) -> Result<()> {
        let frame = {
            let staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
            let image = staged.as_ref().ok_or(ProjectorError::NothingStaged)?;
            pack_frame(image, self.geometry)?
        };

        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        device.seek(SeekFrom::Start(0))?;
        device.write_all(&frame)?;
        device.flush()?;

        tracing::debug!("Wrote {} byte frame to {}", frame.len(), self.path().display());
        Ok(())
    }
}

/// Packed RGB bytes of the top-left `geometry` region of `image`.
fn pack_frame(image: &RgbImage, geometry: Geometry) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    if width < geometry.width || height < geometry.height {
        return Err(ProjectorError::Geometry {
            expected: geometry,
            actual: (width, height),
        });
    }

    if (width, height) == (geometry.width, geometry.height) {
        return Ok(image.as_raw().clone());
    }

    let raw = image.as_raw();
    let src_stride = width as usize * 3;
    let row_bytes = geometry.width as usize * 3;
    let mut frame = Vec::with_capacity(geometry.frame_byte_count().unwrap_or(0));
    for y in 0..geometry.height as usize {
        let start = y * src_stride;
        frame.extend_from_slice(&raw[start..start + row_bytes]);
    }
    Ok(frame)
}
