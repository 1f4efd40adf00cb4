//! Recording doubles for the bus, display and settings.
//!
//! Bus and surface doubles share one [`CallLog`], so tests can check the
//! interleaving of register writes and framebuffer draws.

use crate::{ConfigurationStore, ControlBus, DisplaySurface, Geometry, ProjectorError, Result};
use image::RgbImage;
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    BusRead(u8),
    BusWrite(u8, Vec<u8>),
    Attach(u32, u32),
    Draw,
}

#[derive(Clone, Default)]
pub(crate) struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub(crate) fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub(crate) fn bus_writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::BusWrite(..)))
            .collect()
    }

    pub(crate) fn position(&self, call: &Call) -> Option<usize> {
        self.0.borrow().iter().position(|c| c == call)
    }

    pub(crate) fn last_position(&self, call: &Call) -> Option<usize> {
        self.0.borrow().iter().rposition(|c| c == call)
    }
}

// ── Bus ────────────────────────────────────────────────────────────

pub(crate) struct RecordingBus {
    log: CallLog,
    status: u8,
    fail_writes: Cell<bool>,
}

impl RecordingBus {
    /// `status` is returned for every register read.
    pub(crate) fn new(log: CallLog, status: u8) -> Self {
        Self {
            log,
            status,
            fail_writes: Cell::new(false),
        }
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl ControlBus for RecordingBus {
    fn read(&self, register: u8) -> u8 {
        self.log.push(Call::BusRead(register));
        self.status
    }

    fn write(&self, register: u8, data: &[u8]) -> io::Result<()> {
        self.log.push(Call::BusWrite(register, data.to_vec()));
        if self.fail_writes.get() {
            return Err(io::Error::other("nack"));
        }
        Ok(())
    }
}

/// Answers the probe, then panics on any write.
pub(crate) struct PanickingBus;

impl ControlBus for PanickingBus {
    fn read(&self, _register: u8) -> u8 {
        0x00
    }

    fn write(&self, register: u8, _data: &[u8]) -> io::Result<()> {
        panic!("bus exploded writing {register:#04x}");
    }
}

// ── Surface ────────────────────────────────────────────────────────

pub(crate) struct RecordingSurface {
    log: CallLog,
    geometry: Geometry,
    staged: RefCell<Option<RgbImage>>,
    shown: RefCell<Option<RgbImage>>,
    fail_draws: Cell<bool>,
}

impl RecordingSurface {
    pub(crate) fn new(log: CallLog, width: u32, height: u32) -> Self {
        Self {
            log,
            geometry: Geometry::new(width, height),
            staged: RefCell::new(None),
            shown: RefCell::new(None),
            fail_draws: Cell::new(false),
        }
    }

    pub(crate) fn fail_draws(&self, fail: bool) {
        self.fail_draws.set(fail);
    }

    /// The image most recently drawn.
    pub(crate) fn shown(&self) -> Option<RgbImage> {
        self.shown.borrow().clone()
    }

    /// Colour of the drawn frame if it is a single solid colour.
    pub(crate) fn shown_solid(&self) -> Option<[u8; 3]> {
        let shown = self.shown.borrow();
        let img = shown.as_ref()?;
        let first = img.get_pixel(0, 0).0;
        img.pixels().all(|p| p.0 == first).then_some(first)
    }
}

impl DisplaySurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.geometry.width
    }

    fn height(&self) -> u32 {
        self.geometry.height
    }

    fn attach(&self, image: RgbImage) {
        self.log.push(Call::Attach(image.width(), image.height()));
        *self.staged.borrow_mut() = Some(image);
    }

    fn draw(&self) -> Result<()> {
        self.log.push(Call::Draw);
        if self.fail_draws.get() {
            return Err(ProjectorError::Surface("framebuffer unplugged".into()));
        }
        let staged = self.staged.borrow();
        let image = staged.as_ref().ok_or(ProjectorError::NothingStaged)?;
        *self.shown.borrow_mut() = Some(image.clone());
        Ok(())
    }
}

// ── Settings ───────────────────────────────────────────────────────

/// Returns the same LED current for every key.
pub(crate) struct FixedCurrent(Cell<i32>);

impl FixedCurrent {
    pub(crate) fn new(current: i32) -> Self {
        Self(Cell::new(current))
    }

    pub(crate) fn set(&self, current: i32) {
        self.0.set(current);
    }
}

impl ConfigurationStore for FixedCurrent {
    fn get_int(&self, _key: &str) -> i32 {
        self.0.get()
    }
}

// ── Log capture ────────────────────────────────────────────────────

struct MessageCapture(Arc<Mutex<Vec<String>>>);

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for MessageCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.0.lock().unwrap().push(message);
        }
    }
}

/// Run `f` with a thread-local subscriber and return every logged message.
pub(crate) fn captured_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(MessageCapture(messages.clone()));
    let out = tracing::subscriber::with_default(subscriber, f);
    let messages = messages.lock().unwrap().clone();
    (out, messages)
}
