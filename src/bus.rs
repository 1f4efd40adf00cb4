//! Control bus contract, the light engine's register table, and the LED
//! driver that talks to it.
//!
//! Whether the bus answers is decided exactly once, by [`LedDriver::probe`].
//! From then on the driver is either `Connected` and performs real register
//! writes, or `Disconnected` and never touches the bus again. The projector
//! keeps working in the second case; it just cannot switch or dim the LED.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::io;

// ── Bus contract ───────────────────────────────────────────────────

/// Register-addressed two-wire bus to the light engine's controller chip.
///
/// Both methods take `&self`: the bus is shared with other parts of the
/// system and owned elsewhere. Implementations that need mutable state
/// use interior mutability.
pub trait ControlBus {
    /// Read a single register.
    ///
    /// Must not fail: a transfer error is reported by returning the status
    /// error sentinel from [`Registers::status_error`].
    fn read(&self, register: u8) -> u8;

    /// Write one or more bytes starting at `register`.
    fn write(&self, register: u8, data: &[u8]) -> io::Result<()>;
}

impl<B: ControlBus + ?Sized> ControlBus for &B {
    fn read(&self, register: u8) -> u8 {
        (**self).read(register)
    }

    fn write(&self, register: u8, data: &[u8]) -> io::Result<()> {
        (**self).write(register, data)
    }
}

// ── Register table ─────────────────────────────────────────────────

/// Register addresses and command values of the light engine controller.
///
/// These must match the controller's datasheet exactly. `Default` holds
/// the DLPC350 values; a different part can be described with a JSON
/// table loaded through [`Registers::from_json`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Registers {
    /// Hardware status register, read once to probe the bus.
    pub status: u8,
    /// Value the bus returns from `status` when the transfer failed.
    pub status_error: u8,
    pub gamma: u8,
    /// Turns gamma correction off, giving linear output.
    pub gamma_disable: u8,
    pub led_enable: u8,
    pub enable_leds: u8,
    pub disable_leds: u8,
    /// First of three consecutive LED current channel registers.
    pub led_current: u8,
    pub pwm_polarity: u8,
    /// Polarity that was measured to give the intended output. The
    /// programmer's guide describes the opposite sense.
    pub pwm_polarity_normal: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            status: 0x20,
            status_error: 0xFF,
            gamma: 0x3A,
            gamma_disable: 0x00,
            led_enable: 0x10,
            enable_leds: 0x07,
            disable_leds: 0x00,
            led_current: 0x4B,
            pwm_polarity: 0x0B,
            pwm_polarity_normal: 0x00,
        }
    }
}

impl Registers {
    /// Parse a register table. Fields left out keep their default value;
    /// an unknown (e.g. misspelled) field is an error.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ── LED driver ─────────────────────────────────────────────────────

/// Register-level LED control, chosen once when the bus is probed.
///
/// # Rust concept: enums as strategies
/// Instead of a `can_control: bool` checked at the top of every method,
/// the two modes are two variants. The bus handle only exists inside
/// `Connected`, so the `Disconnected` arm cannot reach the bus even by
/// mistake: the compiler enforces "never touch the bus again".
pub enum LedDriver<B> {
    /// The bus answered the probe; every operation writes registers.
    Connected { bus: B, registers: Registers },
    /// The bus did not answer; every operation is a no-op.
    Disconnected,
}

impl<B: ControlBus> LedDriver<B> {
    /// Probe the status register and pick the driver variant.
    ///
    /// A connected bus gets gamma correction disabled right away. An absent
    /// one is logged once and never accessed again.
    pub fn probe(bus: B, registers: Registers) -> Self {
        if bus.read(registers.status) == registers.status_error {
            tracing::info!("no projector bus control");
            return Self::Disconnected;
        }

        let driver = Self::Connected { bus, registers };
        driver.disable_gamma();
        driver
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Select linear output by switching the controller's gamma stage off.
    pub fn disable_gamma(&self) {
        if let Self::Connected { bus, registers } = self {
            write_register(bus, registers.gamma, &[registers.gamma_disable]);
        }
    }

    pub fn turn_off(&self) {
        if let Self::Connected { bus, registers } = self {
            write_register(bus, registers.led_enable, &[registers.disable_leds]);
        }
    }

    /// Program the LED current (when `current > 0`) and switch the LED on.
    ///
    /// The current is written on every call so that a changed setting takes
    /// effect immediately. PWM polarity goes out before the current: the
    /// programmer's guide lists it afterwards, but the hardware only
    /// behaves when it is set first.
    pub fn turn_on(&self, current: i32) {
        let Self::Connected { bus, registers } = self else {
            return;
        };

        if current > 0 {
            write_register(
                bus,
                registers.pwm_polarity,
                &[registers.pwm_polarity_normal],
            );

            let c = u8::try_from(current).unwrap_or(u8::MAX);
            // same value on all three channels
            write_register(bus, registers.led_current, &[c, c, c]);
        }

        write_register(bus, registers.led_enable, &[registers.enable_leds]);
    }
}

/// Fire-and-forget register write. Failures are logged, never returned.
fn write_register<B: ControlBus>(bus: &B, register: u8, data: &[u8]) {
    tracing::debug!("bus write {:#04x} <- {:02x?}", register, data);
    if let Err(e) = bus.write(register, data) {
        tracing::warn!("bus write to {:#04x} failed: {}", register, e);
    }
}

// ── Tests ──────────────────────────────────────────────────────────
