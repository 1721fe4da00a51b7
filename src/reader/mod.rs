//! Sample sources.
//!
//! - [`ZeroReader`] and [`RandomReader`] produce synthetic scalar readings.
//! - [`DelayReader`] decorates any reader with a fixed polling interval.
//! - [`TelegramReader`] frames and decodes telegrams from a byte stream; with the
//!   `instrument_serial` feature it can open a P1 serial port directly.
//! - [`RawTelegramReader`] replays one captured telegram, useful for tests.
pub mod delay;
#[cfg(feature = "instrument_serial")]
pub mod serial;
pub mod synthetic;
pub mod telegram;

pub use delay::{DelayReader, DEFAULT_DELAY};
pub use synthetic::{RandomReader, ZeroReader};
pub use telegram::{RawTelegramReader, TelegramReader};
