//! # meteread
//!
//! A small smart-meter telemetry collector. A meter pulls raw samples from a
//! reader, hands each one to a processor, and the processor may persist what it
//! extracts through a storage back-end. The library holds all of it; the
//! `meteread` binary only selects a configured meter and runs it.
//!
//! ## Crate Structure
//!
//! - **`core`**: the `Reader`, `Processor` and `Storage` traits plus the
//!   `Reading`/`Signal` enums and the tag/field model shared by every stage.
//! - **`reader`**: synthetic sources (zero, random, delayed) and telegram readers
//!   over a serial port or any buffered byte stream.
//! - **`telegram`**: decoded DSMR telegrams and the decoder.
//! - **`processor`**: sinks (none, record, DSMR electricity/gas), the fan-out
//!   chain, the `{value, unit, sn}` pass-through and source-role processors.
//! - **`storage`**: CSV files and time-series databases (InfluxDB v2).
//! - **`meter`**: the pull loop and the registry building meters from settings.
//! - **`config`**: Figment-based settings (TOML file + `METEREAD_` environment).
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`error`**: the crate-wide `MeterError` and its failure kinds.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod meter;
pub mod processor;
pub mod reader;
pub mod storage;
pub mod telegram;

pub use crate::core::{
    FieldSet, FieldValue, Processor, Reader, Reading, SharedStorage, Signal, Storage, TagSet,
};
pub use crate::error::{AppResult, ErrorKind, MeterError};
pub use crate::meter::Meter;
