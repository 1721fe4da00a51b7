//! Processing stages.
//!
//! Sink-shaped processors implement [`Processor`](crate::core::Processor) and
//! return a [`Signal`](crate::core::Signal):
//!
//! - [`NoneProcessor`] drops the sample and stops.
//! - [`RecordProcessor`] logs (and optionally stores) scalar samples and continues.
//! - [`ElectricityProcessor`] / [`GasProcessor`] extract DSMR readings and stop.
//! - [`ChainProcessor`] fans one sample out to several processors.
//!
//! [`PassProcessor`] is transform-shaped, and the [`source`] module holds the
//! processors that act as sample sources.
pub mod chain;
pub mod dsmr;
pub mod none;
pub mod pass;
pub mod record;
pub mod source;

pub use chain::ChainProcessor;
pub use dsmr::{ElectricityProcessor, GasProcessor};
pub use none::NoneProcessor;
pub use pass::{PassProcessor, PassRecord};
pub use record::RecordProcessor;
pub use source::{DelayProcessor, RandomProcessor, UsageSource, ZeroProcessor};
