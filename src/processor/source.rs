//! Source-role processors.
//!
//! Before readers and processors were split, sample sources lived on the
//! processor side. These names keep that vocabulary: the synthetic sources are
//! the reader types themselves, and [`UsageSource`] narrows a telegram stream to
//! the current electricity draw.
use crate::core::{Reader, Reading};
use crate::error::MeterError;
use crate::reader::{DelayReader, RandomReader, ZeroReader};
use crate::telegram::{Field, Telegram};
use rand::rngs::StdRng;

/// Constant `0.0` source.
pub type ZeroProcessor = ZeroReader;

/// Uniform `[0, 5]` source rounded to two decimals.
pub type RandomProcessor<R = StdRng> = RandomReader<R>;

/// Delays an inner source before every sample.
pub type DelayProcessor<R> = DelayReader<R>;

/// Scalar source yielding `CURRENT_ELECTRICITY_USAGE` (kW) of every telegram.
pub struct UsageSource<R> {
    inner: R,
}

impl<R: Reader<Sample = Telegram>> UsageSource<R> {
    /// Wraps a telegram reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Reader<Sample = Telegram>> Reader for UsageSource<R> {
    type Sample = f64;

    fn read(&mut self) -> Result<Reading<f64>, MeterError> {
        let telegram = match self.inner.read()? {
            Reading::Sample(telegram) => telegram,
            Reading::Exhausted => return Ok(Reading::Exhausted),
        };
        let usage = telegram.require(Field::CurrentElectricityUsage)?;
        let value = usage.decimal().ok_or_else(|| {
            MeterError::MalformedTelegram(format!(
                "{} is not numeric: '{usage}'",
                Field::CurrentElectricityUsage.name()
            ))
        })?;
        Ok(Reading::Sample(value.value()))
    }
}
