//! Polling-interval decorator.
use crate::core::{Reader, Reading};
use crate::error::MeterError;
use std::time::Duration;

/// Default polling interval of [`DelayReader`].
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

type Sleeper = Box<dyn FnMut(Duration) + Send>;

/// Wraps another reader and blocks for a fixed delay before every read.
///
/// The sleep always happens first; whatever the inner reader then returns
/// (sample, exhaustion or error) is passed through unchanged.
pub struct DelayReader<R> {
    inner: R,
    delay: Duration,
    sleep: Sleeper,
}

impl<R: Reader> DelayReader<R> {
    /// Delays every read of `inner` by `delay`.
    pub fn new(inner: R, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Delays every read of `inner` by [`DEFAULT_DELAY`].
    pub fn with_default_delay(inner: R) -> Self {
        Self::new(inner, DEFAULT_DELAY)
    }

    /// Delay given in (fractional) seconds. Negative or non-finite values are rejected.
    pub fn from_secs(inner: R, secs: f64) -> Result<Self, MeterError> {
        let delay = Duration::try_from_secs_f64(secs).map_err(|_| {
            MeterError::Configuration(format!("invalid delay of {secs} seconds"))
        })?;
        Ok(Self::new(inner, delay))
    }

    /// Replaces the blocking sleep, e.g. to observe it in tests.
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleeper);
        self
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Unwraps the decorated reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Reader> Reader for DelayReader<R> {
    type Sample = R::Sample;

    fn read(&mut self) -> Result<Reading<Self::Sample>, MeterError> {
        (self.sleep)(self.delay);
        self.inner.read()
    }
}
