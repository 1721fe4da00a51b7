//! The no-op sink.
use crate::core::{Processor, Signal};
use crate::error::MeterError;

/// Discards every sample and stops the loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneProcessor;

impl<S> Processor<S> for NoneProcessor {
    fn process(&mut self, _sample: &S) -> Result<Signal, MeterError> {
        Ok(Signal::Stop)
    }
}
