//! The meter: one reader bound to one processor, driven by a pull loop.
pub mod registry;

pub use registry::{ConfiguredMeter, MeterRegistry};

use crate::core::{Processor, Reader, Signal};
use crate::error::MeterError;
use tracing::{debug, info, info_span};

/// Composition root for one reader/processor pairing.
pub struct Meter<S> {
    name: String,
    reader: Box<dyn Reader<Sample = S>>,
    processor: Box<dyn Processor<S>>,
}

impl<S> Meter<S> {
    /// Binds `reader` to `processor`.
    pub fn new(
        name: impl Into<String>,
        reader: impl Reader<Sample = S> + 'static,
        processor: impl Processor<S> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
            processor: Box::new(processor),
        }
    }

    /// Configured meter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pulls samples into the processor until it returns [`Signal::Stop`].
    ///
    /// There is no iteration bound and no timeout. Reader exhaustion ends the
    /// loop with [`MeterError::Exhausted`]; any other failure is returned as-is.
    /// The meter keeps its reader and processor, so `run` can be called again.
    pub fn run(&mut self) -> Result<(), MeterError> {
        let span = info_span!("meter", name = %self.name);
        let _enter = span.enter();

        let mut samples: u64 = 0;
        loop {
            let sample = self.reader.read()?.into_result()?;
            samples += 1;
            match self.processor.process(&sample)? {
                Signal::Continue => debug!(samples, "continue"),
                Signal::Stop => break,
            }
        }

        info!(samples, "meter stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Reading;
    use crate::processor::NoneProcessor;
    use crate::reader::ZeroReader;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Counters {
        reads: usize,
        processed: Vec<f64>,
    }

    type Shared = Arc<Mutex<Counters>>;

    struct Counting {
        next: f64,
        limit: Option<usize>,
        counters: Shared,
    }

    impl Reader for Counting {
        type Sample = f64;

        fn read(&mut self) -> Result<Reading<f64>, MeterError> {
            let mut counters = self.counters.lock().unwrap();
            if self.limit == Some(counters.reads) {
                return Ok(Reading::Exhausted);
            }
            counters.reads += 1;
            self.next += 1.0;
            Ok(Reading::Sample(self.next))
        }
    }

    struct Scripted {
        signals: VecDeque<Signal>,
        counters: Shared,
    }

    impl Processor<f64> for Scripted {
        fn process(&mut self, sample: &f64) -> Result<Signal, MeterError> {
            self.counters.lock().unwrap().processed.push(*sample);
            Ok(self.signals.pop_front().unwrap_or(Signal::Continue))
        }
    }

    fn meter(limit: Option<usize>, signals: &[Signal]) -> (Meter<f64>, Shared) {
        let counters = Shared::default();
        let reader = Counting {
            next: 0.0,
            limit,
            counters: counters.clone(),
        };
        let processor = Scripted {
            signals: signals.iter().copied().collect(),
            counters: counters.clone(),
        };
        (Meter::new("test", reader, processor), counters)
    }

    #[test]
    fn stops_when_processor_says_so() {
        let (mut meter, counters) =
            meter(None, &[Signal::Continue, Signal::Continue, Signal::Stop]);
        meter.run().unwrap();

        let counters = counters.lock().unwrap();
        assert_eq!(counters.reads, 3);
        assert_eq!(counters.processed, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn exhaustion_ends_the_loop_with_an_error() {
        let (mut meter, counters) = meter(Some(2), &[]);
        let err = meter.run().unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(counters.lock().unwrap().processed.len(), 2);
    }

    #[test]
    fn run_can_be_repeated() {
        let (mut meter, counters) = meter(None, &[Signal::Stop, Signal::Stop]);
        meter.run().unwrap();
        meter.run().unwrap();
        assert_eq!(counters.lock().unwrap().reads, 2);
    }

    #[test]
    fn none_processor_stops_after_one_sample() {
        let mut meter = Meter::new("zero", ZeroReader::new(), NoneProcessor);
        assert_eq!(meter.name(), "zero");
        meter.run().unwrap();
    }

    struct Failing;

    impl Processor<f64> for Failing {
        fn process(&mut self, _sample: &f64) -> Result<Signal, MeterError> {
            Err(MeterError::Storage("disk full".into()))
        }
    }

    #[test]
    fn processor_failure_propagates() {
        let mut meter = Meter::new("zero", ZeroReader::new(), Failing);
        assert!(matches!(meter.run(), Err(MeterError::Storage(_))));
    }
}
