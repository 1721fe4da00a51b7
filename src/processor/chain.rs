//! Fan-out processor.
use crate::core::{Processor, Signal};
use crate::error::MeterError;

/// Feeds the same sample to every child, in order.
///
/// Child signals are ignored and the chain itself always stops the loop. A
/// child error aborts the fan-out: later children do not see the sample.
pub struct ChainProcessor<S> {
    processors: Vec<Box<dyn Processor<S>>>,
}

impl<S> Default for ChainProcessor<S> {
    fn default() -> Self {
        Self {
            processors: Vec::new(),
        }
    }
}

impl<S> ChainProcessor<S> {
    /// Chain over `processors`, invoked in the given order.
    pub fn new(processors: Vec<Box<dyn Processor<S>>>) -> Self {
        Self { processors }
    }

    /// Appends a child.
    pub fn push(mut self, processor: impl Processor<S> + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// True for an empty chain.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl<S> Processor<S> for ChainProcessor<S> {
    fn process(&mut self, sample: &S) -> Result<Signal, MeterError> {
        for processor in &mut self.processors {
            processor.process(sample)?;
        }
        Ok(Signal::Stop)
    }
}
