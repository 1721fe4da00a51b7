//! Core traits and data types for the collector.
//!
//! A meter is wired from three roles:
//!
//! - a [`Reader`] produces raw samples on demand,
//! - a [`Processor`] consumes one sample and tells the loop whether to go on,
//! - a [`Storage`] persists one measurement (tags + fields) per write.
//!
//! The sample type is fixed per reader/processor pairing through the
//! `Reader::Sample` associated type; no schema is imposed across pairings.
use crate::error::MeterError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::telegram::Decimal;

/// Outcome of a single [`Reader::read`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    /// A sample was produced.
    Sample(T),
    /// The reader has nothing more to give.
    Exhausted,
}

impl<T> Reading<T> {
    /// Applies `f` to a produced sample, passing exhaustion through untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Sample(sample) => Reading::Sample(f(sample)),
            Reading::Exhausted => Reading::Exhausted,
        }
    }

    /// Converts exhaustion into [`MeterError::Exhausted`].
    pub fn into_result(self) -> Result<T, MeterError> {
        match self {
            Reading::Sample(sample) => Ok(sample),
            Reading::Exhausted => Err(MeterError::Exhausted),
        }
    }
}

/// Continuation signal returned by a sink-shaped [`Processor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Read the next sample.
    Continue,
    /// Leave the pull loop.
    Stop,
}

/// A source of raw samples.
///
/// Readers are pulled one sample at a time and conceptually never end; a reader
/// that does run dry reports [`Reading::Exhausted`]. There is no rewind: build a
/// new reader to start over.
pub trait Reader: Send {
    /// Type of the samples this reader yields.
    type Sample;

    /// Produces the next sample, blocking as long as it takes.
    fn read(&mut self) -> Result<Reading<Self::Sample>, MeterError>;
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    type Sample = R::Sample;

    fn read(&mut self) -> Result<Reading<Self::Sample>, MeterError> {
        (**self).read()
    }
}

/// A sink-shaped processing stage.
pub trait Processor<S>: Send {
    /// Consumes one sample and returns whether the driving loop should continue.
    fn process(&mut self, sample: &S) -> Result<Signal, MeterError>;
}

impl<S, P: Processor<S> + ?Sized> Processor<S> for Box<P> {
    fn process(&mut self, sample: &S) -> Result<Signal, MeterError> {
        (**self).process(sample)
    }
}

/// Ordered tag set: string dimensions identifying the source of a measurement.
pub type TagSet = IndexMap<String, String>;

/// Ordered field set: the measured quantities of one write.
pub type FieldSet = IndexMap<String, FieldValue>;

/// A single measured quantity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Binary floating point reading.
    Float(f64),
    /// Decimal reading that keeps the scale reported by the meter.
    Decimal(Decimal),
    /// Integer counter.
    Integer(i64),
    /// Free text.
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Decimal(d) => Some(d.value()),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Decimal(d) => write!(f, "{d}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// A pluggable measurement sink.
///
/// Writes are synchronous. When `timestamp` is `None` the storage stamps the
/// write with the wall-clock time at the moment of the write. Failures are
/// returned to the caller unchanged.
pub trait Storage: Send + Sync {
    /// Persists one measurement.
    fn write(
        &self,
        measurement: &str,
        tags: &TagSet,
        fields: &FieldSet,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), MeterError>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn write(
        &self,
        measurement: &str,
        tags: &TagSet,
        fields: &FieldSet,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), MeterError> {
        (**self).write(measurement, tags, fields, timestamp)
    }
}

/// Shared handle to a storage back-end.
pub type SharedStorage = Arc<dyn Storage>;
