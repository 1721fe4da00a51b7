//! Time-series storage over a point-based database client.
//!
//! [`TimeSeriesStorage`] turns every write into one [`Point`] (measurement, time,
//! tag dimensions, field values) and hands it to a [`PointWriter`]. The client
//! submits synchronously; its success or failure is returned as-is, never retried.
use crate::core::{FieldSet, FieldValue, Storage, TagSet};
use crate::error::MeterError;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use tracing::debug;

/// One time-series data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    timestamp: DateTime<Utc>,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
}

impl Point {
    /// New point stamped with the current time.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp: Utc::now(),
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Sets the point time.
    pub fn time(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a tag dimension.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Adds a field value.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Measurement name.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Point time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Renders the point in InfluxDB line protocol with nanosecond precision.
    ///
    /// Tags with empty values are left out. A point without fields, a non-finite
    /// float or a time outside the nanosecond range is an error.
    pub fn to_line_protocol(&self) -> Result<String, MeterError> {
        if self.fields.is_empty() {
            return Err(MeterError::Storage(format!(
                "point '{}' has no fields",
                self.measurement
            )));
        }
        let nanos = self.timestamp.timestamp_nanos_opt().ok_or_else(|| {
            MeterError::Storage(format!("timestamp {} out of range", self.timestamp))
        })?;

        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in self.tags.iter().filter(|(_, v)| !v.is_empty()) {
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&field_literal(key, value)?);
        }

        let _ = write!(line, " {nanos}");
        Ok(line)
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn field_literal(key: &str, value: &FieldValue) -> Result<String, MeterError> {
    match value {
        FieldValue::Float(v) if !v.is_finite() => Err(MeterError::Storage(format!(
            "field '{key}' is not a finite number"
        ))),
        FieldValue::Float(v) => Ok(v.to_string()),
        FieldValue::Decimal(d) => Ok(d.to_string()),
        FieldValue::Integer(i) => Ok(format!("{i}i")),
        FieldValue::Text(s) => Ok(format!("\"{}\"", escape(s, &['"', '\\']))),
    }
}

/// A time-series database client able to submit one point synchronously.
pub trait PointWriter: Send + Sync {
    /// Submits `point`, returning once the database accepted or rejected it.
    fn write_point(&self, point: &Point) -> Result<(), MeterError>;
}

/// Storage that writes one point per measurement through a [`PointWriter`].
#[derive(Debug, Clone)]
pub struct TimeSeriesStorage<C> {
    client: C,
}

impl<C: PointWriter> TimeSeriesStorage<C> {
    /// Storage submitting through `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: PointWriter> Storage for TimeSeriesStorage<C> {
    fn write(
        &self,
        measurement: &str,
        tags: &TagSet,
        fields: &FieldSet,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), MeterError> {
        let mut point = Point::new(measurement).time(timestamp.unwrap_or_else(Utc::now));
        for (key, value) in tags {
            point = point.tag(key.as_str(), value.as_str());
        }
        for (key, value) in fields {
            point = point.field(key.as_str(), value.clone());
        }

        self.client.write_point(&point)?;
        debug!(measurement, fields = fields.len(), "time-series write");
        Ok(())
    }
}
