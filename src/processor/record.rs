//! Scalar sink for synthetic meters.
use super::pass::PassProcessor;
use crate::core::{FieldSet, FieldValue, Processor, SharedStorage, Signal, TagSet};
use crate::error::MeterError;
use tracing::info;

/// Logs every scalar sample as a `{value, unit, sn}` record and optionally
/// persists it, then asks for the next sample.
///
/// Writes use the configured measurement name, tags `sn` and `unit`, and a
/// single `value` field.
pub struct RecordProcessor {
    measurement: String,
    pass: PassProcessor,
    storage: Option<SharedStorage>,
}

impl RecordProcessor {
    /// Log-only processor for `measurement`.
    pub fn new(measurement: impl Into<String>, pass: PassProcessor) -> Self {
        Self {
            measurement: measurement.into(),
            pass,
            storage: None,
        }
    }

    /// Also writes every record to `storage`.
    pub fn with_storage(mut self, storage: SharedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Measurement name used for writes.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }
}

impl Processor<f64> for RecordProcessor {
    fn process(&mut self, sample: &f64) -> Result<Signal, MeterError> {
        for record in self.pass.process(*sample) {
            info!(
                measurement = %self.measurement,
                sn = %record.sn,
                value = record.value,
                unit = %record.unit,
                "reading"
            );

            if let Some(storage) = &self.storage {
                let tags = TagSet::from([
                    ("sn".to_string(), record.sn),
                    ("unit".to_string(), record.unit),
                ]);
                let fields =
                    FieldSet::from([("value".to_string(), FieldValue::Float(record.value))]);
                storage.write(&self.measurement, &tags, &fields, None)?;
            }
        }
        Ok(Signal::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Storage;
    use chrono::{DateTime, Utc};
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    type Entry = (String, TagSet, FieldSet);

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Entry>>);

    impl Storage for Recorder {
        fn write(
            &self,
            measurement: &str,
            tags: &TagSet,
            fields: &FieldSet,
            _timestamp: Option<DateTime<Utc>>,
        ) -> Result<(), MeterError> {
            self.0
                .lock()
                .unwrap()
                .push((measurement.to_string(), tags.clone(), fields.clone()));
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn logs_and_continues() {
        let mut processor = RecordProcessor::new("water", PassProcessor::new("W-1", "m3"));
        assert_eq!(processor.process(&1.25).unwrap(), Signal::Continue);
        assert!(logs_contain("sn=W-1"));
        assert!(logs_contain("value=1.25"));
    }

    #[test]
    fn writes_record_to_storage() {
        let storage = Arc::new(Recorder::default());
        let mut processor = RecordProcessor::new("water", PassProcessor::new("W-1", "m3"))
            .with_storage(storage.clone());
        processor.process(&1.25).unwrap();
        processor.process(&2.5).unwrap();

        let writes = storage.0.lock().unwrap();
        assert_eq!(writes.len(), 2);
        let (measurement, tags, fields) = &writes[1];
        assert_eq!(measurement, "water");
        assert_eq!(tags["sn"], "W-1");
        assert_eq!(tags["unit"], "m3");
        assert_eq!(fields["value"], FieldValue::Float(2.5));
    }

    struct Failing;

    impl Storage for Failing {
        fn write(
            &self,
            _measurement: &str,
            _tags: &TagSet,
            _fields: &FieldSet,
            _timestamp: Option<DateTime<Utc>>,
        ) -> Result<(), MeterError> {
            Err(MeterError::Storage("disk full".into()))
        }
    }

    #[test]
    fn storage_failure_propagates() {
        let mut processor =
            RecordProcessor::new("water", PassProcessor::default()).with_storage(Arc::new(Failing));
        assert!(matches!(processor.process(&1.0), Err(MeterError::Storage(_))));
    }
}
