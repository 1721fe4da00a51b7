//! Builds meters from [`Settings`].
//!
//! The registry is the composition root: it turns a `[meters.<name>]` section
//! into a reader, its processors and the storages they reference. Each storage
//! is constructed at most once per meter and shared between the processors that
//! name it. Reader and processor sample types must agree: scalar readers feed
//! `record` processors, telegram readers feed `electricity` and `gas`.
use super::Meter;
use crate::config::{MeterSettings, ProcessorSettings, ReaderSettings, Settings, StorageSettings};
use crate::core::{Processor, Reader, SharedStorage};
use crate::error::MeterError;
use crate::processor::{
    ChainProcessor, ElectricityProcessor, GasProcessor, NoneProcessor, PassProcessor,
    RecordProcessor, UsageSource,
};
use crate::reader::{DelayReader, RandomReader, RawTelegramReader, ZeroReader};
use crate::telegram::Telegram;
use std::collections::HashMap;
use tracing::{debug, info};

/// A built meter, by sample type.
pub enum ConfiguredMeter {
    /// Meter over scalar readings.
    Scalar(Meter<f64>),
    /// Meter over decoded telegrams.
    Telegram(Meter<Telegram>),
}

impl ConfiguredMeter {
    /// Meter name.
    pub fn name(&self) -> &str {
        match self {
            ConfiguredMeter::Scalar(meter) => meter.name(),
            ConfiguredMeter::Telegram(meter) => meter.name(),
        }
    }

    /// Runs the pull loop, see [`Meter::run`].
    pub fn run(&mut self) -> Result<(), MeterError> {
        match self {
            ConfiguredMeter::Scalar(meter) => meter.run(),
            ConfiguredMeter::Telegram(meter) => meter.run(),
        }
    }
}

enum Source {
    Scalar(Box<dyn Reader<Sample = f64>>),
    Telegram(Box<dyn Reader<Sample = Telegram>>),
}

/// Meter factory over validated settings.
#[derive(Debug, Clone)]
pub struct MeterRegistry {
    settings: Settings,
}

impl MeterRegistry {
    /// Validates `settings` and wraps them.
    pub fn new(settings: Settings) -> Result<Self, MeterError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Configured meter names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.settings.meter_names()
    }

    /// Underlying settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Builds the meter called `name`, opening its reader and storages.
    pub fn build(&self, name: &str) -> Result<ConfiguredMeter, MeterError> {
        let settings = self
            .settings
            .meters
            .get(name)
            .ok_or_else(|| MeterError::UnknownMeter(name.to_string()))?;
        info!(meter = name, "building meter");

        let mut storages = StorageCache::new(&self.settings);
        let source = build_reader(&settings.reader)?;
        let meter = match source {
            Source::Scalar(reader) => {
                let processor = build_processors(name, settings, &mut storages, scalar_processor)?;
                ConfiguredMeter::Scalar(Meter::new(name, reader, processor))
            }
            Source::Telegram(reader) => {
                let processor =
                    build_processors(name, settings, &mut storages, telegram_processor)?;
                ConfiguredMeter::Telegram(Meter::new(name, reader, processor))
            }
        };
        Ok(meter)
    }
}

fn build_reader(settings: &ReaderSettings) -> Result<Source, MeterError> {
    let source = match settings {
        ReaderSettings::Zero => Source::Scalar(Box::new(ZeroReader::new())),
        ReaderSettings::Random => Source::Scalar(Box::new(RandomReader::new())),
        ReaderSettings::Delay { delay_secs, inner } => match build_reader(inner)? {
            Source::Scalar(r) => Source::Scalar(Box::new(DelayReader::from_secs(r, *delay_secs)?)),
            Source::Telegram(r) => {
                Source::Telegram(Box::new(DelayReader::from_secs(r, *delay_secs)?))
            }
        },
        ReaderSettings::Serial {
            device,
            verify_checksum,
        } => Source::Telegram(open_serial(device, *verify_checksum)?),
        ReaderSettings::Raw { path } => {
            Source::Telegram(Box::new(RawTelegramReader::from_path(path)?))
        }
        ReaderSettings::Usage { inner } => match build_reader(inner)? {
            Source::Telegram(r) => Source::Scalar(Box::new(UsageSource::new(r))),
            Source::Scalar(_) => {
                return Err(MeterError::Configuration(
                    "usage reader needs a telegram reader as inner".to_string(),
                ))
            }
        },
    };
    Ok(source)
}

#[cfg(feature = "instrument_serial")]
fn open_serial(
    device: &str,
    verify_checksum: bool,
) -> Result<Box<dyn Reader<Sample = Telegram>>, MeterError> {
    use crate::reader::serial::{SerialSettings, SerialTelegramReader};
    use crate::telegram::TelegramParser;

    let parser = if verify_checksum {
        TelegramParser::new()
    } else {
        TelegramParser::without_checksum()
    };
    let reader = SerialTelegramReader::open_serial(device, &SerialSettings::dsmr_v5(), parser)?;
    Ok(Box::new(reader))
}

#[cfg(not(feature = "instrument_serial"))]
fn open_serial(
    _device: &str,
    _verify_checksum: bool,
) -> Result<Box<dyn Reader<Sample = Telegram>>, MeterError> {
    Err(MeterError::FeatureNotEnabled("instrument_serial".to_string()))
}

type ProcessorFactory<S> = fn(
    &str,
    &ProcessorSettings,
    &mut StorageCache<'_>,
) -> Result<Box<dyn Processor<S>>, MeterError>;

fn build_processors<S: 'static>(
    meter: &str,
    settings: &MeterSettings,
    storages: &mut StorageCache<'_>,
    factory: ProcessorFactory<S>,
) -> Result<Box<dyn Processor<S>>, MeterError> {
    let mut processors = Vec::with_capacity(settings.processors.len());
    for processor in &settings.processors {
        processors.push(factory(meter, processor, storages)?);
    }

    let processor: Box<dyn Processor<S>> = match processors.len() {
        0 => Box::new(NoneProcessor),
        1 => processors.remove(0),
        n => {
            debug!(meter, processors = n, "chaining processors");
            Box::new(ChainProcessor::new(processors))
        }
    };
    Ok(processor)
}

fn mismatch(meter: &str, processor: &str, samples: &str) -> MeterError {
    MeterError::Configuration(format!(
        "Meter '{meter}': processor '{processor}' cannot consume {samples} samples"
    ))
}

fn scalar_processor(
    meter: &str,
    settings: &ProcessorSettings,
    storages: &mut StorageCache<'_>,
) -> Result<Box<dyn Processor<f64>>, MeterError> {
    match settings {
        ProcessorSettings::Discard => Ok(Box::new(NoneProcessor)),
        ProcessorSettings::Record { sn, unit, storage } => {
            let mut processor = RecordProcessor::new(meter, PassProcessor::new(sn, unit));
            if let Some(name) = storage {
                processor = processor.with_storage(storages.get(name)?);
            }
            Ok(Box::new(processor))
        }
        ProcessorSettings::Electricity { .. } => Err(mismatch(meter, "electricity", "scalar")),
        ProcessorSettings::Gas { .. } => Err(mismatch(meter, "gas", "scalar")),
    }
}

fn telegram_processor(
    meter: &str,
    settings: &ProcessorSettings,
    storages: &mut StorageCache<'_>,
) -> Result<Box<dyn Processor<Telegram>>, MeterError> {
    match settings {
        ProcessorSettings::Discard => Ok(Box::new(NoneProcessor)),
        ProcessorSettings::Electricity { storage } => Ok(Box::new(match storage {
            Some(name) => ElectricityProcessor::with_storage(storages.get(name)?),
            None => ElectricityProcessor::new(),
        })),
        ProcessorSettings::Gas { storage } => Ok(Box::new(match storage {
            Some(name) => GasProcessor::with_storage(storages.get(name)?),
            None => GasProcessor::new(),
        })),
        ProcessorSettings::Record { .. } => Err(mismatch(meter, "record", "telegram")),
    }
}

/// Storages opened for one meter, keyed by configured name.
struct StorageCache<'a> {
    settings: &'a Settings,
    opened: HashMap<String, SharedStorage>,
}

impl<'a> StorageCache<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            opened: HashMap::new(),
        }
    }

    fn get(&mut self, name: &str) -> Result<SharedStorage, MeterError> {
        if let Some(storage) = self.opened.get(name) {
            return Ok(storage.clone());
        }
        let settings = self.settings.storages.get(name).ok_or_else(|| {
            MeterError::Configuration(format!("unknown storage '{name}'"))
        })?;
        let storage = open_storage(settings)?;
        info!(storage = name, "storage ready");
        self.opened.insert(name.to_string(), storage.clone());
        Ok(storage)
    }
}

fn open_storage(settings: &StorageSettings) -> Result<SharedStorage, MeterError> {
    match settings {
        #[cfg(feature = "storage_csv")]
        StorageSettings::Csv { path } => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MeterError::Storage(format!("cannot create '{}': {e}", parent.display()))
                })?;
            }
            Ok(std::sync::Arc::new(crate::storage::CsvStorage::new(path)))
        }
        #[cfg(not(feature = "storage_csv"))]
        StorageSettings::Csv { .. } => Err(MeterError::FeatureNotEnabled("storage_csv".to_string())),

        #[cfg(feature = "storage_influxdb")]
        StorageSettings::Influxdb {
            url,
            token,
            org,
            bucket,
            timeout_secs,
        } => {
            use crate::storage::{InfluxDbConfig, InfluxDbStorage};

            let timeout = timeout_secs
                .map(std::time::Duration::try_from_secs_f64)
                .transpose()
                .map_err(|e| MeterError::Configuration(format!("invalid timeout_secs: {e}")))?;
            let config = InfluxDbConfig {
                url: url.clone(),
                token: token.clone(),
                org: org.clone(),
                bucket: bucket.clone(),
                timeout,
            };
            Ok(std::sync::Arc::new(InfluxDbStorage::connect(&config)?))
        }
        #[cfg(not(feature = "storage_influxdb"))]
        StorageSettings::Influxdb { .. } => Err(MeterError::FeatureNotEnabled(
            "storage_influxdb".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;

    const FIXTURE_PATH: &str = "tests/fixtures/telegram_v5.txt";

    fn with_meter(name: &str, meter: MeterSettings) -> Settings {
        let mut settings = Settings::default();
        settings.meters.insert(name.to_string(), meter);
        settings
    }

    fn raw_reader() -> ReaderSettings {
        ReaderSettings::Raw {
            path: PathBuf::from(FIXTURE_PATH),
        }
    }

    #[test]
    fn lists_builtin_meters() {
        let registry = MeterRegistry::new(Settings::default()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["electricity", "random"]);
    }

    #[test]
    fn builds_random_meter_as_scalar() {
        let registry = MeterRegistry::new(Settings::default()).unwrap();
        let meter = registry.build("random").unwrap();
        assert!(matches!(meter, ConfiguredMeter::Scalar(_)));
        assert_eq!(meter.name(), "random");
    }

    #[test]
    fn unknown_meter_is_rejected() {
        let registry = MeterRegistry::new(Settings::default()).unwrap();
        let err = registry.build("water").err().unwrap();
        assert!(matches!(err, MeterError::UnknownMeter(name) if name == "water"));
    }

    #[test]
    fn raw_telegram_meter_runs_once() {
        let settings = with_meter(
            "p1",
            MeterSettings {
                reader: raw_reader(),
                processors: vec![
                    ProcessorSettings::Electricity { storage: None },
                    ProcessorSettings::Gas { storage: None },
                ],
            },
        );
        let mut meter = MeterRegistry::new(settings).unwrap().build("p1").unwrap();
        assert!(matches!(meter, ConfiguredMeter::Telegram(_)));
        meter.run().unwrap();
    }

    #[test]
    fn usage_meter_feeds_scalar_processors() {
        let settings = with_meter(
            "usage",
            MeterSettings {
                reader: ReaderSettings::Usage {
                    inner: Box::new(raw_reader()),
                },
                processors: vec![ProcessorSettings::Discard],
            },
        );
        let mut meter = MeterRegistry::new(settings).unwrap().build("usage").unwrap();
        assert!(matches!(meter, ConfiguredMeter::Scalar(_)));
        meter.run().unwrap();
    }

    #[test]
    fn telegram_processor_on_scalar_reader_is_rejected() {
        let settings = with_meter(
            "bad",
            MeterSettings {
                reader: ReaderSettings::Zero,
                processors: vec![ProcessorSettings::Electricity { storage: None }],
            },
        );
        let err = MeterRegistry::new(settings).unwrap().build("bad").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("cannot consume scalar samples"));
    }

    #[test]
    fn record_processor_on_telegram_reader_is_rejected() {
        let settings = with_meter(
            "bad",
            MeterSettings {
                reader: raw_reader(),
                processors: vec![ProcessorSettings::Record {
                    sn: "None".to_string(),
                    unit: "kW".to_string(),
                    storage: None,
                }],
            },
        );
        let err = MeterRegistry::new(settings).unwrap().build("bad").err().unwrap();
        assert!(err.to_string().contains("cannot consume telegram samples"));
    }

    #[test]
    fn usage_over_scalar_reader_is_rejected() {
        let settings = with_meter(
            "bad",
            MeterSettings {
                reader: ReaderSettings::Usage {
                    inner: Box::new(ReaderSettings::Random),
                },
                processors: vec![],
            },
        );
        let err = MeterRegistry::new(settings).unwrap().build("bad").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_capture_file_is_transport_failure() {
        let settings = with_meter(
            "gone",
            MeterSettings {
                reader: ReaderSettings::Raw {
                    path: PathBuf::from("tests/fixtures/missing.txt"),
                },
                processors: vec![],
            },
        );
        let err = MeterRegistry::new(settings).unwrap().build("gone").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn invalid_settings_are_rejected_up_front() {
        let mut settings = Settings::default();
        settings.application.log_format = "xml".to_string();
        assert!(MeterRegistry::new(settings).is_err());
    }

    #[cfg(feature = "instrument_serial")]
    #[test]
    fn missing_serial_device_is_transport_failure() {
        let settings = with_meter(
            "serial",
            MeterSettings {
                reader: ReaderSettings::Serial {
                    device: "/dev/does-not-exist-meteread".to_string(),
                    verify_checksum: true,
                },
                processors: vec![],
            },
        );
        let err = MeterRegistry::new(settings).unwrap().build("serial").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
