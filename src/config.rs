//! Configuration loading using Figment.
//!
//! Settings are merged from:
//! 1. a TOML file (`config/meteread.toml` by default, optional)
//! 2. environment variables prefixed with `METEREAD_`, nested with `__`
//!    (e.g. `METEREAD_APPLICATION__LOG_LEVEL=debug`)
//!
//! Sections left out of both fall back to the built-in defaults, which include
//! two ready-to-run meters: `electricity` and `random`.
//!
//! # Example
//! ```no_run
//! use meteread::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("meters: {:?}", settings.meters.keys().collect::<Vec<_>>());
//! # Ok::<(), meteread::error::MeterError>(())
//! ```

use crate::error::MeterError;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/meteread.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "METEREAD_";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// Named storage back-ends, shared by every processor that references them
    pub storages: IndexMap<String, StorageSettings>,
    /// Named meters selectable with `meteread read <name>`. Figment hands
    /// tables over as sorted maps, so file order is not kept.
    pub meters: IndexMap<String, MeterSettings>,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "meteread".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// A storage back-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageSettings {
    /// Append-only CSV file
    Csv {
        /// Target file; its parent directory is created if needed
        path: PathBuf,
    },
    /// InfluxDB v2 bucket
    Influxdb {
        /// Server base URL
        url: String,
        /// API token
        token: String,
        /// Organisation
        org: String,
        /// Bucket
        bucket: String,
        /// Request timeout in seconds; unset waits indefinitely
        #[serde(default)]
        timeout_secs: Option<f64>,
    },
}

/// A sample source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReaderSettings {
    /// Constant `0.0`
    Zero,
    /// Uniform random values in `[0, 5]`
    Random,
    /// Sleeps before every read of `inner`
    Delay {
        /// Delay in seconds
        #[serde(default = "default_delay_secs")]
        delay_secs: f64,
        /// Wrapped reader
        inner: Box<ReaderSettings>,
    },
    /// DSMR v5 telegrams from a serial P1 port
    Serial {
        /// Device path
        #[serde(default = "default_device")]
        device: String,
        /// Verify the CRC footer of every telegram
        #[serde(default = "default_true")]
        verify_checksum: bool,
    },
    /// A captured telegram file, returned on every read
    Raw {
        /// Telegram file
        path: PathBuf,
    },
    /// `CURRENT_ELECTRICITY_USAGE` of a telegram reader, as a scalar
    Usage {
        /// Wrapped telegram reader
        inner: Box<ReaderSettings>,
    },
}

/// A processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessorSettings {
    /// Drop the sample and stop
    #[serde(rename = "none")]
    Discard,
    /// Log scalar samples as `{value, unit, sn}` records and keep reading
    Record {
        /// Serial number tag
        #[serde(default = "default_unset")]
        sn: String,
        /// Unit tag
        #[serde(default = "default_unset")]
        unit: String,
        /// Storage name
        #[serde(default)]
        storage: Option<String>,
    },
    /// DSMR electricity readings
    Electricity {
        /// Storage name
        #[serde(default)]
        storage: Option<String>,
    },
    /// DSMR gas readings
    Gas {
        /// Storage name
        #[serde(default)]
        storage: Option<String>,
    },
}

impl ProcessorSettings {
    /// Referenced storage name, if any.
    pub fn storage(&self) -> Option<&str> {
        match self {
            ProcessorSettings::Discard => None,
            ProcessorSettings::Record { storage, .. }
            | ProcessorSettings::Electricity { storage }
            | ProcessorSettings::Gas { storage } => storage.as_deref(),
        }
    }
}

/// One meter: a reader and the processors fed by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSettings {
    /// Sample source
    pub reader: ReaderSettings,
    /// Processors in invocation order; more than one forms a chain, none discards
    #[serde(default)]
    pub processors: Vec<ProcessorSettings>,
}

fn default_delay_secs() -> f64 {
    1.0
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_unset() -> String {
    "None".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        let storages = IndexMap::from([
            (
                "electricity_csv".to_string(),
                StorageSettings::Csv {
                    path: PathBuf::from("data/electricity.csv"),
                },
            ),
            (
                "gas_csv".to_string(),
                StorageSettings::Csv {
                    path: PathBuf::from("data/gas.csv"),
                },
            ),
        ]);

        let meters = IndexMap::from([
            (
                "electricity".to_string(),
                MeterSettings {
                    reader: ReaderSettings::Serial {
                        device: default_device(),
                        verify_checksum: true,
                    },
                    processors: vec![
                        ProcessorSettings::Electricity {
                            storage: Some("electricity_csv".to_string()),
                        },
                        ProcessorSettings::Gas {
                            storage: Some("gas_csv".to_string()),
                        },
                    ],
                },
            ),
            (
                "random".to_string(),
                MeterSettings {
                    reader: ReaderSettings::Delay {
                        delay_secs: default_delay_secs(),
                        inner: Box::new(ReaderSettings::Random),
                    },
                    processors: vec![ProcessorSettings::Record {
                        sn: default_unset(),
                        unit: "kW".to_string(),
                        storage: None,
                    }],
                },
            ),
        ]);

        Self {
            application: ApplicationConfig::default(),
            storages,
            meters,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl Settings {
    /// Loads `config/meteread.toml` and the environment.
    pub fn load() -> Result<Self, MeterError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads a specific file (missing is fine) and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, MeterError> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// The provider stack used by [`Settings::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Checks values that deserialization cannot.
    pub fn validate(&self) -> Result<(), MeterError> {
        let level = self.application.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(MeterError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        let format = self.application.log_format.to_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            return Err(MeterError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                LOG_FORMATS.join(", ")
            )));
        }

        for (name, storage) in &self.storages {
            if let StorageSettings::Influxdb {
                timeout_secs: Some(secs),
                ..
            } = storage
            {
                if !secs.is_finite() || *secs <= 0.0 {
                    return Err(MeterError::Configuration(format!(
                        "Storage '{name}': timeout_secs must be a positive number, got {secs}"
                    )));
                }
            }
        }

        for (name, meter) in &self.meters {
            validate_reader(name, &meter.reader)?;
            for processor in &meter.processors {
                if let Some(storage) = processor.storage() {
                    if !self.storages.contains_key(storage) {
                        return Err(MeterError::Configuration(format!(
                            "Meter '{name}' references unknown storage '{storage}'"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Names of all configured meters, sorted.
    pub fn meter_names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self.meters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.into_iter()
    }
}

fn validate_reader(meter: &str, reader: &ReaderSettings) -> Result<(), MeterError> {
    match reader {
        ReaderSettings::Delay { delay_secs, inner } => {
            if !delay_secs.is_finite() || *delay_secs < 0.0 {
                return Err(MeterError::Configuration(format!(
                    "Meter '{meter}': delay_secs must be a non-negative number, got {delay_secs}"
                )));
            }
            validate_reader(meter, inner)
        }
        ReaderSettings::Usage { inner } => validate_reader(meter, inner),
        ReaderSettings::Serial { device, .. } if device.is_empty() => Err(
            MeterError::Configuration(format!("Meter '{meter}': serial device path is empty")),
        ),
        _ => Ok(()),
    }
}
