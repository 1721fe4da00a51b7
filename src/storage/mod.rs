//! Storage back-ends.
//!
//! Every back-end implements [`Storage`](crate::core::Storage):
//!
//! - [`CsvStorage`] appends rows to a local file (feature `storage_csv`).
//! - [`TimeSeriesStorage`] submits one point per write through a [`PointWriter`];
//!   [`InfluxDbStorage`] is the InfluxDB v2 flavour (feature `storage_influxdb`).
#[cfg(feature = "storage_csv")]
pub mod csv;
#[cfg(feature = "storage_influxdb")]
pub mod influxdb;
pub mod timeseries;

#[cfg(feature = "storage_csv")]
pub use self::csv::CsvStorage;
#[cfg(feature = "storage_influxdb")]
pub use influxdb::{InfluxDbClient, InfluxDbConfig, InfluxDbStorage};
pub use timeseries::{Point, PointWriter, TimeSeriesStorage};
