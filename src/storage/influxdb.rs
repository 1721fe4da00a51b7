//! InfluxDB v2 client for [`TimeSeriesStorage`].
//!
//! Points are submitted one at a time through the HTTP write API
//! (`POST /api/v2/write`) as line protocol with nanosecond precision. The call
//! blocks until the server answers; a non-2xx answer is a storage failure.
use super::timeseries::{Point, PointWriter, TimeSeriesStorage};
use crate::error::MeterError;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

/// Time-series storage backed by an InfluxDB v2 server.
pub type InfluxDbStorage = TimeSeriesStorage<InfluxDbClient>;

/// Connection parameters of an InfluxDB v2 bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxDbConfig {
    /// Base URL of the server, e.g. `http://localhost:8086`.
    pub url: String,
    /// API token.
    pub token: String,
    /// Organisation name.
    pub org: String,
    /// Target bucket.
    pub bucket: String,
    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Synchronous InfluxDB v2 write client.
#[derive(Debug, Clone)]
pub struct InfluxDbClient {
    client: Client,
    write_url: Url,
    token: String,
}

impl InfluxDbClient {
    /// Builds a client for `config`. Fails on an unparsable URL.
    pub fn new(config: &InfluxDbConfig) -> Result<Self, MeterError> {
        let base = config.url.trim_end_matches('/');
        let mut write_url = Url::parse(&format!("{base}/api/v2/write")).map_err(|e| {
            MeterError::Configuration(format!("invalid InfluxDB url '{}': {e}", config.url))
        })?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &config.org)
            .append_pair("bucket", &config.bucket)
            .append_pair("precision", "ns");

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("meteread/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MeterError::Storage(format!("failed to create HTTP client: {e}")))?;

        info!(url = %base, org = %config.org, bucket = %config.bucket, "InfluxDB client ready");
        Ok(Self {
            client,
            write_url,
            token: config.token.clone(),
        })
    }

    /// Full write endpoint, query included.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

impl PointWriter for InfluxDbClient {
    fn write_point(&self, point: &Point) -> Result<(), MeterError> {
        let body = point.to_line_protocol()?;
        debug!(line = %body, "submitting point");

        let response = self
            .client
            .post(self.write_url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(|e| MeterError::Storage(format!("InfluxDB unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(MeterError::Storage(format!(
                "InfluxDB rejected write ({status}): {}",
                detail.trim()
            )));
        }
        Ok(())
    }
}

impl InfluxDbStorage {
    /// Connects a storage to the bucket described by `config`.
    pub fn connect(config: &InfluxDbConfig) -> Result<Self, MeterError> {
        Ok(TimeSeriesStorage::new(InfluxDbClient::new(config)?))
    }
}
