//! Serial transport for P1 telegram readers.
use super::TelegramReader;
use crate::error::MeterError;
use crate::telegram::TelegramParser;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::BufReader;
use std::time::Duration;
use tracing::info;

/// Default P1 device path.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// Telegram reader over an open serial port.
pub type SerialTelegramReader = TelegramReader<BufReader<Box<dyn SerialPort>>>;

/// Line settings of a P1 port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Parity checking.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Flow control.
    pub flow_control: FlowControl,
    /// Per-read timeout of the port. Timeouts are not fatal: the reader keeps waiting.
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// DSMR 4 and 5: 115200 baud, 8N1.
    pub fn dsmr_v5() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_secs(20),
        }
    }

    /// DSMR 2.2: 9600 baud, 7E1.
    pub fn dsmr_v2_2() -> Self {
        Self {
            baud_rate: 9_600,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            ..Self::dsmr_v5()
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self::dsmr_v5()
    }
}

/// Opens `device` with the given line settings.
pub fn open(device: &str, settings: &SerialSettings) -> Result<Box<dyn SerialPort>, MeterError> {
    let port = serialport::new(device, settings.baud_rate)
        .data_bits(settings.data_bits)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .flow_control(settings.flow_control)
        .timeout(settings.read_timeout)
        .open()?;
    info!(device, baud = settings.baud_rate, "opened serial port");
    Ok(port)
}

impl SerialTelegramReader {
    /// Opens `device` and reads telegrams from it.
    pub fn open_serial(
        device: &str,
        settings: &SerialSettings,
        parser: TelegramParser,
    ) -> Result<Self, MeterError> {
        let port = open(device, settings)?;
        Ok(TelegramReader::new(BufReader::new(port), parser))
    }
}
