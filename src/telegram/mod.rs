//! Decoded smart-meter telegrams.
//!
//! A telegram is a block of `OBIS(value*unit)` lines framed by a `/` header and a
//! `!XXXX` checksum footer. This module holds the decoded shape: named COSEM
//! objects for the electricity meter itself and a list of M-Bus sub-devices (gas,
//! water, ...) multiplexed onto the same telegram.
//!
//! Decoding lives in [`parser`]; everything downstream only sees [`Telegram`].

pub mod parser;

pub use parser::{checksum, TelegramParser};

use crate::error::MeterError;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// M-Bus device type code for gas meters.
pub const GAS_DEVICE_TYPE: i64 = 3;

/// M-Bus device type code for water meters.
pub const WATER_DEVICE_TYPE: i64 = 7;

/// A decimal number that remembers how many fractional digits the meter sent.
///
/// `01.500` parses to a value of `1.5` with a scale of 3 and prints as `1.500`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decimal {
    value: f64,
    scale: u8,
}

impl Decimal {
    /// Creates a decimal from a value and the number of fractional digits to keep.
    pub fn new(value: f64, scale: u8) -> Self {
        Self { value, scale }
    }

    /// Numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Integer view, only for values sent without fractional digits.
    pub fn as_integer(&self) -> Option<i64> {
        (self.scale == 0 && self.value.is_finite()).then_some(self.value as i64)
    }
}

impl FromStr for Decimal {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix('-').unwrap_or(s);
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
            return Err(MeterError::MalformedTelegram(format!(
                "'{s}' is not a decimal number"
            )));
        }
        let scale = u8::try_from(fraction.len()).map_err(|_| {
            MeterError::MalformedTelegram(format!("'{s}' has too many fractional digits"))
        })?;
        let value = s
            .parse::<f64>()
            .map_err(|e| MeterError::MalformedTelegram(format!("'{s}': {e}")))?;

        Ok(Self { value, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", usize::from(self.scale), self.value)
    }
}

/// Value carried by a COSEM object.
#[derive(Debug, Clone, PartialEq)]
pub enum CosemValue {
    /// Numeric quantity.
    Number(Decimal),
    /// Identifier, timestamp or other text.
    Text(String),
}

impl fmt::Display for CosemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CosemValue::Number(d) => d.fmt(f),
            CosemValue::Text(s) => f.write_str(s),
        }
    }
}

/// One decoded telegram field: a value and its physical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CosemObject {
    /// Decoded value.
    pub value: CosemValue,
    /// Unit as sent by the meter (`kWh`, `kW`, `m3`, ...).
    pub unit: Option<String>,
}

impl CosemObject {
    /// Numeric object with a unit.
    pub fn number(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value: CosemValue::Number(value),
            unit: Some(unit.into()),
        }
    }

    /// Unit-less text object.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: CosemValue::Text(value.into()),
            unit: None,
        }
    }

    /// The numeric value, if any.
    pub fn decimal(&self) -> Option<Decimal> {
        match &self.value {
            CosemValue::Number(d) => Some(*d),
            CosemValue::Text(_) => None,
        }
    }

    /// The unit, or an empty string.
    pub fn unit(&self) -> &str {
        self.unit.as_deref().unwrap_or("")
    }
}

impl fmt::Display for CosemObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit())
    }
}

/// Named telegram fields and their OBIS reference codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Field {
    P1MessageHeader,
    P1MessageTimestamp,
    EquipmentIdentifier,
    ElectricityUsedTariff1,
    ElectricityUsedTariff2,
    ElectricityDeliveredTariff1,
    ElectricityDeliveredTariff2,
    ElectricityActiveTariff,
    CurrentElectricityUsage,
    CurrentElectricityDelivery,
}

impl Field {
    /// OBIS reference of this field.
    pub fn obis(self) -> &'static str {
        match self {
            Field::P1MessageHeader => "1-3:0.2.8",
            Field::P1MessageTimestamp => "0-0:1.0.0",
            Field::EquipmentIdentifier => "0-0:96.1.1",
            Field::ElectricityUsedTariff1 => "1-0:1.8.1",
            Field::ElectricityUsedTariff2 => "1-0:1.8.2",
            Field::ElectricityDeliveredTariff1 => "1-0:2.8.1",
            Field::ElectricityDeliveredTariff2 => "1-0:2.8.2",
            Field::ElectricityActiveTariff => "0-0:96.14.0",
            Field::CurrentElectricityUsage => "1-0:1.7.0",
            Field::CurrentElectricityDelivery => "1-0:2.7.0",
        }
    }

    /// Upper-case field name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Field::P1MessageHeader => "P1_MESSAGE_HEADER",
            Field::P1MessageTimestamp => "P1_MESSAGE_TIMESTAMP",
            Field::EquipmentIdentifier => "EQUIPMENT_IDENTIFIER",
            Field::ElectricityUsedTariff1 => "ELECTRICITY_USED_TARIFF_1",
            Field::ElectricityUsedTariff2 => "ELECTRICITY_USED_TARIFF_2",
            Field::ElectricityDeliveredTariff1 => "ELECTRICITY_DELIVERED_TARIFF_1",
            Field::ElectricityDeliveredTariff2 => "ELECTRICITY_DELIVERED_TARIFF_2",
            Field::ElectricityActiveTariff => "ELECTRICITY_ACTIVE_TARIFF",
            Field::CurrentElectricityUsage => "CURRENT_ELECTRICITY_USAGE",
            Field::CurrentElectricityDelivery => "CURRENT_ELECTRICITY_DELIVERY",
        }
    }
}

/// A secondary meter reported through the M-Bus channels of the telegram.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MbusDevice {
    /// M-Bus channel (the `n` in `0-n:24.1.0`).
    pub channel: u8,
    /// `MBUS_DEVICE_TYPE`.
    pub device_type: Option<CosemObject>,
    /// `MBUS_EQUIPMENT_IDENTIFIER`.
    pub equipment_identifier: Option<CosemObject>,
    /// `MBUS_METER_READING`.
    pub meter_reading: Option<CosemObject>,
    /// Capture time of the meter reading, as sent.
    pub reading_timestamp: Option<String>,
}

impl MbusDevice {
    /// Device type as an integer code.
    pub fn device_type_code(&self) -> Option<i64> {
        self.device_type
            .as_ref()
            .and_then(CosemObject::decimal)
            .and_then(|d| d.as_integer())
    }
}

/// A decoded telegram.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Telegram {
    header: String,
    objects: IndexMap<String, CosemObject>,
    mbus_devices: Vec<MbusDevice>,
}

impl Telegram {
    /// Assembles a telegram from already decoded parts.
    pub fn new(
        header: impl Into<String>,
        objects: IndexMap<String, CosemObject>,
        mbus_devices: Vec<MbusDevice>,
    ) -> Self {
        Self {
            header: header.into(),
            objects,
            mbus_devices,
        }
    }

    /// Identification line without the leading `/`.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Looks up an object by raw OBIS reference.
    pub fn get(&self, obis: &str) -> Option<&CosemObject> {
        self.objects.get(obis)
    }

    /// Looks up a named field.
    pub fn field(&self, field: Field) -> Option<&CosemObject> {
        self.get(field.obis())
    }

    /// Looks up a named field, failing with [`MeterError::MissingField`].
    pub fn require(&self, field: Field) -> Result<&CosemObject, MeterError> {
        self.field(field).ok_or(MeterError::MissingField(field.name()))
    }

    /// All decoded objects in telegram order, M-Bus channels excluded.
    pub fn objects(&self) -> impl Iterator<Item = (&str, &CosemObject)> {
        self.objects.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `MBUS_DEVICES`, in channel order of first appearance.
    pub fn mbus_devices(&self) -> &[MbusDevice] {
        &self.mbus_devices
    }
}
