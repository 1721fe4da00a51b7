//! DSMR telegram processors.
//!
//! Each processor extracts one utility's readings from a decoded [`Telegram`],
//! logs them as a structured event and, when it owns a storage, performs exactly
//! one write per telegram. Decoding a telegram is a one-shot extraction, so both
//! processors return [`Signal::Stop`].
use crate::core::{FieldSet, FieldValue, Processor, SharedStorage, Signal, TagSet};
use crate::error::MeterError;
use crate::telegram::{CosemObject, Decimal, Field, Telegram, GAS_DEVICE_TYPE};
use tracing::info;

/// Measurement name of electricity writes.
pub const ELECTRICITY_MEASUREMENT: &str = "electricity";

/// Measurement name of gas writes.
pub const GAS_MEASUREMENT: &str = "gas";

fn numeric(object: &CosemObject, name: &'static str) -> Result<Decimal, MeterError> {
    object
        .decimal()
        .ok_or_else(|| MeterError::MalformedTelegram(format!("{name} is not numeric: '{object}'")))
}

fn require_numeric(telegram: &Telegram, field: Field) -> Result<(&CosemObject, Decimal), MeterError> {
    let object = telegram.require(field)?;
    Ok((object, numeric(object, field.name())?))
}

/// Extracts tariff counters and current power from the electricity meter.
///
/// Writes measurement `electricity` with tag `sn` and fields `t1`, `t2`,
/// `current`, `returned`.
#[derive(Default)]
pub struct ElectricityProcessor {
    storage: Option<SharedStorage>,
}

impl ElectricityProcessor {
    /// Log-only processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor writing every extraction to `storage`.
    pub fn with_storage(storage: SharedStorage) -> Self {
        Self {
            storage: Some(storage),
        }
    }
}

impl Processor<Telegram> for ElectricityProcessor {
    fn process(&mut self, telegram: &Telegram) -> Result<Signal, MeterError> {
        let sn = telegram.require(Field::EquipmentIdentifier)?.value.to_string();
        let (t1_obj, t1) = require_numeric(telegram, Field::ElectricityUsedTariff1)?;
        let (t2_obj, t2) = require_numeric(telegram, Field::ElectricityUsedTariff2)?;
        let (current_obj, current) = require_numeric(telegram, Field::CurrentElectricityUsage)?;
        let (returned_obj, returned) =
            require_numeric(telegram, Field::CurrentElectricityDelivery)?;

        info!(
            sn = %sn,
            t1 = %t1_obj,
            t2 = %t2_obj,
            now = %current_obj,
            returned = %returned_obj,
            "electricity"
        );

        if let Some(storage) = &self.storage {
            let tags = TagSet::from([("sn".to_string(), sn)]);
            let fields = FieldSet::from([
                ("t1".to_string(), FieldValue::Decimal(t1)),
                ("t2".to_string(), FieldValue::Decimal(t2)),
                ("current".to_string(), FieldValue::Decimal(current)),
                ("returned".to_string(), FieldValue::Decimal(returned)),
            ]);
            storage.write(ELECTRICITY_MEASUREMENT, &tags, &fields, None)?;
        }
        Ok(Signal::Stop)
    }
}

/// Extracts the cumulative reading of the gas meter hanging off the M-Bus.
///
/// Only the first sub-device with type code [`GAS_DEVICE_TYPE`] is used; other
/// sub-devices are skipped without logging. Writes measurement `gas` with tag
/// `sn` and field `reading`.
#[derive(Default)]
pub struct GasProcessor {
    storage: Option<SharedStorage>,
}

impl GasProcessor {
    /// Log-only processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor writing every extraction to `storage`.
    pub fn with_storage(storage: SharedStorage) -> Self {
        Self {
            storage: Some(storage),
        }
    }
}

impl Processor<Telegram> for GasProcessor {
    fn process(&mut self, telegram: &Telegram) -> Result<Signal, MeterError> {
        let Some(device) = telegram
            .mbus_devices()
            .iter()
            .find(|d| d.device_type_code() == Some(GAS_DEVICE_TYPE))
        else {
            return Ok(Signal::Stop);
        };

        let sn = device
            .equipment_identifier
            .as_ref()
            .ok_or(MeterError::MissingField("MBUS_EQUIPMENT_IDENTIFIER"))?
            .value
            .to_string();
        let reading_obj = device
            .meter_reading
            .as_ref()
            .ok_or(MeterError::MissingField("MBUS_METER_READING"))?;
        let reading = numeric(reading_obj, "MBUS_METER_READING")?;

        info!(
            sn = %sn,
            reading = %reading,
            unit = reading_obj.unit(),
            channel = device.channel,
            "gas"
        );

        if let Some(storage) = &self.storage {
            let tags = TagSet::from([("sn".to_string(), sn)]);
            let fields = FieldSet::from([("reading".to_string(), FieldValue::Decimal(reading))]);
            storage.write(GAS_MEASUREMENT, &tags, &fields, None)?;
        }
        Ok(Signal::Stop)
    }
}
