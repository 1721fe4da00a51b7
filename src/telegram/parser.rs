//! Telegram decoder.
//!
//! Turns one framed telegram into a [`Telegram`]. Lines have the shape
//! `A-B:C.D.E(group)(group)...`; the last group carries the value, optionally
//! followed by `*unit`. Objects on M-Bus channels (`0-n:` with `n > 0`) are
//! collected per channel into [`MbusDevice`] records.
//!
//! The checksum is CRC-16/ARC over every byte from `/` up to and including `!`,
//! written as four hex digits after the `!`.

use super::{CosemObject, CosemValue, MbusDevice, Telegram};
use crate::error::MeterError;
use crc::{Crc, CRC_16_ARC};
use indexmap::IndexMap;

const CRC16_ARC: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// `C.D.E` references whose unit-less values are numbers rather than text.
const NUMERIC_WITHOUT_UNIT: &[&str] = &[
    "24.1.0", // M-Bus device type
    "96.7.21", "96.7.9", // power failure counters
    "32.32.0", "52.32.0", "72.32.0", // voltage sags
    "32.36.0", "52.36.0", "72.36.0", // voltage swells
];

const MBUS_DEVICE_TYPE: &str = "24.1.0";
const MBUS_EQUIPMENT_IDENTIFIER: &str = "96.1.0";
const MBUS_METER_READING: &str = "24.2.1";

/// Computes the telegram checksum of `data`.
pub fn checksum(data: &[u8]) -> u16 {
    CRC16_ARC.checksum(data)
}

fn malformed(msg: impl Into<String>) -> MeterError {
    MeterError::MalformedTelegram(msg.into())
}

/// Decodes raw telegram text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramParser {
    verify_checksum: bool,
}

impl Default for TelegramParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelegramParser {
    /// Parser that verifies the footer checksum.
    pub fn new() -> Self {
        Self {
            verify_checksum: true,
        }
    }

    /// Parser that ignores the footer checksum (for captured or hand-edited telegrams).
    pub fn without_checksum() -> Self {
        Self {
            verify_checksum: false,
        }
    }

    /// Whether the footer checksum is checked.
    pub fn verifies_checksum(&self) -> bool {
        self.verify_checksum
    }

    /// Decodes one telegram. Text before the `/` header is skipped.
    pub fn parse(&self, raw: &str) -> Result<Telegram, MeterError> {
        let start = raw
            .find('/')
            .ok_or_else(|| malformed("missing '/' identification line"))?;
        let framed = &raw[start..];
        let bang = framed
            .find('!')
            .ok_or_else(|| malformed("missing '!' footer"))?;

        if self.verify_checksum {
            verify(framed, bang)?;
        }

        let mut lines = framed[1..bang].lines();
        let header = lines.next().unwrap_or_default().trim().to_string();

        let mut objects = IndexMap::new();
        let mut devices: Vec<MbusDevice> = Vec::new();

        for line in lines.map(str::trim).filter(|l| !l.is_empty()) {
            let (reference, groups) = split_line(line)?;
            let code = ObisCode::parse(reference)?;
            let value = groups.last().copied().unwrap_or_default();

            match code.mbus_channel() {
                Some(channel) => {
                    let device = device_for(&mut devices, channel);
                    let object = decode_value(code.cde, value)?;
                    match code.cde {
                        MBUS_DEVICE_TYPE => device.device_type = Some(object),
                        MBUS_EQUIPMENT_IDENTIFIER => device.equipment_identifier = Some(object),
                        _ => {
                            if groups.len() > 1 {
                                device.reading_timestamp = Some(groups[0].to_string());
                            }
                            device.meter_reading = Some(object);
                        }
                    }
                }
                None => {
                    objects.insert(reference.to_string(), decode_value(code.cde, value)?);
                }
            }
        }

        Ok(Telegram::new(header, objects, devices))
    }
}

fn verify(framed: &str, bang: usize) -> Result<(), MeterError> {
    let footer = framed[bang + 1..].trim_start();
    let expected = footer
        .get(..4)
        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        .ok_or_else(|| malformed("missing or unreadable checksum after '!'"))?;
    let computed = checksum(framed[..=bang].as_bytes());
    if expected != computed {
        return Err(MeterError::ChecksumMismatch { expected, computed });
    }
    Ok(())
}

/// Splits `ref(g1)(g2)` into `ref` and `[g1, g2]`.
fn split_line(line: &str) -> Result<(&str, Vec<&str>), MeterError> {
    let open = line
        .find('(')
        .ok_or_else(|| malformed(format!("line without value: '{line}'")))?;
    let (reference, rest) = line.split_at(open);
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| malformed(format!("unbalanced value groups: '{line}'")))?;

    let groups: Vec<&str> = inner.split(")(").collect();
    if groups.iter().any(|g| g.contains(['(', ')'])) {
        return Err(malformed(format!("unbalanced value groups: '{line}'")));
    }
    Ok((reference, groups))
}

struct ObisCode<'a> {
    medium: u8,
    channel: u8,
    cde: &'a str,
}

impl<'a> ObisCode<'a> {
    fn parse(reference: &'a str) -> Result<Self, MeterError> {
        let invalid = || malformed(format!("invalid OBIS reference '{reference}'"));

        let (medium, rest) = reference.split_once('-').ok_or_else(invalid)?;
        let (channel, cde) = rest.split_once(':').ok_or_else(invalid)?;
        let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if cde.split('.').count() != 3 || !cde.split('.').all(numeric) {
            return Err(invalid());
        }

        Ok(Self {
            medium: medium.parse().map_err(|_| invalid())?,
            channel: channel.parse().map_err(|_| invalid())?,
            cde,
        })
    }

    fn mbus_channel(&self) -> Option<u8> {
        let mbus_object = matches!(
            self.cde,
            MBUS_DEVICE_TYPE | MBUS_EQUIPMENT_IDENTIFIER | MBUS_METER_READING
        );
        (self.medium == 0 && self.channel > 0 && mbus_object).then_some(self.channel)
    }
}

fn device_for(devices: &mut Vec<MbusDevice>, channel: u8) -> &mut MbusDevice {
    let index = match devices.iter().position(|d| d.channel == channel) {
        Some(index) => index,
        None => {
            devices.push(MbusDevice {
                channel,
                ..MbusDevice::default()
            });
            devices.len() - 1
        }
    };
    &mut devices[index]
}

fn decode_value(cde: &str, raw: &str) -> Result<CosemObject, MeterError> {
    match raw.split_once('*') {
        Some((value, unit)) => Ok(CosemObject::number(value.parse()?, unit)),
        None if NUMERIC_WITHOUT_UNIT.contains(&cde) => Ok(CosemObject {
            value: CosemValue::Number(raw.parse()?),
            unit: None,
        }),
        None => Ok(CosemObject::text(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{Field, GAS_DEVICE_TYPE};

    const FIXTURE: &str = include_str!("../../tests/fixtures/telegram_v5.txt");

    fn parsed() -> Telegram {
        TelegramParser::without_checksum().parse(FIXTURE).unwrap()
    }

    fn signed(body: &str) -> String {
        format!("{body}{:04X}\r\n", checksum(body.as_bytes()))
    }

    #[test]
    fn parses_header() {
        assert_eq!(parsed().header(), "ISk5\\2MT382-1000");
    }

    #[test]
    fn parses_equipment_identifier_as_text() {
        let telegram = parsed();
        let id = telegram.require(Field::EquipmentIdentifier).unwrap();
        assert_eq!(
            id.value,
            CosemValue::Text("4530303334303034363639353537343136".into())
        );
        assert_eq!(id.unit, None);
    }

    #[test]
    fn parses_tariffs_with_units() {
        let telegram = parsed();
        let t1 = telegram.require(Field::ElectricityUsedTariff1).unwrap();
        assert_eq!(t1.decimal().unwrap().to_string(), "1234.567");
        assert_eq!(t1.unit(), "kWh");
        let t2 = telegram.require(Field::ElectricityUsedTariff2).unwrap();
        assert_eq!(t2.decimal().unwrap().value(), 2345.678);
    }

    #[test]
    fn parses_current_usage_and_delivery() {
        let telegram = parsed();
        let usage = telegram.require(Field::CurrentElectricityUsage).unwrap();
        assert_eq!(usage.to_string(), "1.500kW");
        let delivery = telegram.require(Field::CurrentElectricityDelivery).unwrap();
        assert_eq!(delivery.to_string(), "0.000kW");
    }

    #[test]
    fn keeps_tariff_indicator_as_text() {
        let telegram = parsed();
        let tariff = telegram.require(Field::ElectricityActiveTariff).unwrap();
        assert_eq!(tariff.value, CosemValue::Text("0002".into()));
    }

    #[test]
    fn groups_mbus_device() {
        let telegram = parsed();
        assert_eq!(telegram.mbus_devices().len(), 1);
        let gas = &telegram.mbus_devices()[0];
        assert_eq!(gas.channel, 1);
        assert_eq!(gas.device_type_code(), Some(GAS_DEVICE_TYPE));
        assert_eq!(
            gas.equipment_identifier.as_ref().unwrap().to_string(),
            "4730303233353631323930333635383137"
        );
        let reading = gas.meter_reading.as_ref().unwrap();
        assert_eq!(reading.decimal().unwrap().to_string(), "1234.567");
        assert_eq!(reading.unit(), "m3");
        assert_eq!(gas.reading_timestamp.as_deref(), Some("170102161005W"));
    }

    #[test]
    fn mbus_objects_stay_out_of_main_objects() {
        let telegram = parsed();
        assert!(telegram.get("0-1:24.2.1").is_none());
        assert!(telegram.objects().all(|(code, _)| !code.starts_with("0-1:")));
    }

    #[test]
    fn skips_noise_before_header() {
        let raw = format!("garbage\r\n{FIXTURE}");
        assert_eq!(TelegramParser::without_checksum().parse(&raw).unwrap(), parsed());
    }

    #[test]
    fn accepts_valid_checksum() {
        let raw = signed("/ISK5\\2M550T-1012\r\n\r\n1-0:1.8.1(001234.567*kWh)\r\n!");
        let telegram = TelegramParser::new().parse(&raw).unwrap();
        assert_eq!(
            telegram.require(Field::ElectricityUsedTariff1).unwrap().to_string(),
            "1234.567kWh"
        );
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let raw = signed("/ISK5\\2M550T-1012\r\n\r\n1-0:1.8.1(001234.567*kWh)\r\n!")
            .replace("001234.567", "009999.999");
        let err = TelegramParser::new().parse(&raw).unwrap_err();
        assert!(matches!(err, MeterError::ChecksumMismatch { .. }));
    }

    #[test]
    fn placeholder_checksum_fails_verification() {
        let err = TelegramParser::new().parse(FIXTURE).unwrap_err();
        assert!(matches!(err, MeterError::MalformedTelegram(_)));
    }

    #[test]
    fn rejects_missing_frame() {
        let parser = TelegramParser::without_checksum();
        assert!(parser.parse("1-0:1.8.1(001234.567*kWh)\r\n!").is_err());
        assert!(parser.parse("/ISK5\r\n1-0:1.8.1(001234.567*kWh)\r\n").is_err());
    }

    #[test]
    fn rejects_garbage_lines() {
        let parser = TelegramParser::without_checksum();
        assert!(parser.parse("/ISK5\r\nnot an obis line\r\n!").is_err());
        assert!(parser.parse("/ISK5\r\n1-0:1.8.1(0012(34)\r\n!").is_err());
        assert!(parser.parse("/ISK5\r\n1-0:1.8(1.0*kWh)\r\n!").is_err());
        assert!(parser.parse("/ISK5\r\n1-0:1.8.1(abc*kWh)\r\n!").is_err());
    }

    #[test]
    fn empty_value_group_is_empty_text() {
        let telegram = TelegramParser::without_checksum()
            .parse("/ISK5\r\n0-0:96.13.0()\r\n!")
            .unwrap();
        assert_eq!(
            telegram.get("0-0:96.13.0").unwrap().value,
            CosemValue::Text(String::new())
        );
    }
}
