//! End-to-end runs of telegram meters writing CSV files.
#![cfg(feature = "storage_csv")]

use meteread::config::{MeterSettings, ProcessorSettings, ReaderSettings, Settings, StorageSettings};
use meteread::core::Storage;
use meteread::meter::{ConfiguredMeter, Meter, MeterRegistry};
use meteread::processor::{ChainProcessor, ElectricityProcessor, GasProcessor};
use meteread::reader::RawTelegramReader;
use meteread::storage::CsvStorage;
use meteread::telegram::Telegram;
use meteread::{Processor, Signal};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/telegram_v5.txt");

fn raw_reader() -> RawTelegramReader {
    RawTelegramReader::new(FIXTURE).unwrap()
}

fn telegram() -> Telegram {
    raw_reader().telegram().clone()
}

/// Rows as (column, value) pairs keyed by the header line.
fn rows(path: &Path) -> Vec<Vec<(String, String)>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            header
                .iter()
                .cloned()
                .zip(record.iter().map(String::from))
                .collect()
        })
        .collect()
}

fn column<'a>(row: &'a [(String, String)], name: &str) -> &'a str {
    row.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .unwrap()
}

fn csv_storage(path: &Path) -> Arc<dyn Storage> {
    Arc::new(CsvStorage::new(path))
}

#[test]
fn electricity_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.csv");
    ElectricityProcessor::with_storage(csv_storage(&path))
        .process(&telegram())
        .unwrap();

    let rows = rows(&path);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(column(row, "measurement"), "electricity");
    assert_eq!(column(row, "sn"), "4530303334303034363639353537343136");
    assert_eq!(column(row, "t1"), "1234.567");
    assert_eq!(column(row, "t2"), "2345.678");
    assert_eq!(column(row, "current"), "1.500");
    assert_eq!(column(row, "returned"), "0.000");
}

#[test]
fn gas_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.csv");
    GasProcessor::with_storage(csv_storage(&path))
        .process(&telegram())
        .unwrap();

    let rows = rows(&path);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(column(row, "measurement"), "gas");
    assert_eq!(column(row, "sn"), "4730303233353631323930333635383137");
    assert_eq!(column(row, "reading"), "1234.567");
}

#[test]
fn water_only_telegram_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.csv");
    let water = FIXTURE.replace("0-1:24.1.0(003)", "0-1:24.1.0(007)");
    let telegram = RawTelegramReader::new(&water).unwrap().telegram().clone();

    let signal = GasProcessor::with_storage(csv_storage(&path))
        .process(&telegram)
        .unwrap();
    assert_eq!(signal, Signal::Stop);
    assert!(!path.exists());
}

#[test]
fn meter_writes_one_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.csv");
    let mut meter = Meter::new(
        "test",
        raw_reader(),
        ElectricityProcessor::with_storage(csv_storage(&path)),
    );
    meter.run().unwrap();

    let rows = rows(&path);
    assert_eq!(rows.len(), 1);
    assert_eq!(column(&rows[0], "measurement"), "electricity");
}

#[test]
fn repeated_runs_append_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.csv");
    let mut meter = Meter::new(
        "test",
        raw_reader(),
        ElectricityProcessor::with_storage(csv_storage(&path)),
    );
    meter.run().unwrap();
    meter.run().unwrap();

    assert_eq!(rows(&path).len(), 2);
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("timestamp,")).count(), 1);
}

#[test]
fn chain_writes_electricity_and_gas() {
    let dir = TempDir::new().unwrap();
    let electricity = dir.path().join("electricity.csv");
    let gas = dir.path().join("gas.csv");
    let chain = ChainProcessor::<Telegram>::default()
        .push(ElectricityProcessor::with_storage(csv_storage(&electricity)))
        .push(GasProcessor::with_storage(csv_storage(&gas)));

    Meter::new("test", raw_reader(), chain).run().unwrap();

    assert_eq!(column(&rows(&electricity)[0], "measurement"), "electricity");
    assert_eq!(column(&rows(&gas)[0], "measurement"), "gas");
}

#[test]
fn shared_storage_receives_both_measurements() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("all.csv");
    let storage = csv_storage(&path);
    let chain = ChainProcessor::<Telegram>::default()
        .push(ElectricityProcessor::with_storage(storage.clone()))
        .push(GasProcessor::with_storage(storage));

    Meter::new("test", raw_reader(), chain).run().unwrap();

    // The header comes from the electricity write; the gas row keeps its own
    // (shorter) column order.
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with(",measurement,sn,t1,t2,current,returned"));
    assert!(lines[2].ends_with(",gas,4730303233353631323930333635383137,1234.567"));
}

#[test]
fn configured_meter_creates_storage_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("data").join("electricity.csv");
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/telegram_v5.txt");

    let mut settings = Settings::default();
    settings.storages.insert(
        "readings".to_string(),
        StorageSettings::Csv {
            path: nested.clone(),
        },
    );
    settings.meters.insert(
        "p1".to_string(),
        MeterSettings {
            reader: ReaderSettings::Raw { path: fixture },
            processors: vec![
                ProcessorSettings::Electricity {
                    storage: Some("readings".to_string()),
                },
                ProcessorSettings::Gas {
                    storage: Some("readings".to_string()),
                },
            ],
        },
    );

    let mut meter = MeterRegistry::new(settings).unwrap().build("p1").unwrap();
    assert!(matches!(meter, ConfiguredMeter::Telegram(_)));
    meter.run().unwrap();
    let text = std::fs::read_to_string(&nested).unwrap();
    assert_eq!(text.lines().count(), 3);
}
