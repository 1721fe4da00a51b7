//! Re-wraps bare samples into `{value, unit, sn}` records.
use std::iter::{self, Once};

/// Placeholder used when no serial number or unit is configured.
pub const UNSET: &str = "None";

/// A bare sample tagged with its unit and serial number.
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord<T> {
    /// The sample as read.
    pub value: T,
    /// Configured unit.
    pub unit: String,
    /// Configured serial number.
    pub sn: String,
}

/// Transform-shaped processor: yields exactly one [`PassRecord`] per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassProcessor {
    sn: String,
    unit: String,
}

impl Default for PassProcessor {
    fn default() -> Self {
        Self::new(UNSET, UNSET)
    }
}

impl PassProcessor {
    /// Processor stamping records with `sn` and `unit`.
    pub fn new(sn: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            sn: sn.into(),
            unit: unit.into(),
        }
    }

    /// Configured serial number.
    pub fn sn(&self) -> &str {
        &self.sn
    }

    /// Configured unit.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Wraps `value`; the returned sequence has exactly one item.
    pub fn process<T>(&self, value: T) -> Once<PassRecord<T>> {
        iter::once(PassRecord {
            value,
            unit: self.unit.clone(),
            sn: self.sn.clone(),
        })
    }
}
