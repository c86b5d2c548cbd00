//! Magnetic variation: true/magnetic conversion and the per-station table.
//!
//! Convention: variation east is positive, west is negative, and
//! `magnetic = true - variation`.

use crate::error::GuardError;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tracing::warn;

const BUILTIN_TABLE: &str = include_str!("../data/magnetic_variation.toml");

static BUILTIN: Lazy<BTreeMap<String, f64>> = Lazy::new(|| match parse_table(BUILTIN_TABLE) {
    Ok(table) => table,
    Err(e) => {
        warn!(error = %e, "built-in magnetic variation table unreadable, using empty table");
        BTreeMap::new()
    }
});

/// Normalize a heading into [0, 360).
pub fn normalize_heading(heading: f64) -> f64 {
    let h = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// True → magnetic. Absent variation only normalizes.
pub fn true_to_magnetic(true_heading: f64, variation_deg: Option<f64>) -> f64 {
    match variation_deg {
        Some(v) => normalize_heading(true_heading - v),
        None => normalize_heading(true_heading),
    }
}

/// Magnetic → true. Absent variation only normalizes.
pub fn magnetic_to_true(magnetic_heading: f64, variation_deg: Option<f64>) -> f64 {
    match variation_deg {
        Some(v) => normalize_heading(magnetic_heading + v),
        None => normalize_heading(magnetic_heading),
    }
}

fn parse_table(text: &str) -> Result<BTreeMap<String, f64>, GuardError> {
    let raw: BTreeMap<String, f64> = toml::from_str(text)
        .map_err(|e| GuardError::Config(format!("magnetic variation table: {}", e)))?;
    let mut table = BTreeMap::new();
    for (station, value) in raw {
        validate_variation(&station, value)?;
        table.insert(station.trim().to_uppercase(), value);
    }
    Ok(table)
}

pub(crate) fn validate_variation(station: &str, value: f64) -> Result<(), GuardError> {
    if !value.is_finite() || value.abs() > 180.0 {
        return Err(GuardError::Config(format!(
            "magnetic variation for {} must be within [-180, 180], got {}",
            station, value
        )));
    }
    Ok(())
}

/// Read-only station → declination lookup.
///
/// Missing stations are not an error; they mean "no correction".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagneticVariationTable {
    entries: BTreeMap<String, f64>,
}

impl MagneticVariationTable {
    /// Empty table: every lookup yields no correction.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.clone(),
        }
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_uppercase(), v))
                .collect(),
        }
    }

    /// Parse a TOML `STATION = degrees` document.
    pub fn from_toml(text: &str) -> Result<Self, GuardError> {
        Ok(Self {
            entries: parse_table(text)?,
        })
    }

    /// Merge entries over this table; the overrides win.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, f64>) -> Self {
        for (station, value) in overrides {
            self.entries.insert(station.trim().to_uppercase(), *value);
        }
        self
    }

    pub fn lookup(&self, station: &str) -> Option<f64> {
        let key = station.trim();
        if key.is_empty() {
            return None;
        }
        self.entries.get(&key.to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
