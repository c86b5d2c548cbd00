//! Wind observations as handed over by the weather collaborator.

use crate::error::GuardError;
use crate::magnetic::normalize_heading;
use crate::units::Knots;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator of the encoded `"DDD @ SS"` wind form.
pub const WIND_SEPARATOR: &str = " @ ";

/// Direction token used for variable wind.
pub const VARIABLE_TOKEN: &str = "VRB";

const MAX_PLAUSIBLE_SPEED_KT: f64 = 500.0;

/// Which speed fed a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedSource {
    Sustained,
    Gust,
}

impl fmt::Display for SpeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sustained => "sustained",
            Self::Gust => "gust",
        };
        write!(f, "{}", s)
    }
}

/// One wind report. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindObservation {
    station: String,
    direction_true_deg: Option<f64>,
    speed_kt: Knots,
    gust_kt: Option<Knots>,
    raw_text: String,
    observed_at: Option<DateTime<Utc>>,
}

impl WindObservation {
    /// Build a validated observation. `direction_true_deg = None` is variable wind.
    pub fn new(
        station: impl Into<String>,
        direction_true_deg: Option<f64>,
        speed_kt: f64,
        gust_kt: Option<f64>,
    ) -> Result<Self, GuardError> {
        let direction = match direction_true_deg {
            Some(d) if !d.is_finite() || !(0.0..=360.0).contains(&d) => {
                return Err(GuardError::InvalidWind(format!(
                    "direction {} outside 0-360",
                    d
                )));
            }
            Some(d) => Some(normalize_heading(d)),
            None => None,
        };

        let speed = validate_speed("speed", speed_kt)?;
        let gust = match gust_kt {
            Some(g) => {
                let gust = validate_speed("gust", g)?;
                if gust < speed {
                    return Err(GuardError::InvalidWind(format!(
                        "gust {} kt below sustained speed {} kt",
                        gust, speed
                    )));
                }
                Some(gust)
            }
            None => None,
        };

        let mut observation = Self {
            station: station.into().trim().to_uppercase(),
            direction_true_deg: direction,
            speed_kt: speed,
            gust_kt: gust,
            raw_text: String::new(),
            observed_at: None,
        };
        observation.raw_text = observation.wind_string();
        Ok(observation)
    }

    /// Build from the encoded `"DDD @ SS"` form (`"VRB @ SS"` for variable wind).
    pub fn from_encoded(
        station: impl Into<String>,
        encoded: &str,
        gust_kt: Option<f64>,
    ) -> Result<Self, GuardError> {
        let (direction, speed) = parse_wind_pair(encoded)
            .ok_or_else(|| GuardError::InvalidWind(format!("cannot parse '{}'", encoded)))?;
        Self::new(station, direction, speed, gust_kt)
    }

    /// Attach the original report fragment.
    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = raw_text.into();
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn direction_true_deg(&self) -> Option<f64> {
        self.direction_true_deg
    }

    pub fn speed_kt(&self) -> Knots {
        self.speed_kt
    }

    pub fn gust_kt(&self) -> Option<Knots> {
        self.gust_kt
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }

    pub fn is_variable(&self) -> bool {
        self.direction_true_deg.is_none()
    }

    /// Gust speed only when requested and reported, otherwise sustained.
    pub fn speed_for(&self, use_gust: bool) -> (Knots, SpeedSource) {
        match (use_gust, self.gust_kt) {
            (true, Some(gust)) => (gust, SpeedSource::Gust),
            _ => (self.speed_kt, SpeedSource::Sustained),
        }
    }

    /// Re-encode as `"220 @ 10"` / `"VRB @ 3"`.
    pub fn wind_string(&self) -> String {
        let direction = match self.direction_true_deg {
            Some(d) => format_number(d),
            None => VARIABLE_TOKEN.to_string(),
        };
        format!(
            "{}{}{}",
            direction,
            WIND_SEPARATOR,
            format_number(self.speed_kt.as_f64())
        )
    }
}

fn validate_speed(label: &str, value: f64) -> Result<Knots, GuardError> {
    if !value.is_finite() || value < 0.0 || value > MAX_PLAUSIBLE_SPEED_KT {
        return Err(GuardError::InvalidWind(format!(
            "{} {} kt outside 0-{}",
            label, value, MAX_PLAUSIBLE_SPEED_KT
        )));
    }
    Knots::from_f64(value).ok_or_else(|| GuardError::InvalidWind(format!("{} {}", label, value)))
}

/// `220.0` → `"220"`, `12.5` → `"12.5"`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Split `"DDD @ SS"` into direction and speed.
///
/// `"VRB @ SS"` gives an absent direction. Returns `None` when the text does not
/// have exactly the two numeric parts.
pub fn parse_wind_pair(text: &str) -> Option<(Option<f64>, f64)> {
    let (direction, speed) = text.trim().split_once(WIND_SEPARATOR)?;
    let speed: f64 = speed.trim().parse().ok()?;
    if !speed.is_finite() {
        return None;
    }

    let direction = direction.trim();
    if direction.eq_ignore_ascii_case(VARIABLE_TOKEN) {
        return Some((None, speed));
    }
    let direction: f64 = direction.parse().ok()?;
    if !direction.is_finite() {
        return None;
    }
    Some((Some(direction), speed))
}
