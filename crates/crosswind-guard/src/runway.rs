//! Runway headings and favored-runway selection.

use crate::components::magnetic_components;
use crate::error::GuardError;
use crate::magnetic::{normalize_heading, true_to_magnetic, MagneticVariationTable};
use crate::units::Knots;
use crate::wind::{SpeedSource, WindObservation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Default crosswind limit used to annotate a selection.
pub const DEFAULT_MAX_CROSSWIND_KT: f64 = 10.0;

/// Infer a magnetic heading from a designator: leading number × 10, mod 360.
///
/// `"26"` → 260, `"17L"` → 170, `"36"` → 0. `None` when there is no number.
pub fn heading_from_designator(designator: &str) -> Option<f64> {
    let start = designator.find(|c: char| c.is_ascii_digit())?;
    let digits: String = designator[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let number: u32 = digits.parse().ok()?;
    let heading = number.checked_mul(10)? % 360;
    Some(f64::from(heading))
}

/// Runway heading as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunwayHeading {
    /// Magnetic degrees.
    Degrees(f64),
    /// Designator such as `"26"` or `"17L"`.
    Designator(String),
}

impl RunwayHeading {
    /// Magnetic heading in [0, 360), or `None` when it cannot be resolved.
    pub fn resolve(&self) -> Option<f64> {
        match self {
            Self::Degrees(d) if d.is_finite() => Some(normalize_heading(*d)),
            Self::Degrees(_) => None,
            Self::Designator(d) => heading_from_designator(d),
        }
    }
}

impl fmt::Display for RunwayHeading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degrees(d) => write!(f, "{}", d),
            Self::Designator(d) => write!(f, "{}", d),
        }
    }
}

impl From<f64> for RunwayHeading {
    fn from(value: f64) -> Self {
        Self::Degrees(value)
    }
}

impl From<&str> for RunwayHeading {
    fn from(value: &str) -> Self {
        Self::Designator(value.to_string())
    }
}

/// One runway offered for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayInput {
    pub designator: String,
    /// Explicit magnetic heading; wins over the designator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_magnetic_deg: Option<f64>,
}

impl RunwayInput {
    pub fn new(designator: impl Into<String>) -> Self {
        Self {
            designator: designator.into(),
            heading_magnetic_deg: None,
        }
    }

    pub fn with_heading(designator: impl Into<String>, heading_magnetic_deg: f64) -> Self {
        Self {
            designator: designator.into(),
            heading_magnetic_deg: Some(heading_magnetic_deg),
        }
    }

    pub fn resolve_heading(&self) -> Option<f64> {
        match self.heading_magnetic_deg {
            Some(h) if h.is_finite() => Some(normalize_heading(h)),
            Some(_) => None,
            None => heading_from_designator(&self.designator),
        }
    }
}

impl From<&str> for RunwayInput {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A runway with its computed components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayCandidate {
    pub designator: String,
    pub heading_magnetic_deg: f64,
    pub crosswind_kt: Knots,
    /// Positive = headwind, negative = tailwind.
    pub headwind_kt: Knots,
    pub angle_deg: f64,
}

/// Selection knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOptions {
    pub max_crosswind_kt: Knots,
    pub use_gust: bool,
    /// Overrides the station lookup when set.
    pub magnetic_variation_deg: Option<f64>,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            max_crosswind_kt: Knots::round(DEFAULT_MAX_CROSSWIND_KT),
            use_gust: false,
            magnetic_variation_deg: None,
        }
    }
}

/// Wind values a selection was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindUsed {
    pub wind_direction_true_deg: f64,
    pub wind_direction_magnetic_deg: f64,
    pub wind_speed_kt: Knots,
    pub variation_deg: Option<f64>,
    pub speed_source: SpeedSource,
}

/// Result of ranking runways against the wind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwaySelection {
    pub best: RunwayCandidate,
    /// All resolvable runways, best first.
    pub candidates: Vec<RunwayCandidate>,
    /// Annotation only; the best runway is still returned.
    pub exceeds_limit: bool,
    pub max_crosswind_kt: Knots,
    pub used: WindUsed,
}

impl RunwaySelection {
    /// `"Runway 26 favored, 6.8 kt headwind, 7.4 kt crosswind"`.
    pub fn phrase(&self) -> String {
        let headwind = self.best.headwind_kt;
        let kind = if headwind.is_negative() {
            "tailwind"
        } else {
            "headwind"
        };
        let mut phrase = format!(
            "Runway {} favored, {} kt {}, {} kt crosswind",
            self.best.designator,
            headwind.abs().to_tenths_string(),
            kind,
            self.best.crosswind_kt.to_tenths_string()
        );
        if self.exceeds_limit {
            phrase.push_str(&format!(
                " (exceeds {} kt limit)",
                self.max_crosswind_kt.to_tenths_string()
            ));
        }
        phrase
    }
}

/// Rank runways by lowest crosswind, ties broken by strongest headwind.
///
/// Runways whose heading cannot be resolved are skipped. Variable wind and an
/// empty resolvable set are errors rather than guesses.
pub fn select_best_runway(
    wind: &WindObservation,
    runways: &[RunwayInput],
    variations: &MagneticVariationTable,
    options: &SelectionOptions,
) -> Result<RunwaySelection, GuardError> {
    let direction_true = wind.direction_true_deg().ok_or(GuardError::VariableWind)?;
    let (speed, speed_source) = wind.speed_for(options.use_gust);
    let variation = options
        .magnetic_variation_deg
        .or_else(|| variations.lookup(wind.station()));

    let mut candidates: Vec<RunwayCandidate> = Vec::with_capacity(runways.len());
    for runway in runways {
        let Some(heading) = runway.resolve_heading() else {
            debug!(designator = %runway.designator, "skipping runway with unresolvable heading");
            continue;
        };
        let components = magnetic_components(direction_true, speed, heading, variation);
        let designator = if runway.designator.trim().is_empty() {
            format!("HDG {}", heading)
        } else {
            runway.designator.clone()
        };
        candidates.push(RunwayCandidate {
            designator,
            heading_magnetic_deg: heading,
            crosswind_kt: components.crosswind_kt,
            headwind_kt: components.headwind_kt,
            angle_deg: components.angle_deg,
        });
    }

    candidates.sort_by(|a, b| {
        a.crosswind_kt
            .abs()
            .cmp(&b.crosswind_kt.abs())
            .then_with(|| b.headwind_kt.cmp(&a.headwind_kt))
    });

    let best = candidates.first().cloned().ok_or(GuardError::NoResolvableRunway)?;
    let exceeds_limit = best.crosswind_kt.abs() > options.max_crosswind_kt;

    Ok(RunwaySelection {
        best,
        candidates,
        exceeds_limit,
        max_crosswind_kt: options.max_crosswind_kt,
        used: WindUsed {
            wind_direction_true_deg: direction_true,
            wind_direction_magnetic_deg: true_to_magnetic(direction_true, variation),
            wind_speed_kt: speed,
            variation_deg: variation,
            speed_source,
        },
    })
}
