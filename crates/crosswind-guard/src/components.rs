//! Crosswind/headwind decomposition.
//!
//! Pure functions; every output goes through [`Knots`] rounding so callers
//! compare like with like.

use crate::magnetic::{normalize_heading, true_to_magnetic};
use crate::units::Knots;
use serde::{Deserialize, Serialize};

/// Wind split against a runway centerline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindComponents {
    /// Magnitude only, never negative.
    pub crosswind_kt: Knots,
    /// Positive = headwind, negative = tailwind.
    pub headwind_kt: Knots,
    /// Folded angle in [0, 180], one decimal.
    pub angle_deg: f64,
}

/// Unrounded angle between wind and runway, folded into [0, 180].
pub fn wind_angle(direction_deg: f64, runway_heading_deg: f64) -> f64 {
    let diff = (normalize_heading(direction_deg) - normalize_heading(runway_heading_deg)).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// `speed × sin(angle)` and `speed × cos(angle)` for a wind blowing from
/// `direction_deg` onto a runway heading `runway_heading_deg` (same frame).
pub fn crosswind_components(
    speed_kt: Knots,
    direction_deg: f64,
    runway_heading_deg: f64,
) -> WindComponents {
    let angle = wind_angle(direction_deg, runway_heading_deg);
    let (sin, cos) = angle.to_radians().sin_cos();
    let speed = speed_kt.as_f64();

    WindComponents {
        crosswind_kt: Knots::round(speed * sin).abs(),
        headwind_kt: Knots::round(speed * cos),
        angle_deg: round_tenth(angle),
    }
}

/// Convert a true wind direction to magnetic, then decompose against a
/// magnetic runway heading.
pub fn magnetic_components(
    wind_direction_true_deg: f64,
    speed_kt: Knots,
    runway_heading_mag_deg: f64,
    variation_deg: Option<f64>,
) -> WindComponents {
    let wind_mag = true_to_magnetic(wind_direction_true_deg, variation_deg);
    crosswind_components(speed_kt, wind_mag, runway_heading_mag_deg)
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
