//! Crosswind claim extraction from free text.
//!
//! Only the first claim in the text is taken. A response that states two
//! different crosswind values is verified against the earlier one.

use crate::units::Knots;
use once_cell::sync::Lazy;
use regex::Regex;

/// "crosswind … 7.7 kt" or "7.7 kt crosswind", whichever starts first.
static CLAIM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)crosswind.*?(\d+(?:\.\d+)?)\s*(?:kts?|knots?)\b|(\d+(?:\.\d+)?)\s*(?:kts?|knots?)\s+crosswind",
    )
    .unwrap()
});

/// First crosswind value asserted in `text`, exact to the hundredth.
pub fn extract_claim(text: &str) -> Option<Knots> {
    CLAIM_PATTERN.captures_iter(text).find_map(|caps| {
        let value = caps.get(1).or_else(|| caps.get(2))?;
        Knots::parse_decimal(value.as_str())
    })
}
