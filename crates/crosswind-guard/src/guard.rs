//! Crosswind guardrail: checks a claimed crosswind against the computed one.
//!
//! # Verdict rules
//!
//! - **No claim**: always passes, nothing to contest
//! - **Data unresolvable** (variable wind, bad wind text, unknown runway):
//!   fails, but is not eligible for reflection; the data must be refetched
//! - **Numeric**: passes when `|claim - truth| <= tolerance` (inclusive)
//!
//! All comparisons use [`Knots`], so a discrepancy of exactly the tolerance
//! passes and one hundredth more fails.

use crate::audit::{emit_or_report, AuditSink};
use crate::claims::extract_claim;
use crate::components::{magnetic_components, WindComponents};
use crate::error::GuardError;
use crate::magnetic::{true_to_magnetic, MagneticVariationTable};
use crate::runway::RunwayHeading;
use crate::trace::{TraceCategory, TraceRecord, TraceRecorder};
use crate::units::Knots;
use crate::wind::{SpeedSource, WindObservation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default tolerance: the 3-knot rule.
pub const DEFAULT_TOLERANCE_KT: f64 = 3.0;

const RECOMMEND_NONE: &str = "No verification needed";
const RECOMMEND_SEND: &str = "Verification passed - safe to send to user";
const RECOMMEND_REFLECT: &str =
    "TRIGGER REFLECTION: Re-read wind data and runway heading, recalculate crosswind component";
const RECOMMEND_REFETCH: &str = "Re-fetch weather data";

/// Per-call knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyOptions {
    /// Use the gust speed when the observation has one.
    pub use_gust: bool,
    /// Overrides the station lookup when set.
    pub magnetic_variation_deg: Option<f64>,
}

/// Classification of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    NoClaim,
    Verified,
    NumericMismatch,
    DataUnresolvable,
}

impl VerdictKind {
    /// Only a numeric mismatch against a valid truth may be reflected on.
    pub fn is_reflection_eligible(&self) -> bool {
        matches!(self, Self::NumericMismatch)
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoClaim => "no_claim",
            Self::Verified => "verified",
            Self::NumericMismatch => "numeric_mismatch",
            Self::DataUnresolvable => "data_unresolvable",
        };
        write!(f, "{}", s)
    }
}

/// Everything the engine derived for one wind/runway pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosswindSolution {
    pub wind_direction_true_deg: f64,
    pub wind_direction_magnetic_deg: f64,
    pub variation_deg: Option<f64>,
    pub runway_heading_deg: f64,
    pub speed_used_kt: Knots,
    pub speed_source: SpeedSource,
    pub components: WindComponents,
}

impl CrosswindSolution {
    pub fn crosswind_kt(&self) -> Knots {
        self.components.crosswind_kt
    }

    pub fn angle_deg(&self) -> f64 {
        self.components.angle_deg
    }

    /// `"10.00 × sin(47.5°)"`.
    pub fn formula(&self) -> String {
        format!("{} × sin({}°)", self.speed_used_kt, self.components.angle_deg)
    }
}

/// Outcome of one verification. Never mutated: a corrected answer gets a
/// fresh verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    passed: bool,
    kind: VerdictKind,
    agent_claim_kt: Option<Knots>,
    mathematical_truth_kt: Option<Knots>,
    discrepancy_kt: Option<Knots>,
    tolerance_kt: Knots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issue: Option<String>,
    recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    solution: Option<CrosswindSolution>,
}

impl VerificationVerdict {
    fn no_claim(tolerance: Knots) -> Self {
        Self {
            passed: true,
            kind: VerdictKind::NoClaim,
            agent_claim_kt: None,
            mathematical_truth_kt: None,
            discrepancy_kt: None,
            tolerance_kt: tolerance,
            issue: Some("No crosswind claim detected in response".to_string()),
            recommendation: RECOMMEND_NONE.to_string(),
            error_code: None,
            solution: None,
        }
    }

    fn data_unresolvable(claim: Knots, tolerance: Knots, issue: String, error: &GuardError) -> Self {
        Self {
            passed: false,
            kind: VerdictKind::DataUnresolvable,
            agent_claim_kt: Some(claim),
            mathematical_truth_kt: None,
            discrepancy_kt: None,
            tolerance_kt: tolerance,
            issue: Some(issue),
            recommendation: RECOMMEND_REFETCH.to_string(),
            error_code: Some(error.code().to_string()),
            solution: None,
        }
    }

    fn compared(claim: Knots, tolerance: Knots, solution: CrosswindSolution) -> Self {
        let truth = solution.crosswind_kt();
        let discrepancy = claim.abs_diff(truth);
        let passed = discrepancy <= tolerance;

        let (kind, issue, recommendation) = if passed {
            (VerdictKind::Verified, None, RECOMMEND_SEND)
        } else {
            let issue = format!(
                "Crosswind discrepancy: claimed {} kt, but math shows {} kt (difference: {} kt > tolerance: {} kt)",
                claim, truth, discrepancy, tolerance
            );
            (VerdictKind::NumericMismatch, Some(issue), RECOMMEND_REFLECT)
        };

        Self {
            passed,
            kind,
            agent_claim_kt: Some(claim),
            mathematical_truth_kt: Some(truth),
            discrepancy_kt: Some(discrepancy),
            tolerance_kt: tolerance,
            issue,
            recommendation: recommendation.to_string(),
            error_code: None,
            solution: Some(solution),
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn kind(&self) -> VerdictKind {
        self.kind
    }

    pub fn agent_claim_kt(&self) -> Option<Knots> {
        self.agent_claim_kt
    }

    pub fn mathematical_truth_kt(&self) -> Option<Knots> {
        self.mathematical_truth_kt
    }

    pub fn discrepancy_kt(&self) -> Option<Knots> {
        self.discrepancy_kt
    }

    pub fn tolerance_kt(&self) -> Knots {
        self.tolerance_kt
    }

    /// Reason for failure or non-applicability.
    pub fn issue(&self) -> Option<&str> {
        self.issue.as_deref()
    }

    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }

    /// [`GuardError::code`] of the data problem, for data-unresolvable verdicts.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// The engine's computation, present whenever a truth value exists.
    pub fn solution(&self) -> Option<&CrosswindSolution> {
        self.solution.as_ref()
    }

    pub fn is_reflection_eligible(&self) -> bool {
        !self.passed && self.kind.is_reflection_eligible()
    }
}

/// Resolved wind as used by a detailed verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindBreakdown {
    pub raw: String,
    pub raw_report: String,
    pub direction_true_deg: Option<f64>,
    pub direction_magnetic_deg: Option<f64>,
    pub speed_kt: Knots,
    pub gust_kt: Option<Knots>,
    pub speed_used_kt: Knots,
    pub speed_source: SpeedSource,
    pub variation_deg: Option<f64>,
}

/// Step-by-step math behind a truth value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationDetails {
    pub wind_direction_true_deg: f64,
    pub wind_direction_magnetic_deg: f64,
    pub runway_heading_deg: f64,
    pub angle_deg: f64,
    pub formula: String,
    pub result: String,
    pub observed_at: Option<DateTime<Utc>>,
    pub magnetic_variation_deg: Option<f64>,
    pub speed_source: SpeedSource,
}

impl CalculationDetails {
    fn from_solution(solution: &CrosswindSolution, observed_at: Option<DateTime<Utc>>) -> Self {
        let sin = solution.angle_deg().to_radians().sin();
        Self {
            wind_direction_true_deg: solution.wind_direction_true_deg,
            wind_direction_magnetic_deg: solution.wind_direction_magnetic_deg,
            runway_heading_deg: solution.runway_heading_deg,
            angle_deg: solution.angle_deg(),
            formula: solution.formula(),
            result: format!(
                "{} × {:.4} = {} kt",
                solution.speed_used_kt,
                sin,
                solution.crosswind_kt()
            ),
            observed_at,
            magnetic_variation_deg: solution.variation_deg,
            speed_source: solution.speed_source,
        }
    }
}

/// Verdict plus breakdown, explanation and the audited trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedVerification {
    pub verdict: VerificationVerdict,
    pub wind: WindBreakdown,
    pub calculation: Option<CalculationDetails>,
    pub explanation: String,
    pub trace: TraceRecord,
    /// Set when the trace was not written, including when no sink is
    /// configured. The verdict stands regardless.
    pub audit_error: Option<String>,
}

/// Stateless verifier configured with a tolerance, a variation table and an
/// optional audit sink. Cheap to clone and share across threads.
#[derive(Clone)]
pub struct Guardrail {
    tolerance: Knots,
    variations: Arc<MagneticVariationTable>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Default for Guardrail {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Guardrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardrail")
            .field("tolerance", &self.tolerance)
            .field("variations", &self.variations.len())
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

impl Guardrail {
    /// 3-knot tolerance, built-in variation table, no audit sink. Without a
    /// sink, detailed verification reports every record as unaudited.
    pub fn new() -> Self {
        Self {
            tolerance: Knots::round(DEFAULT_TOLERANCE_KT),
            variations: Arc::new(MagneticVariationTable::builtin()),
            audit: None,
        }
    }

    /// Rejects a negative tolerance.
    pub fn with_tolerance(mut self, tolerance: Knots) -> Result<Self, GuardError> {
        if tolerance.is_negative() {
            return Err(GuardError::Config(format!(
                "tolerance must be non-negative, got {} kt",
                tolerance
            )));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    pub fn with_variations(mut self, variations: MagneticVariationTable) -> Self {
        self.variations = Arc::new(variations);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn tolerance(&self) -> Knots {
        self.tolerance
    }

    pub fn variations(&self) -> &MagneticVariationTable {
        &self.variations
    }

    pub fn audit_sink(&self) -> Option<&Arc<dyn AuditSink>> {
        self.audit.as_ref()
    }

    /// Variation to apply: explicit override, else station lookup, else none.
    pub fn resolve_variation(&self, station: &str, options: &VerifyOptions) -> Option<f64> {
        options
            .magnetic_variation_deg
            .or_else(|| self.variations.lookup(station))
    }

    /// Compute the true crosswind for a wind/runway pair.
    pub fn solve(
        &self,
        wind: &WindObservation,
        runway: &RunwayHeading,
        options: &VerifyOptions,
    ) -> Result<CrosswindSolution, GuardError> {
        let direction_true = wind.direction_true_deg().ok_or(GuardError::VariableWind)?;
        let runway_heading = runway
            .resolve()
            .ok_or_else(|| GuardError::UnresolvableRunway(runway.to_string()))?;
        let variation = self.resolve_variation(wind.station(), options);
        let (speed, speed_source) = wind.speed_for(options.use_gust);

        Ok(CrosswindSolution {
            wind_direction_true_deg: direction_true,
            wind_direction_magnetic_deg: true_to_magnetic(direction_true, variation),
            variation_deg: variation,
            runway_heading_deg: runway_heading,
            speed_used_kt: speed,
            speed_source,
            components: magnetic_components(direction_true, speed, runway_heading, variation),
        })
    }

    /// Verify the crosswind claimed in `response` against `wind` and `runway`.
    pub fn verify(
        &self,
        response: &str,
        wind: &WindObservation,
        runway: &RunwayHeading,
        options: &VerifyOptions,
    ) -> VerificationVerdict {
        let Some(claim) = extract_claim(response) else {
            debug!("no crosswind claim in response");
            return VerificationVerdict::no_claim(self.tolerance);
        };

        let verdict = match self.solve(wind, runway, options) {
            Ok(solution) => VerificationVerdict::compared(claim, self.tolerance, solution),
            Err(e) => {
                let issue = data_issue(&e, &wind.wind_string());
                VerificationVerdict::data_unresolvable(claim, self.tolerance, issue, &e)
            }
        };
        log_verdict(&verdict);
        verdict
    }

    /// Same as [`Guardrail::verify`] for the encoded `"DDD @ SS"` wind form.
    /// Text that does not parse into a valid observation is a data failure.
    pub fn verify_encoded(
        &self,
        response: &str,
        station: &str,
        encoded_wind: &str,
        gust_kt: Option<f64>,
        runway: &RunwayHeading,
        options: &VerifyOptions,
    ) -> VerificationVerdict {
        match WindObservation::from_encoded(station, encoded_wind, gust_kt) {
            Ok(wind) => self.verify(response, &wind, runway, options),
            Err(e) => match extract_claim(response) {
                None => VerificationVerdict::no_claim(self.tolerance),
                Some(claim) => {
                    let issue = format!("Could not parse wind data: {}", encoded_wind);
                    let verdict =
                        VerificationVerdict::data_unresolvable(claim, self.tolerance, issue, &e);
                    log_verdict(&verdict);
                    verdict
                }
            },
        }
    }

    /// Verify, then build the breakdown and write an audit record. The record
    /// is written on pass and on fail; a write failure is reported in
    /// `audit_error` and never changes the verdict.
    pub fn verify_detailed(
        &self,
        response: &str,
        wind: &WindObservation,
        runway: &RunwayHeading,
        options: &VerifyOptions,
    ) -> DetailedVerification {
        let mut tracer = TraceRecorder::new(TraceCategory::Crosswind);
        tracer.set_context("airport", wind.station());
        tracer.set_context("runway_heading", runway);

        let verdict = self.verify(response, wind, runway, options);

        tracer.log_input(Some(wind.raw_text()), Some(&wind.wind_string()));
        tracer.log_transformation(wind.direction_true_deg(), Some(wind.speed_kt()));

        let variation = self.resolve_variation(wind.station(), options);
        let (speed_used, speed_source) = wind.speed_for(options.use_gust);
        let breakdown = WindBreakdown {
            raw: wind.wind_string(),
            raw_report: wind.raw_text().to_string(),
            direction_true_deg: wind.direction_true_deg(),
            direction_magnetic_deg: wind
                .direction_true_deg()
                .map(|d| true_to_magnetic(d, variation)),
            speed_kt: wind.speed_kt(),
            gust_kt: wind.gust_kt(),
            speed_used_kt: speed_used,
            speed_source,
            variation_deg: variation,
        };

        // A no-claim verdict carries no solution but the math is still traced.
        let solution = match verdict.solution() {
            Some(solution) => Some(solution.clone()),
            None => self.solve(wind, runway, options).ok(),
        };
        let calculation = solution.as_ref().map(|s| {
            tracer.log_operation("sin", Some(s.angle_deg()), Some(s.formula()));
            tracer.log_result(Some(s.components.crosswind_kt), Some(s.components.headwind_kt));
            CalculationDetails::from_solution(s, wind.observed_at())
        });

        let explanation = explain(&verdict);
        let trace = tracer.finish();
        let audit_error = self.emit(&trace);

        DetailedVerification {
            verdict,
            wind: breakdown,
            calculation,
            explanation,
            trace,
            audit_error,
        }
    }

    /// Write `record` to the sink. A failed write or a missing sink is
    /// logged and returned as text; it never propagates.
    pub(crate) fn emit(&self, record: &TraceRecord) -> Option<String> {
        emit_or_report(self.audit.as_deref(), record)
    }
}

fn data_issue(error: &GuardError, wind_text: &str) -> String {
    match error {
        GuardError::UnresolvableRunway(designator) => {
            format!("Could not resolve runway heading: {}", designator)
        }
        _ => format!("Could not parse wind data: {}", wind_text),
    }
}

fn log_verdict(verdict: &VerificationVerdict) {
    match verdict.kind() {
        VerdictKind::Verified => info!(
            claim = ?verdict.agent_claim_kt(),
            truth = ?verdict.mathematical_truth_kt(),
            "crosswind claim verified"
        ),
        VerdictKind::NumericMismatch => warn!(
            claim = ?verdict.agent_claim_kt(),
            truth = ?verdict.mathematical_truth_kt(),
            discrepancy = ?verdict.discrepancy_kt(),
            "crosswind claim failed verification"
        ),
        VerdictKind::DataUnresolvable => warn!(
            code = verdict.error_code().unwrap_or("unknown"),
            issue = verdict.issue().unwrap_or(""),
            "crosswind data unresolvable"
        ),
        VerdictKind::NoClaim => {}
    }
}

fn explain(verdict: &VerificationVerdict) -> String {
    let source = verdict
        .solution()
        .map(|s| s.speed_source.to_string())
        .unwrap_or_else(|| "sustained".to_string());
    let show = |k: Option<Knots>| k.map(|k| k.to_string()).unwrap_or_else(|| "N/A".to_string());

    match verdict.kind() {
        VerdictKind::NoClaim => {
            "No crosswind claim detected - verification not applicable.".to_string()
        }
        VerdictKind::Verified => format!(
            "VERIFIED: claim ({} kt) is within {} kt of mathematical truth ({} kt). Discrepancy: {} kt. Using {} speed.",
            show(verdict.agent_claim_kt()),
            verdict.tolerance_kt(),
            show(verdict.mathematical_truth_kt()),
            show(verdict.discrepancy_kt()),
            source
        ),
        VerdictKind::NumericMismatch => format!(
            "FAILED: claim ({} kt) differs from mathematical truth ({} kt) by {} kt, which exceeds tolerance of {} kt. TRIGGER REFLECTION. Using {} speed.",
            show(verdict.agent_claim_kt()),
            show(verdict.mathematical_truth_kt()),
            show(verdict.discrepancy_kt()),
            verdict.tolerance_kt(),
            source
        ),
        VerdictKind::DataUnresolvable => format!(
            "DATA UNRESOLVABLE: {}. Re-fetch weather data before answering.",
            verdict.issue().unwrap_or("wind or runway data missing")
        ),
    }
}

/// One-shot check with a fresh guardrail. An invalid tolerance fails closed.
pub fn verify_crosswind_claim(
    response: &str,
    wind: &WindObservation,
    runway: &RunwayHeading,
    tolerance_kt: f64,
) -> bool {
    let Some(guard) = Knots::from_f64(tolerance_kt)
        .and_then(|tolerance| Guardrail::new().with_tolerance(tolerance).ok())
    else {
        warn!(tolerance_kt, "invalid tolerance, failing verification");
        return false;
    };
    guard
        .verify(response, wind, runway, &VerifyOptions::default())
        .passed()
}
