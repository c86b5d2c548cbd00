//! One-shot reflection loop around the guardrail.
//!
//! ```text
//! VERIFY ──pass──────────────────────────────▶ DONE(original)
//!    │ numeric mismatch          data failure ─▶ DONE(data unresolvable)
//!    ▼
//! REFLECT ─▶ RE-VERIFY ──pass────────────────▶ DONE(corrected)
//!                 │ fail
//!                 ▼
//!             SAFE_FAIL
//! ```
//!
//! Exactly one correction is attempted. A mismatch that survives it points at
//! the data rather than the arithmetic, so there is no second retry.

use crate::guard::{CrosswindSolution, DetailedVerification, Guardrail, VerificationVerdict, VerifyOptions};
use crate::runway::RunwayHeading;
use crate::safe_fail::{safe_fail, SafeFailContext, SafeFailResponse};
use crate::wind::WindObservation;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Produces a corrected response from the verifier's own computation.
///
/// The seam where a language model can be plugged in; the default is
/// [`FormulaCorrector`].
pub trait Corrector: Send + Sync {
    fn correct(&self, response: &str, solution: &CrosswindSolution) -> String;
}

/// Restates the exact formula and result the verifier computed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaCorrector;

impl Corrector for FormulaCorrector {
    fn correct(&self, _response: &str, solution: &CrosswindSolution) -> String {
        format!(
            "I apologize for the calculation error. Let me recalculate:\n\n\
             Wind: {speed} knots at {direction}°\n\
             Runway heading: {runway}°\n\
             Angle between wind and runway: {angle}°\n\n\
             Crosswind = {formula} = {truth} knots\n\n\
             The correct crosswind component is {truth} knots.",
            speed = solution.speed_used_kt,
            direction = solution.wind_direction_magnetic_deg,
            runway = solution.runway_heading_deg,
            angle = solution.angle_deg(),
            formula = solution.formula(),
            truth = solution.crosswind_kt(),
        )
    }
}

/// Terminal state of a reflection run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReflectionOutcome {
    /// The original response passed (or made no claim).
    Verified {
        response: String,
        verification: DetailedVerification,
    },
    /// The original failed; the corrected response passed.
    Corrected {
        original: DetailedVerification,
        response: String,
        verification: DetailedVerification,
    },
    /// Wind or runway data could not be resolved; refetch, do not reflect.
    DataUnresolvable { verification: DetailedVerification },
    /// Both the original and the correction failed.
    SafeFail {
        original: DetailedVerification,
        reflection: DetailedVerification,
        response: SafeFailResponse,
    },
}

impl ReflectionOutcome {
    /// Text to show the user. Never the failing claim.
    pub fn user_text(&self) -> String {
        match self {
            Self::Verified { response, .. } | Self::Corrected { response, .. } => response.clone(),
            Self::DataUnresolvable { verification } => format!(
                "Unable to verify the crosswind: {}. Please re-fetch current weather data before relying on any crosswind figure.",
                verification
                    .verdict
                    .issue()
                    .unwrap_or("wind or runway data could not be parsed")
            ),
            Self::SafeFail { response, .. } => response.text.clone(),
        }
    }

    /// The last verdict produced.
    pub fn final_verdict(&self) -> &VerificationVerdict {
        match self {
            Self::Verified { verification, .. }
            | Self::Corrected { verification, .. }
            | Self::DataUnresolvable { verification } => &verification.verdict,
            Self::SafeFail { reflection, .. } => &reflection.verdict,
        }
    }

    pub fn was_reflected(&self) -> bool {
        matches!(self, Self::Corrected { .. } | Self::SafeFail { .. })
    }

    pub fn is_safe_fail(&self) -> bool {
        matches!(self, Self::SafeFail { .. })
    }
}

impl fmt::Display for ReflectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verified { .. } => "verified",
            Self::Corrected { .. } => "corrected",
            Self::DataUnresolvable { .. } => "data_unresolvable",
            Self::SafeFail { .. } => "safe_fail",
        };
        write!(f, "{}", s)
    }
}

enum Step {
    Verify(String),
    Reflect {
        response: String,
        original: DetailedVerification,
    },
    ReVerify {
        original: DetailedVerification,
        corrected: String,
    },
    SafeFail {
        original: DetailedVerification,
        reflection: DetailedVerification,
    },
    Done(ReflectionOutcome),
}

/// Drives VERIFY → REFLECT → RE-VERIFY → DONE | SAFE_FAIL for one request.
#[derive(Clone)]
pub struct ReflectionController {
    guardrail: Guardrail,
    corrector: Arc<dyn Corrector>,
}

impl fmt::Debug for ReflectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionController")
            .field("guardrail", &self.guardrail)
            .finish_non_exhaustive()
    }
}

impl ReflectionController {
    pub fn new(guardrail: Guardrail) -> Self {
        Self {
            guardrail,
            corrector: Arc::new(FormulaCorrector),
        }
    }

    pub fn with_corrector(mut self, corrector: Arc<dyn Corrector>) -> Self {
        self.corrector = corrector;
        self
    }

    pub fn guardrail(&self) -> &Guardrail {
        &self.guardrail
    }

    /// Verify `response`, reflecting at most once.
    pub fn run(
        &self,
        response: &str,
        wind: &WindObservation,
        runway: &RunwayHeading,
        options: &VerifyOptions,
    ) -> ReflectionOutcome {
        let mut step = Step::Verify(response.to_string());
        loop {
            step = match step {
                Step::Verify(response) => {
                    let verification = self.guardrail.verify_detailed(&response, wind, runway, options);
                    if verification.verdict.passed() {
                        Step::Done(ReflectionOutcome::Verified {
                            response,
                            verification,
                        })
                    } else if verification.verdict.is_reflection_eligible() {
                        Step::Reflect {
                            response,
                            original: verification,
                        }
                    } else {
                        Step::Done(ReflectionOutcome::DataUnresolvable { verification })
                    }
                }
                Step::Reflect { response, original } => match original.verdict.solution() {
                    Some(solution) => {
                        info!(
                            issue = original.verdict.issue().unwrap_or(""),
                            "reflection triggered"
                        );
                        let corrected = self.corrector.correct(&response, solution);
                        Step::ReVerify {
                            original,
                            corrected,
                        }
                    }
                    None => Step::Done(ReflectionOutcome::DataUnresolvable {
                        verification: original,
                    }),
                },
                Step::ReVerify {
                    original,
                    corrected,
                } => {
                    let verification =
                        self.guardrail.verify_detailed(&corrected, wind, runway, options);
                    if verification.verdict.passed() {
                        debug!(trace_id = verification.trace.trace_id(), "corrected response verified");
                        Step::Done(ReflectionOutcome::Corrected {
                            original,
                            response: corrected,
                            verification,
                        })
                    } else {
                        Step::SafeFail {
                            original,
                            reflection: verification,
                        }
                    }
                }
                Step::SafeFail {
                    original,
                    reflection,
                } => {
                    let context = SafeFailContext::from_observation(wind, runway);
                    let sink = self.guardrail.audit_sink().map(|s| s.as_ref());
                    let response =
                        safe_fail(&original.verdict, &reflection.verdict, &context, sink);
                    Step::Done(ReflectionOutcome::SafeFail {
                        original,
                        reflection,
                        response,
                    })
                }
                Step::Done(outcome) => return outcome,
            };
        }
    }
}
