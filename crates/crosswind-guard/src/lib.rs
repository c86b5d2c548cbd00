//! Crosswind claim verification and self-correction.
//!
//! Checks a crosswind figure stated in free text against the trigonometric
//! truth for a wind observation and runway, reflects once on a numeric
//! mismatch, and falls back to a conservative audited answer when the
//! correction fails too.

pub mod audit;
pub mod claims;
pub mod components;
pub mod config;
pub mod error;
pub mod guard;
pub mod magnetic;
pub mod reflection;
pub mod runway;
pub mod safe_fail;
pub mod trace;
pub mod units;
pub mod wind;

pub use audit::{AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use claims::extract_claim;
pub use components::{crosswind_components, magnetic_components, WindComponents};
pub use config::GuardConfig;
pub use error::GuardError;
pub use guard::{
    verify_crosswind_claim, CalculationDetails, CrosswindSolution, DetailedVerification,
    Guardrail, VerdictKind, VerificationVerdict, VerifyOptions, WindBreakdown,
};
pub use magnetic::{magnetic_to_true, true_to_magnetic, MagneticVariationTable};
pub use reflection::{Corrector, FormulaCorrector, ReflectionController, ReflectionOutcome};
pub use runway::{
    heading_from_designator, select_best_runway, RunwayCandidate, RunwayHeading, RunwayInput,
    RunwaySelection, SelectionOptions,
};
pub use safe_fail::{safe_fail, SafeFailContext, SafeFailResponse};
pub use trace::{TraceCategory, TraceEvent, TraceRecord, TraceRecorder};
pub use units::Knots;
pub use wind::{parse_wind_pair, SpeedSource, WindObservation};
