//! Terminal fallback when a corrected answer still fails verification.
//!
//! The audit record is written before the text is built. Missing values
//! render as `N/A`. Nothing on this path returns an error; an unwritten
//! record is reported in `SafeFailResponse::audit_error`.

use crate::audit::{emit_or_report, AuditSink};
use crate::guard::VerificationVerdict;
use crate::runway::RunwayHeading;
use crate::trace::{TraceCategory, TraceRecorder};
use crate::wind::WindObservation;
use chrono::Utc;
use serde::Serialize;
use tracing::error;

const PLACEHOLDER: &str = "N/A";

/// What the responder knows about the request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SafeFailContext {
    pub station: Option<String>,
    pub runway_heading: Option<RunwayHeading>,
    pub wind: Option<String>,
    pub raw_report: Option<String>,
}

impl SafeFailContext {
    pub fn from_observation(wind: &WindObservation, runway: &RunwayHeading) -> Self {
        Self {
            station: Some(wind.station().to_string()),
            runway_heading: Some(runway.clone()),
            wind: Some(wind.wind_string()),
            raw_report: Some(wind.raw_text().to_string()),
        }
    }
}

/// Conservative text plus the id of the audit record behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeFailResponse {
    pub text: String,
    pub trace_id: String,
    /// Set when the audit record was not written, including when no sink
    /// was given. The text then names no trace id.
    pub audit_error: Option<String>,
}

/// Audit both failed verdicts, then produce the conservative message.
///
/// The text carries the wind and the computed crosswind, never the failing
/// claim.
pub fn safe_fail(
    original: &VerificationVerdict,
    reflection: &VerificationVerdict,
    context: &SafeFailContext,
    sink: Option<&dyn AuditSink>,
) -> SafeFailResponse {
    error!(
        station = context.station.as_deref().unwrap_or(PLACEHOLDER),
        original_discrepancy = ?original.discrepancy_kt(),
        reflection_discrepancy = ?reflection.discrepancy_kt(),
        "safe-fail triggered: verification failed after reflection"
    );

    let mut tracer = TraceRecorder::new(TraceCategory::SafeFail);
    tracer.set_context("timestamp", Utc::now().to_rfc3339());
    tracer.set_context("airport", &context.station);
    tracer.set_context("runway_heading", &context.runway_heading);
    tracer.set_context("original_claim", original.agent_claim_kt());
    tracer.set_context("original_discrepancy", original.discrepancy_kt());
    tracer.set_context("reflection_claim", reflection.agent_claim_kt());
    tracer.set_context("reflection_discrepancy", reflection.discrepancy_kt());
    tracer.log_input(
        Some(context.raw_report.as_deref().unwrap_or(PLACEHOLDER)),
        Some(context.wind.as_deref().unwrap_or(PLACEHOLDER)),
    );
    tracer.log_operation(
        "safe_fail_triggered",
        None,
        Some("Guardrails failed after reflection".to_string()),
    );
    let record = tracer.finish();

    let audit_error = emit_or_report(sink, &record);
    let audit_note = match &audit_error {
        None => format!("Trace ID: {}", record.trace_id()),
        Some(_) => "audit record not written".to_string(),
    };

    let truth = original
        .mathematical_truth_kt()
        .or_else(|| reflection.mathematical_truth_kt())
        .map(|t| format!("{} kt (mathematically verified)", t))
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    let text = format!(
        "VERIFICATION FAILURE - CONSERVATIVE GUIDANCE PROVIDED\n\n\
         I was unable to provide a verified crosswind calculation. \
         For safety, please use the following information:\n\n\
         Current Wind: {}\n\
         Calculated Crosswind Component: {}\n\n\
         RECOMMENDATION: Verify wind conditions independently before flight. \
         Consult the current METAR/TAF directly and perform your own crosswind calculations.\n\n\
         [AUDIT: Response generated via safe-fail path due to verification failure. {}]\n",
        context.wind.as_deref().unwrap_or(PLACEHOLDER),
        truth,
        audit_note
    );

    SafeFailResponse {
        text,
        trace_id: record.trace_id().to_string(),
        audit_error,
    }
}
