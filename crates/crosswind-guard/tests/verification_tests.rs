//! Golden tests for the crosswind guardrail.
//!
//! Tests verify:
//! - The tolerance boundary is inclusive, to the hundredth
//! - Claims are found in either word order
//! - Data failures are distinguishable from numeric mismatches
//! - Detailed verification always audits, and audit failure never changes
//!   the verdict

use crosswind_guard::{
    extract_claim, verify_crosswind_claim, AuditSink, GuardError, Guardrail, JsonlAuditLog,
    Knots, MagneticVariationTable, MemoryAuditLog, RunwayHeading, TraceEvent, TraceRecord,
    VerdictKind, VerifyOptions, WindObservation,
};
use std::sync::Arc;
use tempfile::tempdir;

fn test_wind() -> WindObservation {
    // Not in the variation table: no magnetic correction
    WindObservation::new("TEST", Some(220.0), 10.0, None).unwrap()
}

fn denver_wind() -> WindObservation {
    WindObservation::new("KDEN", Some(220.0), 10.0, None)
        .unwrap()
        .with_raw_text("METAR KDEN 181953Z 22010KT 10SM FEW080 18/M03 A3012")
}

fn rwy(heading: f64) -> RunwayHeading {
    RunwayHeading::Degrees(heading)
}

fn verify(text: &str) -> crosswind_guard::VerificationVerdict {
    Guardrail::new().verify(text, &test_wind(), &rwy(260.0), &VerifyOptions::default())
}

struct FailingSink;

impl AuditSink for FailingSink {
    fn append(&self, _record: &TraceRecord) -> Result<(), GuardError> {
        Err(GuardError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

// ============================================================================
// Tolerance boundary
// ============================================================================

#[test]
fn test_discrepancy_equal_to_tolerance_passes() {
    let above = verify("The crosswind is 9.43 kt");
    assert_eq!(above.mathematical_truth_kt(), Some(Knots::from_hundredths(643)));
    assert_eq!(above.discrepancy_kt(), Some(Knots::from_hundredths(300)));
    assert!(above.passed());

    let below = verify("The crosswind is 3.43 kt");
    assert_eq!(below.discrepancy_kt(), Some(Knots::from_hundredths(300)));
    assert!(below.passed());
}

#[test]
fn test_one_hundredth_over_tolerance_fails() {
    let above = verify("The crosswind is 9.44 kt");
    assert_eq!(above.discrepancy_kt(), Some(Knots::from_hundredths(301)));
    assert!(!above.passed());
    assert_eq!(above.kind(), VerdictKind::NumericMismatch);

    let below = verify("The crosswind is 3.42 kt");
    assert!(!below.passed());
}

#[test]
fn test_custom_tolerance() {
    let guard = Guardrail::new().with_tolerance(Knots::from_hundredths(50)).unwrap();
    let verdict = guard.verify(
        "crosswind 7 kt",
        &test_wind(),
        &rwy(260.0),
        &VerifyOptions::default(),
    );
    assert!(!verdict.passed());
    assert_eq!(verdict.tolerance_kt(), Knots::from_hundredths(50));
    assert!(verdict.issue().unwrap().contains("tolerance: 0.50 kt"));
}

// ============================================================================
// Claim extraction
// ============================================================================

#[test]
fn test_claim_order_insensitive() {
    let seven_seven = Some(Knots::from_hundredths(770));
    assert_eq!(extract_claim("crosswind at runway 26 is 7.7 kt"), seven_seven);
    assert_eq!(extract_claim("expect 7.7 kt crosswind"), seven_seven);
    assert_eq!(extract_claim("Crosswind: 7.7 knots"), seven_seven);
    assert_eq!(extract_claim("7.7 KNOTS CROSSWIND"), seven_seven);
}

#[test]
fn test_no_claim_always_passes() {
    for text in ["", "Winds 220 at 10 knots", "crosswind is light", "headwind 8 kt"] {
        let verdict = verify(text);
        assert!(verdict.passed(), "{:?}", text);
        assert_eq!(verdict.agent_claim_kt(), None);
        assert_eq!(verdict.kind(), VerdictKind::NoClaim);
    }

    // Even when the data is unusable
    let variable = WindObservation::from_encoded("TEST", "VRB @ 3", None).unwrap();
    let verdict = Guardrail::new().verify(
        "winds are variable",
        &variable,
        &rwy(260.0),
        &VerifyOptions::default(),
    );
    assert!(verdict.passed());
}

// ============================================================================
// End-to-end numbers
// ============================================================================

#[test]
fn test_wrong_claim_at_denver() {
    let verdict = Guardrail::new().verify(
        "The crosswind on runway 26 is 15.5 knots.",
        &denver_wind(),
        &rwy(260.0),
        &VerifyOptions::default(),
    );
    assert!(!verdict.passed());
    assert_eq!(verdict.agent_claim_kt(), Some(Knots::from_hundredths(1550)));
    assert_eq!(verdict.mathematical_truth_kt(), Some(Knots::from_hundredths(737)));
    assert_eq!(verdict.discrepancy_kt(), Some(Knots::from_hundredths(813)));
    assert!(verdict.is_reflection_eligible());
}

#[test]
fn test_wrong_claim_without_variation() {
    let verdict = Guardrail::new()
        .with_variations(MagneticVariationTable::empty())
        .verify(
            "The crosswind is 15.5 knots.",
            &denver_wind(),
            &rwy(260.0),
            &VerifyOptions::default(),
        );
    assert_eq!(verdict.mathematical_truth_kt(), Some(Knots::from_hundredths(643)));
    assert_eq!(verdict.discrepancy_kt(), Some(Knots::from_hundredths(907)));
}

#[test]
fn test_designator_heading() {
    let verdict = Guardrail::new().verify(
        "crosswind 7.37 kt",
        &denver_wind(),
        &RunwayHeading::from("26"),
        &VerifyOptions::default(),
    );
    assert!(verdict.passed());
    assert_eq!(verdict.discrepancy_kt(), Some(Knots::ZERO));
    assert_eq!(verdict.solution().unwrap().runway_heading_deg, 260.0);
}

#[test]
fn test_encoded_wind() {
    let guard = Guardrail::new();
    let options = VerifyOptions::default();

    let ok = guard.verify_encoded("crosswind 7.4 kt", "KDEN", "220 @ 10", None, &rwy(260.0), &options);
    assert!(ok.passed());

    let gusty = guard.verify_encoded(
        "crosswind 7.4 kt",
        "KDEN",
        "220 @ 10",
        Some(25.0),
        &rwy(260.0),
        &VerifyOptions {
            use_gust: true,
            ..Default::default()
        },
    );
    assert_eq!(gusty.mathematical_truth_kt(), Some(Knots::from_hundredths(1843)));
    assert!(!gusty.passed());
}

#[test]
fn test_verify_crosswind_claim_shortcut() {
    assert!(verify_crosswind_claim("crosswind 6.5 kt", &test_wind(), &rwy(260.0), 3.0));
    assert!(!verify_crosswind_claim("crosswind 6.5 kt", &test_wind(), &rwy(260.0), 0.05));
}

// ============================================================================
// Data failures
// ============================================================================

#[test]
fn test_data_failures_are_not_reflection_eligible() {
    let guard = Guardrail::new();
    let options = VerifyOptions::default();

    let bad_text = guard.verify_encoded("crosswind 5 kt", "KDEN", "220@10", None, &rwy(260.0), &options);
    let variable = guard.verify_encoded("crosswind 5 kt", "KDEN", "VRB @ 4", None, &rwy(260.0), &options);
    let bad_runway = guard.verify("crosswind 5 kt", &test_wind(), &RunwayHeading::from("L"), &options);

    for (verdict, code) in [
        (&bad_text, "data.invalid_wind"),
        (&variable, "data.variable_wind"),
        (&bad_runway, "data.unresolvable_runway"),
    ] {
        assert!(!verdict.passed());
        assert_eq!(verdict.kind(), VerdictKind::DataUnresolvable);
        assert!(!verdict.is_reflection_eligible());
        assert_eq!(verdict.error_code(), Some(code));
        assert_eq!(verdict.mathematical_truth_kt(), None);
        assert_eq!(verdict.recommendation(), "Re-fetch weather data");
    }
    assert_eq!(bad_text.issue(), Some("Could not parse wind data: 220@10"));
    assert_eq!(variable.issue(), Some("Could not parse wind data: VRB @ 4"));
}

// ============================================================================
// Detailed verification and audit
// ============================================================================

#[test]
fn test_detailed_writes_jsonl_record() {
    let dir = tempdir().unwrap();
    let log = Arc::new(JsonlAuditLog::new(dir.path().join("logs/trace.jsonl")));
    let guard = Guardrail::new().with_audit_sink(log.clone());

    let detailed = guard.verify_detailed(
        "The crosswind is 15.5 knots.",
        &denver_wind(),
        &rwy(260.0),
        &VerifyOptions::default(),
    );
    assert!(!detailed.verdict.passed());
    assert!(detailed.explanation.starts_with("FAILED"));
    assert!(detailed.audit_error.is_none());

    let records = log.read_all().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.trace_id(), detailed.trace.trace_id());
    assert_eq!(record.context()["airport"], "KDEN");
    assert_eq!(record.context()["runway_heading"], 260.0);

    let kinds: Vec<&str> = record.events().iter().map(TraceEvent::kind).collect();
    assert_eq!(kinds, vec!["input", "transformation", "operation", "result"]);
    match &record.events()[0] {
        TraceEvent::Input { raw_report, wind_str, .. } => {
            assert!(raw_report.as_deref().unwrap().starts_with("METAR KDEN"));
            assert_eq!(wind_str.as_deref(), Some("220 @ 10"));
        }
        other => panic!("expected input, got {:?}", other),
    }
}

#[test]
fn test_detailed_audits_no_claim_too() {
    let sink = Arc::new(MemoryAuditLog::new());
    let guard = Guardrail::new().with_audit_sink(sink.clone());
    let detailed = guard.verify_detailed(
        "Winds 220 at 10.",
        &denver_wind(),
        &rwy(260.0),
        &VerifyOptions::default(),
    );
    assert_eq!(detailed.verdict.kind(), VerdictKind::NoClaim);
    assert!(detailed.calculation.is_some());
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_detailed_variable_wind_has_no_operation() {
    let sink = Arc::new(MemoryAuditLog::new());
    let guard = Guardrail::new().with_audit_sink(sink.clone());
    let variable = WindObservation::from_encoded("KBDU", "VRB @ 3", None).unwrap();
    let detailed = guard.verify_detailed("crosswind 2 kt", &variable, &rwy(260.0), &VerifyOptions::default());

    assert_eq!(detailed.verdict.kind(), VerdictKind::DataUnresolvable);
    assert!(detailed.calculation.is_none());
    assert!(detailed.explanation.starts_with("DATA UNRESOLVABLE"));
    let kinds: Vec<&str> = sink.records()[0].events().iter().map(TraceEvent::kind).collect();
    assert_eq!(kinds, vec!["input", "transformation"]);
}

#[test]
fn test_audit_failure_does_not_change_verdict() {
    let guard = Guardrail::new().with_audit_sink(Arc::new(FailingSink));
    let detailed = guard.verify_detailed(
        "crosswind 7.4 kt",
        &denver_wind(),
        &rwy(260.0),
        &VerifyOptions::default(),
    );
    assert!(detailed.verdict.passed());
    assert!(detailed.audit_error.unwrap().contains("disk full"));
}
