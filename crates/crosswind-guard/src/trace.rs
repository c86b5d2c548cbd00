//! Structured trace of one verification or safe-fail invocation.
//!
//! Events accumulate in a [`TraceRecorder`]; [`TraceRecorder::finish`] seals
//! them into an immutable [`TraceRecord`], which is then emitted exactly once to
//! an [`AuditSink`]. Serialized field order is fixed by declaration order and
//! context keys are sorted, so the JSON is deterministic.

use crate::audit::AuditSink;
use crate::error::GuardError;
use crate::units::Knots;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// What a trace record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceCategory {
    Crosswind,
    SafeFail,
}

impl fmt::Display for TraceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Crosswind => "crosswind",
            Self::SafeFail => "safe_fail",
        };
        write!(f, "{}", s)
    }
}

/// One step of a computation. `ts` is Unix seconds with sub-second precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Raw data as received.
    Input {
        raw_report: Option<String>,
        wind_str: Option<String>,
        ts: f64,
    },
    /// Parsed numbers.
    Transformation {
        wind_direction_deg: Option<f64>,
        wind_speed_kt: Option<Knots>,
        ts: f64,
    },
    /// Function applied to derived quantities.
    Operation {
        function: String,
        angle_deg: Option<f64>,
        expression: Option<String>,
        ts: f64,
    },
    /// Final numbers.
    Result {
        crosswind_kt: Option<Knots>,
        headwind_kt: Option<Knots>,
        ts: f64,
    },
}

impl TraceEvent {
    /// Position in the Input → Transformation → Operation → Result pipeline.
    pub fn stage(&self) -> u8 {
        match self {
            Self::Input { .. } => 0,
            Self::Transformation { .. } => 1,
            Self::Operation { .. } => 2,
            Self::Result { .. } => 3,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::Transformation { .. } => "transformation",
            Self::Operation { .. } => "operation",
            Self::Result { .. } => "result",
        }
    }

    pub fn ts(&self) -> f64 {
        match self {
            Self::Input { ts, .. }
            | Self::Transformation { ts, .. }
            | Self::Operation { ts, .. }
            | Self::Result { ts, .. } => *ts,
        }
    }
}

fn now_ts() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A sealed trace. One JSON line in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    trace_id: String,
    category: TraceCategory,
    context: BTreeMap<String, Value>,
    events: Vec<TraceEvent>,
}

impl TraceRecord {
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn category(&self) -> TraceCategory {
        self.category
    }

    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Check event ordering: stages never go backwards and, when there are
    /// events at all, the first one is an Input.
    pub fn validate(&self) -> Result<(), GuardError> {
        if let Some(first) = self.events.first() {
            if first.stage() != 0 {
                return Err(GuardError::TraceOrdering(format!(
                    "trace {} starts with {} instead of input",
                    self.trace_id,
                    first.kind()
                )));
            }
        }
        for pair in self.events.windows(2) {
            if pair[1].stage() < pair[0].stage() {
                return Err(GuardError::TraceOrdering(format!(
                    "trace {}: {} after {}",
                    self.trace_id,
                    pair[1].kind(),
                    pair[0].kind()
                )));
            }
        }
        Ok(())
    }

    /// Single-line JSON, no trailing newline.
    pub fn to_json_line(&self) -> Result<String, GuardError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validate, then append to `sink`.
    pub fn emit(&self, sink: &dyn AuditSink) -> Result<(), GuardError> {
        self.validate()?;
        sink.append(self)
    }
}

/// Accumulates events for one invocation.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    record: TraceRecord,
}

impl TraceRecorder {
    /// New recorder with a time-ordered UUIDv7 id.
    pub fn new(category: TraceCategory) -> Self {
        Self {
            record: TraceRecord {
                trace_id: Uuid::now_v7().to_string(),
                category,
                context: BTreeMap::new(),
                events: Vec::new(),
            },
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.record.trace_id
    }

    pub fn set_context(&mut self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.record.context.insert(key.to_string(), value);
    }

    pub fn log_input(&mut self, raw_report: Option<&str>, wind_str: Option<&str>) {
        self.record.events.push(TraceEvent::Input {
            raw_report: raw_report.map(str::to_string),
            wind_str: wind_str.map(str::to_string),
            ts: now_ts(),
        });
    }

    pub fn log_transformation(
        &mut self,
        wind_direction_deg: Option<f64>,
        wind_speed_kt: Option<Knots>,
    ) {
        self.record.events.push(TraceEvent::Transformation {
            wind_direction_deg,
            wind_speed_kt,
            ts: now_ts(),
        });
    }

    pub fn log_operation(
        &mut self,
        function: &str,
        angle_deg: Option<f64>,
        expression: Option<String>,
    ) {
        self.record.events.push(TraceEvent::Operation {
            function: function.to_string(),
            angle_deg,
            expression,
            ts: now_ts(),
        });
    }

    pub fn log_result(&mut self, crosswind_kt: Option<Knots>, headwind_kt: Option<Knots>) {
        self.record.events.push(TraceEvent::Result {
            crosswind_kt,
            headwind_kt,
            ts: now_ts(),
        });
    }

    /// Seal the events. The record cannot be changed afterwards.
    pub fn finish(self) -> TraceRecord {
        self.record
    }

    /// Seal and emit in one step.
    pub fn emit(self, sink: &dyn AuditSink) -> Result<TraceRecord, GuardError> {
        let record = self.finish();
        record.emit(sink)?;
        Ok(record)
    }
}
