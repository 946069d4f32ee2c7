//! Call metrics
//!
//! Counters and gauges recorded through the `metrics` facade. Without an
//! installed recorder every call is a no-op.

use crate::domain::call::entity::CallSnapshot;
use crate::domain::call::event::{CallEvent, CallEventKind, DisconnectDetails};
use crate::domain::call::value_object::{AnswerType, CallDirection};
use crate::domain::ports::CallObserver;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!("callcore_calls_created_total", "Calls admitted to the registry");
    describe_counter!("callcore_calls_destroyed_total", "Calls removed from the registry");
    describe_counter!("callcore_calls_blocked_total", "Incoming calls refused at admission");
    describe_counter!("callcore_calls_preempted_total", "Calls ended to make room for another");
    describe_counter!(
        "callcore_requests_rolled_back_total",
        "Requests undone after a bearer failure"
    );
    describe_gauge!("callcore_live_calls", "Calls currently in the registry");
    describe_histogram!("callcore_call_duration_seconds", "Talk time of connected calls");
}

#[derive(Debug, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    pub fn new() -> Self {
        describe_metrics();
        Self
    }
}

fn direction_label(direction: CallDirection) -> &'static str {
    match direction {
        CallDirection::Incoming => "incoming",
        CallDirection::Outgoing => "outgoing",
    }
}

impl CallObserver for MetricsObserver {
    fn on_new_call_created(&self, call: &CallSnapshot) {
        counter!(
            "callcore_calls_created_total",
            "kind" => call.kind.as_str(),
            "direction" => direction_label(call.direction)
        )
        .increment(1);
        gauge!("callcore_live_calls").increment(1.0);
    }

    fn on_call_destroyed(&self, details: &DisconnectDetails) {
        // blocked calls were never registered
        if details.answer_type == AnswerType::Blocked {
            counter!("callcore_calls_blocked_total", "kind" => details.kind.as_str()).increment(1);
            return;
        }
        counter!("callcore_calls_destroyed_total", "kind" => details.kind.as_str()).increment(1);
        gauge!("callcore_live_calls").decrement(1.0);
        if let Some(seconds) = details.duration_seconds() {
            histogram!("callcore_call_duration_seconds").record(seconds as f64);
        }
    }

    fn on_call_event(&self, event: &CallEvent) {
        match &event.kind {
            CallEventKind::RequestRolledBack { request, .. } => {
                counter!("callcore_requests_rolled_back_total", "request" => request.to_string())
                    .increment(1);
            }
            CallEventKind::CallPreempted { .. } => {
                counter!("callcore_calls_preempted_total").increment(1);
            }
            _ => {}
        }
    }
}
