/// Call report logging
///
/// Lifecycle reports go out at info, attribute-level detail at debug.
use crate::domain::call::entity::CallSnapshot;
use crate::domain::call::event::{CallEvent, CallEventKind, DisconnectDetails};
use crate::domain::call::value_object::ProtocolState;
use crate::domain::ports::CallObserver;
use crate::domain::shared::events::DomainEvent;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl CallObserver for TracingObserver {
    fn on_new_call_created(&self, call: &CallSnapshot) {
        info!(
            "Call {} created: {:?} {} call, number {}, slot {}",
            call.call_id, call.direction, call.kind, call.number, call.slot_id
        );
    }

    fn on_call_state_updated(&self, call: &CallSnapshot, prior: ProtocolState, next: ProtocolState) {
        info!("Call {} state {} -> {} ({})", call.call_id, prior, next, call.running_state);
        debug!(
            "Call {} attributes: video {:?}, muted {}, conference {:?}",
            call.call_id, call.video_state, call.muted, call.conference
        );
    }

    fn on_call_destroyed(&self, details: &DisconnectDetails) {
        info!(
            "Call {} destroyed: {:?}, {:?}, talk time {}s",
            details.call_id,
            details.reason,
            details.answer_type,
            details.duration_seconds().unwrap_or(0)
        );
    }

    fn on_call_event(&self, event: &CallEvent) {
        match &event.kind {
            CallEventKind::RequestRolledBack {
                request, reason, ..
            } => warn!(
                "Call {:?}: {} rolled back: {}",
                event.call_id, request, reason
            ),
            _ => info!("{} for call {:?}", event.event_type(), event.call_id),
        }
        match serde_json::to_string(event) {
            Ok(json) => debug!("Event {}: {}", event.metadata.event_id, json),
            Err(err) => warn!("Event {} not serializable: {}", event.metadata.event_id, err),
        }
    }
}
