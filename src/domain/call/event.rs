//! Call events reported through `CallObserver::on_call_event`

use crate::domain::call::value_object::{
    AnswerType, CallDirection, CallKind, ConferenceState, DisconnectReason, RequestKind,
    RunningState, VideoState,
};
use crate::domain::ports::AsyncResultPayload;
use crate::domain::shared::events::{DomainEvent, EventMetadata};
use crate::domain::shared::value_objects::{CallId, PrivacyTicket, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a preempted call was subjected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreemptAction {
    Rejected,
    HungUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEventKind {
    IncomingCallAnswered {
        video_state: VideoState,
    },
    IncomingCallRejected {
        with_message: bool,
        message: Option<String>,
    },
    /// A bearer failure undid a request
    RequestRolledBack {
        request: RequestKind,
        reason: String,
        restored: RunningState,
    },
    /// Ended to make room for another call
    CallPreempted {
        by: CallId,
        action: PreemptAction,
    },
    PrivacyDeferred {
        ticket: PrivacyTicket,
        request: RequestKind,
    },
    PrivacyRequestCancelled {
        ticket: PrivacyTicket,
    },
    ConferenceStateChanged {
        kind: CallKind,
        state: ConferenceState,
        main_call_id: Option<CallId>,
    },
    MuteChanged {
        muted: bool,
    },
    VideoStateChanged {
        video_state: VideoState,
    },
    /// DTMF acks and supplementary-service query answers
    AsyncResult {
        result_id: u64,
        payload: AsyncResultPayload,
    },
}

impl CallEventKind {
    fn name(&self) -> &'static str {
        match self {
            CallEventKind::IncomingCallAnswered { .. } => "call.answered",
            CallEventKind::IncomingCallRejected { .. } => "call.rejected",
            CallEventKind::RequestRolledBack { .. } => "call.rolled_back",
            CallEventKind::CallPreempted { .. } => "call.preempted",
            CallEventKind::PrivacyDeferred { .. } => "privacy.deferred",
            CallEventKind::PrivacyRequestCancelled { .. } => "privacy.cancelled",
            CallEventKind::ConferenceStateChanged { .. } => "conference.state_changed",
            CallEventKind::MuteChanged { .. } => "call.mute_changed",
            CallEventKind::VideoStateChanged { .. } => "call.video_state_changed",
            CallEventKind::AsyncResult { .. } => "call.async_result",
        }
    }
}

/// Event delivered to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub metadata: EventMetadata,
    /// `None` for events about a slot or a conference rather than one call
    pub call_id: Option<CallId>,
    pub kind: CallEventKind,
}

impl CallEvent {
    pub fn new(call_id: Option<CallId>, kind: CallEventKind) -> Self {
        Self {
            metadata: EventMetadata::new(kind.name()),
            call_id,
            kind,
        }
    }

    pub fn for_call(call_id: CallId, kind: CallEventKind) -> Self {
        Self::new(Some(call_id), kind)
    }
}

impl DomainEvent for CallEvent {
    fn event_type(&self) -> &'static str {
        self.kind.name()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}

/// Final record of a call, handed out once when it is destroyed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectDetails {
    pub call_id: CallId,
    pub number: String,
    pub kind: CallKind,
    pub direction: CallDirection,
    pub slot_id: SlotId,
    pub emergency: bool,
    pub answer_type: AnswerType,
    pub reason: DisconnectReason,
    pub created_at: DateTime<Utc>,
    pub began_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

impl DisconnectDetails {
    /// Talk time, if the call was ever connected
    pub fn duration_seconds(&self) -> Option<i64> {
        self.began_at
            .map(|began| (self.ended_at - began).num_seconds().max(0))
    }
}
