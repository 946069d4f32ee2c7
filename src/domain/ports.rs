//! Ports to the collaborators around the call core
//!
//! Traits are defined here, in the domain layer, and implemented by the
//! radio bearer, the companion (Bluetooth/VoIP) service, the privacy UI and
//! the reporting consumers. The loopback bearer in the infrastructure layer
//! is one implementation.

use crate::domain::call::entity::CallSnapshot;
use crate::domain::call::event::{CallEvent, DisconnectDetails};
use crate::domain::call::value_object::{CallKind, DtmfDigit, ProtocolState, RequestKind, VideoState};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, PrivacyTicket, SlotId};
use serde::{Deserialize, Serialize};

/// Command for the radio bearer or the companion service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelCommand {
    Dial { video_state: VideoState, emergency: bool },
    Answer { video_state: VideoState },
    Reject { message: Option<String> },
    HangUp,
    Hold,
    Unhold,
    Switch,
    StartDtmf { digit: DtmfDigit },
    StopDtmf,
    Combine,
    Separate,
    KickOut,
    SetMute { muted: bool },
    UpdateMediaMode { video_state: VideoState },
}

impl ChannelCommand {
    pub fn request_kind(&self) -> RequestKind {
        match self {
            ChannelCommand::Dial { .. } => RequestKind::Dial,
            ChannelCommand::Answer { .. } => RequestKind::Answer,
            ChannelCommand::Reject { .. } => RequestKind::Reject,
            ChannelCommand::HangUp => RequestKind::HangUp,
            ChannelCommand::Hold => RequestKind::Hold,
            ChannelCommand::Unhold => RequestKind::Unhold,
            ChannelCommand::Switch => RequestKind::Switch,
            ChannelCommand::StartDtmf { .. } => RequestKind::StartDtmf,
            ChannelCommand::StopDtmf => RequestKind::StopDtmf,
            ChannelCommand::Combine => RequestKind::Combine,
            ChannelCommand::Separate => RequestKind::Separate,
            ChannelCommand::KickOut => RequestKind::KickOut,
            ChannelCommand::SetMute { .. } => RequestKind::SetMute,
            ChannelCommand::UpdateMediaMode { .. } => RequestKind::UpdateMediaMode,
        }
    }
}

/// A command addressed to one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub call_id: CallId,
    pub kind: CallKind,
    pub slot_id: SlotId,
    pub number: String,
    pub command: ChannelCommand,
}

/// Radio bearer command channel (CS, IMS and satellite calls)
///
/// `submit` only queues the command. Results come back later through the
/// orchestrator's inbound surface, possibly on another thread.
#[cfg_attr(test, mockall::automock)]
pub trait BearerChannel: Send + Sync {
    fn submit(&self, request: ChannelRequest) -> Result<()>;
}

/// Companion service channel (Bluetooth handset, VoIP app)
#[cfg_attr(test, mockall::automock)]
pub trait CompanionChannel: Send + Sync {
    fn submit(&self, request: ChannelRequest) -> Result<()>;
}

/// Elevated privacy mode and its exit confirmation flow
#[cfg_attr(test, mockall::automock)]
pub trait PrivacyGuard: Send + Sync {
    fn is_elevated(&self) -> bool;

    /// Ask the user to leave privacy mode. The answer arrives through
    /// `CallOrchestrator::confirm_privacy_exit` with the same ticket.
    fn request_exit(&self, ticket: PrivacyTicket);
}

/// Consumer of call reports (audio routing, call log, notifications, UI)
///
/// Hooks are invoked after every lock in the core has been released.
#[cfg_attr(test, mockall::automock)]
pub trait CallObserver: Send + Sync {
    fn on_new_call_created(&self, _call: &CallSnapshot) {}

    fn on_call_state_updated(&self, _call: &CallSnapshot, _prior: ProtocolState, _next: ProtocolState) {}

    fn on_call_destroyed(&self, _details: &DisconnectDetails) {}

    fn on_call_event(&self, _event: &CallEvent) {}
}

/// Network-originated call as reported by a bearer or companion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCallInfo {
    pub number: String,
    pub kind: CallKind,
    pub slot_id: SlotId,
    pub video_state: VideoState,
}

impl IncomingCallInfo {
    pub fn new(number: impl Into<String>, kind: CallKind) -> Self {
        Self {
            number: number.into(),
            kind,
            slot_id: SlotId::default(),
            video_state: VideoState::Voice,
        }
    }

    pub fn with_slot(mut self, slot_id: SlotId) -> Self {
        self.slot_id = slot_id;
        self
    }

    pub fn with_video_state(mut self, video_state: VideoState) -> Self {
        self.video_state = video_state;
        self
    }
}

/// Payload of an asynchronous bearer answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AsyncResultPayload {
    DtmfAck {
        call_id: CallId,
        success: bool,
    },
    CallWaitingQuery {
        slot_id: SlotId,
        enabled: bool,
    },
    CallRestrictionQuery {
        slot_id: SlotId,
        facility: String,
        active: bool,
    },
    CallTransferQuery {
        slot_id: SlotId,
        forward_to: Option<String>,
        enabled: bool,
    },
    CombineConference {
        main_call_id: CallId,
        success: bool,
    },
    SeparateConference {
        call_id: CallId,
        success: bool,
    },
    VideoModeChanged {
        call_id: CallId,
        video_state: VideoState,
        success: bool,
    },
    /// The bearer could not carry out a command it had accepted
    RequestFailed {
        call_id: CallId,
        request: RequestKind,
        reason: String,
    },
}
