//! Request parameters and outcomes of the orchestrator's command surface

use crate::domain::call::value_object::{CallKind, VideoState};
use crate::domain::shared::value_objects::{PrivacyTicket, SlotId};
use serde::{Deserialize, Serialize};

/// How to place an outgoing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialOptions {
    pub kind: CallKind,
    pub slot_id: SlotId,
    pub video_state: VideoState,
    /// Forces emergency handling even when the number is not on the list
    pub emergency: bool,
}

impl DialOptions {
    pub fn new(kind: CallKind) -> Self {
        Self {
            kind,
            ..Default::default()
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

    pub fn emergency(mut self) -> Self {
        self.emergency = true;
        self
    }
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            kind: CallKind::Cs,
            slot_id: SlotId::default(),
            video_state: VideoState::Voice,
            emergency: false,
        }
    }
}

/// Outcome of a request that privacy mode may hold back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<T> {
    /// Sent to the channel
    Sent(T),
    /// Waiting for the user to leave privacy mode
    Deferred(PrivacyTicket),
}

impl<T> Dispatch<T> {
    pub fn sent(self) -> Option<T> {
        match self {
            Dispatch::Sent(value) => Some(value),
            Dispatch::Deferred(_) => None,
        }
    }

    pub fn ticket(&self) -> Option<PrivacyTicket> {
        match self {
            Dispatch::Sent(_) => None,
            Dispatch::Deferred(ticket) => Some(*ticket),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Dispatch::Deferred(_))
    }
}
