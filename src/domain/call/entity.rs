//! Call entity
//!
//! One live call. Immutable identity (id, kind, number, slot) sits on the
//! struct; everything that changes lives in an attribute block behind the
//! entity's own mutex. Every command follows the same path: capability check,
//! precondition check and mutation under the lock, then the channel request
//! after the lock has been released. A refused channel request undoes the
//! mutation.

use crate::domain::call::event::DisconnectDetails;
use crate::domain::call::value_object::{
    AnswerType, CallDirection, CallKind, ConferenceMembership, DisconnectReason, DtmfDigit,
    ProtocolState, RequestKind, RunningState, VideoState,
};
use crate::domain::call::variant::{CallVariant, Capabilities};
use crate::domain::ports::{ChannelCommand, ChannelRequest};
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Point-in-time copy of a call's attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub call_id: CallId,
    pub number: String,
    pub kind: CallKind,
    pub direction: CallDirection,
    pub slot_id: SlotId,
    pub emergency: bool,
    pub running_state: RunningState,
    pub protocol_state: ProtocolState,
    pub video_state: VideoState,
    pub answer_type: AnswerType,
    pub muted: bool,
    pub conference: Option<ConferenceMembership>,
    pub pending_request: Option<RequestKind>,
    pub created_at: DateTime<Utc>,
    pub began_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Committed signaling change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub prior: ProtocolState,
    pub next: ProtocolState,
    pub prior_running: RunningState,
    pub running: RunningState,
}

/// Outcome of undoing a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollback {
    pub request: RequestKind,
    pub from: RunningState,
    pub restored: RunningState,
}

/// Attributes a request may touch, kept so a failure can undo them
#[derive(Debug, Clone, PartialEq)]
struct PriorAttributes {
    running_state: RunningState,
    answer_type: AnswerType,
    video_state: VideoState,
    muted: bool,
    disconnect_reason: Option<DisconnectReason>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingRequest {
    kind: RequestKind,
    prior: PriorAttributes,
}

#[derive(Debug)]
struct CallAttributes {
    running_state: RunningState,
    protocol_state: ProtocolState,
    video_state: VideoState,
    answer_type: AnswerType,
    muted: bool,
    conference: Option<ConferenceMembership>,
    pending: Option<PendingRequest>,
    disconnect_reason: Option<DisconnectReason>,
    created_at: DateTime<Utc>,
    began_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl CallAttributes {
    fn new(running_state: RunningState, protocol_state: ProtocolState, video_state: VideoState) -> Self {
        Self {
            running_state,
            protocol_state,
            video_state,
            answer_type: AnswerType::Missed,
            muted: false,
            conference: None,
            pending: None,
            disconnect_reason: None,
            created_at: Utc::now(),
            began_at: None,
            ended_at: None,
        }
    }

    fn prior(&self) -> PriorAttributes {
        PriorAttributes {
            running_state: self.running_state,
            answer_type: self.answer_type,
            video_state: self.video_state,
            muted: self.muted,
            disconnect_reason: self.disconnect_reason.clone(),
        }
    }

    fn restore(&mut self, prior: PriorAttributes) {
        self.running_state = prior.running_state;
        self.answer_type = prior.answer_type;
        self.video_state = prior.video_state;
        self.muted = prior.muted;
        self.disconnect_reason = prior.disconnect_reason;
    }
}

#[derive(Debug)]
pub struct CallEntity {
    id: CallId,
    number: String,
    direction: CallDirection,
    slot_id: SlotId,
    emergency: bool,
    variant: CallVariant,
    attributes: Mutex<CallAttributes>,
}

impl CallEntity {
    /// Outgoing call, not yet handed to any channel
    pub fn outgoing(
        id: CallId,
        number: impl Into<String>,
        slot_id: SlotId,
        video_state: VideoState,
        emergency: bool,
        variant: CallVariant,
    ) -> Self {
        Self {
            id,
            number: number.into(),
            direction: CallDirection::Outgoing,
            slot_id,
            emergency,
            variant,
            attributes: Mutex::new(CallAttributes::new(
                RunningState::Create,
                ProtocolState::Idle,
                video_state,
            )),
        }
    }

    /// Network-originated call. `waiting` is set when another call is already up.
    pub fn incoming(
        id: CallId,
        number: impl Into<String>,
        slot_id: SlotId,
        video_state: VideoState,
        emergency: bool,
        waiting: bool,
        variant: CallVariant,
    ) -> Self {
        let protocol_state = if waiting {
            ProtocolState::Waiting
        } else {
            ProtocolState::Incoming
        };
        Self {
            id,
            number: number.into(),
            direction: CallDirection::Incoming,
            slot_id,
            emergency,
            variant,
            attributes: Mutex::new(CallAttributes::new(
                RunningState::Ringing,
                protocol_state,
                video_state,
            )),
        }
    }

    // Getters
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn kind(&self) -> CallKind {
        self.variant.kind()
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    pub fn capabilities(&self) -> Capabilities {
        self.variant.capabilities()
    }

    pub fn running_state(&self) -> RunningState {
        self.lock().running_state
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.lock().protocol_state
    }

    pub fn conference(&self) -> Option<ConferenceMembership> {
        self.lock().conference.clone()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let attrs = self.lock();
        CallSnapshot {
            call_id: self.id,
            number: self.number.clone(),
            kind: self.kind(),
            direction: self.direction,
            slot_id: self.slot_id,
            emergency: self.emergency,
            running_state: attrs.running_state,
            protocol_state: attrs.protocol_state,
            video_state: attrs.video_state,
            answer_type: attrs.answer_type,
            muted: attrs.muted,
            conference: attrs.conference.clone(),
            pending_request: attrs.pending.as_ref().map(|p| p.kind),
            created_at: attrs.created_at,
            began_at: attrs.began_at,
            ended_at: attrs.ended_at,
        }
    }

    /// Final record handed to observers once the call is gone
    pub fn disconnect_details(&self) -> DisconnectDetails {
        let attrs = self.lock();
        DisconnectDetails {
            call_id: self.id,
            number: self.number.clone(),
            kind: self.kind(),
            direction: self.direction,
            slot_id: self.slot_id,
            emergency: self.emergency,
            answer_type: attrs.answer_type,
            reason: attrs
                .disconnect_reason
                .clone()
                .unwrap_or(DisconnectReason::RemoteRelease),
            created_at: attrs.created_at,
            began_at: attrs.began_at,
            ended_at: attrs.ended_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn dial(&self) -> Result<()> {
        let video_state = self.lock().video_state;
        self.request(
            ChannelCommand::Dial {
                video_state,
                emergency: self.emergency,
            },
            |attrs| expect_state(self.id, attrs, &[RunningState::Create]),
            |attrs| attrs.running_state = RunningState::Connecting,
        )
    }

    pub fn answer(&self, video_state: VideoState) -> Result<()> {
        self.request(
            ChannelCommand::Answer { video_state },
            |attrs| expect_state(self.id, attrs, &[RunningState::Ringing]),
            |attrs| attrs.video_state = video_state,
        )
    }

    pub fn reject(&self, message: Option<String>) -> Result<()> {
        self.request(
            ChannelCommand::Reject { message },
            |attrs| expect_state(self.id, attrs, &[RunningState::Ringing]),
            |attrs| {
                attrs.answer_type = AnswerType::Rejected;
                attrs.disconnect_reason = Some(DisconnectReason::LocalReject);
            },
        )
    }

    pub fn hang_up(&self) -> Result<()> {
        self.request(
            ChannelCommand::HangUp,
            |attrs| {
                if attrs.running_state.is_terminating() {
                    return Err(CallError::StateConflict(format!(
                        "Call {} is already {}",
                        self.id, attrs.running_state
                    )));
                }
                Ok(())
            },
            |attrs| {
                attrs.running_state = RunningState::Disconnecting;
                attrs.disconnect_reason = Some(DisconnectReason::LocalHangUp);
            },
        )
    }

    pub fn hold(&self) -> Result<()> {
        self.request(
            ChannelCommand::Hold,
            |attrs| expect_state(self.id, attrs, &[RunningState::Active]),
            |_| {},
        )
    }

    pub fn unhold(&self) -> Result<()> {
        self.request(
            ChannelCommand::Unhold,
            |attrs| expect_state(self.id, attrs, &[RunningState::Holding]),
            |_| {},
        )
    }

    pub fn switch(&self) -> Result<()> {
        self.request(
            ChannelCommand::Switch,
            |attrs| expect_state(self.id, attrs, &[RunningState::Active, RunningState::Holding]),
            |_| {},
        )
    }

    pub fn start_dtmf(&self, digit: DtmfDigit) -> Result<()> {
        self.request(
            ChannelCommand::StartDtmf { digit },
            |attrs| expect_state(self.id, attrs, &[RunningState::Active]),
            |_| {},
        )
    }

    pub fn stop_dtmf(&self) -> Result<()> {
        self.request(
            ChannelCommand::StopDtmf,
            |attrs| expect_state(self.id, attrs, &[RunningState::Active]),
            |_| {},
        )
    }

    pub fn combine_conference(&self) -> Result<()> {
        self.request(
            ChannelCommand::Combine,
            |attrs| expect_state(self.id, attrs, &[RunningState::Active]),
            |_| {},
        )
    }

    pub fn separate_conference(&self) -> Result<()> {
        self.request(
            ChannelCommand::Separate,
            |attrs| {
                expect_state(self.id, attrs, &[RunningState::Active, RunningState::Holding])?;
                expect_conference(self.id, attrs)
            },
            |_| {},
        )
    }

    pub fn kick_out_from_conference(&self) -> Result<()> {
        self.request(
            ChannelCommand::KickOut,
            |attrs| {
                expect_state(self.id, attrs, &[RunningState::Active, RunningState::Holding])?;
                expect_conference(self.id, attrs)
            },
            |attrs| {
                attrs.running_state = RunningState::Disconnecting;
                attrs.disconnect_reason = Some(DisconnectReason::LocalHangUp);
            },
        )
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(
            ChannelCommand::SetMute { muted },
            |attrs| expect_state(self.id, attrs, &[RunningState::Active]),
            |attrs| attrs.muted = muted,
        )
    }

    /// Ask for a new media mode; committed by `commit_video_state` on ack
    pub fn update_media_mode(&self, video_state: VideoState) -> Result<()> {
        self.request(
            ChannelCommand::UpdateMediaMode { video_state },
            |attrs| {
                expect_state(self.id, attrs, &[RunningState::Active])?;
                if attrs.video_state == video_state {
                    return Err(CallError::StateConflict(format!(
                        "Call {} is already in {:?} mode",
                        self.id, video_state
                    )));
                }
                Ok(())
            },
            |_| {},
        )
    }

    /// Apply a bearer-reported signaling state
    ///
    /// Returns `Ok(None)` for a repeated report of the current state.
    pub fn commit_protocol_state(&self, next: ProtocolState) -> Result<Option<StateTransition>> {
        let mut attrs = self.lock();
        let prior = attrs.protocol_state;
        if prior == next {
            debug!("Call {} already in {}, report ignored", self.id, next);
            return Ok(None);
        }
        if !prior.can_transition_to(next) {
            return Err(CallError::StateConflict(format!(
                "Call {} cannot move from {} to {}",
                self.id, prior, next
            )));
        }

        let prior_running = attrs.running_state;
        let mapped = next.running_state().unwrap_or(prior_running);
        attrs.protocol_state = next;
        // a local hang-up in flight keeps the call in Disconnecting
        if !(prior_running == RunningState::Disconnecting && !mapped.is_terminating()) {
            attrs.running_state = mapped;
        }

        let now = Utc::now();
        if next == ProtocolState::Active && attrs.began_at.is_none() {
            attrs.began_at = Some(now);
            if self.direction == CallDirection::Incoming {
                attrs.answer_type = AnswerType::Active;
            }
        }
        if next == ProtocolState::Disconnected {
            attrs.ended_at = Some(now);
        }
        if attrs
            .pending
            .as_ref()
            .map_or(false, |pending| pending.kind.is_settled_by(next))
        {
            attrs.pending = None;
        }

        Ok(Some(StateTransition {
            prior,
            next,
            prior_running,
            running: attrs.running_state,
        }))
    }

    /// Undo the pending request after the bearer reported it failed
    ///
    /// A failure for anything other than the pending request is stale and
    /// returns `None`.
    pub fn roll_back(&self, request: RequestKind) -> Option<Rollback> {
        let mut attrs = self.lock();
        match attrs.pending.take() {
            Some(pending) if pending.kind == request => {
                let from = attrs.running_state;
                attrs.restore(pending.prior);
                Some(Rollback {
                    request,
                    from,
                    restored: attrs.running_state,
                })
            }
            other => {
                attrs.pending = other;
                None
            }
        }
    }

    /// Clear the pending request once an async result settled it
    pub fn settle(&self, request: RequestKind) -> bool {
        let mut attrs = self.lock();
        if attrs.pending.as_ref().map(|p| p.kind) == Some(request) {
            attrs.pending = None;
            return true;
        }
        false
    }

    pub fn commit_video_state(&self, video_state: VideoState) -> VideoState {
        let mut attrs = self.lock();
        if attrs.pending.as_ref().map(|p| p.kind) == Some(RequestKind::UpdateMediaMode) {
            attrs.pending = None;
        }
        std::mem::replace(&mut attrs.video_state, video_state)
    }

    pub fn set_conference(&self, membership: Option<ConferenceMembership>) {
        self.lock().conference = membership;
    }

    /// End the call without a bearer report (dial failure, refused admission)
    pub fn terminate(&self, reason: DisconnectReason) -> StateTransition {
        let mut attrs = self.lock();
        let transition = StateTransition {
            prior: attrs.protocol_state,
            next: ProtocolState::Disconnected,
            prior_running: attrs.running_state,
            running: RunningState::Disconnected,
        };
        if reason == DisconnectReason::Blocked {
            attrs.answer_type = AnswerType::Blocked;
        }
        attrs.protocol_state = ProtocolState::Disconnected;
        attrs.running_state = RunningState::Disconnected;
        attrs.disconnect_reason = Some(reason);
        attrs.pending = None;
        attrs.ended_at = Some(Utc::now());
        transition
    }

    fn request<A, M>(&self, command: ChannelCommand, admit: A, mutate: M) -> Result<()>
    where
        A: FnOnce(&CallAttributes) -> Result<()>,
        M: FnOnce(&mut CallAttributes),
    {
        let kind = command.request_kind();
        if !self.capabilities().allows(kind) {
            return Err(CallError::Unsupported(format!(
                "{} is not supported on {} call {}",
                kind,
                self.kind(),
                self.id
            )));
        }

        let (prior, previous_pending) = {
            let mut attrs = self.lock();
            admit(&attrs)?;
            if kind.is_tracked() {
                if let Some(pending) = &attrs.pending {
                    let supersedes = kind.is_termination() && !pending.kind.is_termination();
                    if !supersedes {
                        return Err(CallError::StateConflict(format!(
                            "Call {} already has {} in flight",
                            self.id, pending.kind
                        )));
                    }
                    debug!("Call {}: {} supersedes {}", self.id, kind, pending.kind);
                }
            }
            let prior = attrs.prior();
            let previous_pending = attrs.pending.clone();
            mutate(&mut attrs);
            if kind.is_tracked() {
                attrs.pending = Some(PendingRequest {
                    kind,
                    prior: prior.clone(),
                });
            }
            (prior, previous_pending)
        };

        let request = ChannelRequest {
            call_id: self.id,
            kind: self.kind(),
            slot_id: self.slot_id,
            number: self.number.clone(),
            command,
        };
        if let Err(err) = self.variant.send(request) {
            error!("Call {}: channel refused {}: {}", self.id, kind, err);
            let mut attrs = self.lock();
            attrs.restore(prior);
            attrs.pending = previous_pending;
            return Err(err);
        }

        info!("Call {}: {} sent", self.id, kind);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, CallAttributes> {
        self.attributes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expect_state(id: CallId, attrs: &CallAttributes, allowed: &[RunningState]) -> Result<()> {
    if allowed.contains(&attrs.running_state) {
        return Ok(());
    }
    Err(CallError::StateConflict(format!(
        "Call {} is {}",
        id, attrs.running_state
    )))
}

fn expect_conference(id: CallId, attrs: &CallAttributes) -> Result<()> {
    if attrs.conference.is_none() {
        return Err(CallError::StateConflict(format!(
            "Call {} is not in a conference",
            id
        )));
    }
    Ok(())
}
