//! Call orchestrator
//!
//! Command surface for the dialer UI and inbound surface for the bearer.
//! Commands resolve their target call, run admission against a registry
//! snapshot and then hand the request to the entity. Observer hooks always
//! run after every lock has been released.

use super::command::{DialOptions, Dispatch};
use super::context::CallContext;
use super::observers::ObserverSet;
use super::privacy::{DeferredRequest, DeferredRequests};
use crate::config::Config;
use crate::domain::admission::{self, AdmissionPolicy, Preemption};
use crate::domain::call::entity::{CallEntity, CallSnapshot};
use crate::domain::call::event::{CallEvent, CallEventKind, PreemptAction};
use crate::domain::call::value_object::{
    CallKind, ConferenceState, DisconnectReason, ProtocolState, RequestKind, RunningState,
    VideoState,
};
use crate::domain::call::variant::{CallVariant, CarrierCall, CompanionCall};
use crate::domain::conference::{CombineStart, ConferenceCoordinator, ConferenceDirectory};
use crate::domain::ports::{
    AsyncResultPayload, BearerChannel, CallObserver, CompanionChannel, IncomingCallInfo,
    PrivacyGuard,
};
use crate::domain::registry::{CallRegistry, RegistrySnapshot};
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, PrivacyTicket};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct CallOrchestrator {
    config: Config,
    policy: AdmissionPolicy,
    registry: CallRegistry,
    conferences: ConferenceDirectory,
    bearer: Option<Arc<dyn BearerChannel>>,
    companion: Option<Arc<dyn CompanionChannel>>,
    privacy: Option<Arc<dyn PrivacyGuard>>,
    observers: ObserverSet,
    deferred: DeferredRequests,
}

impl CallOrchestrator {
    pub fn new(context: CallContext) -> Self {
        let CallContext {
            config,
            bearer,
            companion,
            privacy,
            observers,
        } = context;
        let conferences = ConferenceDirectory::new(vec![
            ConferenceCoordinator::new(CallKind::Cs, config.conference.cs_max_sub_calls),
            ConferenceCoordinator::new(CallKind::Ims, config.conference.ims_max_sub_calls),
        ]);

        Self {
            policy: AdmissionPolicy::new(config.admission.clone(), config.numbers.clone()),
            registry: CallRegistry::new(config.admission.max_call_count),
            conferences,
            bearer,
            companion,
            privacy,
            observers: ObserverSet::new(observers),
            deferred: DeferredRequests::default(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn add_observer(&self, observer: Arc<dyn CallObserver>) {
        self.observers.add(observer);
    }

    // ----- commands -----

    /// Place an outgoing call
    ///
    /// Emergency calls skip the privacy check and end every other call once registered.
    pub fn dial_call(&self, number: &str, options: DialOptions) -> Result<Dispatch<CallId>> {
        let number = number.trim();
        self.policy.check_number(number, options.kind)?;
        self.policy.check_slot(options.slot_id, options.kind)?;
        let options = DialOptions {
            emergency: options.emergency || self.policy.is_emergency_number(number),
            ..options
        };
        self.policy
            .can_dial(&self.registry.snapshot(), options.kind, options.emergency)?;

        if !options.emergency {
            let request = DeferredRequest::Dial {
                number: number.to_string(),
                options,
            };
            if let Some(ticket) = self.defer_if_private(request) {
                return Ok(Dispatch::Deferred(ticket));
            }
        }
        self.place_call(number, options).map(Dispatch::Sent)
    }

    /// Answer a ringing call, the oldest one when `call_id` is `None`
    pub fn answer_call(&self, call_id: Option<CallId>, video_state: VideoState) -> Result<Dispatch<CallId>> {
        let snapshot = self.registry.snapshot();
        let call_id = resolve_ringing(&snapshot, call_id)?;
        let entity = self.target(call_id, RequestKind::Answer)?;
        self.policy.can_answer(&snapshot, call_id)?;

        if !entity.is_emergency() {
            let request = DeferredRequest::Answer {
                call_id,
                video_state,
            };
            if let Some(ticket) = self.defer_if_private(request) {
                return Ok(Dispatch::Deferred(ticket));
            }
        }
        self.accept_call(&entity, video_state).map(Dispatch::Sent)
    }

    /// Reject a ringing call, optionally with a text reply
    pub fn reject_call(&self, call_id: Option<CallId>, message: Option<String>) -> Result<CallId> {
        let snapshot = self.registry.snapshot();
        let call_id = resolve_ringing(&snapshot, call_id)?;
        let entity = self.target(call_id, RequestKind::Reject)?;
        self.policy.can_reject(&snapshot, call_id, message.as_deref())?;

        entity.reject(message.clone())?;
        self.observers.call_event(&CallEvent::for_call(
            call_id,
            CallEventKind::IncomingCallRejected {
                with_message: message.is_some(),
                message,
            },
        ));
        Ok(call_id)
    }

    /// Hang up a call; without an id, the foreground or outgoing one
    pub fn hang_up_call(&self, call_id: Option<CallId>) -> Result<CallId> {
        let snapshot = self.registry.snapshot();
        let call_id = match call_id {
            Some(call_id) => call_id,
            None => admission::select_hang_up_target(&snapshot)
                .ok_or_else(|| CallError::NotFound("no call to hang up".to_string()))?,
        };
        let entity = self.target(call_id, RequestKind::HangUp)?;
        self.policy.can_hang_up(&snapshot, call_id)?;

        entity.hang_up()?;
        Ok(call_id)
    }

    pub fn hold_call(&self, call_id: CallId) -> Result<()> {
        let entity = self.target(call_id, RequestKind::Hold)?;
        self.policy.can_hold(&self.registry.snapshot(), call_id)?;
        entity.hold()
    }

    pub fn unhold_call(&self, call_id: CallId) -> Result<()> {
        let entity = self.target(call_id, RequestKind::Unhold)?;
        self.policy.can_unhold(&self.registry.snapshot(), call_id)?;
        entity.unhold()
    }

    /// Swap the active and the held call of the same family
    pub fn switch_call(&self, call_id: CallId) -> Result<()> {
        let entity = self.target(call_id, RequestKind::Switch)?;
        self.policy.can_switch(&self.registry.snapshot(), call_id)?;
        entity.switch()
    }

    /// Merge `main_call_id` with the held calls of its family
    ///
    /// A combine issued while another is still being created is a no-op.
    pub fn combine_conference(&self, main_call_id: CallId) -> Result<()> {
        let entity = self.target(main_call_id, RequestKind::Combine)?;
        let coordinator = self.coordinator_for(entity.kind())?;
        if coordinator.state() == ConferenceState::Creating {
            debug!("Call {}: combine coalesced", main_call_id);
            return Ok(());
        }
        self.policy.can_combine(
            &self.registry.snapshot(),
            main_call_id,
            coordinator.max_sub_calls(),
        )?;

        if coordinator.begin_combine(main_call_id) == CombineStart::Coalesced {
            return Ok(());
        }
        if let Err(err) = entity.combine_conference() {
            coordinator.abort_combine();
            return Err(err);
        }
        self.publish_conference(coordinator);
        Ok(())
    }

    /// Split a member off the conference; it stays up as a normal call
    pub fn separate_conference(&self, call_id: CallId) -> Result<()> {
        let entity = self.target(call_id, RequestKind::Separate)?;
        self.policy
            .can_leave_conference(&self.registry.snapshot(), call_id)?;
        let coordinator = self.coordinator_for(entity.kind())?;

        coordinator.separate(call_id)?;
        if let Err(err) = entity.separate_conference() {
            coordinator.rejoin(call_id);
            return Err(err);
        }
        self.publish_conference(coordinator);
        Ok(())
    }

    /// Drop a member from the conference and end its call
    pub fn kick_out_from_conference(&self, call_id: CallId) -> Result<()> {
        let entity = self.target(call_id, RequestKind::KickOut)?;
        self.policy
            .can_leave_conference(&self.registry.snapshot(), call_id)?;
        let coordinator = self.coordinator_for(entity.kind())?;

        coordinator.separate(call_id)?;
        if let Err(err) = entity.kick_out_from_conference() {
            coordinator.rejoin(call_id);
            return Err(err);
        }
        self.publish_conference(coordinator);
        Ok(())
    }

    pub fn start_dtmf(&self, call_id: CallId, digit: char) -> Result<()> {
        let entity = self.target(call_id, RequestKind::StartDtmf)?;
        let digit = self
            .policy
            .can_send_dtmf(&self.registry.snapshot(), call_id, digit)?;
        entity.start_dtmf(digit)
    }

    pub fn stop_dtmf(&self, call_id: CallId) -> Result<()> {
        let entity = self.target(call_id, RequestKind::StopDtmf)?;
        self.policy.can_stop_dtmf(&self.registry.snapshot(), call_id)?;
        entity.stop_dtmf()
    }

    /// Mute or unmute the foreground call. Returns the call it applied to.
    pub fn set_muted(&self, muted: bool) -> Result<CallId> {
        let call_id = admission::select_foreground_call(&self.registry.snapshot())
            .ok_or_else(|| CallError::NotFound("no active call to mute".to_string()))?;
        let entity = self.target(call_id, RequestKind::SetMute)?;

        entity.set_muted(muted)?;
        self.observers.call_event(&CallEvent::for_call(
            call_id,
            CallEventKind::MuteChanged { muted },
        ));
        Ok(call_id)
    }

    /// Ask to renegotiate the media mode of an active IMS call
    pub fn update_call_media_mode(&self, call_id: CallId, video_state: VideoState) -> Result<()> {
        let entity = self.target(call_id, RequestKind::UpdateMediaMode)?;
        entity.update_media_mode(video_state)
    }

    // ----- queries -----

    pub fn get_main_call_id(&self, call_id: CallId) -> Result<Option<CallId>> {
        Ok(self
            .conference_of(call_id)?
            .and_then(|coordinator| coordinator.main_call_id()))
    }

    pub fn get_sub_call_id_list(&self, call_id: CallId) -> Result<Vec<CallId>> {
        Ok(self
            .conference_of(call_id)?
            .map(|coordinator| coordinator.sub_call_ids())
            .unwrap_or_default())
    }

    pub fn get_call_id_list_for_conference(&self, call_id: CallId) -> Result<Vec<CallId>> {
        Ok(self
            .conference_of(call_id)?
            .map(|coordinator| coordinator.call_ids())
            .unwrap_or_default())
    }

    pub fn conference_state(&self, kind: CallKind) -> ConferenceState {
        self.conferences
            .for_kind(kind)
            .map_or(ConferenceState::Idle, |coordinator| coordinator.state())
    }

    pub fn get_call_snapshot(&self, call_id: CallId) -> Result<CallSnapshot> {
        Ok(self.registry.get(call_id)?.snapshot())
    }

    pub fn get_all_calls(&self) -> Vec<CallSnapshot> {
        self.registry.snapshot().calls
    }

    pub fn has_pending_new_call(&self) -> bool {
        self.registry.has_pending_new_call()
    }

    // ----- privacy -----

    /// The user answered the privacy exit prompt for `ticket`
    ///
    /// On confirmation the parked request goes through admission again and
    /// the id of the call it acted on is returned. On refusal it is dropped.
    pub fn confirm_privacy_exit(&self, ticket: PrivacyTicket, confirmed: bool) -> Result<Option<CallId>> {
        let request = self
            .deferred
            .take(ticket)
            .ok_or_else(|| CallError::NotFound(format!("privacy ticket {}", ticket)))?;

        if !confirmed {
            info!("{} for privacy ticket {} cancelled", request.kind(), ticket);
            self.observers.call_event(&CallEvent::new(
                request.call_id(),
                CallEventKind::PrivacyRequestCancelled { ticket },
            ));
            return Ok(None);
        }

        let call_id = match request {
            DeferredRequest::Dial { number, options } => self.place_call(&number, options)?,
            DeferredRequest::Answer {
                call_id,
                video_state,
            } => {
                let entity = self.target(call_id, RequestKind::Answer)?;
                self.accept_call(&entity, video_state)?
            }
        };
        Ok(Some(call_id))
    }

    /// Privacy mode was entered or left
    ///
    /// Entering it ends every call except emergency and OTT ones. Returns the
    /// calls that were asked to end.
    pub fn on_privacy_mode_changed(&self, elevated: bool) -> Vec<CallId> {
        if !elevated {
            debug!("Privacy mode left");
            return Vec::new();
        }

        let mut closed = Vec::new();
        for call in self.registry.snapshot().calls {
            if call.emergency || call.kind == CallKind::Ott || call.running_state.is_terminating() {
                continue;
            }
            let Ok(entity) = self.registry.get(call.call_id) else {
                continue;
            };
            let result = if call.running_state == RunningState::Ringing {
                entity.reject(None)
            } else {
                entity.hang_up()
            };
            match result {
                Ok(()) => closed.push(call.call_id),
                Err(err) => warn!("Call {}: could not close for privacy mode: {}", call.call_id, err),
            }
        }
        info!("Privacy mode elevated, {} calls closed", closed.len());
        closed
    }

    // ----- inbound -----

    /// A bearer or the companion service reported a new call
    ///
    /// A call refused at admission is rejected towards the network, reported
    /// as destroyed and never registered.
    pub fn on_new_incoming_call(&self, info: IncomingCallInfo) -> Result<CallId> {
        let IncomingCallInfo {
            number,
            kind,
            slot_id,
            video_state,
        } = info;
        let variant = self.variant_for(kind)?;
        let emergency = self.policy.is_emergency_number(&number);
        let waiting = self
            .registry
            .snapshot()
            .calls
            .iter()
            .any(|call| matches!(call.running_state, RunningState::Active | RunningState::Holding));

        let call_id = self.registry.allocate_id();
        let entity = Arc::new(CallEntity::incoming(
            call_id,
            number.clone(),
            slot_id,
            video_state,
            emergency,
            waiting,
            variant,
        ));

        let policy = &self.policy;
        match self
            .registry
            .add_if(entity.clone(), |current| policy.can_accept_incoming(current, &number, kind))
        {
            Ok(()) => {}
            Err(CallError::ResourceExhausted(reason)) => {
                warn!("Incoming {} call {} from {} blocked: {}", kind, call_id, number, reason);
                if let Err(err) = entity.reject(None) {
                    debug!("Call {}: blocked call not rejected: {}", call_id, err);
                }
                entity.terminate(DisconnectReason::Blocked);
                self.observers.call_destroyed(&entity.disconnect_details());
                return Err(CallError::ResourceExhausted(reason));
            }
            Err(err) => return Err(err),
        }

        info!("Incoming {} call {} from {}", kind, call_id, number);
        let snapshot = entity.snapshot();
        self.observers.new_call_created(&snapshot);
        self.observers
            .call_state_updated(&snapshot, ProtocolState::Idle, snapshot.protocol_state);
        Ok(call_id)
    }

    /// The bearer reported a signaling state change
    ///
    /// `prior` is what the bearer believes the state was. The core's own
    /// record wins; a mismatch is only logged.
    pub fn on_call_state_changed(&self, call_id: CallId, prior: ProtocolState, next: ProtocolState) -> Result<()> {
        let entity = self.registry.get(call_id)?;
        let current = entity.protocol_state();
        if current != prior {
            debug!(
                "Call {}: bearer reported {} -> {}, core has {}",
                call_id, prior, next, current
            );
        }

        let transition = entity.commit_protocol_state(next).map_err(|err| {
            warn!("Call {}: state report refused: {}", call_id, err);
            err
        })?;
        let Some(transition) = transition else {
            return Ok(());
        };

        debug!(
            "Call {}: {} -> {} ({})",
            call_id, transition.prior, transition.next, transition.running
        );
        self.observers
            .call_state_updated(&entity.snapshot(), transition.prior, transition.next);
        if next == ProtocolState::Disconnected {
            self.reap(&entity);
        }
        Ok(())
    }

    /// The bearer answered an earlier request asynchronously
    pub fn on_async_result(&self, result_id: u64, payload: AsyncResultPayload) -> Result<()> {
        match payload {
            AsyncResultPayload::CombineConference {
                main_call_id,
                success,
            } => self.finish_combine(main_call_id, success),
            AsyncResultPayload::SeparateConference { call_id, success } => {
                self.finish_separate(call_id, success)
            }
            AsyncResultPayload::VideoModeChanged {
                call_id,
                video_state,
                success,
            } => self.finish_media_mode(call_id, video_state, success),
            AsyncResultPayload::RequestFailed {
                call_id,
                request,
                reason,
            } => self.fail_request(call_id, request, &reason),
            payload => {
                let call_id = match &payload {
                    AsyncResultPayload::DtmfAck { call_id, .. } => Some(*call_id),
                    _ => None,
                };
                debug!("Async result {} forwarded to observers", result_id);
                self.observers.call_event(&CallEvent::new(
                    call_id,
                    CallEventKind::AsyncResult { result_id, payload },
                ));
                Ok(())
            }
        }
    }

    // ----- internals -----

    fn place_call(&self, number: &str, options: DialOptions) -> Result<CallId> {
        let DialOptions {
            kind,
            slot_id,
            video_state,
            emergency,
        } = options;
        let variant = self.variant_for(kind)?;
        self.policy
            .can_dial(&self.registry.snapshot(), kind, emergency)?;

        let call_id = self.registry.allocate_id();
        let entity = Arc::new(CallEntity::outgoing(
            call_id,
            number,
            slot_id,
            video_state,
            emergency,
            variant,
        ));
        let policy = &self.policy;
        self.registry
            .add_if(entity.clone(), |current| policy.can_dial(current, kind, emergency))?;
        self.observers.new_call_created(&entity.snapshot());

        // only a registered call may end others
        let current = self.registry.snapshot();
        let preemptions = if emergency {
            self.policy.emergency_preemptions(&current)
        } else {
            self.policy.voip_preemptions(&current, kind)
        };
        self.preempt(call_id, preemptions);
        if let Err(err) = entity.dial() {
            self.end_call(&entity, DisconnectReason::DialFailed(err.to_string()));
            return Err(err);
        }
        info!("Call {} to {} placed ({})", call_id, number, kind);
        Ok(call_id)
    }

    fn accept_call(&self, entity: &CallEntity, video_state: VideoState) -> Result<CallId> {
        let call_id = entity.id();
        let snapshot = self.registry.snapshot();
        self.policy.can_answer(&snapshot, call_id)?;

        let mut preemptions = self.policy.voip_preemptions(&snapshot, entity.kind());
        preemptions.extend(self.policy.satellite_preemptions(&snapshot, call_id));
        self.preempt(call_id, preemptions);

        entity.answer(video_state)?;
        self.observers.call_event(&CallEvent::for_call(
            call_id,
            CallEventKind::IncomingCallAnswered { video_state },
        ));
        Ok(call_id)
    }

    /// End the calls in `preemptions` to make room for `by`
    fn preempt(&self, by: CallId, preemptions: Vec<Preemption>) {
        for Preemption { call_id, action } in preemptions {
            let Ok(entity) = self.registry.get(call_id) else {
                continue;
            };
            let result = match action {
                PreemptAction::Rejected => entity.reject(None),
                PreemptAction::HungUp => entity.hang_up(),
            };
            match result {
                Ok(()) => {
                    info!("Call {} preempted by call {} ({:?})", call_id, by, action);
                    self.observers.call_event(&CallEvent::for_call(
                        call_id,
                        CallEventKind::CallPreempted { by, action },
                    ));
                }
                Err(err) => warn!("Call {}: preemption by call {} failed: {}", call_id, by, err),
            }
        }
    }

    fn defer_if_private(&self, request: DeferredRequest) -> Option<PrivacyTicket> {
        let guard = self.privacy.as_ref()?;
        if !guard.is_elevated() {
            return None;
        }

        let ticket = PrivacyTicket::new();
        let kind = request.kind();
        let call_id = request.call_id();
        self.deferred.insert(ticket, request);
        info!("{} parked until privacy mode is left, ticket {}", kind, ticket);
        guard.request_exit(ticket);
        self.observers.call_event(&CallEvent::new(
            call_id,
            CallEventKind::PrivacyDeferred {
                ticket,
                request: kind,
            },
        ));
        Some(ticket)
    }

    fn finish_combine(&self, main_call_id: CallId, success: bool) -> Result<()> {
        if !success {
            return self.fail_request(main_call_id, RequestKind::Combine, "combine refused by the network");
        }
        let entity = self.registry.get(main_call_id)?;
        let coordinator = self.coordinator_for(entity.kind())?;
        entity.settle(RequestKind::Combine);

        let kind = entity.kind();
        let members: Vec<CallId> = self
            .registry
            .snapshot()
            .calls
            .iter()
            .filter(|call| call.kind == kind)
            .filter(|call| matches!(call.running_state, RunningState::Active | RunningState::Holding))
            .map(|call| call.call_id)
            .collect();
        coordinator.commit_combine(main_call_id, members)?;
        self.publish_conference(coordinator);
        Ok(())
    }

    fn finish_separate(&self, call_id: CallId, success: bool) -> Result<()> {
        if !success {
            return self.fail_request(call_id, RequestKind::Separate, "separate refused by the network");
        }
        let entity = self.registry.get(call_id)?;
        entity.settle(RequestKind::Separate);
        if let Some(coordinator) = self.conferences.for_kind(entity.kind()) {
            coordinator.settle_separation(call_id);
        }
        Ok(())
    }

    fn finish_media_mode(&self, call_id: CallId, video_state: VideoState, success: bool) -> Result<()> {
        if !success {
            return self.fail_request(
                call_id,
                RequestKind::UpdateMediaMode,
                "media mode change refused by the network",
            );
        }
        let entity = self.registry.get(call_id)?;
        let previous = entity.commit_video_state(video_state);
        if previous != video_state {
            info!("Call {}: media mode {:?} -> {:?}", call_id, previous, video_state);
            self.observers.call_event(&CallEvent::for_call(
                call_id,
                CallEventKind::VideoStateChanged { video_state },
            ));
        }
        Ok(())
    }

    /// Undo a request the bearer could not carry out
    ///
    /// A failed dial has no prior state to return to and ends the call.
    /// Failures for anything but the pending request are stale and ignored.
    fn fail_request(&self, call_id: CallId, request: RequestKind, reason: &str) -> Result<()> {
        let entity = self.registry.get(call_id)?;

        if request == RequestKind::Dial {
            if entity.snapshot().pending_request != Some(RequestKind::Dial) {
                debug!("Call {}: stale dial failure ignored", call_id);
                return Ok(());
            }
            warn!("Call {}: dial failed: {}", call_id, reason);
            self.end_call(&entity, DisconnectReason::DialFailed(reason.to_string()));
            return Ok(());
        }

        let Some(rollback) = entity.roll_back(request) else {
            debug!("Call {}: stale {} failure ignored", call_id, request);
            return Ok(());
        };
        warn!(
            "Call {}: {} failed ({}), {} -> {}",
            call_id, request, reason, rollback.from, rollback.restored
        );

        if let Some(coordinator) = self.conferences.for_kind(entity.kind()) {
            match request {
                RequestKind::Combine => {
                    coordinator.abort_combine();
                    self.publish_conference(coordinator);
                }
                RequestKind::Separate | RequestKind::KickOut => {
                    if coordinator.rejoin(call_id).is_some() {
                        self.publish_conference(coordinator);
                    }
                }
                _ => {}
            }
        }

        self.observers.call_event(&CallEvent::for_call(
            call_id,
            CallEventKind::RequestRolledBack {
                request,
                reason: reason.to_string(),
                restored: rollback.restored,
            },
        ));
        Ok(())
    }

    /// End a call that never got a Disconnected report and drop it
    fn end_call(&self, entity: &CallEntity, reason: DisconnectReason) {
        let transition = entity.terminate(reason);
        self.observers
            .call_state_updated(&entity.snapshot(), transition.prior, transition.next);
        self.reap(entity);
    }

    /// Remove a disconnected call from every book, then from the registry
    fn reap(&self, entity: &CallEntity) {
        let call_id = entity.id();
        if let Some(coordinator) = self.conferences.for_kind(entity.kind()) {
            if coordinator.leave(call_id) {
                self.publish_conference(coordinator);
            }
        }
        for ticket in self.deferred.discard_for_call(call_id) {
            debug!("Call {}: parked request {} dropped", call_id, ticket);
        }

        self.observers.call_destroyed(&entity.disconnect_details());
        if let Err(err) = self.registry.remove(call_id) {
            debug!("Call {}: {}", call_id, err);
        }
        info!("Call {} destroyed", call_id);
    }

    /// Copy the coordinator's membership onto its family's entities and
    /// report the conference state
    fn publish_conference(&self, coordinator: &ConferenceCoordinator) {
        let membership = coordinator.membership();
        for entity in self.registry.get_all() {
            if entity.kind() != coordinator.kind() {
                continue;
            }
            let call_id = entity.id();
            let next = membership
                .as_ref()
                .filter(|m| m.is_main(call_id) || m.sub_call_ids.contains(&call_id))
                .cloned();
            if entity.conference() != next {
                entity.set_conference(next);
            }
        }

        let main_call_id = coordinator.main_call_id();
        self.observers.call_event(&CallEvent::new(
            main_call_id,
            CallEventKind::ConferenceStateChanged {
                kind: coordinator.kind(),
                state: coordinator.state(),
                main_call_id,
            },
        ));
    }

    fn variant_for(&self, kind: CallKind) -> Result<CallVariant> {
        if kind.is_carrier() {
            let bearer = self
                .bearer
                .clone()
                .ok_or_else(|| {
                    error!("No bearer channel wired in for {} call", kind);
                    CallError::missing_collaborator("bearer channel")
                })?;
            return Ok(CallVariant::Carrier(CarrierCall::new(kind, bearer)));
        }
        if kind.is_companion() {
            let companion = self
                .companion
                .clone()
                .ok_or_else(|| {
                    error!("No companion channel wired in for {} call", kind);
                    CallError::missing_collaborator("companion channel")
                })?;
            return Ok(CallVariant::Companion(CompanionCall::new(kind, companion)));
        }
        Ok(CallVariant::Ott)
    }

    /// Look up a call and make sure its variant supports `request`
    fn target(&self, call_id: CallId, request: RequestKind) -> Result<Arc<CallEntity>> {
        let entity = self.registry.get(call_id)?;
        if !entity.capabilities().allows(request) {
            return Err(CallError::Unsupported(format!(
                "{} is not supported on {} call {}",
                request,
                entity.kind(),
                call_id
            )));
        }
        Ok(entity)
    }

    fn coordinator_for(&self, kind: CallKind) -> Result<&ConferenceCoordinator> {
        self.conferences
            .for_kind(kind)
            .ok_or_else(|| CallError::Unsupported(format!("{} calls have no conferences", kind)))
    }

    fn conference_of(&self, call_id: CallId) -> Result<Option<&ConferenceCoordinator>> {
        let entity = self.registry.get(call_id)?;
        Ok(self
            .conferences
            .for_kind(entity.kind())
            .filter(|coordinator| coordinator.contains(call_id)))
    }
}

fn resolve_ringing(snapshot: &RegistrySnapshot, call_id: Option<CallId>) -> Result<CallId> {
    match call_id {
        Some(call_id) => Ok(call_id),
        None => admission::select_ringing_call(snapshot)
            .ok_or_else(|| CallError::NotFound("no ringing call".to_string())),
    }
}
