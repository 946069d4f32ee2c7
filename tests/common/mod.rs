//! Shared fixtures for the integration tests
#![allow(dead_code)]

use callcore::application::{CallContext, CallOrchestrator, DialOptions};
use callcore::config::Config;
use callcore::domain::call::{CallEvent, CallEventKind, CallKind, DisconnectDetails, ProtocolState};
use callcore::domain::call::entity::CallSnapshot;
use callcore::domain::ports::{
    BearerChannel, CallObserver, ChannelCommand, ChannelRequest, CompanionChannel,
    IncomingCallInfo, PrivacyGuard,
};
use callcore::domain::shared::value_objects::{CallId, PrivacyTicket};
use callcore::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Bearer and companion that accept everything and remember it
#[derive(Default)]
pub struct RecordingChannel {
    requests: Mutex<Vec<ChannelRequest>>,
}

impl RecordingChannel {
    pub fn requests(&self) -> Vec<ChannelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands_for(&self, call_id: CallId) -> Vec<ChannelCommand> {
        self.requests()
            .into_iter()
            .filter(|request| request.call_id == call_id)
            .map(|request| request.command)
            .collect()
    }

    fn record(&self, request: ChannelRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

impl BearerChannel for RecordingChannel {
    fn submit(&self, request: ChannelRequest) -> Result<()> {
        self.record(request)
    }
}

impl CompanionChannel for RecordingChannel {
    fn submit(&self, request: ChannelRequest) -> Result<()> {
        self.record(request)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Created(CallId),
    Updated(CallId, ProtocolState, ProtocolState),
    Destroyed(DisconnectDetails),
    Event(Option<CallId>, CallEventKind),
}

#[derive(Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<Report>>,
}

impl RecordingObserver {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn reports_for(&self, call_id: CallId) -> Vec<Report> {
        self.reports()
            .into_iter()
            .filter(|report| match report {
                Report::Created(id) | Report::Updated(id, _, _) => *id == call_id,
                Report::Destroyed(details) => details.call_id == call_id,
                Report::Event(id, _) => *id == Some(call_id),
            })
            .collect()
    }

    pub fn events(&self) -> Vec<CallEventKind> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::Event(_, kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<DisconnectDetails> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::Destroyed(details) => Some(details),
                _ => None,
            })
            .collect()
    }

    fn push(&self, report: Report) {
        self.reports.lock().unwrap().push(report);
    }
}

impl CallObserver for RecordingObserver {
    fn on_new_call_created(&self, call: &CallSnapshot) {
        self.push(Report::Created(call.call_id));
    }

    fn on_call_state_updated(&self, call: &CallSnapshot, prior: ProtocolState, next: ProtocolState) {
        self.push(Report::Updated(call.call_id, prior, next));
    }

    fn on_call_destroyed(&self, details: &DisconnectDetails) {
        self.push(Report::Destroyed(details.clone()));
    }

    fn on_call_event(&self, event: &CallEvent) {
        self.push(Report::Event(event.call_id, event.kind.clone()));
    }
}

/// Privacy mode switch the test flips by hand
#[derive(Default)]
pub struct ManualPrivacyGuard {
    elevated: AtomicBool,
    prompts: Mutex<Vec<PrivacyTicket>>,
}

impl ManualPrivacyGuard {
    pub fn set_elevated(&self, elevated: bool) {
        self.elevated.store(elevated, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<PrivacyTicket> {
        self.prompts.lock().unwrap().clone()
    }
}

impl PrivacyGuard for ManualPrivacyGuard {
    fn is_elevated(&self) -> bool {
        self.elevated.load(Ordering::SeqCst)
    }

    fn request_exit(&self, ticket: PrivacyTicket) {
        self.prompts.lock().unwrap().push(ticket);
    }
}

pub struct Harness {
    pub orchestrator: CallOrchestrator,
    pub channel: Arc<RecordingChannel>,
    pub observer: Arc<RecordingObserver>,
    pub privacy: Arc<ManualPrivacyGuard>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let channel = Arc::new(RecordingChannel::default());
        let observer = Arc::new(RecordingObserver::default());
        let privacy = Arc::new(ManualPrivacyGuard::default());
        let context = CallContext::new(config)
            .with_bearer(channel.clone())
            .with_companion(channel.clone())
            .with_privacy_guard(privacy.clone())
            .with_observer(observer.clone());
        Self {
            orchestrator: CallOrchestrator::new(context),
            channel,
            observer,
            privacy,
        }
    }

    /// Feed bearer reports, each one using the core's current state as prior
    pub fn report(&self, call_id: CallId, states: &[ProtocolState]) {
        for next in states {
            let prior = self
                .orchestrator
                .get_call_snapshot(call_id)
                .unwrap()
                .protocol_state;
            self.orchestrator
                .on_call_state_changed(call_id, prior, *next)
                .unwrap();
        }
    }

    pub fn dial(&self, number: &str, kind: CallKind) -> CallId {
        self.orchestrator
            .dial_call(number, DialOptions::new(kind))
            .unwrap()
            .sent()
            .unwrap()
    }

    pub fn active_outgoing(&self, number: &str, kind: CallKind) -> CallId {
        let call_id = self.dial(number, kind);
        self.report(call_id, &[ProtocolState::Dialing, ProtocolState::Active]);
        call_id
    }

    pub fn ringing(&self, number: &str, kind: CallKind) -> CallId {
        self.orchestrator
            .on_new_incoming_call(IncomingCallInfo::new(number, kind))
            .unwrap()
    }

    /// Bearer confirms a hang-up, reject or kick-out
    pub fn disconnect(&self, call_id: CallId) {
        self.report(
            call_id,
            &[ProtocolState::Disconnecting, ProtocolState::Disconnected],
        );
    }

    /// One active and one held call of `kind`, returned as (held, active)
    pub fn held_and_active(&self, kind: CallKind) -> (CallId, CallId) {
        let held = self.active_outgoing("10086", kind);
        self.orchestrator.hold_call(held).unwrap();
        self.report(held, &[ProtocolState::Holding]);
        let active = self.active_outgoing("10010", kind);
        (held, active)
    }
}
