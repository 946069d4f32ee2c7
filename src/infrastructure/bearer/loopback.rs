//! Loopback bearer
//!
//! Stands in for the radio bearer and the companion service. Requests are
//! queued on an mpsc channel and answered by a network task that reports
//! back through the orchestrator's inbound surface, the way a cooperative
//! network would.

use crate::application::CallOrchestrator;
use crate::domain::call::value_object::{CallKind, ProtocolState, RequestKind, RunningState};
use crate::domain::ports::{
    AsyncResultPayload, BearerChannel, ChannelCommand, ChannelRequest, CompanionChannel,
    IncomingCallInfo,
};
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum NetworkInput {
    Request(ChannelRequest),
    Incoming {
        info: IncomingCallInfo,
        reply: oneshot::Sender<Result<CallId>>,
    },
    /// Remote party released the call
    Release(CallId),
    Shutdown,
}

type FailureSet = Arc<Mutex<HashSet<RequestKind>>>;

fn stopped() -> CallError {
    CallError::Internal("loopback network stopped".to_string())
}

/// Channel side handed to the orchestrator
#[derive(Clone)]
pub struct LoopbackBearer {
    inputs: mpsc::UnboundedSender<NetworkInput>,
    failures: FailureSet,
}

impl LoopbackBearer {
    /// Bearer plus the network that answers it; requests are answered
    /// `latency` after they are picked up
    pub fn new(latency: Duration) -> (Self, LoopbackNetwork) {
        let (inputs, receiver) = mpsc::unbounded_channel();
        let failures = FailureSet::default();
        let bearer = Self {
            inputs,
            failures: failures.clone(),
        };
        let network = LoopbackNetwork {
            inputs: receiver,
            latency,
            auto_answer: true,
            failures,
            next_result_id: 1,
        };
        (bearer, network)
    }

    /// Make the network refuse the next request of this kind
    pub fn fail_next(&self, request: RequestKind) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request);
    }

    /// Deliver a network-originated call and wait for the core's verdict
    pub async fn inject_incoming(&self, info: IncomingCallInfo) -> Result<CallId> {
        let (reply, verdict) = oneshot::channel();
        self.inputs
            .send(NetworkInput::Incoming { info, reply })
            .map_err(|_| stopped())?;
        verdict.await.map_err(|_| stopped())?
    }

    /// Remote party hangs up
    pub fn release(&self, call_id: CallId) -> Result<()> {
        self.inputs
            .send(NetworkInput::Release(call_id))
            .map_err(|_| stopped())
    }

    pub fn shutdown(&self) {
        if self.inputs.send(NetworkInput::Shutdown).is_err() {
            debug!("Loopback network already stopped");
        }
    }

    fn queue(&self, request: ChannelRequest) -> Result<()> {
        self.inputs
            .send(NetworkInput::Request(request))
            .map_err(|_| stopped())
    }
}

impl BearerChannel for LoopbackBearer {
    fn submit(&self, request: ChannelRequest) -> Result<()> {
        self.queue(request)
    }
}

impl CompanionChannel for LoopbackBearer {
    fn submit(&self, request: ChannelRequest) -> Result<()> {
        self.queue(request)
    }
}

/// Network side, run as a tokio task
pub struct LoopbackNetwork {
    inputs: mpsc::UnboundedReceiver<NetworkInput>,
    latency: Duration,
    auto_answer: bool,
    failures: FailureSet,
    next_result_id: u64,
}

impl LoopbackNetwork {
    /// Whether the remote party picks up outgoing calls (default: yes)
    pub fn with_auto_answer(mut self, auto_answer: bool) -> Self {
        self.auto_answer = auto_answer;
        self
    }

    pub fn spawn(self, orchestrator: Arc<CallOrchestrator>) -> JoinHandle<()> {
        tokio::spawn(self.run(orchestrator))
    }

    async fn run(mut self, orchestrator: Arc<CallOrchestrator>) {
        info!("Loopback network started, latency {:?}", self.latency);
        while let Some(input) = self.inputs.recv().await {
            match input {
                NetworkInput::Request(request) => {
                    if !self.latency.is_zero() {
                        tokio::time::sleep(self.latency).await;
                    }
                    self.answer(&orchestrator, request);
                }
                NetworkInput::Incoming { info, reply } => {
                    if reply.send(orchestrator.on_new_incoming_call(info)).is_err() {
                        debug!("Incoming call verdict dropped");
                    }
                }
                NetworkInput::Release(call_id) => {
                    self.report(&orchestrator, call_id, ProtocolState::Disconnected);
                }
                NetworkInput::Shutdown => break,
            }
        }
        info!("Loopback network stopped");
    }

    fn answer(&mut self, orchestrator: &CallOrchestrator, request: ChannelRequest) {
        let ChannelRequest {
            call_id,
            kind,
            command,
            ..
        } = request;
        let request_kind = command.request_kind();
        debug!("Loopback: {} for call {}", request_kind, call_id);

        if self.take_failure(request_kind) {
            self.result(
                orchestrator,
                AsyncResultPayload::RequestFailed {
                    call_id,
                    request: request_kind,
                    reason: "refused by loopback network".to_string(),
                },
            );
            return;
        }

        match command {
            ChannelCommand::Dial { .. } => {
                self.report(orchestrator, call_id, ProtocolState::Dialing);
                self.report(orchestrator, call_id, ProtocolState::Alerting);
                if self.auto_answer {
                    self.report(orchestrator, call_id, ProtocolState::Active);
                }
            }
            ChannelCommand::Answer { .. } => {
                // the foreground call of the family goes on hold
                for peer in peers(orchestrator, kind, call_id, RunningState::Active) {
                    self.report(orchestrator, peer, ProtocolState::Holding);
                }
                self.report(orchestrator, call_id, ProtocolState::Active);
            }
            ChannelCommand::Reject { .. } | ChannelCommand::HangUp | ChannelCommand::KickOut => {
                self.report(orchestrator, call_id, ProtocolState::Disconnecting);
                self.report(orchestrator, call_id, ProtocolState::Disconnected);
            }
            ChannelCommand::Hold => self.report(orchestrator, call_id, ProtocolState::Holding),
            ChannelCommand::Unhold => self.report(orchestrator, call_id, ProtocolState::Active),
            ChannelCommand::Switch => {
                let family = |state: RunningState| {
                    orchestrator
                        .get_all_calls()
                        .into_iter()
                        .filter(|call| call.kind == kind && call.running_state == state)
                        .map(|call| call.call_id)
                        .collect::<Vec<_>>()
                };
                let active = family(RunningState::Active);
                let held = family(RunningState::Holding);
                for call in active {
                    self.report(orchestrator, call, ProtocolState::Holding);
                }
                for call in held {
                    self.report(orchestrator, call, ProtocolState::Active);
                }
            }
            ChannelCommand::Combine => {
                for peer in peers(orchestrator, kind, call_id, RunningState::Holding) {
                    self.report(orchestrator, peer, ProtocolState::Active);
                }
                self.result(
                    orchestrator,
                    AsyncResultPayload::CombineConference {
                        main_call_id: call_id,
                        success: true,
                    },
                );
            }
            ChannelCommand::Separate => {
                // the rest of the conference is put on hold
                for peer in peers(orchestrator, kind, call_id, RunningState::Active) {
                    self.report(orchestrator, peer, ProtocolState::Holding);
                }
                self.result(
                    orchestrator,
                    AsyncResultPayload::SeparateConference {
                        call_id,
                        success: true,
                    },
                );
            }
            ChannelCommand::StartDtmf { .. } => self.result(
                orchestrator,
                AsyncResultPayload::DtmfAck {
                    call_id,
                    success: true,
                },
            ),
            ChannelCommand::UpdateMediaMode { video_state } => self.result(
                orchestrator,
                AsyncResultPayload::VideoModeChanged {
                    call_id,
                    video_state,
                    success: true,
                },
            ),
            ChannelCommand::StopDtmf | ChannelCommand::SetMute { .. } => {}
        }
    }

    fn take_failure(&self, request: RequestKind) -> bool {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request)
    }

    fn report(&self, orchestrator: &CallOrchestrator, call_id: CallId, next: ProtocolState) {
        let prior = match orchestrator.get_call_snapshot(call_id) {
            Ok(call) => call.protocol_state,
            Err(err) => {
                debug!("Loopback: {} not reported: {}", next, err);
                return;
            }
        };
        if let Err(err) = orchestrator.on_call_state_changed(call_id, prior, next) {
            warn!("Loopback: {} for call {} refused: {}", next, call_id, err);
        }
    }

    fn result(&mut self, orchestrator: &CallOrchestrator, payload: AsyncResultPayload) {
        let result_id = self.next_result_id;
        self.next_result_id += 1;
        if let Err(err) = orchestrator.on_async_result(result_id, payload) {
            warn!("Loopback: async result {} refused: {}", result_id, err);
        }
    }
}

/// Other calls of `kind` in `state`
fn peers(orchestrator: &CallOrchestrator, kind: CallKind, call_id: CallId, state: RunningState) -> Vec<CallId> {
    orchestrator
        .get_all_calls()
        .into_iter()
        .filter(|call| call.kind == kind && call.call_id != call_id && call.running_state == state)
        .map(|call| call.call_id)
        .collect()
}
