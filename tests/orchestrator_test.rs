//! Call Orchestrator Integration Tests
//!
//! Drives the orchestrator through a recording channel and feeds the bearer
//! reports by hand.

mod common;

use callcore::application::{CallContext, CallOrchestrator, DialOptions, Dispatch};
use callcore::config::Config;
use callcore::domain::call::event::PreemptAction;
use callcore::domain::call::value_object::AnswerType;
use callcore::domain::call::{
    CallEventKind, CallKind, ConferenceState, DisconnectReason, ProtocolState, RequestKind,
    RunningState, VideoState,
};
use callcore::domain::ports::{AsyncResultPayload, ChannelCommand, IncomingCallInfo};
use callcore::domain::shared::value_objects::{CallId, SlotId};
use callcore::ErrorKind;
use common::{Harness, RecordingChannel, Report};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn running_state(harness: &Harness, call_id: CallId) -> RunningState {
    harness
        .orchestrator
        .get_call_snapshot(call_id)
        .unwrap()
        .running_state
}

fn combined_conference(harness: &Harness) -> (CallId, CallId) {
    let (held, active) = harness.held_and_active(CallKind::Cs);
    harness.orchestrator.combine_conference(active).unwrap();
    harness
        .orchestrator
        .on_async_result(
            1,
            AsyncResultPayload::CombineConference {
                main_call_id: active,
                success: true,
            },
        )
        .unwrap();
    (held, active)
}

#[test]
fn test_refused_dial_changes_nothing() {
    let harness = Harness::new();

    let err = harness
        .orchestrator
        .dial_call("12a45", DialOptions::new(CallKind::Cs))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(harness.orchestrator.registry().is_empty());
    assert!(harness.channel.requests().is_empty());
    assert!(harness.observer.reports().is_empty());
}

#[test]
fn test_slot_out_of_range() {
    let harness = Harness::new();

    let err = harness
        .orchestrator
        .dial_call("10086", DialOptions::new(CallKind::Cs).with_slot(SlotId::new(5)))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(harness.orchestrator.registry().is_empty());
}

#[test]
fn test_only_one_call_is_placed_at_a_time() {
    let harness = Harness::new();
    let first = harness.dial("10086", CallKind::Cs);

    let err = harness
        .orchestrator
        .dial_call("10010", DialOptions::new(CallKind::Cs))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert!(harness.orchestrator.has_pending_new_call());

    harness.report(first, &[ProtocolState::Dialing, ProtocolState::Active]);
    assert!(!harness.orchestrator.has_pending_new_call());
    harness.orchestrator.hold_call(first).unwrap();
    harness.report(first, &[ProtocolState::Holding]);

    let second = harness.dial("10010", CallKind::Cs);
    assert_ne!(first, second);
    assert_eq!(harness.orchestrator.registry().len(), 2);
}

#[test]
fn test_third_ringing_call_is_blocked() {
    let harness = Harness::new();
    harness.ringing("13900000001", CallKind::Cs);
    harness.ringing("13900000002", CallKind::Cs);

    let err = harness
        .orchestrator
        .on_new_incoming_call(IncomingCallInfo::new("13900000003", CallKind::Cs))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert_eq!(harness.orchestrator.registry().len(), 2);

    let destroyed = harness.observer.destroyed();
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].number, "13900000003");
    assert_eq!(destroyed[0].answer_type, AnswerType::Blocked);
    assert_eq!(destroyed[0].reason, DisconnectReason::Blocked);

    let blocked = destroyed[0].call_id;
    assert_eq!(
        harness.channel.commands_for(blocked),
        vec![ChannelCommand::Reject { message: None }]
    );
    assert!(!harness.observer.reports().contains(&Report::Created(blocked)));
}

#[test]
fn test_ringing_voip_call_does_not_block_carrier_call() {
    let harness = Harness::new();
    harness.ringing("alice@voip.example", CallKind::Voip);
    harness.ringing("13900000001", CallKind::Cs);

    let carrier = harness
        .orchestrator
        .on_new_incoming_call(IncomingCallInfo::new("13900000002", CallKind::Cs))
        .unwrap();
    assert_eq!(running_state(&harness, carrier), RunningState::Ringing);

    // two carrier calls ringing is still the limit
    let err = harness
        .orchestrator
        .on_new_incoming_call(IncomingCallInfo::new("13900000003", CallKind::Cs))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert_eq!(harness.orchestrator.registry().len(), 3);
}

#[test]
fn test_duplicate_incoming_number_is_refused() {
    let harness = Harness::new();
    harness.ringing("13900000001", CallKind::Cs);

    let err = harness
        .orchestrator
        .on_new_incoming_call(IncomingCallInfo::new("13900000001", CallKind::Cs))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Duplicate);
    assert_eq!(harness.orchestrator.registry().len(), 1);
}

#[test]
fn test_incoming_during_call_is_waiting() {
    let harness = Harness::new();
    harness.active_outgoing("10086", CallKind::Cs);

    let waiting = harness.ringing("13900000001", CallKind::Cs);

    let snapshot = harness.orchestrator.get_call_snapshot(waiting).unwrap();
    assert_eq!(snapshot.protocol_state, ProtocolState::Waiting);
    assert_eq!(snapshot.running_state, RunningState::Ringing);
    assert_eq!(
        harness.observer.reports_for(waiting),
        vec![
            Report::Created(waiting),
            Report::Updated(waiting, ProtocolState::Idle, ProtocolState::Waiting),
        ]
    );
}

#[test]
fn test_observer_sees_one_lifecycle() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Cs);

    harness.orchestrator.hang_up_call(None).unwrap();
    harness.disconnect(call_id);

    let reports = harness.observer.reports_for(call_id);
    assert_eq!(reports.first(), Some(&Report::Created(call_id)));
    assert!(matches!(reports.last(), Some(Report::Destroyed(details)) if details.call_id == call_id));
    let destroyed = reports
        .iter()
        .filter(|report| matches!(report, Report::Destroyed(_)))
        .count();
    assert_eq!(destroyed, 1);
    assert_eq!(
        reports[reports.len() - 2],
        Report::Updated(call_id, ProtocolState::Disconnecting, ProtocolState::Disconnected)
    );

    let err = harness.orchestrator.get_call_snapshot(call_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let late = harness.orchestrator.on_call_state_changed(
        call_id,
        ProtocolState::Disconnected,
        ProtocolState::Disconnected,
    );
    assert_eq!(late.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_remote_release_reason() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Cs);

    harness.report(call_id, &[ProtocolState::Disconnected]);

    let destroyed = harness.observer.destroyed();
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].reason, DisconnectReason::RemoteRelease);
    assert!(destroyed[0].began_at.is_some());
}

#[test]
fn test_invalid_report_is_refused() {
    let harness = Harness::new();
    let call_id = harness.ringing("13900000001", CallKind::Cs);

    let err = harness
        .orchestrator
        .on_call_state_changed(call_id, ProtocolState::Incoming, ProtocolState::Holding)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(running_state(&harness, call_id), RunningState::Ringing);
}

#[test]
fn test_hold_needs_switch_when_another_is_held() {
    let harness = Harness::new();
    let (held, active) = harness.held_and_active(CallKind::Cs);

    let err = harness.orchestrator.hold_call(active).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    harness.orchestrator.switch_call(active).unwrap();
    assert_eq!(harness.channel.commands_for(active).last(), Some(&ChannelCommand::Switch));
    assert_eq!(running_state(&harness, held), RunningState::Holding);
}

#[test]
fn test_failed_hold_is_rolled_back() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Cs);
    harness.orchestrator.hold_call(call_id).unwrap();

    harness
        .orchestrator
        .on_async_result(
            9,
            AsyncResultPayload::RequestFailed {
                call_id,
                request: RequestKind::Hold,
                reason: "no resources".to_string(),
            },
        )
        .unwrap();

    assert_eq!(running_state(&harness, call_id), RunningState::Active);
    assert!(harness.observer.events().iter().any(|event| matches!(
        event,
        CallEventKind::RequestRolledBack {
            request: RequestKind::Hold,
            restored: RunningState::Active,
            ..
        }
    )));
    // the call accepts a new request afterwards
    harness.orchestrator.hold_call(call_id).unwrap();
}

#[test]
fn test_stale_failure_is_ignored() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Cs);

    harness
        .orchestrator
        .on_async_result(
            3,
            AsyncResultPayload::RequestFailed {
                call_id,
                request: RequestKind::Unhold,
                reason: "late".to_string(),
            },
        )
        .unwrap();

    assert_eq!(running_state(&harness, call_id), RunningState::Active);
    assert!(harness
        .observer
        .events()
        .iter()
        .all(|event| !matches!(event, CallEventKind::RequestRolledBack { .. })));
}

#[test]
fn test_combine_builds_conference() {
    let harness = Harness::new();
    let (held, active) = harness.held_and_active(CallKind::Cs);

    harness.orchestrator.combine_conference(active).unwrap();
    assert_eq!(harness.orchestrator.conference_state(CallKind::Cs), ConferenceState::Creating);

    // a second combine while creating is coalesced
    harness.orchestrator.combine_conference(active).unwrap();
    let combines = harness
        .channel
        .commands_for(active)
        .into_iter()
        .filter(|command| *command == ChannelCommand::Combine)
        .count();
    assert_eq!(combines, 1);

    harness
        .orchestrator
        .on_async_result(
            1,
            AsyncResultPayload::CombineConference {
                main_call_id: active,
                success: true,
            },
        )
        .unwrap();

    let orchestrator = &harness.orchestrator;
    assert_eq!(orchestrator.conference_state(CallKind::Cs), ConferenceState::Active);
    assert_eq!(orchestrator.get_main_call_id(held).unwrap(), Some(active));
    assert_eq!(orchestrator.get_sub_call_id_list(active).unwrap(), vec![held]);
    assert_eq!(
        orchestrator.get_call_id_list_for_conference(held).unwrap(),
        vec![active, held]
    );
    let membership = orchestrator.get_call_snapshot(held).unwrap().conference.unwrap();
    assert_eq!(membership.main_call_id, active);
    assert!(harness.observer.events().contains(&CallEventKind::ConferenceStateChanged {
        kind: CallKind::Cs,
        state: ConferenceState::Active,
        main_call_id: Some(active),
    }));
}

#[test]
fn test_combine_needs_held_call() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Cs);

    let err = harness.orchestrator.combine_conference(call_id).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(harness.orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);
    assert!(harness.orchestrator.get_main_call_id(call_id).unwrap().is_none());
}

#[test]
fn test_refused_combine_returns_to_idle() {
    let harness = Harness::new();
    let (_held, active) = harness.held_and_active(CallKind::Cs);
    harness.orchestrator.combine_conference(active).unwrap();

    harness
        .orchestrator
        .on_async_result(
            1,
            AsyncResultPayload::CombineConference {
                main_call_id: active,
                success: false,
            },
        )
        .unwrap();

    assert_eq!(harness.orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);
    assert!(harness.observer.events().iter().any(|event| matches!(
        event,
        CallEventKind::RequestRolledBack {
            request: RequestKind::Combine,
            ..
        }
    )));
    harness.orchestrator.combine_conference(active).unwrap();
}

#[test]
fn test_separating_only_sub_dissolves_conference() {
    let harness = Harness::new();
    let (held, active) = combined_conference(&harness);

    harness.orchestrator.separate_conference(held).unwrap();

    let orchestrator = &harness.orchestrator;
    assert_eq!(orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);
    assert!(orchestrator.get_main_call_id(active).unwrap().is_none());
    assert!(orchestrator.get_call_snapshot(held).unwrap().conference.is_none());
    assert!(orchestrator.get_call_snapshot(active).unwrap().conference.is_none());
    assert_eq!(harness.channel.commands_for(held).last(), Some(&ChannelCommand::Separate));

    // separating again has nothing to leave
    let err = orchestrator.separate_conference(held).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

#[test]
fn test_refused_separation_rejoins() {
    let harness = Harness::new();
    let (held, active) = combined_conference(&harness);
    harness.orchestrator.separate_conference(held).unwrap();

    harness
        .orchestrator
        .on_async_result(
            2,
            AsyncResultPayload::SeparateConference {
                call_id: held,
                success: false,
            },
        )
        .unwrap();

    let orchestrator = &harness.orchestrator;
    assert_eq!(orchestrator.conference_state(CallKind::Cs), ConferenceState::Active);
    assert_eq!(orchestrator.get_main_call_id(held).unwrap(), Some(active));
    assert!(orchestrator.get_call_snapshot(held).unwrap().conference.is_some());
}

#[test]
fn test_refused_separation_of_main_restores_conference() {
    let harness = Harness::new();
    let (held, active) = combined_conference(&harness);
    harness.orchestrator.separate_conference(active).unwrap();
    assert_eq!(harness.orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);

    harness
        .orchestrator
        .on_async_result(
            2,
            AsyncResultPayload::RequestFailed {
                call_id: active,
                request: RequestKind::Separate,
                reason: "network busy".to_string(),
            },
        )
        .unwrap();

    let orchestrator = &harness.orchestrator;
    assert_eq!(orchestrator.conference_state(CallKind::Cs), ConferenceState::Active);
    assert_eq!(orchestrator.get_main_call_id(held).unwrap(), Some(active));
    assert_eq!(orchestrator.get_sub_call_id_list(active).unwrap(), vec![held]);
    assert!(orchestrator.get_call_snapshot(active).unwrap().conference.is_some());
    assert!(orchestrator.get_call_snapshot(held).unwrap().conference.is_some());

    // the restored conference can be left again
    orchestrator.separate_conference(held).unwrap();
    assert_eq!(orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);
}

#[test]
fn test_kicked_out_member_leaves_and_ends() {
    let harness = Harness::new();
    let (held, active) = combined_conference(&harness);

    harness.orchestrator.kick_out_from_conference(held).unwrap();
    assert_eq!(running_state(&harness, held), RunningState::Disconnecting);
    assert_eq!(harness.channel.commands_for(held).last(), Some(&ChannelCommand::KickOut));

    harness.disconnect(held);

    let orchestrator = &harness.orchestrator;
    assert_eq!(orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);
    assert_eq!(orchestrator.registry().len(), 1);
    assert_eq!(running_state(&harness, active), RunningState::Active);
}

#[test]
fn test_main_call_ending_dissolves_two_party_conference() {
    let harness = Harness::new();
    let (held, active) = combined_conference(&harness);

    harness.orchestrator.hang_up_call(Some(active)).unwrap();
    harness.disconnect(active);

    assert_eq!(harness.orchestrator.conference_state(CallKind::Cs), ConferenceState::Idle);
    assert!(harness.orchestrator.get_call_snapshot(held).unwrap().conference.is_none());
}

#[test]
fn test_answering_second_satellite_call_ends_first() {
    let harness = Harness::new();
    let first = harness.active_outgoing("10086", CallKind::Satellite);
    let second = harness.ringing("13900000001", CallKind::Satellite);

    let answered = harness
        .orchestrator
        .answer_call(Some(second), VideoState::Voice)
        .unwrap();

    assert_eq!(answered, Dispatch::Sent(second));
    assert_eq!(harness.channel.commands_for(first).last(), Some(&ChannelCommand::HangUp));
    assert!(harness.observer.events().contains(&CallEventKind::CallPreempted {
        by: second,
        action: PreemptAction::HungUp,
    }));

    harness.disconnect(first);
    harness.report(second, &[ProtocolState::Active]);
    let active: Vec<_> = harness
        .orchestrator
        .get_all_calls()
        .into_iter()
        .filter(|call| call.running_state == RunningState::Active)
        .map(|call| call.call_id)
        .collect();
    assert_eq!(active, vec![second]);
}

#[test]
fn test_satellite_call_cannot_be_held() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Satellite);

    let err = harness.orchestrator.hold_call(call_id).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(harness.channel.commands_for(call_id).len(), 1);
}

#[test]
fn test_carrier_answer_preempts_voip_call() {
    let harness = Harness::new();
    let voip = harness.active_outgoing("alice@voip.example", CallKind::Voip);
    let carrier = harness.ringing("13900000001", CallKind::Cs);

    harness.orchestrator.answer_call(None, VideoState::Voice).unwrap();

    assert_eq!(harness.channel.commands_for(voip).last(), Some(&ChannelCommand::HangUp));
    assert_eq!(
        harness.channel.commands_for(carrier),
        vec![ChannelCommand::Answer {
            video_state: VideoState::Voice
        }]
    );
    assert!(harness.observer.events().contains(&CallEventKind::CallPreempted {
        by: carrier,
        action: PreemptAction::HungUp,
    }));
}

#[test]
fn test_carrier_answer_rejects_ringing_voip_call() {
    let harness = Harness::new();
    let voip = harness.ringing("alice@voip.example", CallKind::Voip);
    let carrier = harness.ringing("13900000001", CallKind::Cs);

    harness
        .orchestrator
        .answer_call(Some(carrier), VideoState::Voice)
        .unwrap();

    assert_eq!(
        harness.channel.commands_for(voip),
        vec![ChannelCommand::Reject { message: None }]
    );
    assert!(harness.observer.events().contains(&CallEventKind::CallPreempted {
        by: carrier,
        action: PreemptAction::Rejected,
    }));
    assert_eq!(running_state(&harness, carrier), RunningState::Ringing);
}

#[test]
fn test_default_hang_up_prefers_active_call() {
    let harness = Harness::new();
    let active = harness.active_outgoing("10086", CallKind::Cs);
    let dialing = harness.dial("10010", CallKind::Cs);
    harness.report(dialing, &[ProtocolState::Dialing]);

    let hung_up = harness.orchestrator.hang_up_call(None).unwrap();

    assert_eq!(hung_up, active);
    assert_eq!(running_state(&harness, active), RunningState::Disconnecting);
    assert_eq!(running_state(&harness, dialing), RunningState::Dialing);
}

#[test]
fn test_ott_call_takes_no_control() {
    let harness = Harness::new();
    let call_id = harness.ringing("ott:bob", CallKind::Ott);

    let answer = harness
        .orchestrator
        .answer_call(Some(call_id), VideoState::Voice)
        .unwrap_err();
    let hang_up = harness.orchestrator.hang_up_call(Some(call_id)).unwrap_err();

    assert_eq!(answer.kind(), ErrorKind::Unsupported);
    assert_eq!(hang_up.kind(), ErrorKind::Unsupported);
    assert_eq!(harness.orchestrator.registry().len(), 1);
    assert!(harness.channel.requests().is_empty());
}

#[test]
fn test_emergency_dial_preempts_every_call() {
    let harness = Harness::new();
    let active = harness.active_outgoing("10086", CallKind::Cs);
    let ringing = harness.ringing("13900000001", CallKind::Cs);

    let emergency = harness.dial("112", CallKind::Cs);

    assert!(harness.orchestrator.get_call_snapshot(emergency).unwrap().emergency);
    assert_eq!(harness.channel.commands_for(active).last(), Some(&ChannelCommand::HangUp));
    assert_eq!(
        harness.channel.commands_for(ringing).last(),
        Some(&ChannelCommand::Reject { message: None })
    );
    assert_eq!(
        harness.channel.commands_for(emergency),
        vec![ChannelCommand::Dial {
            video_state: VideoState::Voice,
            emergency: true
        }]
    );
}

#[test]
fn test_emergency_dial_at_call_ceiling_touches_nothing() {
    let mut config = Config::default();
    config.admission.max_call_count = 2;
    let harness = Harness::with_config(config);
    let (held, active) = harness.held_and_active(CallKind::Cs);
    let sent = harness.channel.requests().len();

    let err = harness
        .orchestrator
        .dial_call("112", DialOptions::new(CallKind::Cs))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert_eq!(harness.orchestrator.registry().len(), 2);
    assert_eq!(running_state(&harness, held), RunningState::Holding);
    assert_eq!(running_state(&harness, active), RunningState::Active);
    assert_eq!(harness.channel.requests().len(), sent);
    assert!(!harness
        .observer
        .events()
        .iter()
        .any(|event| matches!(event, CallEventKind::CallPreempted { .. })));
}

#[test]
fn test_privacy_prompt_refused_cancels_dial() {
    let harness = Harness::new();
    harness.privacy.set_elevated(true);

    let dispatch = harness
        .orchestrator
        .dial_call("10086", DialOptions::new(CallKind::Cs))
        .unwrap();
    let ticket = dispatch.ticket().unwrap();

    assert_eq!(harness.privacy.prompts(), vec![ticket]);
    assert!(harness.orchestrator.registry().is_empty());

    assert_eq!(harness.orchestrator.confirm_privacy_exit(ticket, false).unwrap(), None);
    assert!(harness
        .observer
        .events()
        .contains(&CallEventKind::PrivacyRequestCancelled { ticket }));
    assert!(harness.channel.requests().is_empty());

    let err = harness.orchestrator.confirm_privacy_exit(ticket, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_privacy_prompt_confirmed_answers_call() {
    let harness = Harness::new();
    let call_id = harness.ringing("13900000001", CallKind::Cs);
    harness.privacy.set_elevated(true);

    let ticket = harness
        .orchestrator
        .answer_call(None, VideoState::Voice)
        .unwrap()
        .ticket()
        .unwrap();
    assert!(harness.channel.commands_for(call_id).is_empty());

    harness.privacy.set_elevated(false);
    let answered = harness.orchestrator.confirm_privacy_exit(ticket, true).unwrap();

    assert_eq!(answered, Some(call_id));
    assert_eq!(
        harness.channel.commands_for(call_id),
        vec![ChannelCommand::Answer {
            video_state: VideoState::Voice
        }]
    );
}

#[test]
fn test_parked_answer_dropped_when_caller_hangs_up() {
    let harness = Harness::new();
    let call_id = harness.ringing("13900000001", CallKind::Cs);
    harness.privacy.set_elevated(true);
    let ticket = harness
        .orchestrator
        .answer_call(Some(call_id), VideoState::Voice)
        .unwrap()
        .ticket()
        .unwrap();

    harness.report(call_id, &[ProtocolState::Disconnected]);

    let err = harness.orchestrator.confirm_privacy_exit(ticket, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_entering_privacy_mode_closes_calls() {
    let harness = Harness::new();
    let active = harness.active_outgoing("10086", CallKind::Cs);
    let ringing = harness.ringing("13900000001", CallKind::Cs);
    let ott = harness.ringing("ott:bob", CallKind::Ott);

    let closed = harness.orchestrator.on_privacy_mode_changed(true);

    assert_eq!(closed, vec![active, ringing]);
    assert_eq!(harness.channel.commands_for(active).last(), Some(&ChannelCommand::HangUp));
    assert_eq!(
        harness.channel.commands_for(ringing).last(),
        Some(&ChannelCommand::Reject { message: None })
    );
    assert_eq!(running_state(&harness, ott), RunningState::Ringing);
    assert!(harness.orchestrator.on_privacy_mode_changed(false).is_empty());
}

#[test]
fn test_reject_with_message() {
    let harness = Harness::new();
    let call_id = harness.ringing("13900000001", CallKind::Cs);

    let too_long = harness
        .orchestrator
        .reject_call(None, Some("x".repeat(301)))
        .unwrap_err();
    assert_eq!(too_long.kind(), ErrorKind::InvalidArgument);

    let rejected = harness
        .orchestrator
        .reject_call(None, Some("In a meeting".to_string()))
        .unwrap();

    assert_eq!(rejected, call_id);
    assert_eq!(
        harness.channel.commands_for(call_id),
        vec![ChannelCommand::Reject {
            message: Some("In a meeting".to_string())
        }]
    );
    assert!(harness.observer.events().contains(&CallEventKind::IncomingCallRejected {
        with_message: true,
        message: Some("In a meeting".to_string()),
    }));

    harness.disconnect(call_id);
    assert_eq!(harness.observer.destroyed()[0].answer_type, AnswerType::Rejected);
}

#[test]
fn test_dtmf_rules() {
    let harness = Harness::new();
    let ringing = harness.ringing("13900000001", CallKind::Cs);

    let err = harness.orchestrator.start_dtmf(ringing, '5').unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    harness.orchestrator.answer_call(Some(ringing), VideoState::Voice).unwrap();
    harness.report(ringing, &[ProtocolState::Active]);

    let err = harness.orchestrator.start_dtmf(ringing, 'x').unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    harness.orchestrator.start_dtmf(ringing, '#').unwrap();
    harness.orchestrator.stop_dtmf(ringing).unwrap();
    let commands = harness.channel.commands_for(ringing);
    assert_eq!(commands.last(), Some(&ChannelCommand::StopDtmf));
}

#[test]
fn test_mute_applies_to_foreground_call() {
    let harness = Harness::new();
    let err = harness.orchestrator.set_muted(true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let call_id = harness.active_outgoing("10086", CallKind::Cs);
    assert_eq!(harness.orchestrator.set_muted(true).unwrap(), call_id);

    assert!(harness.orchestrator.get_call_snapshot(call_id).unwrap().muted);
    assert!(harness
        .observer
        .events()
        .contains(&CallEventKind::MuteChanged { muted: true }));
}

#[test]
fn test_ims_media_mode_upgrade() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Ims);

    harness
        .orchestrator
        .update_call_media_mode(call_id, VideoState::Video)
        .unwrap();
    // not committed until the bearer agrees
    let snapshot = harness.orchestrator.get_call_snapshot(call_id).unwrap();
    assert_eq!(snapshot.video_state, VideoState::Voice);

    harness
        .orchestrator
        .on_async_result(
            4,
            AsyncResultPayload::VideoModeChanged {
                call_id,
                video_state: VideoState::Video,
                success: true,
            },
        )
        .unwrap();

    let snapshot = harness.orchestrator.get_call_snapshot(call_id).unwrap();
    assert_eq!(snapshot.video_state, VideoState::Video);
    assert!(harness.observer.events().contains(&CallEventKind::VideoStateChanged {
        video_state: VideoState::Video
    }));
}

#[test]
fn test_cs_media_mode_is_unsupported() {
    let harness = Harness::new();
    let call_id = harness.active_outgoing("10086", CallKind::Cs);

    let err = harness
        .orchestrator
        .update_call_media_mode(call_id, VideoState::Video)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_query_results_are_forwarded() {
    let harness = Harness::new();

    harness
        .orchestrator
        .on_async_result(
            7,
            AsyncResultPayload::CallWaitingQuery {
                slot_id: SlotId::default(),
                enabled: true,
            },
        )
        .unwrap();

    assert_eq!(
        harness.observer.reports(),
        vec![Report::Event(
            None,
            CallEventKind::AsyncResult {
                result_id: 7,
                payload: AsyncResultPayload::CallWaitingQuery {
                    slot_id: SlotId::default(),
                    enabled: true,
                },
            }
        )]
    );
}

#[test]
fn test_missing_companion_is_internal() {
    let channel = Arc::new(RecordingChannel::default());
    let orchestrator =
        CallOrchestrator::new(CallContext::new(Config::default()).with_bearer(channel));

    let err = orchestrator
        .on_new_incoming_call(IncomingCallInfo::new("alice@voip.example", CallKind::Voip))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(orchestrator.registry().is_empty());
}

#[test]
fn test_concurrent_incoming_calls_respect_ringing_limit() {
    let harness = Harness::new();
    let orchestrator = &harness.orchestrator;

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                scope.spawn(move || {
                    orchestrator.on_new_incoming_call(IncomingCallInfo::new(
                        format!("1390000000{}", i),
                        CallKind::Cs,
                    ))
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let admitted: Vec<CallId> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(admitted.len(), 2);
    assert_eq!(orchestrator.registry().len(), 2);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| err.kind() == ErrorKind::ResourceExhausted));
    assert_eq!(harness.observer.destroyed().len(), 6);

    let mut ids: HashSet<CallId> = admitted.into_iter().collect();
    ids.extend(harness.observer.destroyed().iter().map(|d| d.call_id));
    assert_eq!(ids.len(), 8);
}

#[test]
fn test_concurrent_dials_place_one_call() {
    let harness = Harness::new();
    let orchestrator = &harness.orchestrator;

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                scope.spawn(move || {
                    orchestrator.dial_call(&format!("1008{}", i), DialOptions::new(CallKind::Cs))
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1);
    assert_eq!(orchestrator.registry().len(), 1);
    assert_eq!(harness.channel.requests().len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| err.kind() == ErrorKind::ResourceExhausted));
}
