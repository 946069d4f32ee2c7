//! Admission policy
//!
//! Predicates over a `RegistrySnapshot`, run before anything is mutated.
//! Nothing here touches an entity or the registry; a failure maps straight
//! to the error the caller sees.

use crate::config::{AdmissionConfig, NumberConfig};
use crate::domain::call::entity::CallSnapshot;
use crate::domain::call::event::PreemptAction;
use crate::domain::call::value_object::{CallKind, DtmfDigit, RunningState};
use crate::domain::registry::RegistrySnapshot;
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, SlotId};

/// A call to end before a request may go ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preemption {
    pub call_id: CallId,
    pub action: PreemptAction,
}

fn is_dial_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '*' | '#' | '+' | ',' | ';' | 'p' | 'P' | 'w' | 'W' | ' ')
}

fn lookup(snapshot: &RegistrySnapshot, call_id: CallId) -> Result<&CallSnapshot> {
    snapshot
        .get(call_id)
        .ok_or_else(|| CallError::NotFound(format!("Call {}", call_id)))
}

fn require_state(call: &CallSnapshot, allowed: &[RunningState]) -> Result<()> {
    if allowed.contains(&call.running_state) {
        return Ok(());
    }
    Err(CallError::StateConflict(format!(
        "Call {} is {}",
        call.call_id, call.running_state
    )))
}

/// Same-family calls other than `call`, still alive
fn peers<'a>(snapshot: &'a RegistrySnapshot, call: &'a CallSnapshot) -> impl Iterator<Item = &'a CallSnapshot> {
    snapshot.calls.iter().filter(move |other| {
        other.call_id != call.call_id
            && other.kind == call.kind
            && !other.running_state.is_terminating()
    })
}

#[derive(Debug, Clone, Default)]
pub struct AdmissionPolicy {
    limits: AdmissionConfig,
    numbers: NumberConfig,
}

impl AdmissionPolicy {
    pub fn new(limits: AdmissionConfig, numbers: NumberConfig) -> Self {
        Self { limits, numbers }
    }

    /// Non-empty, bounded, and for carrier calls made of dial characters only
    pub fn check_number(&self, number: &str, kind: CallKind) -> Result<()> {
        let trimmed = number.trim();
        if trimmed.is_empty() {
            return Err(CallError::InvalidArgument("number is empty".to_string()));
        }
        if number.chars().count() > self.numbers.max_number_len {
            return Err(CallError::InvalidArgument(format!(
                "number longer than {} characters",
                self.numbers.max_number_len
            )));
        }
        if kind.is_carrier() {
            if let Some(bad) = trimmed.chars().find(|c| !is_dial_char(*c)) {
                return Err(CallError::InvalidArgument(format!(
                    "'{}' is not allowed in a dial string",
                    bad
                )));
            }
        }
        Ok(())
    }

    pub fn check_slot(&self, slot_id: SlotId, kind: CallKind) -> Result<()> {
        if kind.is_carrier() && slot_id.value() >= self.limits.slot_count {
            return Err(CallError::InvalidArgument(format!(
                "slot {} out of range (0..{})",
                slot_id, self.limits.slot_count
            )));
        }
        Ok(())
    }

    pub fn is_emergency_number(&self, number: &str) -> bool {
        let number = number.trim();
        self.numbers.emergency_numbers.iter().any(|n| n == number)
    }

    pub fn check_reject_message(&self, message: Option<&str>) -> Result<()> {
        match message {
            Some(text) if text.chars().count() > self.numbers.max_reject_message_len => {
                Err(CallError::InvalidArgument(format!(
                    "reject message longer than {} characters",
                    self.numbers.max_reject_message_len
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn can_dial(&self, snapshot: &RegistrySnapshot, kind: CallKind, emergency: bool) -> Result<()> {
        match kind {
            CallKind::Ott => {
                return Err(CallError::Unsupported(
                    "OTT calls are placed by their app".to_string(),
                ))
            }
            CallKind::Bluetooth if !snapshot.is_empty() => {
                return Err(CallError::StateConflict(
                    "a Bluetooth call needs the line to itself".to_string(),
                ))
            }
            _ => {}
        }

        // a VoIP call never blocks a carrier call
        let considered: Vec<&CallSnapshot> = snapshot
            .calls
            .iter()
            .filter(|call| kind == CallKind::Voip || call.kind != CallKind::Voip)
            .filter(|call| !call.running_state.is_terminating())
            .collect();

        if emergency {
            if considered
                .iter()
                .any(|call| call.emergency && call.running_state.is_new_call())
            {
                return Err(CallError::ResourceExhausted(
                    "an emergency call is already being placed".to_string(),
                ));
            }
            // preempted calls stay registered until the bearer releases them
            if snapshot.len() >= self.limits.max_call_count {
                return Err(CallError::ResourceExhausted(format!(
                    "call count limit {} reached",
                    self.limits.max_call_count
                )));
            }
            return Ok(());
        }

        if let Some(call) = considered.iter().find(|call| call.running_state.is_new_call()) {
            return Err(CallError::ResourceExhausted(format!(
                "call {} is still being placed",
                call.call_id
            )));
        }
        if let Some(call) = considered.iter().find(|call| call.kind == CallKind::Satellite) {
            return Err(CallError::ResourceExhausted(format!(
                "satellite call {} holds the line",
                call.call_id
            )));
        }
        if let Some(call) = considered
            .iter()
            .find(|call| call.running_state == RunningState::Ringing)
        {
            return Err(CallError::StateConflict(format!(
                "call {} is ringing",
                call.call_id
            )));
        }
        let active = considered
            .iter()
            .filter(|call| call.running_state == RunningState::Active)
            .count();
        if active >= self.limits.max_active_calls {
            return Err(CallError::ResourceExhausted(format!(
                "{} active calls",
                active
            )));
        }
        if snapshot.len() >= self.limits.max_call_count {
            return Err(CallError::ResourceExhausted(format!(
                "call count limit {} reached",
                self.limits.max_call_count
            )));
        }
        Ok(())
    }

    /// Every non-emergency call has to make way for an emergency dial
    pub fn emergency_preemptions(&self, snapshot: &RegistrySnapshot) -> Vec<Preemption> {
        snapshot
            .calls
            .iter()
            .filter(|call| !call.emergency && !call.running_state.is_terminating())
            .filter(|call| call.kind != CallKind::Ott)
            .map(|call| Preemption {
                call_id: call.call_id,
                action: if call.running_state == RunningState::Ringing {
                    PreemptAction::Rejected
                } else {
                    PreemptAction::HungUp
                },
            })
            .collect()
    }

    /// VoIP calls that must go before a carrier call is placed or answered
    pub fn voip_preemptions(&self, snapshot: &RegistrySnapshot, kind: CallKind) -> Vec<Preemption> {
        if !kind.is_carrier() {
            return Vec::new();
        }
        snapshot
            .calls
            .iter()
            .filter(|call| call.kind == CallKind::Voip)
            .filter_map(|call| {
                let action = match call.running_state {
                    RunningState::Ringing => PreemptAction::Rejected,
                    RunningState::Active => PreemptAction::HungUp,
                    _ => return None,
                };
                Some(Preemption {
                    call_id: call.call_id,
                    action,
                })
            })
            .collect()
    }

    /// Active satellite calls that must end before `target` is answered
    pub fn satellite_preemptions(&self, snapshot: &RegistrySnapshot, target: CallId) -> Vec<Preemption> {
        let is_satellite = snapshot
            .get(target)
            .map_or(false, |call| call.kind == CallKind::Satellite);
        if !is_satellite {
            return Vec::new();
        }
        snapshot
            .calls
            .iter()
            .filter(|call| call.call_id != target && call.kind == CallKind::Satellite)
            .filter(|call| call.running_state == RunningState::Active)
            .map(|call| Preemption {
                call_id: call.call_id,
                action: PreemptAction::HungUp,
            })
            .collect()
    }

    pub fn can_accept_incoming(&self, snapshot: &RegistrySnapshot, number: &str, kind: CallKind) -> Result<()> {
        if let Some(call) = snapshot
            .calls
            .iter()
            .find(|call| call.number == number && call.kind == kind && !call.running_state.is_terminating())
        {
            return Err(CallError::Duplicate(format!(
                "call {} already carries {}",
                call.call_id, number
            )));
        }
        // a VoIP call never blocks a carrier call
        let in_state = |state: RunningState| {
            snapshot
                .calls
                .iter()
                .filter(|call| kind == CallKind::Voip || call.kind != CallKind::Voip)
                .filter(|call| call.running_state == state)
                .count()
        };
        let ringing = in_state(RunningState::Ringing);
        if ringing >= self.limits.max_ringing_calls {
            return Err(CallError::ResourceExhausted(format!(
                "{} calls already ringing",
                ringing
            )));
        }
        let active = in_state(RunningState::Active);
        if active >= self.limits.max_active_calls {
            return Err(CallError::ResourceExhausted(format!(
                "{} active calls",
                active
            )));
        }
        if snapshot.len() >= self.limits.max_call_count {
            return Err(CallError::ResourceExhausted(format!(
                "call count limit {} reached",
                self.limits.max_call_count
            )));
        }
        Ok(())
    }

    pub fn can_answer(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        require_state(lookup(snapshot, call_id)?, &[RunningState::Ringing])
    }

    pub fn can_reject(&self, snapshot: &RegistrySnapshot, call_id: CallId, message: Option<&str>) -> Result<()> {
        self.check_reject_message(message)?;
        require_state(lookup(snapshot, call_id)?, &[RunningState::Ringing])
    }

    pub fn can_hang_up(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        let call = lookup(snapshot, call_id)?;
        if call.running_state.is_terminating() {
            return Err(CallError::StateConflict(format!(
                "Call {} is already {}",
                call_id, call.running_state
            )));
        }
        Ok(())
    }

    pub fn can_hold(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        let call = lookup(snapshot, call_id)?;
        require_state(call, &[RunningState::Active])?;
        if let Some(held) = peers(snapshot, call).find(|p| p.running_state == RunningState::Holding) {
            return Err(CallError::StateConflict(format!(
                "call {} is already held, switch instead",
                held.call_id
            )));
        }
        Ok(())
    }

    pub fn can_unhold(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        let call = lookup(snapshot, call_id)?;
        require_state(call, &[RunningState::Holding])?;
        if let Some(active) = peers(snapshot, call).find(|p| p.running_state == RunningState::Active) {
            return Err(CallError::StateConflict(format!(
                "call {} is active, switch instead",
                active.call_id
            )));
        }
        Ok(())
    }

    pub fn can_switch(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        let call = lookup(snapshot, call_id)?;
        require_state(call, &[RunningState::Active, RunningState::Holding])?;
        let wanted = if call.running_state == RunningState::Active {
            RunningState::Holding
        } else {
            RunningState::Active
        };
        if !peers(snapshot, call).any(|p| p.running_state == wanted) {
            return Err(CallError::StateConflict(format!(
                "no {} {} call to switch with",
                wanted, call.kind
            )));
        }
        Ok(())
    }

    pub fn can_combine(&self, snapshot: &RegistrySnapshot, main_call_id: CallId, max_sub_calls: usize) -> Result<()> {
        let main = lookup(snapshot, main_call_id)?;
        require_state(main, &[RunningState::Active])?;
        if !peers(snapshot, main).any(|p| p.running_state == RunningState::Holding) {
            return Err(CallError::StateConflict(format!(
                "no held {} call to combine with call {}",
                main.kind, main_call_id
            )));
        }
        let subs = peers(snapshot, main)
            .filter(|p| matches!(p.running_state, RunningState::Active | RunningState::Holding))
            .count();
        if subs > max_sub_calls {
            return Err(CallError::ResourceExhausted(format!(
                "conference limited to {} sub-calls",
                max_sub_calls
            )));
        }
        Ok(())
    }

    pub fn can_leave_conference(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        let call = lookup(snapshot, call_id)?;
        if call.conference.is_none() {
            return Err(CallError::StateConflict(format!(
                "Call {} is not in a conference",
                call_id
            )));
        }
        Ok(())
    }

    pub fn can_send_dtmf(&self, snapshot: &RegistrySnapshot, call_id: CallId, digit: char) -> Result<DtmfDigit> {
        let digit = DtmfDigit::from_char(digit)
            .ok_or_else(|| CallError::InvalidArgument(format!("'{}' is not a DTMF digit", digit)))?;
        require_state(lookup(snapshot, call_id)?, &[RunningState::Active])?;
        Ok(digit)
    }

    pub fn can_stop_dtmf(&self, snapshot: &RegistrySnapshot, call_id: CallId) -> Result<()> {
        require_state(lookup(snapshot, call_id)?, &[RunningState::Active])
    }
}

/// Call an unspecified answer or reject applies to: the oldest ringing call
pub fn select_ringing_call(snapshot: &RegistrySnapshot) -> Option<CallId> {
    snapshot
        .in_state(RunningState::Ringing)
        .map(|call| call.call_id)
        .min()
}

/// Call an unspecified hang-up applies to: Active, then Dialing, then Connecting
pub fn select_hang_up_target(snapshot: &RegistrySnapshot) -> Option<CallId> {
    [
        RunningState::Active,
        RunningState::Dialing,
        RunningState::Connecting,
    ]
    .iter()
    .find_map(|state| snapshot.in_state(*state).map(|call| call.call_id).min())
}

/// Call that mute and other foreground-only requests apply to
pub fn select_foreground_call(snapshot: &RegistrySnapshot) -> Option<CallId> {
    snapshot
        .in_state(RunningState::Active)
        .map(|call| call.call_id)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::value_object::{
        AnswerType, CallDirection, ProtocolState, VideoState,
    };
    use chrono::Utc;

    fn call(raw: u32, kind: CallKind, state: RunningState) -> CallSnapshot {
        let protocol_state = match state {
            RunningState::Create | RunningState::Connecting => ProtocolState::Idle,
            RunningState::Dialing => ProtocolState::Dialing,
            RunningState::Ringing => ProtocolState::Incoming,
            RunningState::Active => ProtocolState::Active,
            RunningState::Holding => ProtocolState::Holding,
            RunningState::Disconnecting => ProtocolState::Disconnecting,
            RunningState::Disconnected => ProtocolState::Disconnected,
        };
        CallSnapshot {
            call_id: CallId::new(raw),
            number: format!("1380000000{}", raw),
            kind,
            direction: CallDirection::Outgoing,
            slot_id: SlotId::default(),
            emergency: false,
            running_state: state,
            protocol_state,
            video_state: VideoState::Voice,
            answer_type: AnswerType::Missed,
            muted: false,
            conference: None,
            pending_request: None,
            created_at: Utc::now(),
            began_at: None,
            ended_at: None,
        }
    }

    fn snapshot(calls: Vec<CallSnapshot>) -> RegistrySnapshot {
        RegistrySnapshot {
            calls,
            max_call_count: 6,
        }
    }

    fn policy() -> AdmissionPolicy {
        AdmissionPolicy::default()
    }

    #[test]
    fn test_number_legality() {
        let policy = policy();
        assert!(policy.check_number("+86 138,0000;1234#", CallKind::Cs).is_ok());
        assert!(matches!(
            policy.check_number("   ", CallKind::Cs),
            Err(CallError::InvalidArgument(_))
        ));
        assert!(matches!(
            policy.check_number("138-0000", CallKind::Ims),
            Err(CallError::InvalidArgument(_))
        ));
        assert!(policy.check_number("alice@example.com", CallKind::Voip).is_ok());
        assert!(matches!(
            policy.check_number(&"1".repeat(256), CallKind::Cs),
            Err(CallError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_slot_range() {
        let policy = policy();
        assert!(policy.check_slot(SlotId::new(1), CallKind::Cs).is_ok());
        assert!(policy.check_slot(SlotId::new(2), CallKind::Cs).is_err());
        assert!(policy.check_slot(SlotId::new(9), CallKind::Voip).is_ok());
    }

    #[test]
    fn test_dial_blocked_by_pending_new_call() {
        let snap = snapshot(vec![call(1, CallKind::Cs, RunningState::Dialing)]);
        assert!(matches!(
            policy().can_dial(&snap, CallKind::Cs, false),
            Err(CallError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_voip_never_blocks_carrier_dial() {
        let snap = snapshot(vec![call(1, CallKind::Voip, RunningState::Dialing)]);
        assert!(policy().can_dial(&snap, CallKind::Cs, false).is_ok());
        assert!(policy().can_dial(&snap, CallKind::Voip, false).is_err());
    }

    #[test]
    fn test_dial_blocked_by_ringing_and_satellite() {
        let ringing = snapshot(vec![call(1, CallKind::Cs, RunningState::Ringing)]);
        assert!(matches!(
            policy().can_dial(&ringing, CallKind::Cs, false),
            Err(CallError::StateConflict(_))
        ));

        let satellite = snapshot(vec![call(1, CallKind::Satellite, RunningState::Active)]);
        assert!(matches!(
            policy().can_dial(&satellite, CallKind::Ims, false),
            Err(CallError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_dial_ott_unsupported_and_bluetooth_needs_empty_line() {
        let snap = snapshot(vec![call(1, CallKind::Cs, RunningState::Holding)]);
        assert!(matches!(
            policy().can_dial(&snap, CallKind::Ott, false),
            Err(CallError::Unsupported(_))
        ));
        assert!(matches!(
            policy().can_dial(&snap, CallKind::Bluetooth, false),
            Err(CallError::StateConflict(_))
        ));
    }

    #[test]
    fn test_emergency_dial_plan() {
        let mut ringing = call(3, CallKind::Cs, RunningState::Ringing);
        ringing.direction = CallDirection::Incoming;
        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Dialing),
            call(2, CallKind::Ims, RunningState::Holding),
            ringing,
        ]);
        let policy = policy();

        assert!(policy.can_dial(&snap, CallKind::Cs, true).is_ok());
        let plan = policy.emergency_preemptions(&snap);
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.iter().find(|p| p.call_id == CallId::new(3)).unwrap().action,
            PreemptAction::Rejected
        );
    }

    #[test]
    fn test_second_emergency_dial_refused() {
        let mut ecc = call(1, CallKind::Cs, RunningState::Dialing);
        ecc.emergency = true;
        let snap = snapshot(vec![ecc]);
        assert!(matches!(
            policy().can_dial(&snap, CallKind::Cs, true),
            Err(CallError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_emergency_dial_respects_call_ceiling() {
        let limits = AdmissionConfig {
            max_call_count: 2,
            ..AdmissionConfig::default()
        };
        let policy = AdmissionPolicy::new(limits, NumberConfig::default());
        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Holding),
            call(2, CallKind::Cs, RunningState::Active),
        ]);

        assert!(matches!(
            policy.can_dial(&snap, CallKind::Cs, true),
            Err(CallError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_voip_calls_do_not_count_against_carrier_incoming() {
        let policy = policy();
        let mut voip = call(1, CallKind::Voip, RunningState::Ringing);
        voip.number = "alice@voip.example".to_string();
        let snap = snapshot(vec![voip, call(2, CallKind::Cs, RunningState::Ringing)]);

        assert!(policy.can_accept_incoming(&snap, "10086", CallKind::Cs).is_ok());
        assert!(matches!(
            policy.can_accept_incoming(&snap, "bob@voip.example", CallKind::Voip),
            Err(CallError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_incoming_limits() {
        let policy = policy();
        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Ringing),
            call(2, CallKind::Cs, RunningState::Ringing),
        ]);
        assert!(matches!(
            policy.can_accept_incoming(&snap, "10086", CallKind::Cs),
            Err(CallError::ResourceExhausted(_))
        ));

        let snap = snapshot(vec![call(1, CallKind::Cs, RunningState::Active)]);
        assert!(matches!(
            policy.can_accept_incoming(&snap, "13800000001", CallKind::Cs),
            Err(CallError::Duplicate(_))
        ));
        assert!(policy.can_accept_incoming(&snap, "10086", CallKind::Cs).is_ok());
    }

    #[test]
    fn test_hold_unhold_switch_rules() {
        let policy = policy();
        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Active),
            call(2, CallKind::Cs, RunningState::Holding),
        ]);
        assert!(matches!(
            policy.can_hold(&snap, CallId::new(1)),
            Err(CallError::StateConflict(_))
        ));
        assert!(matches!(
            policy.can_unhold(&snap, CallId::new(2)),
            Err(CallError::StateConflict(_))
        ));
        assert!(policy.can_switch(&snap, CallId::new(2)).is_ok());
        assert!(policy.can_switch(&snap, CallId::new(1)).is_ok());

        let lone = snapshot(vec![call(1, CallKind::Cs, RunningState::Active)]);
        assert!(policy.can_hold(&lone, CallId::new(1)).is_ok());
        assert!(matches!(
            policy.can_switch(&lone, CallId::new(1)),
            Err(CallError::StateConflict(_))
        ));
        assert!(matches!(
            policy.can_hold(&lone, CallId::new(7)),
            Err(CallError::NotFound(_))
        ));
    }

    #[test]
    fn test_combine_needs_held_peer_of_same_family() {
        let policy = policy();
        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Active),
            call(2, CallKind::Ims, RunningState::Holding),
        ]);
        assert!(matches!(
            policy.can_combine(&snap, CallId::new(1), 5),
            Err(CallError::StateConflict(_))
        ));

        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Active),
            call(2, CallKind::Cs, RunningState::Holding),
        ]);
        assert!(policy.can_combine(&snap, CallId::new(1), 5).is_ok());
        assert!(matches!(
            policy.can_combine(&snap, CallId::new(1), 0),
            Err(CallError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_dtmf_digit_validation() {
        let snap = snapshot(vec![call(1, CallKind::Cs, RunningState::Active)]);
        assert_eq!(
            policy().can_send_dtmf(&snap, CallId::new(1), '#').unwrap(),
            DtmfDigit::Pound
        );
        assert!(matches!(
            policy().can_send_dtmf(&snap, CallId::new(1), 'x'),
            Err(CallError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_reject_message_length() {
        let snap = snapshot(vec![call(1, CallKind::Cs, RunningState::Ringing)]);
        let long = "x".repeat(301);
        assert!(matches!(
            policy().can_reject(&snap, CallId::new(1), Some(&long)),
            Err(CallError::InvalidArgument(_))
        ));
        assert!(policy().can_reject(&snap, CallId::new(1), Some("busy")).is_ok());
    }

    #[test]
    fn test_default_target_selection() {
        let snap = snapshot(vec![
            call(1, CallKind::Cs, RunningState::Dialing),
            call(2, CallKind::Cs, RunningState::Active),
            call(3, CallKind::Cs, RunningState::Ringing),
        ]);
        assert_eq!(select_hang_up_target(&snap), Some(CallId::new(2)));
        assert_eq!(select_ringing_call(&snap), Some(CallId::new(3)));

        let only_connecting = snapshot(vec![call(4, CallKind::Cs, RunningState::Connecting)]);
        assert_eq!(select_hang_up_target(&only_connecting), Some(CallId::new(4)));
        assert_eq!(select_hang_up_target(&snapshot(vec![])), None);
    }

    #[test]
    fn test_preemption_plans() {
        let policy = policy();
        let snap = snapshot(vec![
            call(1, CallKind::Voip, RunningState::Ringing),
            call(2, CallKind::Voip, RunningState::Active),
            call(3, CallKind::Satellite, RunningState::Active),
            call(4, CallKind::Satellite, RunningState::Ringing),
        ]);

        let voip = policy.voip_preemptions(&snap, CallKind::Cs);
        assert_eq!(
            voip,
            vec![
                Preemption { call_id: CallId::new(1), action: PreemptAction::Rejected },
                Preemption { call_id: CallId::new(2), action: PreemptAction::HungUp },
            ]
        );
        assert!(policy.voip_preemptions(&snap, CallKind::Voip).is_empty());

        let satellite = policy.satellite_preemptions(&snap, CallId::new(4));
        assert_eq!(satellite.len(), 1);
        assert_eq!(satellite[0].call_id, CallId::new(3));
    }
}
