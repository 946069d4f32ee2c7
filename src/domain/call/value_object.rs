//! Call value objects

use crate::domain::shared::value_objects::CallId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Call technology. Also the family key for conferences and hold/switch peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Circuit-switched cellular
    Cs,
    /// IMS (VoLTE / VoNR)
    Ims,
    Satellite,
    /// Over-the-top call owned by a third-party app
    Ott,
    Bluetooth,
    Voip,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Cs => "cs",
            CallKind::Ims => "ims",
            CallKind::Satellite => "satellite",
            CallKind::Ott => "ott",
            CallKind::Bluetooth => "bluetooth",
            CallKind::Voip => "voip",
        }
    }

    /// Carried over the cellular/IMS/satellite radio bearer
    pub fn is_carrier(&self) -> bool {
        matches!(self, CallKind::Cs | CallKind::Ims | CallKind::Satellite)
    }

    /// Driven through the companion service (Bluetooth handset or VoIP app)
    pub fn is_companion(&self) -> bool {
        matches!(self, CallKind::Bluetooth | CallKind::Voip)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

/// Coarse lifecycle bucket of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningState {
    /// Entity exists, nothing sent yet
    Create,
    /// Dial handed to the channel
    Connecting,
    /// Network is setting up the call (includes alerting)
    Dialing,
    /// Incoming or waiting
    Ringing,
    Active,
    Holding,
    Disconnecting,
    Disconnected,
}

impl RunningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunningState::Create => "create",
            RunningState::Connecting => "connecting",
            RunningState::Dialing => "dialing",
            RunningState::Ringing => "ringing",
            RunningState::Active => "active",
            RunningState::Holding => "holding",
            RunningState::Disconnecting => "disconnecting",
            RunningState::Disconnected => "disconnected",
        }
    }

    /// Outgoing call still being set up. At most one call may be here.
    pub fn is_new_call(&self) -> bool {
        matches!(
            self,
            RunningState::Create | RunningState::Connecting | RunningState::Dialing
        )
    }

    pub fn is_terminating(&self) -> bool {
        matches!(self, RunningState::Disconnecting | RunningState::Disconnected)
    }
}

impl fmt::Display for RunningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained signaling state as reported by the bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolState {
    Idle,
    Incoming,
    Waiting,
    Dialing,
    Alerting,
    Active,
    Holding,
    Disconnecting,
    Disconnected,
}

impl ProtocolState {
    /// Check if a bearer-reported transition is valid
    pub fn can_transition_to(&self, next: ProtocolState) -> bool {
        use ProtocolState::*;

        match (self, next) {
            (Idle, Dialing | Incoming | Waiting | Disconnecting | Disconnected) => true,

            (Dialing, Alerting | Active | Disconnecting | Disconnected) => true,
            (Alerting, Active | Disconnecting | Disconnected) => true,

            // a waiting call becomes incoming once the foreground call ends
            (Incoming, Waiting) | (Waiting, Incoming) => true,
            (Incoming | Waiting, Active | Disconnecting | Disconnected) => true,

            (Active, Holding | Disconnecting | Disconnected) => true,
            (Holding, Active | Disconnecting | Disconnected) => true,

            (Disconnecting, Disconnected) => true,

            // Disconnected is terminal
            (Disconnected, _) => false,

            _ => false,
        }
    }

    /// Running state this signaling state maps onto. `Idle` maps to nothing.
    pub fn running_state(&self) -> Option<RunningState> {
        match self {
            ProtocolState::Idle => None,
            ProtocolState::Dialing | ProtocolState::Alerting => Some(RunningState::Dialing),
            ProtocolState::Incoming | ProtocolState::Waiting => Some(RunningState::Ringing),
            ProtocolState::Active => Some(RunningState::Active),
            ProtocolState::Holding => Some(RunningState::Holding),
            ProtocolState::Disconnecting => Some(RunningState::Disconnecting),
            ProtocolState::Disconnected => Some(RunningState::Disconnected),
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Media mode of a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoState {
    #[default]
    Voice,
    Video,
    ReceiveOnly,
    TransmitOnly,
}

/// How an incoming call was dealt with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    #[default]
    Missed,
    Active,
    Blocked,
    Rejected,
}

/// Conference coordinator state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConferenceState {
    #[default]
    Idle,
    /// Combine sent to the bearer, waiting for its answer
    Creating,
    Active,
}

/// Conference membership as seen by one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceMembership {
    pub main_call_id: CallId,
    pub sub_call_ids: BTreeSet<CallId>,
}

impl ConferenceMembership {
    pub fn is_main(&self, call_id: CallId) -> bool {
        self.main_call_id == call_id
    }
}

/// Command kinds an entity can have outstanding with its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Dial,
    Answer,
    Reject,
    HangUp,
    Hold,
    Unhold,
    Switch,
    StartDtmf,
    StopDtmf,
    Combine,
    Separate,
    KickOut,
    SetMute,
    UpdateMediaMode,
}

impl RequestKind {
    /// Requests that end the call. These may replace an in-flight dial or answer.
    pub fn is_termination(&self) -> bool {
        matches!(
            self,
            RequestKind::Reject | RequestKind::HangUp | RequestKind::KickOut
        )
    }

    /// Requests tracked as pending until the bearer answers
    pub fn is_tracked(&self) -> bool {
        !matches!(
            self,
            RequestKind::StartDtmf | RequestKind::StopDtmf | RequestKind::SetMute
        )
    }

    /// Whether a reported signaling state settles this request
    pub fn is_settled_by(&self, state: ProtocolState) -> bool {
        use ProtocolState::*;

        if state == Disconnected {
            return true;
        }
        match self {
            RequestKind::Dial => matches!(state, Dialing | Alerting | Active),
            RequestKind::Answer => matches!(state, Active | Disconnecting),
            RequestKind::Reject | RequestKind::HangUp | RequestKind::KickOut => {
                state == Disconnecting
            }
            RequestKind::Hold => state == Holding,
            RequestKind::Unhold => state == Active,
            RequestKind::Switch => matches!(state, Active | Holding),
            // settled through async results
            _ => false,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why a call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Hung up from this device
    LocalHangUp,
    /// Rejected from this device
    LocalReject,
    /// Released by the network or the remote party
    RemoteRelease,
    /// Refused at admission
    Blocked,
    /// The bearer could not place the call
    DialFailed(String),
}

/// In-call keypad digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtmfDigit {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Star,
    Pound,
    A,
    B,
    C,
    D,
}

impl DtmfDigit {
    pub fn to_char(&self) -> char {
        match self {
            DtmfDigit::Zero => '0',
            DtmfDigit::One => '1',
            DtmfDigit::Two => '2',
            DtmfDigit::Three => '3',
            DtmfDigit::Four => '4',
            DtmfDigit::Five => '5',
            DtmfDigit::Six => '6',
            DtmfDigit::Seven => '7',
            DtmfDigit::Eight => '8',
            DtmfDigit::Nine => '9',
            DtmfDigit::Star => '*',
            DtmfDigit::Pound => '#',
            DtmfDigit::A => 'A',
            DtmfDigit::B => 'B',
            DtmfDigit::C => 'C',
            DtmfDigit::D => 'D',
        }
    }

    /// Parse a keypad character; letters are accepted in either case
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            '0' => Some(DtmfDigit::Zero),
            '1' => Some(DtmfDigit::One),
            '2' => Some(DtmfDigit::Two),
            '3' => Some(DtmfDigit::Three),
            '4' => Some(DtmfDigit::Four),
            '5' => Some(DtmfDigit::Five),
            '6' => Some(DtmfDigit::Six),
            '7' => Some(DtmfDigit::Seven),
            '8' => Some(DtmfDigit::Eight),
            '9' => Some(DtmfDigit::Nine),
            '*' => Some(DtmfDigit::Star),
            '#' => Some(DtmfDigit::Pound),
            'A' => Some(DtmfDigit::A),
            'B' => Some(DtmfDigit::B),
            'C' => Some(DtmfDigit::C),
            'D' => Some(DtmfDigit::D),
            _ => None,
        }
    }
}
