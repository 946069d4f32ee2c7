//! Per-technology behavior behind the common call surface
//!
//! CS, IMS and satellite calls share one `CarrierCall` that talks to the
//! radio bearer and differ only in their capability flags. Bluetooth and VoIP
//! calls go through the companion service. OTT calls belong to the app that
//! created them and accept no control from the core.

use crate::domain::call::value_object::{CallKind, RequestKind};
use crate::domain::ports::{BearerChannel, ChannelRequest, CompanionChannel};
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// What a call variant lets the core do with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Dial, answer, reject and hang up
    pub control: bool,
    pub hold: bool,
    pub switch: bool,
    pub conference: bool,
    pub dtmf: bool,
    pub mute: bool,
    pub video_renegotiation: bool,
}

impl Capabilities {
    pub fn for_kind(kind: CallKind) -> Self {
        match kind {
            CallKind::Cs => Self {
                control: true,
                hold: true,
                switch: true,
                conference: true,
                dtmf: true,
                mute: true,
                video_renegotiation: false,
            },
            CallKind::Ims => Self {
                control: true,
                hold: true,
                switch: true,
                conference: true,
                dtmf: true,
                mute: true,
                video_renegotiation: true,
            },
            // one foreground satellite call, no supplementary services
            CallKind::Satellite => Self {
                control: true,
                hold: false,
                switch: false,
                conference: false,
                dtmf: true,
                mute: false,
                video_renegotiation: false,
            },
            CallKind::Ott => Self {
                control: false,
                hold: false,
                switch: false,
                conference: false,
                dtmf: false,
                mute: false,
                video_renegotiation: false,
            },
            CallKind::Bluetooth | CallKind::Voip => Self {
                control: true,
                hold: true,
                switch: true,
                conference: false,
                dtmf: true,
                mute: true,
                video_renegotiation: false,
            },
        }
    }

    pub fn allows(&self, request: RequestKind) -> bool {
        match request {
            RequestKind::Dial | RequestKind::Answer | RequestKind::Reject | RequestKind::HangUp => {
                self.control
            }
            RequestKind::Hold | RequestKind::Unhold => self.hold,
            RequestKind::Switch => self.switch,
            RequestKind::StartDtmf | RequestKind::StopDtmf => self.dtmf,
            RequestKind::Combine | RequestKind::Separate | RequestKind::KickOut => self.conference,
            RequestKind::SetMute => self.mute,
            RequestKind::UpdateMediaMode => self.video_renegotiation,
        }
    }
}

/// Shared behavior of CS, IMS and satellite calls
pub struct CarrierCall {
    kind: CallKind,
    bearer: Arc<dyn BearerChannel>,
}

impl CarrierCall {
    pub fn new(kind: CallKind, bearer: Arc<dyn BearerChannel>) -> Self {
        Self { kind, bearer }
    }

    fn send(&self, request: ChannelRequest) -> Result<()> {
        self.bearer.submit(request)
    }
}

/// Bluetooth or VoIP call driven by the companion service
pub struct CompanionCall {
    kind: CallKind,
    companion: Arc<dyn CompanionChannel>,
}

impl CompanionCall {
    pub fn new(kind: CallKind, companion: Arc<dyn CompanionChannel>) -> Self {
        Self { kind, companion }
    }

    fn send(&self, request: ChannelRequest) -> Result<()> {
        self.companion.submit(request)
    }
}

pub enum CallVariant {
    Carrier(CarrierCall),
    Ott,
    Companion(CompanionCall),
}

impl CallVariant {
    pub fn kind(&self) -> CallKind {
        match self {
            CallVariant::Carrier(carrier) => carrier.kind,
            CallVariant::Ott => CallKind::Ott,
            CallVariant::Companion(companion) => companion.kind,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_kind(self.kind())
    }

    /// Hand a command to the channel that owns this call
    pub fn send(&self, request: ChannelRequest) -> Result<()> {
        match self {
            CallVariant::Carrier(carrier) => carrier.send(request),
            CallVariant::Companion(companion) => companion.send(request),
            CallVariant::Ott => Err(CallError::Unsupported(
                "OTT calls are controlled by their app".to_string(),
            )),
        }
    }
}

impl fmt::Debug for CallVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallVariant::Carrier(carrier) => write!(f, "Carrier({})", carrier.kind),
            CallVariant::Ott => f.write_str("Ott"),
            CallVariant::Companion(companion) => write!(f, "Companion({})", companion.kind),
        }
    }
}
