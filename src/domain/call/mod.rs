//! Call bounded context - one live call and its vocabulary

pub mod entity;
pub mod event;
pub mod value_object;
pub mod variant;

pub use entity::{CallEntity, CallSnapshot};
pub use event::{CallEvent, CallEventKind, DisconnectDetails};
pub use value_object::{
    CallDirection, CallKind, ConferenceState, DisconnectReason, ProtocolState, RequestKind,
    RunningState, VideoState,
};
pub use variant::{CallVariant, Capabilities};
