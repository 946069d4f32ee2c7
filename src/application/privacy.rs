//! Requests parked while privacy mode is elevated

use super::command::DialOptions;
use crate::domain::call::value_object::{RequestKind, VideoState};
use crate::domain::shared::value_objects::{CallId, PrivacyTicket};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeferredRequest {
    Dial { number: String, options: DialOptions },
    Answer { call_id: CallId, video_state: VideoState },
}

impl DeferredRequest {
    pub(crate) fn kind(&self) -> RequestKind {
        match self {
            DeferredRequest::Dial { .. } => RequestKind::Dial,
            DeferredRequest::Answer { .. } => RequestKind::Answer,
        }
    }

    /// Call the request is about; a dial has none until it is replayed
    pub(crate) fn call_id(&self) -> Option<CallId> {
        match self {
            DeferredRequest::Dial { .. } => None,
            DeferredRequest::Answer { call_id, .. } => Some(*call_id),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeferredRequests {
    requests: Mutex<HashMap<PrivacyTicket, DeferredRequest>>,
}

impl DeferredRequests {
    pub(crate) fn insert(&self, ticket: PrivacyTicket, request: DeferredRequest) {
        self.lock().insert(ticket, request);
    }

    pub(crate) fn take(&self, ticket: PrivacyTicket) -> Option<DeferredRequest> {
        self.lock().remove(&ticket)
    }

    /// Drop parked answers for a call that is gone
    pub(crate) fn discard_for_call(&self, call_id: CallId) -> Vec<PrivacyTicket> {
        let mut requests = self.lock();
        let tickets: Vec<PrivacyTicket> = requests
            .iter()
            .filter(|(_, request)| request.call_id() == Some(call_id))
            .map(|(ticket, _)| *ticket)
            .collect();
        for ticket in &tickets {
            requests.remove(ticket);
        }
        tickets
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PrivacyTicket, DeferredRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
