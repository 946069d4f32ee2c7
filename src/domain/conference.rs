//! Conference bookkeeping
//!
//! One coordinator per call family (CS, IMS). A coordinator only stores call
//! ids; entities are resolved through the registry. Its lock covers its own
//! book and nothing is called while it is held.
use crate::domain::call::value_object::{CallKind, ConferenceMembership, ConferenceState};
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of asking for a combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStart {
    /// Combine recorded, the caller must now send it to the bearer
    Started,
    /// A combine is already being created; nothing to do
    Coalesced,
}

#[derive(Debug, Default)]
struct ConferenceBook {
    state: ConferenceState,
    main_call_id: Option<CallId>,
    sub_call_ids: BTreeSet<CallId>,
    /// Designation in force before the current combine
    prior_main_call_id: Option<CallId>,
    /// Main call of the combine being created
    combining: Option<CallId>,
    /// Separated calls awaiting bearer confirmation, with the book they left
    separating: BTreeMap<CallId, Separation>,
}

/// Designation in force when a call was separated
#[derive(Debug)]
struct Separation {
    main_call_id: Option<CallId>,
    sub_call_ids: BTreeSet<CallId>,
}

impl Separation {
    fn forget(&mut self, call_id: CallId) {
        if self.main_call_id == Some(call_id) {
            self.main_call_id = None;
        }
        self.sub_call_ids.remove(&call_id);
    }

    fn members(&self) -> impl Iterator<Item = CallId> + '_ {
        self.main_call_id
            .into_iter()
            .chain(self.sub_call_ids.iter().copied())
    }
}

impl ConferenceBook {
    fn is_member(&self, call_id: CallId) -> bool {
        self.main_call_id == Some(call_id) || self.sub_call_ids.contains(&call_id)
    }

    fn membership(&self) -> Option<ConferenceMembership> {
        if self.state == ConferenceState::Idle {
            return None;
        }
        self.main_call_id.map(|main_call_id| ConferenceMembership {
            main_call_id,
            sub_call_ids: self.sub_call_ids.clone(),
        })
    }

    /// Drop `call_id`, promoting the lowest sub-call if it was main
    fn remove(&mut self, call_id: CallId) {
        if self.main_call_id == Some(call_id) {
            self.main_call_id = self.sub_call_ids.pop_first();
        } else {
            self.sub_call_ids.remove(&call_id);
        }
        if self.sub_call_ids.is_empty() {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.state = ConferenceState::Idle;
        self.main_call_id = None;
        self.sub_call_ids.clear();
    }

    /// Back to what the remaining sub-calls support
    fn abort_combine(&mut self) {
        self.combining = None;
        let prior_main = self.prior_main_call_id.take();
        match prior_main.filter(|id| !self.sub_call_ids.contains(id)) {
            Some(main) => self.main_call_id = Some(main),
            None => self.main_call_id = self.sub_call_ids.pop_first(),
        }
        if self.sub_call_ids.is_empty() {
            self.reset();
        } else {
            self.state = ConferenceState::Active;
        }
    }
}

pub struct ConferenceCoordinator {
    kind: CallKind,
    max_sub_calls: usize,
    book: Mutex<ConferenceBook>,
}

impl ConferenceCoordinator {
    pub fn new(kind: CallKind, max_sub_calls: usize) -> Self {
        Self {
            kind,
            max_sub_calls,
            book: Mutex::new(ConferenceBook::default()),
        }
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn max_sub_calls(&self) -> usize {
        self.max_sub_calls
    }

    pub fn state(&self) -> ConferenceState {
        self.lock().state
    }

    pub fn begin_combine(&self, main_call_id: CallId) -> CombineStart {
        let mut book = self.lock();
        if book.state == ConferenceState::Creating {
            debug!(
                "{} conference already being created, combine on call {} coalesced",
                self.kind, main_call_id
            );
            return CombineStart::Coalesced;
        }
        book.prior_main_call_id = book.main_call_id;
        book.combining = Some(main_call_id);
        book.state = ConferenceState::Creating;
        info!("{} conference creating around call {}", self.kind, main_call_id);
        CombineStart::Started
    }

    /// Bearer confirmed the combine
    pub fn commit_combine(
        &self,
        main_call_id: CallId,
        members: impl IntoIterator<Item = CallId>,
    ) -> Result<ConferenceMembership> {
        let mut book = self.lock();
        if book.state != ConferenceState::Creating {
            return Err(CallError::StateConflict(format!(
                "{} conference is {:?}, not creating",
                self.kind, book.state
            )));
        }
        if let Some(previous) = book.main_call_id.filter(|id| *id != main_call_id) {
            book.sub_call_ids.insert(previous);
        }
        book.sub_call_ids
            .extend(members.into_iter().filter(|id| *id != main_call_id));
        book.sub_call_ids.remove(&main_call_id);
        book.main_call_id = Some(main_call_id);
        book.prior_main_call_id = None;
        book.combining = None;
        book.state = ConferenceState::Active;

        info!(
            "{} conference active, main {} with {} sub-calls",
            self.kind,
            main_call_id,
            book.sub_call_ids.len()
        );
        Ok(ConferenceMembership {
            main_call_id,
            sub_call_ids: book.sub_call_ids.clone(),
        })
    }

    /// Bearer refused the combine: back to what the remaining sub-calls support
    pub fn abort_combine(&self) -> ConferenceState {
        let mut book = self.lock();
        if book.state != ConferenceState::Creating {
            return book.state;
        }
        book.abort_combine();
        warn!("{} conference combine failed, back to {:?}", self.kind, book.state);
        book.state
    }

    /// Main call of the combine in flight
    pub fn combining(&self) -> Option<CallId> {
        self.lock().combining
    }

    /// Take `call_id` out of an active conference
    ///
    /// Returns the membership left behind, `None` once the conference is gone.
    pub fn separate(&self, call_id: CallId) -> Result<Option<ConferenceMembership>> {
        let mut book = self.lock();
        if book.state != ConferenceState::Active {
            return Err(CallError::StateConflict(format!(
                "{} conference is {:?}",
                self.kind, book.state
            )));
        }
        if !book.is_member(call_id) {
            return Err(CallError::StateConflict(format!(
                "Call {} is not in the {} conference",
                call_id, self.kind
            )));
        }
        let separation = Separation {
            main_call_id: book.main_call_id,
            sub_call_ids: book.sub_call_ids.clone(),
        };
        book.separating.insert(call_id, separation);
        book.remove(call_id);
        info!("Call {} separated from {} conference", call_id, self.kind);
        Ok(book.membership())
    }

    /// Drop a call that ended; non-members are ignored
    ///
    /// If the call was the main of a combine in flight, that combine is
    /// abandoned. Returns whether the book changed.
    pub fn leave(&self, call_id: CallId) -> bool {
        let mut book = self.lock();
        book.separating.remove(&call_id);
        for separation in book.separating.values_mut() {
            separation.forget(call_id);
        }
        let mut changed = false;
        if book.combining == Some(call_id) {
            book.abort_combine();
            changed = true;
        }
        if book.is_member(call_id) {
            book.remove(call_id);
            changed = true;
        }
        if changed {
            debug!("Call {} left {} conference", call_id, self.kind);
        }
        changed
    }

    /// Bearer confirmed a separation
    pub fn settle_separation(&self, call_id: CallId) {
        self.lock().separating.remove(&call_id);
    }

    /// Put a call back after the bearer refused to separate it
    ///
    /// The designation recorded at separation is restored as far as its
    /// calls are still around: calls that ended since are left out, and
    /// calls with their own separation still pending stay out.
    pub fn rejoin(&self, call_id: CallId) -> Option<ConferenceMembership> {
        let mut book = self.lock();
        let separation = book.separating.remove(&call_id)?;
        if book.state == ConferenceState::Creating {
            // the combine in flight settles the designation
            book.sub_call_ids.insert(call_id);
            info!("Call {} rejoined {} conference being created", call_id, self.kind);
            return book.membership();
        }

        let mut members: BTreeSet<CallId> = book
            .main_call_id
            .into_iter()
            .chain(book.sub_call_ids.iter().copied())
            .chain(separation.members())
            .collect();
        members.insert(call_id);
        let pending: Vec<CallId> = book.separating.keys().copied().collect();
        for other in pending {
            members.remove(&other);
        }

        let main_call_id = separation
            .main_call_id
            .filter(|main| members.contains(main))
            .or(book.main_call_id)
            .or_else(|| members.first().copied());
        match main_call_id {
            Some(main) => {
                members.remove(&main);
                book.main_call_id = Some(main);
                book.sub_call_ids = members;
            }
            None => book.sub_call_ids.clear(),
        }
        if book.sub_call_ids.is_empty() {
            book.reset();
        } else {
            book.state = ConferenceState::Active;
        }
        info!("Call {} rejoined {} conference", call_id, self.kind);
        book.membership()
    }

    pub fn contains(&self, call_id: CallId) -> bool {
        self.lock().is_member(call_id)
    }

    pub fn main_call_id(&self) -> Option<CallId> {
        self.lock().main_call_id
    }

    pub fn sub_call_ids(&self) -> Vec<CallId> {
        self.lock().sub_call_ids.iter().copied().collect()
    }

    /// Main call first, then sub-calls in id order
    pub fn call_ids(&self) -> Vec<CallId> {
        let book = self.lock();
        book.main_call_id
            .into_iter()
            .chain(book.sub_call_ids.iter().copied())
            .collect()
    }

    pub fn membership(&self) -> Option<ConferenceMembership> {
        self.lock().membership()
    }

    fn lock(&self) -> MutexGuard<'_, ConferenceBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The coordinators of every family that supports conferences
pub struct ConferenceDirectory {
    coordinators: Vec<ConferenceCoordinator>,
}

impl ConferenceDirectory {
    pub fn new(coordinators: Vec<ConferenceCoordinator>) -> Self {
        Self { coordinators }
    }

    pub fn for_kind(&self, kind: CallKind) -> Option<&ConferenceCoordinator> {
        self.coordinators.iter().find(|c| c.kind() == kind)
    }
}
