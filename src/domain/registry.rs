//! Call registry
//!
//! Catalog of every live call. Owns id allocation and the call-count
//! ceiling. One coarse lock guards the catalog; the registry lock is always
//! taken before any entity lock.

use crate::domain::call::entity::{CallEntity, CallSnapshot};
use crate::domain::call::value_object::RunningState;
use crate::domain::shared::error::CallError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Attribute copies of every live call, taken under the registry lock
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub calls: Vec<CallSnapshot>,
    pub max_call_count: usize,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn get(&self, call_id: CallId) -> Option<&CallSnapshot> {
        self.calls.iter().find(|call| call.call_id == call_id)
    }

    pub fn in_state(&self, state: RunningState) -> impl Iterator<Item = &CallSnapshot> {
        self.calls
            .iter()
            .filter(move |call| call.running_state == state)
    }
}

pub struct CallRegistry {
    calls: Mutex<Vec<Arc<CallEntity>>>,
    next_id: AtomicU32,
    max_call_count: usize,
}

impl CallRegistry {
    pub fn new(max_call_count: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(CallId::FIRST.value()),
            max_call_count,
        }
    }

    /// Next call id. Never repeats within this registry.
    pub fn allocate_id(&self) -> CallId {
        CallId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn max_call_count(&self) -> usize {
        self.max_call_count
    }

    pub fn add(&self, entity: Arc<CallEntity>) -> Result<()> {
        self.add_if(entity, |_| Ok(()))
    }

    /// Add `entity` if `admit` accepts the catalog as it stands
    ///
    /// The check and the insertion happen under one registry lock, so two
    /// concurrent admissions cannot both pass against the same catalog.
    pub fn add_if<F>(&self, entity: Arc<CallEntity>, admit: F) -> Result<()>
    where
        F: FnOnce(&RegistrySnapshot) -> Result<()>,
    {
        let mut calls = self.lock();
        let snapshot = self.snapshot_of(&calls);
        admit(&snapshot)?;

        if calls.iter().any(|call| call.id() == entity.id()) {
            return Err(CallError::Duplicate(format!("Call {}", entity.id())));
        }
        if calls.len() >= self.max_call_count {
            return Err(CallError::ResourceExhausted(format!(
                "Call count limit {} reached",
                self.max_call_count
            )));
        }

        info!(
            "Call {} ({}) registered, {} live",
            entity.id(),
            entity.kind(),
            calls.len() + 1
        );
        calls.push(entity);
        Ok(())
    }

    pub fn remove(&self, call_id: CallId) -> Result<Arc<CallEntity>> {
        let mut calls = self.lock();
        let index = calls
            .iter()
            .position(|call| call.id() == call_id)
            .ok_or_else(|| CallError::NotFound(format!("Call {}", call_id)))?;
        let entity = calls.remove(index);
        debug!("Call {} removed, {} live", call_id, calls.len());
        Ok(entity)
    }

    pub fn get(&self, call_id: CallId) -> Result<Arc<CallEntity>> {
        self.lock()
            .iter()
            .find(|call| call.id() == call_id)
            .cloned()
            .ok_or_else(|| CallError::NotFound(format!("Call {}", call_id)))
    }

    pub fn get_by_number(&self, number: &str) -> Option<Arc<CallEntity>> {
        self.lock()
            .iter()
            .find(|call| call.number() == number)
            .cloned()
    }

    pub fn get_by_state(&self, state: RunningState) -> Vec<Arc<CallEntity>> {
        self.lock()
            .iter()
            .filter(|call| call.running_state() == state)
            .cloned()
            .collect()
    }

    pub fn get_all(&self) -> Vec<Arc<CallEntity>> {
        self.lock().clone()
    }

    /// An outgoing call is still being set up
    pub fn has_pending_new_call(&self) -> bool {
        self.lock()
            .iter()
            .any(|call| call.running_state().is_new_call())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let calls = self.lock();
        self.snapshot_of(&calls)
    }

    fn snapshot_of(&self, calls: &[Arc<CallEntity>]) -> RegistrySnapshot {
        RegistrySnapshot {
            calls: calls.iter().map(|call| call.snapshot()).collect(),
            max_call_count: self.max_call_count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<CallEntity>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new(crate::config::AdmissionConfig::default().max_call_count)
    }
}
