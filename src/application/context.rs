//! Service context
//!
//! Everything the orchestrator needs, gathered once at start-up.

use crate::config::Config;
use crate::domain::ports::{BearerChannel, CallObserver, CompanionChannel, PrivacyGuard};
use std::sync::Arc;

#[derive(Default)]
pub struct CallContext {
    pub config: Config,
    pub bearer: Option<Arc<dyn BearerChannel>>,
    pub companion: Option<Arc<dyn CompanionChannel>>,
    pub privacy: Option<Arc<dyn PrivacyGuard>>,
    pub observers: Vec<Arc<dyn CallObserver>>,
}

impl CallContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Radio bearer for CS, IMS and satellite calls
    pub fn with_bearer(mut self, bearer: Arc<dyn BearerChannel>) -> Self {
        self.bearer = Some(bearer);
        self
    }

    /// Companion service for Bluetooth and VoIP calls
    pub fn with_companion(mut self, companion: Arc<dyn CompanionChannel>) -> Self {
        self.companion = Some(companion);
        self
    }

    pub fn with_privacy_guard(mut self, privacy: Arc<dyn PrivacyGuard>) -> Self {
        self.privacy = Some(privacy);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}
