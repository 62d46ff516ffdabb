//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::triggers::TriggerPublisher;
use std::sync::Arc;
use threadboard_core::ports::IdentityService;
use threadboard_core::DocumentGateway;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: DocumentGateway,
    pub identity: Arc<dyn IdentityService>,
    pub triggers: TriggerPublisher,
}
