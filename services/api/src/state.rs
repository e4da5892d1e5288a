//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared services
//! every handler works through.

use crate::planning::PlanningService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub planning: Arc<PlanningService>,
}
