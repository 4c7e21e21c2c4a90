//! Shared application state.

use std::sync::Arc;

use crate::broker::Broker;

/// Shared application state: handlers only ever talk to the broker.
pub struct AppState {
    pub broker: Arc<Broker>,
}
