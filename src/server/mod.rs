//! HTTP layer: routes, handlers and the server runner.

mod handler;
mod runner;
mod signal;
mod state;

pub use runner::{build_router, run_server};
pub use state::AppState;
