//! HTTP long-polling chat broker library.
//!
//! Clients exchange short text messages over plain HTTP request/response
//! cycles: a poll is held open by the broker until a message arrives or a
//! renewal timeout elapses, emulating push over ordinary HTTP.

// layers
pub mod broker;
pub mod domain;
pub mod infrastructure;
pub mod server;

// shared library
pub mod common;
