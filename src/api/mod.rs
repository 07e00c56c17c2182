//! Responder-facing API
//!
//! Length-prefixed JSON envelopes over TCP, routed into the coordinator.

mod handler;
mod server;

pub use server::ApiServer;
