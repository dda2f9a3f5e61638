//! Domain models for the debug/log stream.
//!
//! This crate contains the data that crosses the wire or the public API of
//! `stream-core`: connection states, command and event envelopes, target ids
//! and validated endpoints. Models have no I/O and no runtime - they're just
//! data that can be passed between layers.
//!
//! ## Architecture
//!
//! - **common**: error location tracking
//! - **models** (this crate): pure data structures
//! - **stream-core**: connection lifecycle, dispatch and command delivery
//! - **debug-console**: terminal consumer wiring everything together

pub mod command;
pub mod connection_state;
pub mod endpoint;
pub mod error;
pub mod inbound;
pub mod target;

pub use command::{CommandKind, OutboundCommand};
pub use common::ErrorLocation;
pub use connection_state::ConnectionState;
pub use endpoint::{DEBUG_FEATURE, DEPLOYMENT_LOGS_FEATURE, Endpoint};
pub use endpoint::builder::EndpointBuilder;
pub use error::model_error::ModelError;
pub use inbound::{
    ErrorPayload, ExecutionState, InboundEnvelope, InboundEvent, InboundKind, LogPayload,
    StateChangePayload,
};
pub use target::TargetId;

#[cfg(test)]
mod tests;
