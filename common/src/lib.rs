//! Shared building blocks for the debug stream workspace.
//!
//! Every error type in the workspace records where it was raised. The
//! [`ErrorLocation`] type defined here is that record: it is captured with
//! `#[track_caller]` at the error site and rendered as `[file:line:column]`
//! at the end of each error message.

pub mod error;

pub use error::error_location::ErrorLocation;
