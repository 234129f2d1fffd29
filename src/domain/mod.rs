//! Domain layer for o11y-client.
//!
//! Contains the canonical types shared across all modules:
//! - `Event`: a producer payload waiting to be serialized
//! - `Envelope`: the NDJSON record sent to the collector
//! - `Action`: envelope tag (connect/data/closing)
//! - `ClientError`: errors returned to callers

pub mod action;
pub mod envelope;
pub mod error;
pub mod event;

pub use action::Action;
pub use envelope::{BadType, CheckResponse, Envelope};
pub use error::ClientError;
pub use event::Event;
