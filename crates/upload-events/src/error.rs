//! Event bus error types

use thiserror::Error;

use crate::events::UploadEvent;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus is closed")]
    Closed,

    #[error("bus rejected {event} subscription change: {reason}")]
    Rejected { event: UploadEvent, reason: String },

    #[error("unknown event name: {0}")]
    UnknownEvent(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
