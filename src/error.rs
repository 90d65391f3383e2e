//! Errors surfaced to callers at validation boundaries.

use thiserror::Error;
use uuid::Uuid;

/// Rejected settings input. Nothing is written when `save` returns one of these.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{field} must be at least one minute")]
    ZeroDuration { field: &'static str },

    #[error("volume must be between 0 and 1, got {0}")]
    VolumeOutOfRange(f32),

    #[error("{field} must name a sound")]
    EmptySoundId { field: &'static str },

    #[error("failed to persist settings: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task text is empty")]
    EmptyText,

    #[error("no task with id {0}")]
    NotFound(Uuid),

    #[error("failed to persist tasks: {0:#}")]
    Storage(#[from] anyhow::Error),
}
