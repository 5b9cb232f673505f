//! Error types for Mailflow.

use uuid::Uuid;

use crate::queue::ScheduleState;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Engagement error: {0}")]
    Engagement(#[from] EngagementError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Delivery-provider errors. One variant per failure class; the adapter never
/// retries — callers decide what to do with these.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} rejected the message (status {status}): {body}")]
    Rejected {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    BuildFailed(String),
}

/// Dispatch-engine errors. Suppression is deliberately not here — a suppressed
/// recipient is an expected terminal outcome, modeled on `DispatchOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Scheduled-queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Scheduled entry {id} not found")]
    NotFound { id: Uuid },

    #[error("Scheduled entry {id} is {state:?}; operation requires the scheduled state")]
    InvalidState { id: Uuid, state: ScheduleState },

    #[error("Scheduled entry {id} is {state:?}; only terminal entries can be reset")]
    NotTerminal { id: Uuid, state: ScheduleState },
}

/// Engagement-store errors.
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("Engagement store write failed: {0}")]
    Store(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
