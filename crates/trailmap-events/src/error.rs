use thiserror::Error;
use uuid::Uuid;

use trailmap_core::EventType;

/// Failure reported by an injected external service.
///
/// Retry policy belongs to the service implementation; the pipeline makes
/// exactly one attempt per handler invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// Store unreachable or otherwise failing.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Store refused the write (constraint violation and similar).
    #[error("rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler was subscribed to a type it does not understand.
    #[error("{handler} handler does not support {event_type}")]
    Unsupported {
        handler: &'static str,
        event_type: EventType,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("{operation} exceeded dispatch deadline")]
    DeadlineExceeded { operation: &'static str },

    #[error("{operation} failed: {source}")]
    External {
        operation: &'static str,
        #[source]
        source: CapabilityError,
    },

    /// Several independent steps of one handler failed.
    #[error("{}", join(.0))]
    Combined(Vec<HandlerError>),
}

impl HandlerError {
    /// Fold the errors of independently attempted steps into one result.
    pub fn combine(errors: Vec<HandlerError>) -> Result<(), HandlerError> {
        let mut errors = errors;
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(HandlerError::Combined(errors)),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, HandlerError::Unsupported { .. })
    }

    /// True for cancellation and deadline expiry, including inside a combined error.
    pub fn is_cancellation(&self) -> bool {
        match self {
            HandlerError::Cancelled { .. } | HandlerError::DeadlineExceeded { .. } => true,
            HandlerError::Combined(errors) => errors.iter().all(HandlerError::is_cancellation),
            _ => false,
        }
    }
}

/// Aggregate result of a dispatch in which at least one handler failed.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(
        "{event_type} ({event_id}): {} of {total} handlers failed: {}",
        .failures.len(),
        summarize(.failures)
    )]
    Partial {
        event_id: Uuid,
        event_type: EventType,
        total: usize,
        failures: Vec<(&'static str, HandlerError)>,
    },
}

fn join(errors: &[HandlerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn summarize(failures: &[(&'static str, HandlerError)]) -> String {
    failures
        .iter()
        .map(|(handler, err)| format!("[{}] {}", handler, err))
        .collect::<Vec<_>>()
        .join(", ")
}
