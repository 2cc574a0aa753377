//! Asynchronous error notifications.
//!
//! Errors that happen away from the caller's thread (on the solver thread,
//! or while rolling back a location whose distances could not be computed)
//! are delivered to subscribers instead of being returned.

use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

use crate::error::{DistanceError, SolverError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ErrorEvent {
    DistanceFailure { message: String, context: String },
    SolverFailure { message: String, context: String },
    InvariantViolation { message: String, context: String },
}

impl ErrorEvent {
    pub fn distance(err: &DistanceError, context: impl Into<String>) -> Self {
        ErrorEvent::DistanceFailure {
            message: err.to_string(),
            context: context.into(),
        }
    }

    pub fn solver(err: &SolverError, context: impl Into<String>) -> Self {
        let message = err.to_string();
        let context = context.into();
        if err.is_invariant_violation() {
            ErrorEvent::InvariantViolation { message, context }
        } else {
            ErrorEvent::SolverFailure { message, context }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorEvent::DistanceFailure { message, .. }
            | ErrorEvent::SolverFailure { message, .. }
            | ErrorEvent::InvariantViolation { message, .. } => message,
        }
    }

    pub fn context(&self) -> &str {
        match self {
            ErrorEvent::DistanceFailure { context, .. }
            | ErrorEvent::SolverFailure { context, .. }
            | ErrorEvent::InvariantViolation { context, .. } => context,
        }
    }
}

/// Fans error events out to every live subscriber.
#[derive(Debug, Default)]
pub struct ErrorNotifier {
    subscribers: Mutex<Vec<Sender<ErrorEvent>>>,
}

impl ErrorNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ErrorEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Logs the event and hands it to subscribers. Subscribers whose receiver
    /// was dropped are forgotten.
    pub fn notify(&self, event: ErrorEvent) {
        error!(context = event.context(), "{}", event.message());
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
