//! # Language Dispatcher
//!
//! Routes one code execution to the embedded runtime or the sidecar worker
//! client based on the record's declared language. Every execution walks
//! the same state machine:
//!
//! `Pending → Dispatched → {CompletedSuccess, CompletedFailure, Faulted,
//! TimedOut, BackendUnavailable}`
//!
//! No failure class escapes this boundary as an error; each lands in a
//! terminal state the normalizer can map.

use std::time::Instant;

use uuid::Uuid;

use crate::definitions::Language;
use crate::observability::Logger;
use crate::runtime::EmbeddedRuntime;
use crate::worker::WorkerClient;

use super::context::ExecutionContext;
use super::envelope::ResponseEnvelope;

/// Execution lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Pending,
    Dispatched,
    CompletedSuccess,
    CompletedFailure,
    Faulted,
    TimedOut,
    BackendUnavailable,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Dispatched => "dispatched",
            ExecutionState::CompletedSuccess => "completed_success",
            ExecutionState::CompletedFailure => "completed_failure",
            ExecutionState::Faulted => "faulted",
            ExecutionState::TimedOut => "timed_out",
            ExecutionState::BackendUnavailable => "backend_unavailable",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Pending | ExecutionState::Dispatched)
    }
}

/// Terminal result of one code execution
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The code ran to completion; its envelope speaks for itself
    Completed(ResponseEnvelope),

    /// Parse or runtime fault, message already sanitized
    Faulted { message: String, error_type: String },

    /// Wall-clock budget exhausted
    TimedOut,

    /// Sidecar unreachable or its database driver unavailable
    BackendUnavailable,
}

impl ExecutionOutcome {
    /// Terminal state this outcome landed in
    pub fn state(&self) -> ExecutionState {
        match self {
            ExecutionOutcome::Completed(envelope) => {
                if envelope.success {
                    ExecutionState::CompletedSuccess
                } else {
                    ExecutionState::CompletedFailure
                }
            }
            ExecutionOutcome::Faulted { .. } => ExecutionState::Faulted,
            ExecutionOutcome::TimedOut => ExecutionState::TimedOut,
            ExecutionOutcome::BackendUnavailable => ExecutionState::BackendUnavailable,
        }
    }

    /// Collapse into the envelope returned to the caller
    pub fn into_envelope(self) -> ResponseEnvelope {
        match self {
            ExecutionOutcome::Completed(envelope) => envelope,
            ExecutionOutcome::Faulted {
                message,
                error_type,
            } => ResponseEnvelope::fault(&message, &error_type),
            ExecutionOutcome::TimedOut => ResponseEnvelope::timed_out(),
            ExecutionOutcome::BackendUnavailable => ResponseEnvelope::backend_unavailable(),
        }
    }
}

/// Routes executions to the right backend
pub struct Dispatcher {
    embedded: EmbeddedRuntime,
    worker: WorkerClient,
    logger: Logger,
}

impl Dispatcher {
    pub fn new(embedded: EmbeddedRuntime, worker: WorkerClient) -> Self {
        Self {
            embedded,
            worker,
            logger: Logger::new("dispatcher"),
        }
    }

    /// Execute one snippet against the context, landing in a terminal
    /// state whatever the code does.
    pub async fn dispatch(
        &self,
        execution_id: Uuid,
        language: Language,
        code: &str,
        context: &ExecutionContext,
    ) -> ExecutionOutcome {
        let id = execution_id.to_string();
        self.logger.debug(
            "EXECUTION_DISPATCHED",
            &[("execution_id", &id), ("language", language.as_str())],
        );

        let started = Instant::now();
        let outcome = match language {
            Language::Rhai => self.embedded.execute(code, context).await,
            Language::Javascript => self.worker.execute(code, context).await,
        };
        let duration_ms = started.elapsed().as_millis().to_string();

        debug_assert!(outcome.state().is_terminal());
        self.logger.info(
            "EXECUTION_FINISHED",
            &[
                ("execution_id", &id),
                ("language", language.as_str()),
                ("state", outcome.state().as_str()),
                ("duration_ms", &duration_ms),
            ],
        );
        outcome
    }
}
