//! Agent loop state management
//!
//! Tracks the ReAct loop of a single run (iteration bound and phase) and the
//! bookkeeping a session exposes about its last run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{ReagentError, Result, TokenUsage};

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Waiting for the model's next response
    AwaitingModel,
    /// Decoding the response into an action
    Parsing,
    /// Running the requested tool
    Dispatching,
    /// An answer was produced
    Finished,
}

/// State of one run through the loop
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Model calls made so far
    pub iteration: usize,
    /// Maximum allowed model calls
    pub max_iterations: usize,
    pub phase: LoopPhase,
}

impl LoopState {
    /// Create a new loop state with the given bound
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            phase: LoopPhase::AwaitingModel,
        }
    }

    /// Check if another model call is allowed
    pub fn should_continue(&self) -> bool {
        self.iteration < self.max_iterations && self.phase != LoopPhase::Finished
    }

    /// Count a model call, failing once the bound is reached
    ///
    /// A finished loop accepts no further calls.
    pub fn begin_iteration(&mut self) -> Result<usize> {
        if !self.should_continue() {
            return Err(ReagentError::IterationsExceeded(self.max_iterations));
        }
        self.iteration += 1;
        self.phase = LoopPhase::AwaitingModel;
        Ok(self.iteration)
    }

    pub fn enter(&mut self, phase: LoopPhase) {
        self.phase = phase;
    }
}

/// Bookkeeping for the most recent run of a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetadata {
    pub conversation_id: Option<String>,
    /// Provider-reported usage summed over every model call
    pub usage: TokenUsage,
    /// Model calls made
    pub iterations: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunMetadata {
    /// Reset for a new run
    pub fn start(&mut self, conversation_id: Option<&str>) {
        *self = Self {
            conversation_id: conversation_id.map(str::to_string),
            started_at: Some(Utc::now()),
            ..Default::default()
        };
    }

    pub fn record_usage(&mut self, usage: Option<TokenUsage>) {
        if let Some(usage) = usage {
            self.usage.accumulate(&usage);
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Wall time of the run, once it has ended
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.ended_at? - self.started_at?)
    }
}
