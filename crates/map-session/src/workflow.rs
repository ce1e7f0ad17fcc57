//! Memo submission and map generation.
//!
//! `Idle -> Submitting -> Generating -> Idle`. Only one submission may be in
//! flight per session. The controller performs the network calls; this type
//! owns the guard and decides which step comes next.

use serde::Serialize;

use crate::error::SessionError;
use crate::wire::{Memo, MemoId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    #[default]
    Idle,
    Submitting,
    Generating,
}

/// Next network call the controller should issue.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStep {
    CreateMemo(String),
    GenerateMap(MemoId),
}

#[derive(Debug, Default)]
pub struct GenerationWorkflow {
    phase: GenerationPhase,
}

impl GenerationWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase != GenerationPhase::Idle
    }

    /// Validate the text and claim the in-flight guard.
    ///
    /// Empty or whitespace-only text is rejected without leaving `Idle`.
    pub fn submit(&mut self, text: &str) -> Result<GenerationStep, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMemo);
        }
        if self.is_in_flight() {
            return Err(SessionError::GenerationInFlight);
        }
        self.phase = GenerationPhase::Submitting;
        Ok(GenerationStep::CreateMemo(text.to_string()))
    }

    /// The memo was created; generation for it comes next.
    pub fn memo_created(&mut self, memo: &Memo) -> Option<GenerationStep> {
        if self.phase != GenerationPhase::Submitting {
            return None;
        }
        self.phase = GenerationPhase::Generating;
        Some(GenerationStep::GenerateMap(memo.id.clone()))
    }

    /// Release the guard, whatever the outcome.
    pub fn finish(&mut self) {
        self.phase = GenerationPhase::Idle;
    }
}
