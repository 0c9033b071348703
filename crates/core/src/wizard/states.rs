use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::answers::AnswerSet;
use crate::submission::SubmissionPayload;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Submitting,
    Submitted,
    Failed { reason: String },
}

/// The externally visible state of a wizard, derived from its session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardState {
    AtStep { index: usize },
    Submitting,
    Submitted,
    /// The last step stays on screen with the error so the user can retry.
    Failed { index: usize, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSession {
    pub id: SessionId,
    pub current_step_index: usize,
    pub answers: AnswerSet,
    pub submission_state: SubmissionState,
    /// Always recomputed from `answers`, never patched.
    pub computed_price: i64,
}

impl WizardSession {
    pub fn state(&self) -> WizardState {
        match &self.submission_state {
            SubmissionState::Idle => WizardState::AtStep { index: self.current_step_index },
            SubmissionState::Submitting => WizardState::Submitting,
            SubmissionState::Submitted => WizardState::Submitted,
            SubmissionState::Failed { reason } => {
                WizardState::Failed { index: self.current_step_index, reason: reason.clone() }
            }
        }
    }
}

/// What the synchronous half of `advance` decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceDecision {
    Moved { from: usize, to: usize },
    Blocked { step: usize },
    Ignored,
    Submit(Box<SubmissionPayload>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Moved { from: usize, to: usize },
    /// The current step is incomplete; nothing changed.
    Blocked { step: usize },
    /// A submission is in flight or already done; nothing changed.
    Ignored,
    Submitted,
    Failed { reason: String },
}
