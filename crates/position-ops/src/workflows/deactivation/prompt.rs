use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAction {
    Affirm,
    Decline,
}

impl PromptAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Affirm => "Yes",
            Self::Decline => "No",
        }
    }
}

/// Which confirmation gate of the saga is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Deactivation,
    Reassignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub title: String,
    pub message: String,
    pub emphasized: PromptAction,
}

impl Prompt {
    pub fn confirmation(kind: PromptKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: "Confirmation...".to_string(),
            message: message.into(),
            emphasized: PromptAction::Affirm,
        }
    }

    pub fn actions(&self) -> [PromptAction; 2] {
        [PromptAction::Affirm, PromptAction::Decline]
    }
}

/// Asks a person to approve the next saga step; resolved whenever they answer.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, prompt: &Prompt) -> PromptAction;
}
