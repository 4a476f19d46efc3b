//! Choice and confirmation capabilities. Any UI (terminal, web view, test
//! harness) implements these; the crate only consumes the answers.

use async_trait::async_trait;
use serde::Serialize;

use crate::record::ScriptRecord;

pub const CHOICE_TITLE: &str = "Select a Script";
pub const CHOICE_PROMPT: &str = "Multiple scripts share this trigger. Choose one to run.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptChoice {
    pub id: String,
    pub label: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceRequest {
    pub title: String,
    pub prompt: String,
    pub choices: Vec<ScriptChoice>,
    /// Id of the pre-selected choice.
    pub default: String,
}

#[async_trait]
pub trait ChoicePrompt: Send + Sync {
    /// Resolves to a choice id, or `None` when dismissed.
    async fn choose(&self, request: ChoiceRequest) -> Option<String>;
}

#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, title: &str, content: &str) -> bool;
}

/// Asks the user to pick one of `records`. Resolves to `None` without asking
/// when there is nothing to pick from, or when the answer names no candidate.
pub async fn present(prompt: &dyn ChoicePrompt, records: &[ScriptRecord]) -> Option<String> {
    let first = records.first()?;
    let request = ChoiceRequest {
        title: CHOICE_TITLE.to_string(),
        prompt: CHOICE_PROMPT.to_string(),
        choices: records
            .iter()
            .map(|r| ScriptChoice {
                id: r.id.clone(),
                label: r.name.clone(),
                icon: r.img.clone(),
            })
            .collect(),
        default: first.id.clone(),
    };
    let chosen = prompt.choose(request).await?;
    records
        .iter()
        .any(|r| r.id == chosen)
        .then_some(chosen)
}
