//! In-process doubles for the host, engine and prompt capabilities.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HostError, ScriptRuntimeError};
use crate::host::{
    ActorDoc, ActorInventory, Host, ItemDoc, NoticeLevel, Speaker, TokenDoc, UseOptions,
};
use crate::prompt::{ChoicePrompt, ChoiceRequest, ConfirmPrompt};
use crate::scripting::{ScriptEngine, ScriptScope};

pub fn item(id: &str) -> ItemDoc {
    ItemDoc {
        id: id.to_string(),
        uuid: format!("Item.{id}"),
        name: id.to_string(),
        actor_id: None,
        system: Value::Null,
    }
}

/// Interprets commands as JSON literals. `throw ...` fails, blank yields null.
#[derive(Default)]
pub struct StubEngine {
    runs: Mutex<Vec<(String, ScriptScope)>>,
}

impl StubEngine {
    pub fn runs(&self) -> Vec<(String, ScriptScope)> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn run(&self, command: &str, scope: &ScriptScope) -> Result<Value, ScriptRuntimeError> {
        self.runs
            .lock()
            .unwrap()
            .push((command.to_string(), scope.clone()));
        let command = command.trim();
        if command.starts_with("throw") {
            return Err(ScriptRuntimeError::Runtime(command.to_string()));
        }
        if command.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(command).map_err(|e| ScriptRuntimeError::Compile(e.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingHost {
    items: Mutex<Vec<ItemDoc>>,
    actors: Mutex<HashMap<String, ActorDoc>>,
    tokens: Mutex<HashMap<String, TokenDoc>>,
    actor_tokens: Mutex<HashMap<String, String>>,
    character: Mutex<Option<ActorDoc>>,
    owned: Mutex<HashMap<String, Vec<ItemDoc>>>,
    notices: Mutex<Vec<(NoticeLevel, String)>>,
    uses: Mutex<Vec<(ItemDoc, UseOptions, Value)>>,
    next_owned: Mutex<u32>,
}

impl RecordingHost {
    pub fn add_item(&self, item: ItemDoc) {
        self.items.lock().unwrap().push(item);
    }

    pub fn add_actor(&self, actor: ActorDoc) {
        self.actors.lock().unwrap().insert(actor.id.clone(), actor);
    }

    /// Puts `token` on the canvas as the active token of `actor_id`.
    pub fn place_token(&self, actor_id: &str, token: TokenDoc) {
        self.actor_tokens
            .lock()
            .unwrap()
            .insert(actor_id.to_string(), token.id.clone());
        self.tokens.lock().unwrap().insert(token.id.clone(), token);
    }

    pub fn set_character(&self, actor: ActorDoc) {
        *self.character.lock().unwrap() = Some(actor);
    }

    pub fn give(&self, actor_id: &str, item: ItemDoc) {
        self.owned
            .lock()
            .unwrap()
            .entry(actor_id.to_string())
            .or_default()
            .push(item);
    }

    pub fn owned(&self, actor_id: &str) -> Vec<ItemDoc> {
        self.owned
            .lock()
            .unwrap()
            .get(actor_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn uses(&self) -> Vec<(ItemDoc, UseOptions, Value)> {
        self.uses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn speaker_for(&self, item: &ItemDoc) -> Speaker {
        let actor = item.actor_id.clone();
        let token = actor
            .as_deref()
            .and_then(|id| self.actor_tokens.lock().unwrap().get(id).cloned());
        let alias = actor
            .as_deref()
            .and_then(|id| self.actor(id))
            .map(|a| a.name)
            .or_else(|| Some(item.name.clone()));
        Speaker {
            scene: None,
            actor,
            token,
            alias,
        }
    }

    fn canvas_token(&self, token_id: &str) -> Option<TokenDoc> {
        self.tokens.lock().unwrap().get(token_id).cloned()
    }

    fn actor(&self, actor_id: &str) -> Option<ActorDoc> {
        self.actors.lock().unwrap().get(actor_id).cloned()
    }

    fn user_character(&self) -> Option<ActorDoc> {
        self.character.lock().unwrap().clone()
    }

    async fn resolve_item(&self, reference: &str) -> Option<ItemDoc> {
        let items = self.items.lock().unwrap();
        items
            .iter()
            .find(|i| i.id == reference)
            .or_else(|| items.iter().find(|i| i.name == reference))
            .or_else(|| items.iter().find(|i| i.uuid == reference))
            .cloned()
    }

    async fn use_item(
        &self,
        item: &ItemDoc,
        config: &Value,
        options: UseOptions,
    ) -> Result<(), HostError> {
        self.uses
            .lock()
            .unwrap()
            .push((item.clone(), options, config.clone()));
        Ok(())
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

#[async_trait]
impl ActorInventory for RecordingHost {
    async fn create_owned_item(&self, actor_id: &str, data: Value) -> Result<ItemDoc, HostError> {
        if self.actor(actor_id).is_none() {
            return Err(HostError::NotFound {
                kind: "actor",
                reference: actor_id.to_string(),
            });
        }
        let id = {
            let mut next = self.next_owned.lock().unwrap();
            *next += 1;
            format!("owned{}", *next)
        };
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Item")
            .to_string();
        let created = ItemDoc {
            uuid: format!("Actor.{actor_id}.Item.{id}"),
            id,
            name,
            actor_id: Some(actor_id.to_string()),
            system: data.get("system").cloned().unwrap_or(Value::Null),
        };
        self.give(actor_id, created.clone());
        Ok(created)
    }

    fn owned_item(&self, actor_id: &str, reference: &str) -> Option<ItemDoc> {
        let owned = self.owned(actor_id);
        owned
            .iter()
            .find(|i| i.id == reference)
            .or_else(|| owned.iter().find(|i| i.name == reference))
            .cloned()
    }

    async fn delete_owned_item(&self, actor_id: &str, item_id: &str) -> Result<(), HostError> {
        let mut owned = self.owned.lock().unwrap();
        let items = owned.entry(actor_id.to_string()).or_default();
        let before = items.len();
        items.retain(|i| i.id != item_id);
        if items.len() == before {
            return Err(HostError::NotFound {
                kind: "item",
                reference: item_id.to_string(),
            });
        }
        Ok(())
    }
}

enum Answer {
    Index(usize),
    Id(String),
    Dismiss,
}

pub struct ScriptedPrompt {
    answer: Answer,
    requests: Mutex<Vec<ChoiceRequest>>,
}

impl ScriptedPrompt {
    pub fn choosing(index: usize) -> Self {
        Self::with(Answer::Index(index))
    }

    pub fn answering(id: &str) -> Self {
        Self::with(Answer::Id(id.to_string()))
    }

    pub fn dismissing() -> Self {
        Self::with(Answer::Dismiss)
    }

    fn with(answer: Answer) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChoiceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChoicePrompt for ScriptedPrompt {
    async fn choose(&self, request: ChoiceRequest) -> Option<String> {
        let answer = match &self.answer {
            Answer::Index(i) => request.choices.get(*i).map(|c| c.id.clone()),
            Answer::Id(id) => Some(id.clone()),
            Answer::Dismiss => None,
        };
        self.requests.lock().unwrap().push(request);
        answer
    }
}

pub struct FixedConfirm(pub bool);

#[async_trait]
impl ConfirmPrompt for FixedConfirm {
    async fn confirm(&self, _title: &str, _content: &str) -> bool {
        self.0
    }
}
