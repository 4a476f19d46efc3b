//! Contracts the embedding host provides: documents, identity resolution,
//! the item-use flow and user notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDoc {
    pub id: String,
    /// Globally unique reference, also the key of the item's flag storage.
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub system: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDoc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub system: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDoc {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
}

/// Who a chat message or script speaks as.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

/// A posted item-use card. Run buttons on it carry a script id; the card
/// carries the item it was produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCard {
    pub id: String,
    #[serde(default)]
    pub item_uuid: Option<String>,
    #[serde(default)]
    pub speaker: Speaker,
    #[serde(default)]
    pub content: String,
}

/// Options payload of the item-use flow. The dispatcher marks it before
/// re-entering the flow so the nested pre-use hook knows what to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseOptions {
    #[serde(default)]
    pub skip_scripts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Speaker for chat output attributed to the item's owner.
    fn speaker_for(&self, item: &ItemDoc) -> Speaker;

    /// Token on the active canvas, if a canvas is ready and the token is on it.
    fn canvas_token(&self, token_id: &str) -> Option<TokenDoc>;

    fn actor(&self, actor_id: &str) -> Option<ActorDoc>;

    /// The persona assigned to the local user, if any.
    fn user_character(&self) -> Option<ActorDoc>;

    /// World item by id, then by display name, then by uuid.
    async fn resolve_item(&self, reference: &str) -> Option<ItemDoc>;

    /// Starts the item-use flow again with the given options.
    async fn use_item(
        &self,
        item: &ItemDoc,
        config: &Value,
        options: UseOptions,
    ) -> Result<(), HostError>;

    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Embedded items owned by actors, needed by the linked-items API.
#[async_trait]
pub trait ActorInventory: Send + Sync {
    async fn create_owned_item(&self, actor_id: &str, data: Value) -> Result<ItemDoc, HostError>;

    /// Owned item by id, then by name.
    fn owned_item(&self, actor_id: &str, reference: &str) -> Option<ItemDoc>;

    async fn delete_owned_item(&self, actor_id: &str, item_id: &str) -> Result<(), HostError>;
}
