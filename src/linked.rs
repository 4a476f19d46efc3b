//! Items granted alongside a main item and removed with it.
//!
//! The ids of the granted copies are remembered on the main item under
//! `scriptable-items.linkedItems`, so a later removal needs no arguments.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::flags::FlagStore;
use crate::host::{ActorInventory, Host, ItemDoc, NoticeLevel};
use crate::{FLAG_LINKED_ITEMS, MODULE_ID};

/// Something to grant: an existing item, a world reference (id, name or
/// uuid), or raw item data.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkedSource {
    Item(ItemDoc),
    Reference(String),
    Data(Value),
}

/// Something to take away again: an owned item or an id/name on the actor.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkedRef {
    Item(ItemDoc),
    Reference(String),
}

pub struct LinkedItems {
    flags: Arc<dyn FlagStore>,
    host: Arc<dyn Host>,
    inventory: Arc<dyn ActorInventory>,
}

impl LinkedItems {
    pub fn new(
        flags: Arc<dyn FlagStore>,
        host: Arc<dyn Host>,
        inventory: Arc<dyn ActorInventory>,
    ) -> Self {
        Self {
            flags,
            host,
            inventory,
        }
    }

    /// Copies every source into the main item's actor and records the new ids.
    /// Returns the created items.
    pub async fn add(&self, main: &ItemDoc, sources: Vec<LinkedSource>) -> Result<Vec<ItemDoc>> {
        let Some(actor_id) = main.actor_id.as_deref() else {
            self.warn(main, "Main item is invalid");
            return Ok(Vec::new());
        };
        if sources.is_empty() {
            self.warn(main, "Linked items are empty");
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for source in sources {
            let data = match source {
                LinkedSource::Item(item) => item_data(&item),
                LinkedSource::Data(data) => data,
                LinkedSource::Reference(reference) => {
                    match self.host.resolve_item(&reference).await {
                        Some(item) => item_data(&item),
                        None => {
                            self.not_found(main, &reference);
                            continue;
                        }
                    }
                }
            };
            created.push(self.inventory.create_owned_item(actor_id, data).await?);
        }

        let ids: Vec<Value> = created.iter().map(|i| Value::String(i.id.clone())).collect();
        self.flags
            .set(&main.uuid, MODULE_ID, FLAG_LINKED_ITEMS, Value::Array(ids))
            .await?;
        tracing::info!(item = %main.uuid, actor = actor_id, count = created.len(), "added linked items");
        Ok(created)
    }

    /// Deletes the given items from the main item's actor, or the remembered
    /// ones when `refs` is empty, then forgets the remembered ids.
    pub async fn remove(&self, main: &ItemDoc, refs: Vec<LinkedRef>) -> Result<usize> {
        let Some(actor_id) = main.actor_id.as_deref() else {
            self.warn(main, "Main item is invalid");
            return Ok(0);
        };
        let refs = if refs.is_empty() {
            self.remembered(main).await?
        } else {
            refs
        };
        if refs.is_empty() {
            self.warn(
                main,
                "Linked items are empty and no linked items are associated with the main item",
            );
            return Ok(0);
        }

        let mut removed = 0;
        for linked in refs {
            let target = match &linked {
                LinkedRef::Item(item) => Some(item.clone()),
                LinkedRef::Reference(reference) => self.inventory.owned_item(actor_id, reference),
            };
            let Some(target) = target else {
                if let LinkedRef::Reference(reference) = &linked {
                    self.not_found(main, reference);
                }
                continue;
            };
            self.inventory.delete_owned_item(actor_id, &target.id).await?;
            removed += 1;
        }

        self.flags
            .unset(&main.uuid, MODULE_ID, FLAG_LINKED_ITEMS)
            .await?;
        tracing::info!(item = %main.uuid, actor = actor_id, removed, "removed linked items");
        Ok(removed)
    }

    async fn remembered(&self, main: &ItemDoc) -> Result<Vec<LinkedRef>> {
        let stored = self
            .flags
            .get(&main.uuid, MODULE_ID, FLAG_LINKED_ITEMS)
            .await?;
        Ok(match stored {
            Some(Value::Array(ids)) => ids
                .into_iter()
                .filter_map(|id| id.as_str().map(|id| LinkedRef::Reference(id.to_string())))
                .collect(),
            _ => Vec::new(),
        })
    }

    fn warn(&self, main: &ItemDoc, message: &str) {
        tracing::warn!(
            item = %main.uuid,
            actor = ?main.actor_id,
            reason = message,
            "linked items request ignored"
        );
        self.host.notify(NoticeLevel::Warn, message);
    }

    fn not_found(&self, main: &ItemDoc, reference: &str) {
        tracing::warn!(item = %main.uuid, reference, "linked item not found");
        self.host
            .notify(NoticeLevel::Warn, &format!("Linked item not found: {reference}"));
    }
}

/// Creation payload for a copy of `item`; identity fields are left to the host.
fn item_data(item: &ItemDoc) -> Value {
    serde_json::json!({
        "name": item.name,
        "system": item.system,
    })
}
