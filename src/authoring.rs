//! Headless counterpart of the script overview and edit form.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::host::{Host, ItemDoc, NoticeLevel};
use crate::prompt::ConfirmPrompt;
use crate::record::{ScriptPatch, ScriptRecord};
use crate::scripting::{ScopeVars, ScriptExecutor};
use crate::settings::{Settings, UserRole};
use crate::store::ScriptStore;

/// One row of the overview list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptSummary {
    pub id: String,
    pub name: String,
    pub img: String,
    pub triggers: String,
}

pub struct Authoring {
    host: Arc<dyn Host>,
    confirm: Arc<dyn ConfirmPrompt>,
    settings: Settings,
}

impl Authoring {
    pub fn new(host: Arc<dyn Host>, confirm: Arc<dyn ConfirmPrompt>, settings: Settings) -> Self {
        Self {
            host,
            confirm,
            settings,
        }
    }

    pub fn can_manage(&self, role: UserRole) -> bool {
        self.settings.can_manage_scripts(role)
    }

    pub async fn summaries(&self, store: &ScriptStore) -> Result<Vec<ScriptSummary>> {
        let mut rows: Vec<ScriptSummary> = store
            .get_all()
            .await?
            .into_iter()
            .map(|script| ScriptSummary {
                triggers: script.triggers_text(),
                id: script.id,
                name: script.name,
                img: script.img,
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    pub async fn create_default(&self, store: &ScriptStore) -> Result<ScriptRecord> {
        let record = ScriptRecord::create(ScriptPatch::default())?;
        store.save(&record).await?;
        tracing::info!(entity = %store.entity(), script = %record.id, "created script");
        Ok(record)
    }

    /// Applies an edit. An invalid edit is reported to the author and nothing
    /// is written; `Ok(None)` is returned in that case and for unknown ids.
    pub async fn submit(
        &self,
        store: &ScriptStore,
        id: &str,
        patch: ScriptPatch,
    ) -> Result<Option<ScriptRecord>> {
        let Some(current) = store.get_by_id(id).await? else {
            self.host
                .notify(NoticeLevel::Warn, &format!("Script not found: {id}"));
            return Ok(None);
        };
        let next = match current.update(patch) {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(entity = %store.entity(), script = %id, error = %e, "edit rejected");
                self.host.notify(NoticeLevel::Error, &e.to_string());
                return Ok(None);
            }
        };
        store.save(&next).await?;
        Ok(Some(next))
    }

    /// Submits the edit, then runs the saved script without a trigger.
    pub async fn save_and_execute(
        &self,
        store: &ScriptStore,
        executor: &ScriptExecutor,
        item: &ItemDoc,
        id: &str,
        patch: ScriptPatch,
    ) -> Result<Option<Value>> {
        let Some(record) = self.submit(store, id, patch).await? else {
            return Ok(None);
        };
        executor
            .execute(&record, item, None, ScopeVars::new())
            .await
            .map_err(Error::from)
    }

    /// Deletes after the user confirms. Returns whether anything was deleted.
    pub async fn delete(&self, store: &ScriptStore, id: &str) -> Result<bool> {
        let Some(record) = store.get_by_id(id).await? else {
            return Ok(false);
        };
        let title = format!("Delete Script: {}", record.name);
        let content = "Are you sure? This script will be permanently deleted.";
        if !self.confirm.confirm(&title, content).await {
            return Ok(false);
        }
        store.delete(id).await?;
        tracing::info!(entity = %store.entity(), script = %id, "deleted script");
        Ok(true)
    }
}
