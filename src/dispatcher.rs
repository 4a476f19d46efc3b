//! Routes host lifecycle and use events to the scripts attached to an item.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::flags::FlagStore;
use crate::host::{ChatCard, Host, ItemDoc, NoticeLevel, UseOptions};
use crate::prompt::{self, ChoicePrompt};
use crate::record::ScriptRecord;
use crate::scripting::{ScopeVars, ScriptEngine, ScriptExecutor};
use crate::store::ScriptStore;
use crate::trigger::Trigger;

/// What happened for an event that may run at most one script.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Nothing ran: no match, a dismissed choice, a missing target, or an
    /// actor change this participant is not responsible for.
    Skipped,
    /// `result` is `None` when the command faulted.
    Ran {
        script_id: String,
        result: Option<Value>,
    },
}

pub struct Dispatcher {
    flags: Arc<dyn FlagStore>,
    host: Arc<dyn Host>,
    prompt: Arc<dyn ChoicePrompt>,
    executor: ScriptExecutor,
}

impl Dispatcher {
    pub fn new(
        flags: Arc<dyn FlagStore>,
        host: Arc<dyn Host>,
        prompt: Arc<dyn ChoicePrompt>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        let executor = ScriptExecutor::new(engine, host.clone());
        Self {
            flags,
            host,
            prompt,
            executor,
        }
    }

    pub fn executor(&self) -> &ScriptExecutor {
        &self.executor
    }

    pub fn store_for(&self, item: &ItemDoc) -> ScriptStore {
        ScriptStore::new(self.flags.clone(), item.uuid.clone())
    }

    /// Before-use hook. Returns whether the host should continue its default
    /// use flow unmodified.
    ///
    /// When a script runs, the current use is cancelled and the flow is entered
    /// again with `skip_scripts` set, but only if the script returned `true`.
    /// With several candidates the flow is re-entered carrying the chosen id.
    pub async fn on_pre_use(
        &self,
        item: &ItemDoc,
        config: &Value,
        options: &mut UseOptions,
    ) -> Result<bool> {
        if options.skip_scripts {
            return Ok(true);
        }

        let store = self.store_for(item);
        if let Some(script_id) = options.script_id.take() {
            match store.get_by_id(&script_id).await? {
                Some(script) => self.run_pre_use(item, config, options, &script).await?,
                None => self.missing_script(item, &script_id),
            }
            return Ok(false);
        }

        let scripts = store.get_with_trigger(&Trigger::PreUse).await?;
        match scripts.as_slice() {
            [] => Ok(true),
            [script] => {
                self.run_pre_use(item, config, options, script).await?;
                Ok(false)
            }
            _ => {
                let Some(chosen) = prompt::present(self.prompt.as_ref(), &scripts).await else {
                    tracing::debug!(item = %item.uuid, "pre-use script choice dismissed");
                    return Ok(false);
                };
                options.script_id = Some(chosen);
                self.host.use_item(item, config, options.clone()).await?;
                Ok(false)
            }
        }
    }

    async fn run_pre_use(
        &self,
        item: &ItemDoc,
        config: &Value,
        options: &mut UseOptions,
        script: &ScriptRecord,
    ) -> Result<()> {
        let result = self
            .executor
            .execute(script, item, Some(&Trigger::PreUse), ScopeVars::new())
            .await?;
        if result == Some(Value::Bool(true)) {
            options.skip_scripts = true;
            self.host.use_item(item, config, options.clone()).await?;
        } else {
            tracing::debug!(item = %item.uuid, script = %script.id, "use cancelled by script");
        }
        Ok(())
    }

    /// A run button on a posted card was clicked.
    pub async fn on_card_button(&self, card: &ChatCard, script_id: &str) -> Result<Dispatch> {
        let Some(uuid) = card.item_uuid.as_deref() else {
            tracing::warn!(
                card = %card.id,
                script = %script_id,
                "chat card does not reference an item"
            );
            self.notify_warn(&format!("Chat card {} does not reference an item", card.id));
            return Ok(Dispatch::Skipped);
        };
        let Some(item) = self.host.resolve_item(uuid).await else {
            tracing::warn!(card = %card.id, item = %uuid, script = %script_id, "card item not found");
            self.notify_warn(&format!("Item not found: {uuid}"));
            return Ok(Dispatch::Skipped);
        };
        let Some(script) = self.store_for(&item).get_by_id(script_id).await? else {
            self.missing_script(&item, script_id);
            return Ok(Dispatch::Skipped);
        };

        let message = serde_json::to_value(card).unwrap_or(Value::Null);
        let extra = ScopeVars::from([("message".to_string(), message)]);
        let result = self
            .executor
            .execute(&script, &item, Some(&Trigger::Button), extra)
            .await?;
        Ok(Dispatch::Ran {
            script_id: script.id,
            result,
        })
    }

    /// The item was created in an actor's holdings. Only the participant who
    /// made the change runs scripts, so observers do not repeat them.
    pub async fn on_add_to_actor(&self, item: &ItemDoc, is_authoritative: bool) -> Result<Dispatch> {
        self.on_actor_change(item, Trigger::AddToActor, is_authoritative)
            .await
    }

    pub async fn on_remove_from_actor(
        &self,
        item: &ItemDoc,
        is_authoritative: bool,
    ) -> Result<Dispatch> {
        self.on_actor_change(item, Trigger::RemoveFromActor, is_authoritative)
            .await
    }

    async fn on_actor_change(
        &self,
        item: &ItemDoc,
        trigger: Trigger,
        is_authoritative: bool,
    ) -> Result<Dispatch> {
        if !is_authoritative {
            return Ok(Dispatch::Skipped);
        }

        let mut scripts = self.store_for(item).get_with_trigger(&trigger).await?;
        let script = match scripts.len() {
            0 => return Ok(Dispatch::Skipped),
            1 => scripts.swap_remove(0),
            _ => {
                let Some(chosen) = prompt::present(self.prompt.as_ref(), &scripts).await else {
                    tracing::debug!(item = %item.uuid, %trigger, "script choice dismissed");
                    return Ok(Dispatch::Skipped);
                };
                let Some(index) = scripts.iter().position(|s| s.id == chosen) else {
                    return Ok(Dispatch::Skipped);
                };
                scripts.swap_remove(index)
            }
        };

        let result = self
            .executor
            .execute(&script, item, Some(&trigger), ScopeVars::new())
            .await?;
        Ok(Dispatch::Ran {
            script_id: script.id,
            result,
        })
    }

    fn missing_script(&self, item: &ItemDoc, script_id: &str) {
        tracing::warn!(item = %item.uuid, script = %script_id, "script not found");
        self.notify_warn(&format!("Script {script_id} not found on {}", item.name));
    }

    fn notify_warn(&self, message: &str) {
        self.host.notify(NoticeLevel::Warn, message);
    }
}
