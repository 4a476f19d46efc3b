use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{ScopeVars, ScriptEngine, ScriptScope, DEFAULT_TRIGGER_NAME};
use crate::error::InvalidScopeError;
use crate::host::{Host, ItemDoc, NoticeLevel};
use crate::record::ScriptRecord;
use crate::trigger::Trigger;

const SCRIPT_ERROR_NOTICE: &str =
    "There was an error in your script. See the log for details.";

/// Builds a script's scope from the host and runs its command, containing
/// every failure raised by the command body.
#[derive(Clone)]
pub struct ScriptExecutor {
    engine: Arc<dyn ScriptEngine>,
    host: Arc<dyn Host>,
}

impl ScriptExecutor {
    pub fn new(engine: Arc<dyn ScriptEngine>, host: Arc<dyn Host>) -> Self {
        Self { engine, host }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn build_scope(
        &self,
        item: &ItemDoc,
        trigger: Option<&Trigger>,
        extra: ScopeVars,
    ) -> Result<ScriptScope, InvalidScopeError> {
        if let Some(key) = extra.keys().find(|key| is_numeric_key(key)) {
            return Err(InvalidScopeError::NumericKey(key.clone()));
        }

        let speaker = self.host.speaker_for(item);
        let token = speaker
            .token
            .as_deref()
            .and_then(|id| self.host.canvas_token(id));
        let actor = token
            .as_ref()
            .and_then(|token| token.actor_id.as_deref())
            .and_then(|id| self.host.actor(id))
            .or_else(|| speaker.actor.as_deref().and_then(|id| self.host.actor(id)));
        let character = self.host.user_character();

        Ok(ScriptScope {
            item: to_json(item),
            speaker: to_json(&speaker),
            actor: to_json(&actor),
            token: to_json(&token),
            character: to_json(&character),
            trigger: trigger
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| DEFAULT_TRIGGER_NAME.to_string()),
            extra,
        })
    }

    /// Runs `record` for `item`.
    ///
    /// `Ok(None)` means the command faulted; the fault has already been logged
    /// and shown to the user. A numeric extra key is rejected before anything runs.
    pub async fn execute(
        &self,
        record: &ScriptRecord,
        item: &ItemDoc,
        trigger: Option<&Trigger>,
        extra: ScopeVars,
    ) -> Result<Option<Value>, InvalidScopeError> {
        let scope = self.build_scope(item, trigger, extra)?;
        tracing::info!(
            item = %item.uuid,
            script = %record.id,
            trigger = %scope.trigger,
            engine = self.engine.name(),
            "executing script"
        );
        match self.engine.run(&record.command, &scope).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::error!(
                    item = %item.uuid,
                    script = %record.id,
                    name = %record.name,
                    error = %e,
                    "script failed"
                );
                self.host.notify(NoticeLevel::Error, SCRIPT_ERROR_NOTICE);
                Ok(None)
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Keys that read as a number once trimmed: decimal or exponent forms,
/// `Infinity`, `0x`/`0o`/`0b` literals, and blank keys (which read as zero).
fn is_numeric_key(key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return true;
    }
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        let lower = key.get(..2).map(str::to_ascii_lowercase);
        if lower.as_deref() == Some(prefix) {
            let digits = &key[2..];
            return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
        }
    }
    let unsigned = key.strip_prefix(['+', '-']).unwrap_or(key);
    if unsigned == "Infinity" {
        return true;
    }
    // Rust also parses `inf` and `nan`; only digit-led forms count here.
    unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') && key.parse::<f64>().is_ok()
}
