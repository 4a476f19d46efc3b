//! Script engines and the executor that binds a record's scope before handing
//! the command to an engine.

pub mod executor;
#[cfg(feature = "lua")]
pub mod lua_engine;
pub mod rhai_engine;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ScriptRuntimeError;

pub use executor::ScriptExecutor;
#[cfg(feature = "lua")]
pub use lua_engine::LuaEngine;
pub use rhai_engine::RhaiEngine;

pub const DEFAULT_TRIGGER_NAME: &str = "debug";
pub const DEFAULT_RHAI_MAX_OPERATIONS: u64 = 500_000;
pub const DEFAULT_RHAI_MAX_CALL_LEVELS: usize = 64;
pub const DEFAULT_SCRIPT_HOOK_INSTRUCTION_INTERVAL: u32 = 10_000;
pub const DEFAULT_LUA_BUDGET_MS: u64 = 2_000;

/// Caller-supplied names added to a script's scope.
pub type ScopeVars = BTreeMap<String, Value>;

/// Everything a command body can see. Values are host documents rendered to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptScope {
    pub item: Value,
    pub speaker: Value,
    pub actor: Value,
    pub token: Value,
    pub character: Value,
    pub trigger: String,
    pub extra: ScopeVars,
}

impl ScriptScope {
    /// Name/value pairs in binding order. Extras come last and shadow built-ins.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut out = vec![
            ("item".to_string(), self.item.clone()),
            ("speaker".to_string(), self.speaker.clone()),
            ("actor".to_string(), self.actor.clone()),
            ("token".to_string(), self.token.clone()),
            ("character".to_string(), self.character.clone()),
            ("trigger".to_string(), Value::String(self.trigger.clone())),
        ];
        out.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}

/// Runs a command body with the scope's names bound as its free variables.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, command: &str, scope: &ScriptScope) -> Result<Value, ScriptRuntimeError>;
}
