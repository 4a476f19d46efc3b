use std::time::{Duration, Instant};

use async_trait::async_trait;
use mlua::{HookTriggers, Lua, LuaSerdeExt, SerializeOptions, VmState};
use serde_json::Value;

use super::{ScriptEngine, ScriptScope, DEFAULT_LUA_BUDGET_MS, DEFAULT_SCRIPT_HOOK_INSTRUCTION_INTERVAL};
use crate::error::ScriptRuntimeError;

/// Lua backend. Scope names become globals of a fresh state; the command is
/// loaded as a chunk, so a top-level `return` yields the result.
#[derive(Debug, Clone)]
pub struct LuaEngine {
    budget: Duration,
    instruction_interval: u32,
}

impl Default for LuaEngine {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_LUA_BUDGET_MS),
            DEFAULT_SCRIPT_HOOK_INSTRUCTION_INTERVAL,
        )
    }
}

impl LuaEngine {
    pub fn new(budget: Duration, instruction_interval: u32) -> Self {
        Self {
            budget,
            instruction_interval: instruction_interval.max(1),
        }
    }

    pub fn from_settings(settings: &crate::settings::Settings) -> Self {
        Self::new(
            Duration::from_millis(settings.lua_budget_ms),
            settings.lua_instruction_interval,
        )
    }

    /// Aborts the chunk once it has run longer than the budget. The state is
    /// dropped after one run, so the hook never needs removing.
    fn install_deadline(&self, lua: &Lua) {
        let deadline = Instant::now() + self.budget;
        let budget = self.budget;
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(self.instruction_interval),
            move |_lua, _debug| {
                if Instant::now() >= deadline {
                    return Err(mlua::Error::RuntimeError(format!(
                        "script ran past its {}ms budget",
                        budget.as_millis()
                    )));
                }
                Ok(VmState::Continue)
            },
        );
    }

    pub fn eval(&self, command: &str, scope: &ScriptScope) -> Result<Value, ScriptRuntimeError> {
        let lua = Lua::new();
        let globals = lua.globals();
        // JSON null must read as nil, not as a truthy null userdata.
        let options = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        for (name, value) in scope.bindings() {
            let value = lua
                .to_value_with(&value, options)
                .map_err(|e| ScriptRuntimeError::Conversion(e.to_string()))?;
            globals
                .set(name, value)
                .map_err(|e| ScriptRuntimeError::Runtime(e.to_string()))?;
        }

        self.install_deadline(&lua);
        let out = lua
            .load(command)
            .set_name("script")
            .eval::<mlua::Value>()
            .map_err(|e| match e {
                mlua::Error::SyntaxError { message, .. } => ScriptRuntimeError::Compile(message),
                other => ScriptRuntimeError::Runtime(other.to_string()),
            })?;
        lua.from_value::<Value>(out)
            .map_err(|e| ScriptRuntimeError::Conversion(e.to_string()))
    }
}

#[async_trait]
impl ScriptEngine for LuaEngine {
    fn name(&self) -> &'static str {
        "lua"
    }

    async fn run(&self, command: &str, scope: &ScriptScope) -> Result<Value, ScriptRuntimeError> {
        let engine = self.clone();
        let command = command.to_string();
        let scope = scope.clone();
        tokio::task::spawn_blocking(move || engine.eval(&command, &scope))
            .await
            .map_err(|e| ScriptRuntimeError::Aborted(e.to_string()))?
    }
}
