use async_trait::async_trait;
use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;

use super::{ScriptEngine, ScriptScope, DEFAULT_RHAI_MAX_CALL_LEVELS, DEFAULT_RHAI_MAX_OPERATIONS};
use crate::error::ScriptRuntimeError;

/// Rhai backend. A fresh engine is built per run so nothing leaks between
/// scripts, and the run happens on the blocking pool.
#[derive(Debug, Clone)]
pub struct RhaiEngine {
    max_operations: u64,
    max_call_levels: usize,
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RHAI_MAX_OPERATIONS, DEFAULT_RHAI_MAX_CALL_LEVELS)
    }
}

impl RhaiEngine {
    pub fn new(max_operations: u64, max_call_levels: usize) -> Self {
        Self {
            max_operations: max_operations.max(10_000),
            max_call_levels: max_call_levels.max(8),
        }
    }

    pub fn from_settings(settings: &crate::settings::Settings) -> Self {
        Self::new(settings.rhai_max_operations, settings.rhai_max_call_levels)
    }

    fn build(&self) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);
        engine.set_max_call_levels(self.max_call_levels);
        engine.on_print(|text| tracing::info!(target: "scriptable_items::script", "{text}"));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: "scriptable_items::script",
                source = source.unwrap_or("script"),
                position = %pos,
                "{text}"
            )
        });
        engine
    }

    /// Synchronous evaluation; `return` at the top level ends the script with that value.
    pub fn eval(&self, command: &str, scope: &ScriptScope) -> Result<Value, ScriptRuntimeError> {
        let engine = self.build();
        let ast = engine
            .compile(command)
            .map_err(|e| ScriptRuntimeError::Compile(e.to_string()))?;
        let mut rhai_scope = Scope::new();
        for (name, value) in scope.bindings() {
            let value = rhai::serde::to_dynamic(&value)
                .map_err(|e| ScriptRuntimeError::Conversion(e.to_string()))?;
            rhai_scope.push_dynamic(name, value);
        }
        let out = engine
            .eval_ast_with_scope::<Dynamic>(&mut rhai_scope, &ast)
            .map_err(|e| ScriptRuntimeError::Runtime(e.to_string()))?;
        // Function pointers and other opaque values have no JSON form.
        serde_json::to_value(&out).map_err(|e| ScriptRuntimeError::Conversion(e.to_string()))
    }
}

#[async_trait]
impl ScriptEngine for RhaiEngine {
    fn name(&self) -> &'static str {
        "rhai"
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> ScriptScope {
        ScriptScope {
            item: json!({ "name": "Potion", "system": { "uses": 3 } }),
            actor: json!({ "name": "Tess" }),
            trigger: "button".into(),
            ..ScriptScope::default()
        }
    }

    #[test]
    fn bound_names_are_visible() {
        let engine = RhaiEngine::default();
        let out = engine
            .eval(r#"item.name + " for " + actor.name + " via " + trigger"#, &scope())
            .unwrap();
        assert_eq!(out, json!("Potion for Tess via button"));
    }

    #[test]
    fn top_level_return_is_the_result() {
        let engine = RhaiEngine::default();
        let out = engine
            .eval("if item.system.uses > 0 { return true; } false", &scope())
            .unwrap();
        assert_eq!(out, Value::Bool(true));
    }

    #[test]
    fn blank_command_yields_null() {
        let engine = RhaiEngine::default();
        assert_eq!(engine.eval("", &scope()).unwrap(), Value::Null);
    }

    #[test]
    fn extras_are_bound() {
        let engine = RhaiEngine::default();
        let mut scope = scope();
        scope.extra.insert("message".into(), json!({ "id": "m1" }));
        assert_eq!(engine.eval("message.id", &scope).unwrap(), json!("m1"));
    }

    #[test]
    fn throw_and_syntax_errors_are_reported() {
        let engine = RhaiEngine::default();
        assert!(matches!(
            engine.eval(r#"throw "nope""#, &scope()),
            Err(ScriptRuntimeError::Runtime(_))
        ));
        assert!(matches!(
            engine.eval("let = ;", &scope()),
            Err(ScriptRuntimeError::Compile(_))
        ));
    }

    #[test]
    fn runaway_scripts_hit_the_operation_limit() {
        let engine = RhaiEngine::new(10_000, 8);
        assert!(matches!(
            engine.eval("loop { }", &scope()),
            Err(ScriptRuntimeError::Runtime(_))
        ));
    }

    #[test]
    fn maps_and_arrays_convert_back_to_json() {
        let engine = RhaiEngine::default();
        let out = engine
            .eval(r#"#{ ok: true, rolls: [1, 2.5, "x"] }"#, &scope())
            .unwrap();
        assert_eq!(out, json!({ "ok": true, "rolls": [1, 2.5, "x"] }));
    }

    #[test]
    fn null_bindings_are_unit() {
        let engine = RhaiEngine::default();
        let out = engine.eval(r#"type_of(token) == "()""#, &scope()).unwrap();
        assert_eq!(out, Value::Bool(true));
    }

    #[tokio::test]
    async fn run_uses_the_blocking_pool() {
        let engine = RhaiEngine::default();
        let out = engine.run("40 + 2", &scope()).await.unwrap();
        assert_eq!(out, json!(42));
    }
}
