use serde::{Deserialize, Serialize};

use crate::scripting::{
    DEFAULT_LUA_BUDGET_MS, DEFAULT_RHAI_MAX_CALL_LEVELS, DEFAULT_RHAI_MAX_OPERATIONS,
    DEFAULT_SCRIPT_HOOK_INSTRUCTION_INTERVAL,
};

pub const CONFIG_PATH_ENV: &str = "SCRIPTABLE_ITEMS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "scriptable-items.json";

/// Host user roles, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    None,
    Player,
    Trusted,
    Assistant,
    Gamemaster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum role allowed to open the script overview and edit scripts.
    pub manage_role: UserRole,
    pub card_button_prefix: String,
    pub card_button_icon: String,
    pub rhai_max_operations: u64,
    pub rhai_max_call_levels: usize,
    pub lua_instruction_interval: u32,
    pub lua_budget_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manage_role: UserRole::Gamemaster,
            card_button_prefix: "Execute".to_string(),
            card_button_icon: "fa-solid fa-code".to_string(),
            rhai_max_operations: DEFAULT_RHAI_MAX_OPERATIONS,
            rhai_max_call_levels: DEFAULT_RHAI_MAX_CALL_LEVELS,
            lua_instruction_interval: DEFAULT_SCRIPT_HOOK_INSTRUCTION_INTERVAL,
            lua_budget_ms: DEFAULT_LUA_BUDGET_MS,
        }
    }
}

impl Settings {
    pub fn can_manage_scripts(&self, role: UserRole) -> bool {
        role >= self.manage_role
    }

    /// Reads the config file named by `SCRIPTABLE_ITEMS_CONFIG` (or the default
    /// path), then applies environment overrides. A missing or broken file
    /// falls back to defaults.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = Self::from_path(&path);
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings
    }

    pub fn from_path(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    tracing::info!(path, "loaded settings");
                    settings
                }
                Err(e) => {
                    tracing::error!(path, error = %e, "failed to parse settings, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(value) = var("SCRIPTABLE_ITEMS_RHAI_MAX_OPERATIONS")
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            self.rhai_max_operations = value;
        }
        if let Some(value) = var("SCRIPTABLE_ITEMS_RHAI_MAX_CALL_LEVELS")
            .and_then(|value| value.trim().parse::<usize>().ok())
        {
            self.rhai_max_call_levels = value;
        }
    }
}
