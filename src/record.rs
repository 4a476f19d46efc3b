use std::collections::BTreeSet;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::trigger::Trigger;

pub const DEFAULT_SCRIPT_NAME: &str = "New Script";
pub const DEFAULT_SCRIPT_ICON: &str = "icons/svg/dice-target.svg";
const SCRIPT_ID_LEN: usize = 16;

pub fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SCRIPT_ID_LEN)
        .map(char::from)
        .collect()
}

/// One authored script attached to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub id: String,
    pub name: String,
    pub img: String,
    pub command: String,
    pub triggers: BTreeSet<Trigger>,
}

/// Shape written under `scripts.<id>`. The id lives in the key, not the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedScript {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_img")]
    pub img: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

fn default_name() -> String {
    DEFAULT_SCRIPT_NAME.to_string()
}

fn default_img() -> String {
    DEFAULT_SCRIPT_ICON.to_string()
}

/// Partial field set used for creation and edits. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<Trigger>>,
}

impl ScriptPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn img(mut self, img: impl Into<String>) -> Self {
        self.img = Some(img.into());
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn triggers<I, T>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Trigger>,
    {
        self.triggers = Some(triggers.into_iter().map(Into::into).collect());
        self
    }
}

impl ScriptRecord {
    /// Builds a record with a fresh id, filling `name` and `img` defaults.
    pub fn create(fields: ScriptPatch) -> Result<Self, ValidationError> {
        let record = Self {
            id: random_id(),
            name: fields.name.unwrap_or_else(default_name),
            img: fields
                .img
                .filter(|img| !img.trim().is_empty())
                .unwrap_or_else(default_img),
            command: fields.command.unwrap_or_default(),
            triggers: fields.triggers.unwrap_or_default().into_iter().collect(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Returns the merged record, leaving `self` untouched when the merge is invalid.
    /// A `triggers` entry in the patch replaces the whole set.
    pub fn update(&self, patch: ScriptPatch) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(img) = patch.img {
            next.img = if img.trim().is_empty() {
                default_img()
            } else {
                img
            };
        }
        if let Some(command) = patch.command {
            next.command = command;
        }
        if let Some(triggers) = patch.triggers {
            next.triggers = triggers.into_iter().collect();
        }
        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::BlankId);
        }
        // The id is a segment of the flag path.
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        if self.triggers.iter().any(Trigger::is_blank) {
            return Err(ValidationError::BlankTrigger);
        }
        Ok(())
    }

    /// Blank trigger entries in stored data are dropped.
    pub fn from_persisted(id: impl Into<String>, data: PersistedScript) -> Self {
        Self {
            id: id.into(),
            name: data.name,
            img: data.img,
            command: data.command,
            triggers: data
                .triggers
                .into_iter()
                .filter(|trigger| !trigger.is_blank())
                .collect(),
        }
    }

    pub fn to_persistable(&self) -> PersistedScript {
        PersistedScript {
            name: self.name.clone(),
            img: self.img.clone(),
            command: self.command.clone(),
            triggers: self.triggers.iter().cloned().collect(),
        }
    }

    pub fn has_trigger(&self, trigger: &Trigger) -> bool {
        self.triggers.contains(trigger)
    }

    pub fn triggers_text(&self) -> String {
        if self.triggers.is_empty() {
            return "None".to_string();
        }
        self.triggers
            .iter()
            .map(Trigger::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
