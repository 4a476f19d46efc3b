use std::fmt;

use serde::{Deserialize, Serialize};

/// What makes a script run. Known kinds are dispatched by the crate; any other
/// non-blank tag is kept so author data round-trips untouched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Trigger {
    Button,
    PreUse,
    AddToActor,
    RemoveFromActor,
    Custom(String),
}

impl Trigger {
    pub const KNOWN: [Trigger; 4] = [
        Trigger::Button,
        Trigger::PreUse,
        Trigger::AddToActor,
        Trigger::RemoveFromActor,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Button => "button",
            Self::PreUse => "preUseItem",
            Self::AddToActor => "addToActor",
            Self::RemoveFromActor => "removeFromActor",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Human label used by list surfaces.
    pub fn label(&self) -> &str {
        match self {
            Self::Button => "Button",
            Self::PreUse => "Before Use",
            Self::AddToActor => "Added to Actor",
            Self::RemoveFromActor => "Removed from Actor",
            Self::Custom(name) => name.as_str(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Custom(name) if name.trim().is_empty())
    }
}

impl From<&str> for Trigger {
    fn from(value: &str) -> Self {
        match value {
            "button" => Self::Button,
            "preUseItem" | "preUse" => Self::PreUse,
            "addToActor" => Self::AddToActor,
            "removeFromActor" => Self::RemoveFromActor,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for Trigger {
    fn from(value: String) -> Self {
        Trigger::from(value.as_str())
    }
}

impl From<Trigger> for String {
    fn from(value: Trigger) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
