//! Item-attached scripts fired by game events.
//!
//! Authors attach small scripts to items and tag each one with triggers. The
//! [`Dispatcher`] turns host events into script runs: it looks up the scripts
//! on the item that carry the event's trigger, asks the user to pick one when
//! several match, and hands the winner to a [`ScriptEngine`] with the item,
//! actor, token and chat message bound.

pub mod authoring;
pub mod card;
pub mod dispatcher;
pub mod error;
pub mod flags;
pub mod host;
pub mod linked;
pub mod prompt;
pub mod record;
pub mod scripting;
pub mod settings;
pub mod store;
pub mod trigger;

#[cfg(test)]
mod testing;

pub const MODULE_ID: &str = "scriptable-items";
pub const FLAG_SCRIPTS: &str = "scripts";
pub const FLAG_LINKED_ITEMS: &str = "linkedItems";
/// `data-action` of the run buttons added to item cards.
pub const RUN_ACTION: &str = "scriptable-items-run";

pub use authoring::Authoring;
pub use card::CardButton;
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::{Error, Result};
pub use flags::{FlagStore, JsonFileFlags, MemoryFlags};
pub use host::{ActorInventory, Host, ItemDoc};
pub use prompt::{ChoicePrompt, ConfirmPrompt};
pub use record::{ScriptPatch, ScriptRecord};
pub use scripting::{ScriptEngine, ScriptExecutor};
pub use settings::{Settings, UserRole};
pub use store::ScriptStore;
pub use trigger::Trigger;
