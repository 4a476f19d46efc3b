//! Run buttons added to an item's use card.

use serde::Serialize;

use crate::error::Result;
use crate::settings::Settings;
use crate::store::ScriptStore;
use crate::trigger::Trigger;
use crate::RUN_ACTION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardButton {
    pub action: String,
    pub script_id: String,
    pub label: String,
    pub icon: String,
}

/// One button per script carrying the `button` trigger.
pub async fn card_buttons(store: &ScriptStore, settings: &Settings) -> Result<Vec<CardButton>> {
    let scripts = store.get_with_trigger(&Trigger::Button).await?;
    Ok(scripts
        .into_iter()
        .map(|script| CardButton {
            action: RUN_ACTION.to_string(),
            label: format!("{} {}", settings.card_button_prefix, script.name)
                .trim()
                .to_string(),
            script_id: script.id,
            icon: settings.card_button_icon.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::MemoryFlags;
    use crate::record::{ScriptPatch, ScriptRecord};
    use std::sync::Arc;

    #[tokio::test]
    async fn only_button_scripts_get_buttons() {
        let store = ScriptStore::new(Arc::new(MemoryFlags::new()), "Item.sword");
        let fire = ScriptRecord::create(
            ScriptPatch::default()
                .name("Fireball")
                .triggers(["button", "preUseItem"]),
        )
        .unwrap();
        let quiet = ScriptRecord::create(ScriptPatch::default().triggers(["addToActor"])).unwrap();
        store.save(&fire).await.unwrap();
        store.save(&quiet).await.unwrap();

        let buttons = card_buttons(&store, &Settings::default()).await.unwrap();
        assert_eq!(
            buttons,
            vec![CardButton {
                action: "scriptable-items-run".into(),
                script_id: fire.id.clone(),
                label: "Execute Fireball".into(),
                icon: "fa-solid fa-code".into(),
            }]
        );
    }

    #[tokio::test]
    async fn prefix_comes_from_settings() {
        let store = ScriptStore::new(Arc::new(MemoryFlags::new()), "Item.sword");
        let fire =
            ScriptRecord::create(ScriptPatch::default().name("Fireball").triggers(["button"]))
                .unwrap();
        store.save(&fire).await.unwrap();

        let settings = Settings {
            card_button_prefix: String::new(),
            ..Settings::default()
        };
        let buttons = card_buttons(&store, &settings).await.unwrap();
        assert_eq!(buttons[0].label, "Fireball");
    }
}
