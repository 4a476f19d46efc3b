use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::flags::FlagStore;
use crate::record::{PersistedScript, ScriptRecord};
use crate::trigger::Trigger;
use crate::{FLAG_SCRIPTS, MODULE_ID};

/// Scripts attached to a single owning entity, stored in its flags under
/// `scriptable-items.scripts.<id>`.
#[derive(Clone)]
pub struct ScriptStore {
    flags: Arc<dyn FlagStore>,
    entity: String,
}

impl ScriptStore {
    pub fn new(flags: Arc<dyn FlagStore>, entity: impl Into<String>) -> Self {
        Self {
            flags,
            entity: entity.into(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub async fn has_scripts(&self) -> Result<bool> {
        let scripts = self.flags.get(&self.entity, MODULE_ID, FLAG_SCRIPTS).await?;
        Ok(matches!(scripts, Some(Value::Object(map)) if !map.is_empty()))
    }

    pub async fn get_all(&self) -> Result<Vec<ScriptRecord>> {
        let Some(Value::Object(scripts)) =
            self.flags.get(&self.entity, MODULE_ID, FLAG_SCRIPTS).await?
        else {
            return Ok(Vec::new());
        };
        Ok(scripts
            .into_iter()
            .filter_map(|(id, data)| self.decode(id, data))
            .collect())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<ScriptRecord>> {
        if id.trim().is_empty() || id.contains('.') {
            return Ok(None);
        }
        let data = self
            .flags
            .get(&self.entity, MODULE_ID, &record_path(id))
            .await?;
        Ok(data.and_then(|data| self.decode(id.to_string(), data)))
    }

    pub async fn get_with_trigger(&self, trigger: &Trigger) -> Result<Vec<ScriptRecord>> {
        let mut scripts = self.get_all().await?;
        scripts.retain(|script| script.has_trigger(trigger));
        Ok(scripts)
    }

    /// Upsert. The whole record is written in one path assignment.
    pub async fn save(&self, record: &ScriptRecord) -> Result<()> {
        record.validate()?;
        let data = serde_json::to_value(record.to_persistable()).map_err(StoreError::from)?;
        self.flags
            .set(&self.entity, MODULE_ID, &record_path(&record.id), data)
            .await?;
        tracing::debug!(entity = %self.entity, script = %record.id, "saved script");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() || id.contains('.') {
            return Ok(());
        }
        self.flags
            .unset(&self.entity, MODULE_ID, &record_path(id))
            .await?;
        tracing::debug!(entity = %self.entity, script = %id, "deleted script");
        Ok(())
    }

    fn decode(&self, id: String, data: Value) -> Option<ScriptRecord> {
        match serde_json::from_value::<PersistedScript>(data) {
            Ok(data) => Some(ScriptRecord::from_persisted(id, data)),
            Err(e) => {
                tracing::warn!(
                    entity = %self.entity,
                    script = %id,
                    error = %e,
                    "skipping unreadable script"
                );
                None
            }
        }
    }
}

fn record_path(id: &str) -> String {
    format!("{FLAG_SCRIPTS}.{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::flags::MemoryFlags;
    use crate::record::ScriptPatch;
    use std::collections::HashSet;

    fn store() -> ScriptStore {
        ScriptStore::new(Arc::new(MemoryFlags::new()), "Item.abc")
    }

    #[tokio::test]
    async fn saved_record_reads_back_equal() {
        let store = store();
        let record = ScriptRecord::create(
            ScriptPatch::default()
                .name("Potion")
                .command("actor.hp += 5")
                .triggers(["button", "preUse"]),
        )
        .unwrap();
        store.save(&record).await.unwrap();

        assert!(store.has_scripts().await.unwrap());
        assert_eq!(store.get_by_id(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn get_with_trigger_is_the_matching_subset() {
        let store = store();
        for triggers in [vec!["button"], vec!["preUse", "button"], vec![], vec!["addToActor"]] {
            let record =
                ScriptRecord::create(ScriptPatch::default().triggers(triggers)).unwrap();
            store.save(&record).await.unwrap();
        }

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 4);
        for trigger in Trigger::KNOWN {
            let expected: HashSet<String> = all
                .iter()
                .filter(|r| r.triggers.contains(&trigger))
                .map(|r| r.id.clone())
                .collect();
            let actual: HashSet<String> = store
                .get_with_trigger(&trigger)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect();
            assert_eq!(actual, expected, "trigger {trigger}");
        }
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let store = store();
        let record =
            ScriptRecord::create(ScriptPatch::default().triggers(["button"])).unwrap();
        store.save(&record).await.unwrap();
        let edited = record
            .update(ScriptPatch::default().name("Renamed").triggers(Vec::<&str>::new()))
            .unwrap();
        store.save(&edited).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all, vec![edited]);
    }

    #[tokio::test]
    async fn delete_missing_id_is_a_no_op() {
        let store = store();
        store.delete("does-not-exist").await.unwrap();
        store.delete("").await.unwrap();
        assert!(!store.has_scripts().await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_only_that_record() {
        let store = store();
        let a = ScriptRecord::create(ScriptPatch::default().name("A")).unwrap();
        let b = ScriptRecord::create(ScriptPatch::default().name("B")).unwrap();
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();
        store.delete(&a.id).await.unwrap();
        assert_eq!(store.get_by_id(&a.id).await.unwrap(), None);
        assert_eq!(store.get_all().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn unreadable_entries_are_skipped() {
        let flags = Arc::new(MemoryFlags::new());
        flags
            .set("Item.abc", MODULE_ID, "scripts.bad", serde_json::json!({ "name": 7 }))
            .await
            .unwrap();
        let store = ScriptStore::new(flags, "Item.abc");
        let good = ScriptRecord::create(ScriptPatch::default()).unwrap();
        store.save(&good).await.unwrap();

        assert_eq!(store.get_all().await.unwrap(), vec![good]);
        assert_eq!(store.get_by_id("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_records_are_not_persisted() {
        let store = store();
        let mut record = ScriptRecord::create(ScriptPatch::default()).unwrap();
        record.name = " ".into();
        assert!(matches!(
            store.save(&record).await,
            Err(crate::Error::Validation(_))
        ));
        assert!(!store.has_scripts().await.unwrap());
    }

    #[tokio::test]
    async fn dotted_ids_are_rejected_before_writing() {
        let store = store();
        let mut record = ScriptRecord::create(ScriptPatch::default()).unwrap();
        record.id = "a.b".into();

        assert!(matches!(
            store.save(&record).await,
            Err(crate::Error::Validation(ValidationError::InvalidId(id))) if id == "a.b"
        ));
        assert!(!store.has_scripts().await.unwrap());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_blank_triggers_are_dropped_on_read() {
        let flags = Arc::new(MemoryFlags::new());
        flags
            .set(
                "Item.abc",
                MODULE_ID,
                "scripts.old1",
                serde_json::json!({ "name": "Old", "triggers": ["button", ""] }),
            )
            .await
            .unwrap();
        let store = ScriptStore::new(flags, "Item.abc");

        let record = store.get_by_id("old1").await.unwrap().unwrap();
        assert_eq!(record.triggers.into_iter().collect::<Vec<_>>(), [Trigger::Button]);

        let renamed = store
            .get_by_id("old1")
            .await
            .unwrap()
            .unwrap()
            .update(ScriptPatch::default().name("Renamed"))
            .unwrap();
        store.save(&renamed).await.unwrap();
        assert_eq!(store.get_by_id("old1").await.unwrap(), Some(renamed));
    }
}
