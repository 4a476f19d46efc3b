//! Entity flag storage.
//!
//! Every owning entity carries a JSON object of namespaced flags. Paths inside
//! a namespace are dotted (`scripts.<id>`), so a single record can be written
//! or removed without touching its siblings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn get(
        &self,
        entity: &str,
        namespace: &str,
        path: &str,
    ) -> Result<Option<Value>, StoreError>;

    /// Replaces whatever is stored at `path` with `value`.
    async fn set(
        &self,
        entity: &str,
        namespace: &str,
        path: &str,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Removes `path`. Missing paths are not an error.
    async fn unset(&self, entity: &str, namespace: &str, path: &str) -> Result<(), StoreError>;
}

fn segments<'a>(namespace: &'a str, path: &'a str) -> Result<Vec<&'a str>, StoreError> {
    let mut out = Vec::new();
    for part in std::iter::once(namespace).chain(path.split('.')) {
        if part.trim().is_empty() {
            return Err(StoreError::InvalidPath(format!("{namespace}.{path}")));
        }
        out.push(part);
    }
    Ok(out)
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.as_object()?.get(*key))
}

fn assign(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = root;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
}

fn remove(root: &mut Value, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut node = root;
    for key in parents {
        node = node.as_object_mut()?.get_mut(*key)?;
    }
    node.as_object_mut()?.remove(*last)
}

/// Process-local store. Used by tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryFlags {
    entities: Mutex<HashMap<String, Value>>,
}

impl MemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: HashMap<String, Value>) -> Self {
        Self {
            entities: Mutex::new(entities),
        }
    }

    /// Copy of one entity's whole flag object.
    pub fn entity_snapshot(&self, entity: &str) -> Option<Value> {
        self.entities
            .lock()
            .ok()
            .and_then(|entities| entities.get(entity).cloned())
    }
}

#[async_trait]
impl FlagStore for MemoryFlags {
    async fn get(
        &self,
        entity: &str,
        namespace: &str,
        path: &str,
    ) -> Result<Option<Value>, StoreError> {
        let keys = segments(namespace, path)?;
        let entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entities
            .get(entity)
            .and_then(|root| lookup(root, &keys))
            .cloned())
    }

    async fn set(
        &self,
        entity: &str,
        namespace: &str,
        path: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let keys = segments(namespace, path)?;
        let mut entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        let root = entities
            .entry(entity.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        assign(root, &keys, value);
        Ok(())
    }

    async fn unset(&self, entity: &str, namespace: &str, path: &str) -> Result<(), StoreError> {
        let keys = segments(namespace, path)?;
        let mut entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(root) = entities.get_mut(entity) {
            remove(root, &keys);
        }
        Ok(())
    }
}

/// Flags kept in one JSON document on disk: `{ "<entity>": { "<namespace>": ... } }`.
///
/// Each mutation is a read-modify-write under an async lock, finished by an
/// atomic rename so readers never observe a half-written file.
pub struct JsonFileFlags {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileFlags {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Value, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Value::Object(Map::new())),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, data: &Value) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(data)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl FlagStore for JsonFileFlags {
    async fn get(
        &self,
        entity: &str,
        namespace: &str,
        path: &str,
    ) -> Result<Option<Value>, StoreError> {
        let keys = segments(namespace, path)?;
        let _guard = self.lock.lock().await;
        let data = self.load().await?;
        Ok(data
            .get(entity)
            .and_then(|root| lookup(root, &keys))
            .cloned())
    }

    async fn set(
        &self,
        entity: &str,
        namespace: &str,
        path: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut keys = vec![entity];
        keys.extend(segments(namespace, path)?);
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        assign(&mut data, &keys, value);
        self.write(&data).await
    }

    async fn unset(&self, entity: &str, namespace: &str, path: &str) -> Result<(), StoreError> {
        let mut keys = vec![entity];
        keys.extend(segments(namespace, path)?);
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        if remove(&mut data, &keys).is_some() {
            self.write(&data).await?;
        }
        Ok(())
    }
}
