use crate::errors::StoreError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::{fs, sync::Mutex};
use tracing::{error, warn};

pub const ACTIVITIES_KEY: &str = "userActivities";

pub fn streak_key(user_id: &str) -> String {
    format!("streak:{user_id}")
}

pub fn tasks_key(user_id: &str) -> String {
    format!("dailyTasks:{user_id}")
}

pub fn tasks_last_saved_key(user_id: &str) -> String {
    format!("tasksLastSaved:{user_id}")
}

pub fn freezes_key(user_id: &str) -> String {
    format!("streakFreezes:{user_id}")
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn append(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

pub async fn read_as<T: DeserializeOwned>(
    store: &dyn Store,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        None => Ok(None),
    }
}

pub async fn write_as<T: Serialize>(
    store: &dyn Store,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.write(key, serde_json::to_value(value)?).await
}

fn push_entry(
    entries: &mut BTreeMap<String, Value>,
    key: &str,
    value: Value,
) -> Result<(), StoreError> {
    match entries.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(items) => {
            items.push(value);
            Ok(())
        }
        _ => Err(StoreError::Corrupt {
            key: key.to_string(),
            reason: "expected a JSON array".to_string(),
        }),
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let entries = load_entries(&path).await;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn load_entries(path: &Path) -> BTreeMap<String, Value> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                error!("failed to parse data file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read data file: {err}");
            BTreeMap::new()
        }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), value);
        if let Err(err) = self.persist(&entries).await {
            warn!(key, "write not persisted, rolling back");
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn append(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let previous = entries.get(key).cloned();
        push_entry(&mut entries, key, value)?;
        if let Err(err) = self.persist(&entries).await {
            warn!(key, "append not persisted, rolling back");
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("writes disabled")));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn append(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        push_entry(&mut *self.entries.lock().await, key, value)
    }
}
