use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::ActionKind;
use crate::settings::Settings;

pub const SETTINGS_KEY: &str = "settings";
pub const ANALYTICS_KEY: &str = "analytics";
pub const DONE_IDS_KEY: &str = "done-ids";
pub const RUNNING_TABS_KEY: &str = "running-tabs";

/// Per-account cap for both completed ids and session history.
pub const LEDGER_CAP: usize = 100;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn put(&self, key: &str, value: Value) -> Result<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        (**self).put(key, value).await
    }
}

/// One pretty-printed JSON file per key.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path(key);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let data = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(self.path(key), data).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Rolling per-account list of completed item ids, oldest first.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Ledger {
    accounts: HashMap<String, VecDeque<String>>,
}

impl Ledger {
    pub fn contains(&self, account: &str, id: &str) -> bool {
        self.accounts
            .get(account)
            .is_some_and(|ids| ids.iter().any(|known| known == id))
    }

    /// Appends `id` once. Returns false if it was already recorded.
    pub fn append(&mut self, account: &str, id: &str) -> bool {
        let ids = self.accounts.entry(account.to_string()).or_default();
        if ids.iter().any(|known| known == id) {
            return false;
        }
        ids.push_back(id.to_string());
        while ids.len() > LEDGER_CAP {
            ids.pop_front();
        }
        true
    }

    pub fn ids(&self, account: &str) -> Vec<&str> {
        self.accounts
            .get(account)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Counters {
    pub replies: u64,
    pub likes: u64,
    pub retweets: u64,
    pub follows: u64,
}

impl Counters {
    pub fn record(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Reply => self.replies += 1,
            ActionKind::Like => self.likes += 1,
            ActionKind::Retweet => self.retweets += 1,
            ActionKind::Follow => self.follows += 1,
        }
    }

    pub fn add(&mut self, other: &Counters) {
        self.replies += other.replies;
        self.likes += other.likes;
        self.retweets += other.retweets;
        self.follows += other.follows;
    }

    pub fn total(&self) -> u64 {
        self.replies + self.likes + self.retweets + self.follows
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Completed,
    Stopped,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub account: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub target: u32,
    pub completed: u32,
    pub outcome: SessionOutcome,
    pub totals: Counters,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AccountStats {
    pub totals: Counters,
    pub sessions: u64,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Analytics {
    pub totals: Counters,
    pub sessions: u64,
    pub accounts: HashMap<String, AccountStats>,
    pub history: VecDeque<SessionRecord>,
}

impl Analytics {
    pub fn close_session(&mut self, record: SessionRecord) {
        self.totals.add(&record.totals);
        self.sessions += 1;

        let account = self.accounts.entry(record.account.clone()).or_default();
        account.totals.add(&record.totals);
        account.sessions += 1;

        self.history.push_back(record);
        while self.history.len() > LEDGER_CAP {
            self.history.pop_front();
        }
    }
}

/// Counters for the session in progress. Only its final record is stored.
#[derive(Clone, Debug)]
pub struct OpenSession {
    pub account: String,
    pub started_at: DateTime<Utc>,
    pub target: u32,
    pub totals: Counters,
}

impl OpenSession {
    pub fn open(account: &str, target: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            account: account.to_string(),
            started_at,
            target,
            totals: Counters::default(),
        }
    }

    pub fn finish(self, outcome: SessionOutcome, completed: u32, ended_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            account: self.account,
            started_at: self.started_at,
            ended_at,
            target: self.target,
            completed,
            outcome,
            totals: self.totals,
        }
    }
}

/// Typed access to the records the core keeps in the key-value store.
/// Anything missing or unreadable comes back as its default.
pub struct Storage<S> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.store.get(key).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(key, error = %e, "Malformed record, using defaults");
                T::default()
            }),
            Ok(None) => {
                debug!(key, "No stored record, using defaults");
                T::default()
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read record, using defaults");
                T::default()
            }
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.put(key, value).await
    }

    pub async fn load_settings(&self) -> Settings {
        let mut settings: Settings = self.load(SETTINGS_KEY).await;
        settings.ensure_reserved();
        settings
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.save(SETTINGS_KEY, settings).await
    }

    pub async fn load_ledger(&self) -> Ledger {
        self.load(DONE_IDS_KEY).await
    }

    pub async fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        self.save(DONE_IDS_KEY, ledger).await
    }

    pub async fn load_analytics(&self) -> Analytics {
        self.load(ANALYTICS_KEY).await
    }

    pub async fn save_analytics(&self, analytics: &Analytics) -> Result<()> {
        self.save(ANALYTICS_KEY, analytics).await
    }

    pub async fn set_running(&self, tab: &str, running: bool) -> Result<()> {
        let mut tabs: HashMap<String, bool> = self.load(RUNNING_TABS_KEY).await;
        tabs.insert(tab.to_string(), running);
        self.save(RUNNING_TABS_KEY, &tabs).await
    }

    pub async fn is_running(&self, tab: &str) -> bool {
        let tabs: HashMap<String, bool> = self.load(RUNNING_TABS_KEY).await;
        tabs.get(tab).copied().unwrap_or(false)
    }
}

