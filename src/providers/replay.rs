use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Badge, RawItem};
use crate::providers::page::{Control, Page, Presenter, StatusUpdate};

/// Replays a recorded timeline. Each scroll reveals another batch of items.
pub struct ReplayPage {
    items: Vec<RawItem>,
    visible: AtomicUsize,
    batch: usize,
}

impl ReplayPage {
    pub fn new(items: Vec<RawItem>, batch: usize) -> Self {
        let batch = batch.max(1);
        Self {
            visible: AtomicUsize::new(batch.min(items.len())),
            items,
            batch,
        }
    }

    pub fn from_file(path: impl AsRef<Path>, batch: usize) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        let items: Vec<RawItem> = serde_json::from_str(&data)?;
        info!("Loaded {} timeline items from {:?}", items.len(), path.as_ref());
        Ok(Self::new(items, batch))
    }
}

#[async_trait]
impl Page for ReplayPage {
    async fn scan(&self) -> Vec<RawItem> {
        let visible = self.visible.load(Ordering::Relaxed);
        self.items[..visible].to_vec()
    }

    fn on_notifications(&self) -> bool {
        false
    }

    async fn find(&self, _target: &str, _control: Control) -> bool {
        true
    }

    async fn wait_for(&self, _target: &str, _control: Control, _timeout: Duration) -> bool {
        true
    }

    async fn scroll(&self) {
        let visible = self.visible.load(Ordering::Relaxed);
        let next = (visible + self.batch).min(self.items.len());
        self.visible.store(next, Ordering::Relaxed);
        debug!(visible = next, "Scrolled timeline");
    }
}

pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn mark(&self, id: &str, badge: Badge) {
        debug!(id, ?badge, "Badge");
    }

    fn status(&self, update: StatusUpdate) {
        info!(?update, "Status");
    }
}
