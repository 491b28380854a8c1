use std::time::Duration;

use async_trait::async_trait;

use crate::models::{ActionKind, Badge, RawItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Like,
    Retweet,
    RetweetConfirm,
    Reply,
    Follow,
}

impl From<ActionKind> for Control {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Like => Control::Like,
            ActionKind::Retweet => Control::Retweet,
            ActionKind::Reply => Control::Reply,
            ActionKind::Follow => Control::Follow,
        }
    }
}

/// The timeline the session works on.
#[async_trait]
pub trait Page: Send + Sync {
    /// Items currently rendered on the page.
    async fn scan(&self) -> Vec<RawItem>;

    fn on_notifications(&self) -> bool;

    /// Whether `control` exists for the item (or author, for `Follow`).
    async fn find(&self, target: &str, control: Control) -> bool;

    /// Waits up to `timeout` for `control` to appear.
    async fn wait_for(&self, target: &str, control: Control, timeout: Duration) -> bool;

    /// Loads more of the timeline.
    async fn scroll(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Running { target: u32 },
    Action(ActionKind),
    Completed,
    Stopped,
}

/// Fire-and-forget sink for what the operator sees.
pub trait Presenter: Send + Sync {
    fn mark(&self, id: &str, badge: Badge);
    fn status(&self, update: StatusUpdate);
}
