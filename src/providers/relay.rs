use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngageError, Result};
use crate::memory::Counters;
use crate::models::ActionKind;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatsReport {
    pub account: String,
    pub counts: Counters,
}

/// Messages handed to the privileged context. Each call is at-most-once.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "message", rename_all = "kebab-case")]
pub enum RelayMessage {
    GetTabId,
    PerformAction(ActionRequest),
    Stats(StatsReport),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum RelayResponse {
    TabId(String),
    Ok,
}

#[async_trait]
pub trait Relay: Send + Sync {
    async fn send(&self, message: RelayMessage) -> Result<RelayResponse>;

    async fn tab_id(&self) -> Result<String> {
        match self.send(RelayMessage::GetTabId).await? {
            RelayResponse::TabId(id) => Ok(id),
            other => Err(EngageError::Relay(format!("Unexpected reply to get-tab-id: {other:?}"))),
        }
    }

    async fn perform(&self, request: ActionRequest) -> Result<()> {
        self.send(RelayMessage::PerformAction(request)).await.map(|_| ())
    }

    async fn report_stats(&self, report: StatsReport) -> Result<()> {
        self.send(RelayMessage::Stats(report)).await.map(|_| ())
    }
}

/// Relay that only logs. Used by the dry-run binary.
pub struct LoggingRelay {
    tab: String,
}

impl LoggingRelay {
    pub fn new(tab: impl Into<String>) -> Self {
        Self { tab: tab.into() }
    }
}

#[async_trait]
impl Relay for LoggingRelay {
    async fn send(&self, message: RelayMessage) -> Result<RelayResponse> {
        match message {
            RelayMessage::GetTabId => Ok(RelayResponse::TabId(self.tab.clone())),
            RelayMessage::PerformAction(request) => {
                info!(
                    action = ?request.kind,
                    item = %request.target_id,
                    reply = request.message.as_deref().unwrap_or(""),
                    image = request.image.as_deref().unwrap_or(""),
                    "Dry run action"
                );
                Ok(RelayResponse::Ok)
            }
            RelayMessage::Stats(report) => {
                info!(account = %report.account, total = report.counts.total(), "Session stats");
                Ok(RelayResponse::Ok)
            }
        }
    }
}
