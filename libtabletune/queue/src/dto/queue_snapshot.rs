use serde::{Deserialize, Serialize};

use super::queue_item::QueueItem;

/// Read-only copy of a bar's queue state, used for broadcast payloads and
/// reconnect recovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub bar_id: String,
    pub current: Option<QueueItem>,
    pub priority: Vec<QueueItem>,
    pub standard: Vec<QueueItem>,
    pub pending: Vec<QueueItem>,
    pub history: Vec<QueueItem>,
}
