use serde::Serialize;
use strum::Display;

use super::queue_item::QueueItem;
use super::queue_snapshot::QueueSnapshot;

/// Events fanned out to every subscriber of a bar's channel.
#[derive(Clone, Debug, Serialize, Display)]
#[serde(tag = "event", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QueueEvent {
    QueueUpdated {
        #[serde(rename = "barId")]
        bar_id: String,
        queue: QueueSnapshot,
    },
    NowPlaying {
        #[serde(rename = "barId")]
        bar_id: String,
        current: Option<QueueItem>,
    },
    PointsUpdated {
        #[serde(rename = "barId")]
        bar_id: String,
        #[serde(rename = "tableId")]
        table_id: String,
        balance: u64,
    },
}
