use serde::{Deserialize, Serialize};
use strum::Display;
use time::OffsetDateTime;
use uuid::Uuid;

use super::bar_settings::BarSettings;
use super::request::SongRequest;
use super::track::Track;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
    Playing,
    Played,
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SkipReason {
    TrackUnavailable,
    PlayerSkip,
    AdminOverride,
}

/// A single admitted song request with its lifecycle status.
/// Owned exclusively by the queue store of its bar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub item_id: String,
    pub bar_id: String,
    pub table_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    pub track: Track,
    pub points_spent: u32,
    pub is_priority: bool,
    pub status: ItemStatus,
    pub position: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl QueueItem {
    pub(crate) fn admitted(request: &SongRequest, track: Track, settings: &BarSettings) -> Self {
        let status = if settings.auto_approve {
            ItemStatus::Approved
        } else {
            ItemStatus::Pending
        };
        Self {
            item_id: Uuid::new_v4().to_string(),
            bar_id: request.bar_id.clone(),
            table_id: request.table_id.clone(),
            requested_by: request.requested_by.clone(),
            track,
            points_spent: settings.cost(request.is_priority),
            is_priority: request.is_priority,
            status,
            position: 0,
            created_at: OffsetDateTime::now_utc(),
            skip_reason: None,
        }
    }
}
