use serde::{Deserialize, Serialize};

/// Playable metadata for a provider-scoped track identifier.
/// Immutable once resolved; the queue only ever borrows these by value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub duration_seconds: u32,
    pub thumbnail_url: String,
    #[serde(default)]
    pub explicit: bool,
}
