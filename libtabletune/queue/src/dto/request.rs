use serde::{Deserialize, Serialize};

/// A patron's song request as it enters validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRequest {
    #[serde(default)]
    pub bar_id: String,
    pub table_id: String,
    pub track_id: String,
    #[serde(default)]
    pub is_priority: bool,
    #[serde(default)]
    pub requested_by: Option<String>,
}
