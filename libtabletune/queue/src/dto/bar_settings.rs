use serde::{Deserialize, Serialize};

/// Per-bar policy snapshot consumed by request validation and scheduling.
/// Owned by the external bar configuration source; a snapshot is taken at
/// the start of each command's validation and never refreshed mid-command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarSettings {
    pub max_songs_per_table: usize,
    pub request_cooldown_seconds: u64,
    pub priority_cost: u32,
    pub standard_cost: u32,
    pub auto_approve: bool,
    pub max_queue_size: usize,
    pub allow_explicit: bool,
}

impl Default for BarSettings {
    fn default() -> Self {
        Self {
            max_songs_per_table: 3,
            request_cooldown_seconds: 30,
            priority_cost: 100,
            standard_cost: 50,
            auto_approve: true,
            max_queue_size: 50,
            allow_explicit: true,
        }
    }
}

impl BarSettings {
    pub fn cost(&self, is_priority: bool) -> u32 {
        if is_priority {
            self.priority_cost
        } else {
            self.standard_cost
        }
    }
}
