use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::dto::bar_settings::BarSettings;

/// Boundary to the external bar/table services. The core trusts these as
/// already-validated inputs and never writes back.
#[async_trait]
pub trait BarDirectory: Send + Sync {
    async fn is_bar_active(&self, bar_id: &str) -> bool;
    async fn is_valid_table(&self, bar_id: &str, table_id: &str) -> bool;
    async fn bar_settings(&self, bar_id: &str) -> BarSettings;
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarProfile {
    pub bar_id: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// An empty list accepts any table identifier.
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub settings: BarSettings,
}

fn default_active() -> bool {
    true
}

/// In-memory directory for deployments where bars are described by a
/// config file, and for tests. Real installations would back this trait
/// with the bar management service instead.
#[derive(Debug, Default)]
pub struct StaticBarDirectory {
    bars: DashMap<String, BarProfile>,
    permissive: bool,
}

impl StaticBarDirectory {
    pub fn new(profiles: impl IntoIterator<Item = BarProfile>) -> Self {
        let directory = Self::default();
        for profile in profiles {
            directory.insert(profile);
        }
        directory
    }

    /// Accepts any bar and table with default settings. Meant for local
    /// development, not production.
    pub fn permissive() -> Self {
        Self {
            bars: DashMap::new(),
            permissive: true,
        }
    }

    pub fn insert(&self, profile: BarProfile) {
        self.bars.insert(profile.bar_id.clone(), profile);
    }
}

#[async_trait]
impl BarDirectory for StaticBarDirectory {
    async fn is_bar_active(&self, bar_id: &str) -> bool {
        match self.bars.get(bar_id) {
            Some(profile) => profile.active,
            None => self.permissive,
        }
    }

    async fn is_valid_table(&self, bar_id: &str, table_id: &str) -> bool {
        match self.bars.get(bar_id) {
            Some(profile) => {
                profile.tables.is_empty() || profile.tables.iter().any(|table| table == table_id)
            }
            None => self.permissive,
        }
    }

    async fn bar_settings(&self, bar_id: &str) -> BarSettings {
        self.bars
            .get(bar_id)
            .map(|profile| profile.settings.clone())
            .unwrap_or_default()
    }
}
