use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use serde::Deserialize;
use tracing::debug;

use super::{CatalogResolver, ResolveError};
use crate::dto::track::Track;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogTrack {
    #[serde(default)]
    track_id: Option<String>,
    title: String,
    artist: String,
    duration_seconds: u32,
    #[serde(default)]
    thumbnail_url: String,
    #[serde(default)]
    explicit: bool,
}

/// Resolver backed by the catalog service's HTTP API. Transient failures
/// are retried once with exponential backoff inside the client; anything
/// that still fails is surfaced as `ResolveError::Transient`.
pub struct HttpCatalogResolver {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HttpCatalogResolver {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(1);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl CatalogResolver for HttpCatalogResolver {
    async fn resolve(&self, track_id: &str) -> Result<Track, ResolveError> {
        let url = format!(
            "{}/tracks/{}",
            self.base_url,
            urlencoding::encode(track_id)
        );
        debug!("resolving track {track_id} via {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResolveError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ResolveError::NotFound(track_id.to_owned())),
            status if !status.is_success() => Err(ResolveError::Transient(format!(
                "catalog returned {status}"
            ))),
            _ => {
                let metadata: CatalogTrack = response
                    .json()
                    .await
                    .map_err(|e| ResolveError::Transient(e.to_string()))?;
                Ok(Track {
                    track_id: metadata.track_id.unwrap_or_else(|| track_id.to_owned()),
                    title: metadata.title,
                    artist: metadata.artist,
                    duration_seconds: metadata.duration_seconds,
                    thumbnail_url: metadata.thumbnail_url,
                    explicit: metadata.explicit,
                })
            }
        }
    }
}
