mod directory;
mod dto;
mod ledger;
mod mailbox;
mod resolver;
mod settings;
mod store;
mod worker;

pub mod tabletune_queue {
    use std::sync::Arc;

    use dashmap::DashMap;
    use tap::TapFallible;
    use tokio::sync::broadcast;
    use tokio::time::timeout;
    use tracing::{error, info, warn};

    pub use crate::directory::{BarDirectory, BarProfile, StaticBarDirectory};
    pub use crate::dto::bar_settings::BarSettings;
    use crate::dto::command::{Command, QueueResponse};
    pub use crate::dto::queue_event::QueueEvent;
    pub use crate::dto::queue_item::{ItemStatus, QueueItem, SkipReason};
    pub use crate::dto::queue_snapshot::QueueSnapshot;
    pub use crate::dto::request::SongRequest;
    pub use crate::dto::request_error::RequestError;
    pub use crate::dto::track::Track;
    use crate::mailbox::{MailboxSender, mailbox};
    pub use crate::resolver::{CatalogCache, CatalogResolver, HttpCatalogResolver, ResolveError};
    pub use crate::settings::Settings;
    use crate::worker::{BarWorker, main_loop};

    struct BarHandle {
        commands: MailboxSender<Command, QueueResponse>,
        events: broadcast::Sender<QueueEvent>,
    }

    /// Handle to the song request queues of every bar this process hosts.
    /// Each bar's state is owned by a dedicated worker task; methods here
    /// validate what can be validated off-worker, then send a command into
    /// the bar's mailbox and await the typed reply.
    pub struct TabletuneQueue {
        bars: DashMap<String, BarHandle>,
        directory: Arc<dyn BarDirectory>,
        resolver: Arc<dyn CatalogResolver>,
        catalog: Arc<CatalogCache>,
        settings: Settings,
    }

    impl TabletuneQueue {
        pub fn new(
            directory: Arc<dyn BarDirectory>,
            resolver: Arc<dyn CatalogResolver>,
            settings: Settings,
        ) -> Self {
            let catalog = Arc::new(CatalogCache::new(
                settings.catalog_ttl,
                settings.catalog_capacity,
            ));
            Self {
                bars: DashMap::new(),
                directory,
                resolver,
                catalog,
                settings,
            }
        }

        /// Submits a patron request. Runs the full admission pipeline:
        /// identifier checks and catalog resolution here, then duplicate,
        /// rate, affordability and capacity checks plus the point debit
        /// inside the bar worker as a single command.
        pub async fn submit_request(
            &self,
            request: SongRequest,
        ) -> Result<QueueItem, RequestError> {
            validate_id(&request.bar_id, "bar id")?;
            validate_id(&request.table_id, "table id")?;
            validate_track_id(&request.track_id)?;
            if !self.directory.is_bar_active(&request.bar_id).await {
                return Err(RequestError::Validation(format!(
                    "bar {} is not active",
                    request.bar_id
                )));
            }
            if !self
                .directory
                .is_valid_table(&request.bar_id, &request.table_id)
                .await
            {
                return Err(RequestError::Validation(format!(
                    "table {} is not registered at bar {}",
                    request.table_id, request.bar_id
                )));
            }
            let settings = self.directory.bar_settings(&request.bar_id).await;
            let track = self.resolve_track(&request.track_id).await?;

            let bar_id = request.bar_id.clone();
            match self
                .ask(
                    &bar_id,
                    Command::Submit {
                        request,
                        track,
                        settings,
                    },
                )
                .await?
            {
                QueueResponse::Submitted(result) => result,
                other => Err(unexpected_response(other)),
            }
        }

        /// Moderator decision on a pending item. Rejection refunds the
        /// points spent at admission.
        pub async fn moderate(
            &self,
            bar_id: &str,
            item_id: &str,
            approve: bool,
        ) -> Result<QueueItem, RequestError> {
            let command = Command::Moderate {
                item_id: item_id.to_owned(),
                approve,
            };
            match self.ask(bar_id, command).await? {
                QueueResponse::Moderated(result) => result,
                other => Err(unexpected_response(other)),
            }
        }

        /// Removes an item from the queue. Idempotent: unknown ids are a
        /// no-op so duplicate admin actions are safe.
        pub async fn remove_item(&self, bar_id: &str, item_id: &str) -> Result<(), RequestError> {
            let command = Command::Remove {
                item_id: item_id.to_owned(),
            };
            match self.ask(bar_id, command).await? {
                QueueResponse::Ack => Ok(()),
                other => Err(unexpected_response(other)),
            }
        }

        /// Admin override: skips whatever is playing and starts the given
        /// item next.
        pub async fn play_now(
            &self,
            bar_id: &str,
            item_id: &str,
        ) -> Result<Option<QueueItem>, RequestError> {
            let command = Command::PlayNow {
                item_id: item_id.to_owned(),
            };
            self.now_playing(bar_id, command).await
        }

        /// Admin skip of the currently playing item.
        pub async fn skip_current(&self, bar_id: &str) -> Result<Option<QueueItem>, RequestError> {
            self.now_playing(bar_id, Command::SkipCurrent).await
        }

        /// The player connected or is otherwise ready for a track. Safe to
        /// call repeatedly; while something is playing it is returned
        /// unchanged.
        pub async fn player_ready(&self, bar_id: &str) -> Result<Option<QueueItem>, RequestError> {
            self.now_playing(bar_id, Command::PlayerReady).await
        }

        /// The player finished the given item; advances to the next track.
        /// Stale reports for an item that is no longer current are no-ops.
        pub async fn playback_completed(
            &self,
            bar_id: &str,
            item_id: &str,
        ) -> Result<Option<QueueItem>, RequestError> {
            let command = Command::PlaybackCompleted {
                item_id: item_id.to_owned(),
            };
            self.now_playing(bar_id, command).await
        }

        /// The player skipped the given item; advances to the next track.
        pub async fn playback_skipped(
            &self,
            bar_id: &str,
            item_id: &str,
        ) -> Result<Option<QueueItem>, RequestError> {
            let command = Command::PlaybackSkipped {
                item_id: item_id.to_owned(),
            };
            self.now_playing(bar_id, command).await
        }

        /// Credits points to a table (purchase events, loyalty bonuses).
        /// Returns the new balance.
        pub async fn credit_points(
            &self,
            bar_id: &str,
            table_id: &str,
            amount: u64,
        ) -> Result<u64, RequestError> {
            let command = Command::CreditPoints {
                table_id: table_id.to_owned(),
                amount,
            };
            match self.ask(bar_id, command).await? {
                QueueResponse::Balance(balance) => Ok(balance),
                other => Err(unexpected_response(other)),
            }
        }

        pub async fn balance(&self, bar_id: &str, table_id: &str) -> Result<u64, RequestError> {
            let command = Command::GetBalance {
                table_id: table_id.to_owned(),
            };
            match self.ask(bar_id, command).await? {
                QueueResponse::Balance(balance) => Ok(balance),
                other => Err(unexpected_response(other)),
            }
        }

        /// Read-only copy of the bar's queue state, for reconnecting
        /// clients that need to reconcile instead of replaying events.
        pub async fn snapshot(&self, bar_id: &str) -> Result<QueueSnapshot, RequestError> {
            match self.ask(bar_id, Command::GetSnapshot).await? {
                QueueResponse::Snapshot(snapshot) => Ok(snapshot),
                other => Err(unexpected_response(other)),
            }
        }

        /// Replaces a bar's queue state with a previously taken snapshot.
        /// Used when an external write-through store seeds a restarted
        /// process; point balances are restored through credits.
        pub async fn restore(
            &self,
            bar_id: &str,
            snapshot: QueueSnapshot,
        ) -> Result<QueueSnapshot, RequestError> {
            if snapshot.bar_id != bar_id {
                return Err(RequestError::Validation(format!(
                    "snapshot for bar {} cannot restore bar {bar_id}",
                    snapshot.bar_id
                )));
            }
            match self.ask(bar_id, Command::RestoreSnapshot { snapshot }).await? {
                QueueResponse::Snapshot(snapshot) => Ok(snapshot),
                other => Err(unexpected_response(other)),
            }
        }

        /// Subscribes to the bar's event channel. Slow subscribers lag and
        /// skip ahead rather than back-pressuring queue mutations.
        pub fn subscribe(&self, bar_id: &str) -> broadcast::Receiver<QueueEvent> {
            self.bar(bar_id).events.subscribe()
        }

        /// Drops a track from the shared catalog cache, forcing the next
        /// request to resolve it again.
        pub fn invalidate_track(&self, track_id: &str) {
            self.catalog.invalidate(track_id);
        }

        /// Stops every bar worker after its queued commands have drained.
        pub async fn shutdown(&self) {
            // Collect senders first so no map guard is held across an await.
            let handles: Vec<_> = self
                .bars
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().commands.clone()))
                .collect();
            for (bar_id, commands) in handles {
                let _ = commands
                    .ask(Command::Shutdown)
                    .await
                    .tap_err(|e| warn!("error stopping worker for bar {bar_id}: {e:?}"));
            }
            info!("all bar workers stopped");
        }

        async fn now_playing(
            &self,
            bar_id: &str,
            command: Command,
        ) -> Result<Option<QueueItem>, RequestError> {
            match self.ask(bar_id, command).await? {
                QueueResponse::NowPlaying(result) => result,
                other => Err(unexpected_response(other)),
            }
        }

        async fn ask(&self, bar_id: &str, command: Command) -> Result<QueueResponse, RequestError> {
            // Clone the sender out so no map guard is held across the await.
            let commands = self.bar(bar_id).commands.clone();
            commands
                .ask(command)
                .await
                .map_err(|e| RequestError::ServiceUnavailable(format!("bar {bar_id}: {e}")))
        }

        fn bar(&self, bar_id: &str) -> dashmap::mapref::one::Ref<'_, String, BarHandle> {
            if let Some(handle) = self.bars.get(bar_id) {
                return handle;
            }
            self.bars
                .entry(bar_id.to_owned())
                .or_insert_with(|| {
                    let (event_tx, _) = broadcast::channel(self.settings.event_channel_size);
                    let (command_tx, command_rx) = mailbox();
                    let worker = BarWorker::new(
                        bar_id.to_owned(),
                        self.catalog.clone(),
                        event_tx.clone(),
                        &self.settings,
                    );
                    tokio::spawn(main_loop(command_rx, worker));
                    info!("started queue worker for bar {bar_id}");
                    BarHandle {
                        commands: command_tx,
                        events: event_tx,
                    }
                })
                .downgrade()
        }

        /// Resolves a track through the shared cache, falling back to the
        /// external resolver with a bounded timeout and a single retry.
        /// Runs in the caller's task so a slow catalog never blocks the
        /// bar worker.
        async fn resolve_track(&self, track_id: &str) -> Result<Track, RequestError> {
            if let Some(track) = self.catalog.get(track_id) {
                return Ok(track);
            }
            for attempt in 0..2 {
                if attempt > 0 {
                    tokio::time::sleep(self.settings.resolver_retry_delay).await;
                }
                match timeout(
                    self.settings.resolver_timeout,
                    self.resolver.resolve(track_id),
                )
                .await
                {
                    Ok(Ok(track)) => {
                        self.catalog.insert(track.clone());
                        return Ok(track);
                    }
                    Ok(Err(ResolveError::NotFound(id))) => {
                        warn!("track {id} not found in catalog");
                        return Err(RequestError::CatalogUnavailable(id));
                    }
                    Ok(Err(e @ ResolveError::Transient(_))) => {
                        warn!("catalog lookup for track {track_id} failed: {e}");
                    }
                    Err(_) => {
                        warn!("catalog lookup for track {track_id} timed out");
                    }
                }
            }
            Err(RequestError::CatalogUnavailable(track_id.to_owned()))
        }
    }

    fn validate_id(value: &str, what: &str) -> Result<(), RequestError> {
        if lazy_regex::regex_is_match!("^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$", value) {
            Ok(())
        } else {
            Err(RequestError::Validation(format!(
                "{what} {value:?} is malformed"
            )))
        }
    }

    fn validate_track_id(track_id: &str) -> Result<(), RequestError> {
        let well_formed = !track_id.is_empty()
            && track_id.len() <= 128
            && !track_id
                .chars()
                .any(|c| c.is_whitespace() || c.is_control());
        if well_formed {
            Ok(())
        } else {
            Err(RequestError::Validation(format!(
                "track id {track_id:?} is malformed"
            )))
        }
    }

    fn unexpected_response(response: QueueResponse) -> RequestError {
        error!("unexpected queue response {response:?}");
        RequestError::ServiceUnavailable("unexpected response from queue worker".to_owned())
    }
}

#[cfg(test)]
#[path = "./lib_test.rs"]
mod lib_test;
