use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::dto::bar_settings::BarSettings;
use crate::dto::command::{Command, QueueResponse};
use crate::dto::queue_event::QueueEvent;
use crate::dto::queue_item::{ItemStatus, QueueItem, SkipReason};
use crate::dto::request::SongRequest;
use crate::dto::request_error::RequestError;
use crate::dto::track::Track;
use crate::ledger::{LedgerError, PointsLedger};
use crate::mailbox::MailboxReceiver;
use crate::resolver::CatalogCache;
use crate::settings::Settings;
use crate::store::QueueStore;

/// Owns all mutable state for one bar: the queue store, the points ledger
/// and the per-table cooldown clocks. Commands arrive through the mailbox
/// and are applied strictly in arrival order, which is what makes the
/// debit-plus-enqueue coupling and the lane invariants hold without locks.
pub(crate) struct BarWorker {
    bar_id: String,
    store: QueueStore,
    ledger: PointsLedger,
    last_accepted: HashMap<String, Instant>,
    catalog: Arc<CatalogCache>,
    event_tx: broadcast::Sender<QueueEvent>,
}

pub(crate) async fn main_loop(
    mut receiver: MailboxReceiver<Command, QueueResponse>,
    mut worker: BarWorker,
) {
    while let Ok(envelope) = receiver.recv_async().await {
        let (command, responder) = envelope.split();
        info!("bar {}: got command {:?}", worker.bar_id, command);
        let shutting_down = matches!(command, Command::Shutdown);
        responder.respond(worker.handle(command));
        if shutting_down {
            break;
        }
    }
    info!("queue loop for bar {} completed", worker.bar_id);
}

impl BarWorker {
    pub(crate) fn new(
        bar_id: String,
        catalog: Arc<CatalogCache>,
        event_tx: broadcast::Sender<QueueEvent>,
        settings: &Settings,
    ) -> Self {
        let store = QueueStore::new(
            bar_id.clone(),
            settings.history_capacity,
            settings.history_max_age,
        );
        Self {
            bar_id,
            store,
            ledger: PointsLedger::default(),
            last_accepted: HashMap::new(),
            catalog,
            event_tx,
        }
    }

    fn handle(&mut self, command: Command) -> QueueResponse {
        match command {
            Command::Submit {
                request,
                track,
                settings,
            } => QueueResponse::Submitted(self.submit(request, track, &settings)),
            Command::Moderate { item_id, approve } => {
                QueueResponse::Moderated(self.moderate(&item_id, approve))
            }
            Command::Remove { item_id } => {
                self.remove(&item_id);
                QueueResponse::Ack
            }
            Command::PlayNow { item_id } => QueueResponse::NowPlaying(self.play_now(&item_id)),
            Command::SkipCurrent => {
                QueueResponse::NowPlaying(Ok(self.skip_current(SkipReason::AdminOverride)))
            }
            Command::PlayerReady => QueueResponse::NowPlaying(Ok(self.player_ready())),
            Command::PlaybackCompleted { item_id } => QueueResponse::NowPlaying(Ok(
                self.playback_finished(&item_id, ItemStatus::Played, None),
            )),
            Command::PlaybackSkipped { item_id } => QueueResponse::NowPlaying(Ok(
                self.playback_finished(&item_id, ItemStatus::Skipped, Some(SkipReason::PlayerSkip)),
            )),
            Command::CreditPoints { table_id, amount } => {
                QueueResponse::Balance(self.credit(&table_id, amount))
            }
            Command::GetBalance { table_id } => {
                QueueResponse::Balance(self.ledger.balance(&table_id))
            }
            Command::GetSnapshot => QueueResponse::Snapshot(self.store.snapshot()),
            Command::RestoreSnapshot { snapshot } => {
                self.store.restore(snapshot);
                self.publish_queue();
                self.publish_now_playing(self.store.current().cloned());
                QueueResponse::Snapshot(self.store.snapshot())
            }
            Command::Shutdown => QueueResponse::Ack,
        }
    }

    /// Admission checks in order, then the debit and the enqueue as one
    /// uninterruptible step. A failure at any check leaves no side effects.
    fn submit(
        &mut self,
        request: SongRequest,
        track: Track,
        settings: &BarSettings,
    ) -> Result<QueueItem, RequestError> {
        if track.explicit && !settings.allow_explicit {
            return Err(RequestError::ExplicitContent(track.track_id));
        }
        if self.store.contains_track(&track.track_id) {
            return Err(RequestError::DuplicateTrack(track.track_id));
        }
        self.check_rate_limits(&request.table_id, settings)?;

        let cost = u64::from(settings.cost(request.is_priority));
        let balance = self.ledger.balance(&request.table_id);
        if balance < cost {
            return Err(RequestError::InsufficientPoints {
                table_id: request.table_id,
                required: cost,
                balance,
            });
        }
        if self.store.admitted_len() >= settings.max_queue_size {
            return Err(RequestError::QueueFull(self.bar_id.clone()));
        }

        let balance = self
            .ledger
            .debit(&request.table_id, cost)
            .map_err(|LedgerError::InsufficientFunds { required, balance }| {
                RequestError::InsufficientPoints {
                    table_id: request.table_id.clone(),
                    required,
                    balance,
                }
            })?;
        let item = self
            .store
            .enqueue(QueueItem::admitted(&request, track, settings));
        self.last_accepted
            .insert(request.table_id.clone(), Instant::now());

        info!(
            "bar {}: admitted {} request {} for track {} from table {}",
            self.bar_id,
            if item.is_priority { "priority" } else { "standard" },
            item.item_id,
            item.track.track_id,
            item.table_id
        );
        self.publish_points(&request.table_id, balance);
        self.publish_queue();
        Ok(item)
    }

    fn check_rate_limits(
        &self,
        table_id: &str,
        settings: &BarSettings,
    ) -> Result<(), RequestError> {
        let cooldown = Duration::from_secs(settings.request_cooldown_seconds);
        if let Some(last) = self.last_accepted.get(table_id) {
            let elapsed = last.elapsed();
            if elapsed < cooldown {
                let wait = (cooldown - elapsed).as_secs().max(1);
                return Err(RequestError::RateLimited {
                    reason: format!("wait {wait}s before the next request"),
                    retry_after_seconds: Some(wait),
                });
            }
        }
        let queued = self.store.table_queued_count(table_id);
        if queued >= settings.max_songs_per_table {
            return Err(RequestError::RateLimited {
                reason: format!("table {table_id} already has {queued} songs queued"),
                retry_after_seconds: None,
            });
        }
        Ok(())
    }

    fn moderate(&mut self, item_id: &str, approve: bool) -> Result<QueueItem, RequestError> {
        if approve {
            let item = self
                .store
                .approve(item_id)
                .ok_or_else(|| RequestError::NotFound(format!("pending item {item_id}")))?;
            self.publish_queue();
            Ok(item)
        } else {
            let item = self
                .store
                .reject(item_id)
                .ok_or_else(|| RequestError::NotFound(format!("pending item {item_id}")))?;
            // The table got nothing for its points, so they come back.
            let balance = self
                .ledger
                .credit(&item.table_id, u64::from(item.points_spent));
            self.publish_points(&item.table_id, balance);
            self.publish_queue();
            Ok(item)
        }
    }

    fn remove(&mut self, item_id: &str) {
        let Some(item) = self.store.remove(item_id) else {
            // Unknown or already-removed ids are a no-op.
            return;
        };
        if matches!(item.status, ItemStatus::Pending | ItemStatus::Approved) {
            let balance = self
                .ledger
                .credit(&item.table_id, u64::from(item.points_spent));
            self.publish_points(&item.table_id, balance);
        }
        self.publish_queue();
    }

    fn play_now(&mut self, item_id: &str) -> Result<Option<QueueItem>, RequestError> {
        if !self.store.promote(item_id) {
            return Err(RequestError::NotFound(format!("queue item {item_id}")));
        }
        Ok(self.skip_current(SkipReason::AdminOverride))
    }

    /// Forces the current item (if any) out of the way and advances, which
    /// keeps a single code path for all transitions into `playing`.
    fn skip_current(&mut self, reason: SkipReason) -> Option<QueueItem> {
        if let Some(mut current) = self.store.take_current() {
            current.status = ItemStatus::Skipped;
            current.skip_reason = Some(reason);
            self.store.push_history(current);
        }
        self.advance()
    }

    fn player_ready(&mut self) -> Option<QueueItem> {
        self.advance()
    }

    fn playback_finished(
        &mut self,
        item_id: &str,
        status: ItemStatus,
        reason: Option<SkipReason>,
    ) -> Option<QueueItem> {
        let is_current = self
            .store
            .current()
            .is_some_and(|current| current.item_id == item_id);
        if !is_current {
            warn!(
                "bar {}: ignoring stale playback report for item {item_id}",
                self.bar_id
            );
            return self.store.current().cloned();
        }
        if let Some(mut finished) = self.store.take_current() {
            finished.status = status;
            finished.skip_reason = reason;
            self.store.push_history(finished);
        }
        self.advance()
    }

    /// Selects the next track. Re-entrant: while something is still
    /// playing this returns it unchanged, so duplicate ready signals never
    /// double-advance. A popped item whose track is no longer in the
    /// catalog cache is skipped and the loop continues; the queue strictly
    /// shrinks, so this terminates.
    fn advance(&mut self) -> Option<QueueItem> {
        if let Some(current) = self.store.current() {
            if current.status == ItemStatus::Playing {
                return Some(current.clone());
            }
        }
        loop {
            let Some(next) = self.store.peek_next() else {
                self.publish_queue();
                self.publish_now_playing(None);
                return None;
            };
            if !self.catalog.contains(&next.track.track_id) {
                warn!(
                    "bar {}: track {} unavailable at play time, skipping item {}",
                    self.bar_id, next.track.track_id, next.item_id
                );
                if let Some(mut item) = self.store.pop_next() {
                    item.status = ItemStatus::Skipped;
                    item.skip_reason = Some(SkipReason::TrackUnavailable);
                    self.store.push_history(item);
                }
                continue;
            }
            let Some(mut item) = self.store.pop_next() else {
                continue;
            };
            item.status = ItemStatus::Playing;
            item.position = 0;
            self.store.set_current(item.clone());
            info!(
                "bar {}: now playing {} ({})",
                self.bar_id, item.track.track_id, item.item_id
            );
            self.publish_queue();
            self.publish_now_playing(Some(item.clone()));
            return Some(item);
        }
    }

    fn credit(&mut self, table_id: &str, amount: u64) -> u64 {
        let balance = self.ledger.credit(table_id, amount);
        self.publish_points(table_id, balance);
        balance
    }

    fn publish_queue(&self) {
        self.event_tx
            .send(QueueEvent::QueueUpdated {
                bar_id: self.bar_id.clone(),
                queue: self.store.snapshot(),
            })
            .unwrap_or_default();
    }

    fn publish_now_playing(&self, current: Option<QueueItem>) {
        self.event_tx
            .send(QueueEvent::NowPlaying {
                bar_id: self.bar_id.clone(),
                current,
            })
            .unwrap_or_default();
    }

    fn publish_points(&self, table_id: &str, balance: u64) {
        self.event_tx
            .send(QueueEvent::PointsUpdated {
                bar_id: self.bar_id.clone(),
                table_id: table_id.to_owned(),
                balance,
            })
            .unwrap_or_default();
    }
}
