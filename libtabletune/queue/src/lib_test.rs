use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use dashmap::DashMap;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio::sync::broadcast;
use tokio::time::{error::Elapsed, timeout};

use crate::tabletune_queue::*;

const BAR: &str = "bar-1";
const OTHER_BAR: &str = "bar-2";
const T1: &str = "table-1";
const T2: &str = "table-2";

#[ctor::ctor]
fn init() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .init();
}

#[async_trait]
trait TimedFut<T> {
    async fn timed_recv(&mut self) -> T;
}

#[async_trait]
impl<T: Clone + Send> TimedFut<Option<T>> for broadcast::Receiver<T> {
    async fn timed_recv(&mut self) -> Option<T> {
        timed_await(self.recv()).await.unwrap().ok()
    }
}

async fn timed_await<T>(future: T) -> Result<T::Output, Elapsed>
where
    T: Future,
{
    timeout(Duration::from_secs(5), future).await
}

#[derive(Default)]
struct MockResolver {
    tracks: DashMap<String, Track>,
    transient_failures: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockResolver {
    fn add(&self, track: Track) {
        self.tracks.insert(track.track_id.clone(), track);
    }

    fn fail_transient(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl CatalogResolver for MockResolver {
    async fn resolve(&self, track_id: &str) -> Result<Track, ResolveError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ResolveError::Transient("catalog offline".to_owned()));
        }
        self.tracks
            .get(track_id)
            .map(|track| track.clone())
            .ok_or_else(|| ResolveError::NotFound(track_id.to_owned()))
    }
}

fn track(track_id: &str) -> Track {
    Track {
        track_id: track_id.to_owned(),
        title: format!("title for {track_id}"),
        artist: "artist".to_owned(),
        duration_seconds: 180,
        thumbnail_url: format!("https://thumbs.example/{track_id}.jpg"),
        explicit: false,
    }
}

fn request(table_id: &str, track_id: &str, is_priority: bool) -> SongRequest {
    SongRequest {
        bar_id: BAR.to_owned(),
        table_id: table_id.to_owned(),
        track_id: track_id.to_owned(),
        is_priority,
        requested_by: None,
    }
}

fn open_settings() -> BarSettings {
    BarSettings {
        max_songs_per_table: 10,
        request_cooldown_seconds: 0,
        priority_cost: 100,
        standard_cost: 50,
        auto_approve: true,
        max_queue_size: 50,
        allow_explicit: true,
    }
}

fn test_settings() -> Settings {
    Settings {
        resolver_timeout: Duration::from_millis(500),
        resolver_retry_delay: Duration::from_millis(10),
        ..Settings::default()
    }
}

struct TestQueue {
    queue: TabletuneQueue,
    resolver: Arc<MockResolver>,
}

fn init_queue(bar_settings: BarSettings) -> TestQueue {
    init_queue_with(bar_settings, test_settings())
}

fn init_queue_with(bar_settings: BarSettings, settings: Settings) -> TestQueue {
    let resolver = Arc::new(MockResolver::default());
    for track_id in ["track-1", "track-2", "track-3", "track-4", "track-5"] {
        resolver.add(track(track_id));
    }
    let directory = StaticBarDirectory::new([
        BarProfile {
            bar_id: BAR.to_owned(),
            active: true,
            tables: vec![],
            settings: bar_settings.clone(),
        },
        BarProfile {
            bar_id: OTHER_BAR.to_owned(),
            active: true,
            tables: vec![],
            settings: bar_settings,
        },
    ]);
    let queue = TabletuneQueue::new(Arc::new(directory), resolver.clone(), settings);
    TestQueue { queue, resolver }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn standard_request_then_duplicate_is_rejected() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let item = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_eq!(item.points_spent, 50);
    assert_eq!(item.position, 0);
    assert_eq!(item.status, ItemStatus::Approved);
    assert!(!item.is_priority);
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 50);

    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::DuplicateTrack(id)) if id == "track-1"
    );
    // The rejected duplicate must not debit anything.
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn priority_requests_jump_the_standard_lane() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 150).await.unwrap();
    queue.credit_points(BAR, T2, 100).await.unwrap();

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-3", false))
        .await
        .unwrap();
    let priority = queue
        .submit_request(request(T2, "track-4", true))
        .await
        .unwrap();

    let playing = queue.player_ready(BAR).await.unwrap().unwrap();
    assert_eq!(playing.item_id, priority.item_id);
    assert!(playing.is_priority);
    assert_eq!(playing.status, ItemStatus::Playing);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn full_queue_rejects_without_debiting() {
    let settings = BarSettings {
        max_queue_size: 2,
        ..open_settings()
    };
    let TestQueue { queue, .. } = init_queue(settings);
    queue.credit_points(BAR, T1, 200).await.unwrap();

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);

    assert_matches!(
        queue.submit_request(request(T1, "track-3", false)).await,
        Err(RequestError::QueueFull(_))
    );
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn stale_completed_report_is_a_noop() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let z = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    let w = queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();

    let playing = queue.player_ready(BAR).await.unwrap().unwrap();
    assert_eq!(playing.item_id, z.item_id);

    let next = queue
        .playback_completed(BAR, &z.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.item_id, w.item_id);

    // A duplicate completion for z arriving late must not advance past w.
    let still = queue
        .playback_completed(BAR, &z.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still.item_id, w.item_id);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    assert_eq!(snapshot.current.unwrap().item_id, w.item_id);
    let played: Vec<_> = snapshot
        .history
        .iter()
        .filter(|item| item.item_id == z.item_id)
        .collect();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].status, ItemStatus::Played);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn resolver_outage_then_recovery_debits_once() {
    let TestQueue { queue, resolver } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    // Both the initial attempt and its retry fail.
    resolver.fail_transient(2);
    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::CatalogUnavailable(_))
    );
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);

    let item = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_eq!(item.status, ItemStatus::Approved);
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn slow_resolver_times_out_without_debit() {
    let settings = Settings {
        resolver_timeout: Duration::from_millis(20),
        resolver_retry_delay: Duration::from_millis(5),
        ..Settings::default()
    };
    let TestQueue { queue, resolver } = init_queue_with(open_settings(), settings);
    resolver.set_delay(Duration::from_millis(100));
    queue.credit_points(BAR, T1, 100).await.unwrap();

    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::CatalogUnavailable(_))
    );
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn unknown_track_is_catalog_unavailable() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    assert_matches!(
        queue.submit_request(request(T1, "no-such-track", false)).await,
        Err(RequestError::CatalogUnavailable(id)) if id == "no-such-track"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn advance_is_idempotent_while_playing() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();
    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();

    let first = queue.player_ready(BAR).await.unwrap().unwrap();
    let second = queue.player_ready(BAR).await.unwrap().unwrap();
    assert_eq!(first.item_id, second.item_id);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    assert!(snapshot.history.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn duplicate_of_the_playing_track_is_rejected() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 200).await.unwrap();
    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue.player_ready(BAR).await.unwrap().unwrap();

    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::DuplicateTrack(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cooldown_rate_limits_back_to_back_requests() {
    let settings = BarSettings {
        request_cooldown_seconds: 30,
        ..open_settings()
    };
    let TestQueue { queue, .. } = init_queue(settings);
    queue.credit_points(BAR, T1, 200).await.unwrap();

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_matches!(
        queue.submit_request(request(T1, "track-2", false)).await,
        Err(RequestError::RateLimited {
            retry_after_seconds: Some(wait),
            ..
        }) if wait > 0 && wait <= 30
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn per_table_pending_cap_rate_limits() {
    let settings = BarSettings {
        max_songs_per_table: 2,
        ..open_settings()
    };
    let TestQueue { queue, .. } = init_queue(settings);
    queue.credit_points(BAR, T1, 300).await.unwrap();

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();
    assert_matches!(
        queue.submit_request(request(T1, "track-3", false)).await,
        Err(RequestError::RateLimited {
            retry_after_seconds: None,
            ..
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn insufficient_points_is_reported_with_amounts() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 40).await.unwrap();

    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::InsufficientPoints {
            required: 50,
            balance: 40,
            ..
        })
    );
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn explicit_tracks_respect_bar_policy() {
    let settings = BarSettings {
        allow_explicit: false,
        ..open_settings()
    };
    let TestQueue { queue, resolver } = init_queue(settings);
    let mut explicit = track("track-explicit");
    explicit.explicit = true;
    resolver.add(explicit);
    queue.credit_points(BAR, T1, 100).await.unwrap();

    assert_matches!(
        queue
            .submit_request(request(T1, "track-explicit", false))
            .await,
        Err(RequestError::ExplicitContent(_))
    );
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn moderation_gates_scheduling() {
    let settings = BarSettings {
        auto_approve: false,
        ..open_settings()
    };
    let TestQueue { queue, .. } = init_queue(settings);
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let item = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_eq!(item.status, ItemStatus::Pending);

    // Pending items never occupy a schedulable lane slot.
    assert_matches!(queue.player_ready(BAR).await, Ok(None));

    let approved = queue.moderate(BAR, &item.item_id, true).await.unwrap();
    assert_eq!(approved.status, ItemStatus::Approved);
    assert_eq!(approved.position, 0);

    let playing = queue.player_ready(BAR).await.unwrap().unwrap();
    assert_eq!(playing.item_id, item.item_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn rejection_refunds_the_points() {
    let settings = BarSettings {
        auto_approve: false,
        ..open_settings()
    };
    let TestQueue { queue, .. } = init_queue(settings);
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let item = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 50);

    let rejected = queue.moderate(BAR, &item.item_id, false).await.unwrap();
    assert_eq!(rejected.status, ItemStatus::Rejected);
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    assert!(snapshot.pending.is_empty());
    assert_eq!(snapshot.history.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn moderating_an_unknown_item_is_not_found() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    assert_matches!(
        queue.moderate(BAR, "no-such-item", true).await,
        Err(RequestError::NotFound(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn play_now_skips_current_and_starts_the_target() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 150).await.unwrap();

    let a = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();
    let c = queue
        .submit_request(request(T1, "track-3", false))
        .await
        .unwrap();

    let playing = queue.player_ready(BAR).await.unwrap().unwrap();
    assert_eq!(playing.item_id, a.item_id);

    let forced = queue.play_now(BAR, &c.item_id).await.unwrap().unwrap();
    assert_eq!(forced.item_id, c.item_id);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    assert_eq!(snapshot.current.unwrap().item_id, c.item_id);
    let skipped = snapshot
        .history
        .iter()
        .find(|item| item.item_id == a.item_id)
        .unwrap();
    assert_eq!(skipped.status, ItemStatus::Skipped);
    assert_eq!(skipped.skip_reason, Some(SkipReason::AdminOverride));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn play_now_on_an_unknown_item_is_not_found() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    assert_matches!(
        queue.play_now(BAR, "no-such-item").await,
        Err(RequestError::NotFound(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn remove_refunds_and_stays_idempotent() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let item = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 50);

    queue.remove_item(BAR, &item.item_id).await.unwrap();
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);

    // Removing again must be a harmless no-op.
    queue.remove_item(BAR, &item.item_id).await.unwrap();
    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 100);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    assert!(snapshot.standard.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn unavailable_tracks_are_skipped_at_play_time() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let gone = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    let next = queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();

    // The cache entry vanishes between admission and play time.
    queue.invalidate_track("track-1");

    let playing = queue.player_ready(BAR).await.unwrap().unwrap();
    assert_eq!(playing.item_id, next.item_id);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    let skipped = snapshot
        .history
        .iter()
        .find(|item| item.item_id == gone.item_id)
        .unwrap();
    assert_eq!(skipped.status, ItemStatus::Skipped);
    assert_eq!(skipped.skip_reason, Some(SkipReason::TrackUnavailable));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn draining_the_queue_returns_empty() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    assert_matches!(queue.player_ready(BAR).await, Ok(None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn player_skip_advances_and_records_the_reason() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let a = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    let b = queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();

    queue.player_ready(BAR).await.unwrap().unwrap();
    let next = queue
        .playback_skipped(BAR, &a.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.item_id, b.item_id);

    let snapshot = queue.snapshot(BAR).await.unwrap();
    let skipped = snapshot
        .history
        .iter()
        .find(|item| item.item_id == a.item_id)
        .unwrap();
    assert_eq!(skipped.skip_reason, Some(SkipReason::PlayerSkip));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn events_reach_subscribers_in_causal_order() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    let mut events = queue.subscribe(BAR);

    queue.credit_points(BAR, T1, 100).await.unwrap();
    assert_matches!(
        events.timed_recv().await,
        Some(QueueEvent::PointsUpdated { balance: 100, .. })
    );

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    assert_matches!(
        events.timed_recv().await,
        Some(QueueEvent::PointsUpdated { balance: 50, .. })
    );
    assert_matches!(
        events.timed_recv().await,
        Some(QueueEvent::QueueUpdated { queue, .. }) if queue.standard.len() == 1
    );

    queue.player_ready(BAR).await.unwrap().unwrap();
    assert_matches!(
        events.timed_recv().await,
        Some(QueueEvent::QueueUpdated { queue, .. }) if queue.standard.is_empty()
    );
    assert_matches!(
        events.timed_recv().await,
        Some(QueueEvent::NowPlaying { current: Some(item), .. })
            if item.track.track_id == "track-1"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn bars_are_fully_independent() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();
    queue.credit_points(OTHER_BAR, T1, 30).await.unwrap();

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();

    assert_eq!(queue.balance(BAR, T1).await.unwrap(), 50);
    assert_eq!(queue.balance(OTHER_BAR, T1).await.unwrap(), 30);

    let other = queue.snapshot(OTHER_BAR).await.unwrap();
    assert!(other.standard.is_empty());
    assert!(other.priority.is_empty());
}

#[rstest]
#[case::unknown_bar("no-such-bar", T1)]
#[case::malformed_bar("not a bar id", T1)]
#[case::malformed_table(BAR, "bad table!")]
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn invalid_identifiers_are_rejected(#[case] bar_id: &str, #[case] table_id: &str) {
    let TestQueue { queue, .. } = init_queue(open_settings());
    let mut request = request(table_id, "track-1", false);
    request.bar_id = bar_id.to_owned();

    assert_matches!(
        queue.submit_request(request).await,
        Err(RequestError::Validation(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn inactive_bars_reject_requests() {
    let resolver = Arc::new(MockResolver::default());
    resolver.add(track("track-1"));
    let directory = StaticBarDirectory::new([BarProfile {
        bar_id: BAR.to_owned(),
        active: false,
        tables: vec![],
        settings: open_settings(),
    }]);
    let queue = TabletuneQueue::new(Arc::new(directory), resolver, test_settings());

    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::Validation(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn unknown_tables_reject_requests() {
    let resolver = Arc::new(MockResolver::default());
    resolver.add(track("track-1"));
    let directory = StaticBarDirectory::new([BarProfile {
        bar_id: BAR.to_owned(),
        active: true,
        tables: vec!["table-9".to_owned()],
        settings: open_settings(),
    }]);
    let queue = TabletuneQueue::new(Arc::new(directory), resolver, test_settings());

    assert_matches!(
        queue.submit_request(request(T1, "track-1", false)).await,
        Err(RequestError::Validation(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn snapshot_positions_stay_dense_across_lanes() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 300).await.unwrap();
    queue.credit_points(BAR, T2, 200).await.unwrap();

    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-2", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T2, "track-3", true))
        .await
        .unwrap();
    queue
        .submit_request(request(T2, "track-4", true))
        .await
        .unwrap();

    let snapshot = queue.snapshot(BAR).await.unwrap();
    let standard: Vec<_> = snapshot.standard.iter().map(|item| item.position).collect();
    let priority: Vec<_> = snapshot.priority.iter().map(|item| item.position).collect();
    assert_eq!(standard, vec![0, 1]);
    assert_eq!(priority, vec![0, 1]);

    // A track id appears at most once across both lanes and current.
    let mut track_ids: Vec<_> = snapshot
        .priority
        .iter()
        .chain(&snapshot.standard)
        .chain(&snapshot.current)
        .map(|item| item.track.track_id.clone())
        .collect();
    track_ids.sort();
    track_ids.dedup();
    assert_eq!(track_ids.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn queue_items_serialize_with_wire_field_names() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 100).await.unwrap();

    let item = queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["barId"], BAR);
    assert_eq!(value["tableId"], T1);
    assert_eq!(value["track"]["trackId"], "track-1");
    assert_eq!(value["isPriority"], false);
    assert_eq!(value["status"], "approved");
    assert_eq!(value["position"], 0);

    let event = QueueEvent::NowPlaying {
        bar_id: BAR.to_owned(),
        current: None,
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event"], "now-playing");
    assert_eq!(value["barId"], BAR);
    assert_eq!(event.to_string(), "now-playing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn snapshot_restores_into_a_fresh_process() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    queue.credit_points(BAR, T1, 200).await.unwrap();
    queue
        .submit_request(request(T1, "track-1", false))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-2", true))
        .await
        .unwrap();
    queue
        .submit_request(request(T1, "track-3", false))
        .await
        .unwrap();
    queue.player_ready(BAR).await.unwrap().unwrap();
    let snapshot = queue.snapshot(BAR).await.unwrap();

    let TestQueue { queue: second, .. } = init_queue(open_settings());
    let restored = second.restore(BAR, snapshot.clone()).await.unwrap();
    assert_eq!(restored, snapshot);
    assert_eq!(second.snapshot(BAR).await.unwrap(), snapshot);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn restore_refuses_a_snapshot_for_another_bar() {
    let TestQueue { queue, .. } = init_queue(open_settings());
    let snapshot = queue.snapshot(OTHER_BAR).await.unwrap();
    assert_matches!(
        queue.restore(BAR, snapshot).await,
        Err(RequestError::Validation(_))
    );
}

#[test]
fn catalog_cache_expires_entries_by_ttl() {
    let cache = CatalogCache::new(Duration::ZERO, 16);
    cache.insert(track("track-1"));
    std::thread::sleep(Duration::from_millis(2));
    assert!(cache.get("track-1").is_none());
    assert!(!cache.contains("track-1"));
}

#[test]
fn catalog_cache_evicts_oldest_past_capacity() {
    let cache = CatalogCache::new(Duration::from_secs(60), 2);
    cache.insert(track("track-1"));
    std::thread::sleep(Duration::from_millis(2));
    cache.insert(track("track-2"));
    std::thread::sleep(Duration::from_millis(2));
    cache.insert(track("track-3"));

    assert!(cache.get("track-1").is_none());
    assert!(cache.contains("track-2"));
    assert!(cache.contains("track-3"));
}
