use super::bar_settings::BarSettings;
use super::queue_item::QueueItem;
use super::queue_snapshot::QueueSnapshot;
use super::request::SongRequest;
use super::request_error::RequestError;
use super::track::Track;

#[derive(Clone, Debug)]
pub(crate) enum Command {
    Submit {
        request: SongRequest,
        track: Track,
        settings: BarSettings,
    },
    Moderate {
        item_id: String,
        approve: bool,
    },
    Remove {
        item_id: String,
    },
    PlayNow {
        item_id: String,
    },
    SkipCurrent,
    PlayerReady,
    PlaybackCompleted {
        item_id: String,
    },
    PlaybackSkipped {
        item_id: String,
    },
    CreditPoints {
        table_id: String,
        amount: u64,
    },
    GetBalance {
        table_id: String,
    },
    GetSnapshot,
    RestoreSnapshot {
        snapshot: QueueSnapshot,
    },
    Shutdown,
}

#[derive(Clone, Debug)]
pub(crate) enum QueueResponse {
    Submitted(Result<QueueItem, RequestError>),
    Moderated(Result<QueueItem, RequestError>),
    NowPlaying(Result<Option<QueueItem>, RequestError>),
    Balance(u64),
    Snapshot(QueueSnapshot),
    Ack,
}
