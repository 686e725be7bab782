use strum::IntoStaticStr;
use thiserror::Error;

/// Why a request or admin operation was refused. Every variant maps to a
/// reason a client UI can render directly.
#[derive(Clone, Debug, PartialEq, Eq, Error, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("track {0} is already queued")]
    DuplicateTrack(String),
    #[error("{reason}")]
    RateLimited {
        reason: String,
        retry_after_seconds: Option<u64>,
    },
    #[error("table {table_id} has {balance} points but the request costs {required}")]
    InsufficientPoints {
        table_id: String,
        required: u64,
        balance: u64,
    },
    #[error("the queue for bar {0} is full")]
    QueueFull(String),
    #[error("track {0} could not be resolved")]
    CatalogUnavailable(String),
    #[error("track {0} is not allowed by this bar's content policy")]
    ExplicitContent(String),
    #[error("{0} was not found")]
    NotFound(String),
    #[error("queue service unavailable: {0}")]
    ServiceUnavailable(String),
}
