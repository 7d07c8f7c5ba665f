use thiserror::Error;

/// Error kinds for the coordination core, per the wire/error contract every
/// `CoordinatorService` and `WorkerService` handler is built against.
#[derive(Error, Debug)]
pub enum CoordError {
    #[error("transport error calling {url}: {cause}")]
    Transport { url: String, cause: String },

    #[error("stale control message: local epoch {local_epoch} > message epoch {message_epoch}")]
    Stale { local_epoch: u64, message_epoch: u64 },

    #[error("no worker owns shard {shard_id}")]
    NoWorkerForShard { shard_id: u32 },

    #[error("invalid cluster state: {0}")]
    InvalidState(String),

    #[error("invariant violation: {0}")]
    Fatal(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CoordError {
    fn from(err: reqwest::Error) -> Self {
        CoordError::Transport {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            cause: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
