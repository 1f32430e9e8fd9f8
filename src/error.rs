/// Error types shared across the crate.
///
/// Client-input failures (`BadArguments`, `Range`), lookup failures
/// (`Token`), and storage failures (`Backend`) are kept distinct so the
/// HTTP layer above can map them to status codes without string matching.
/// Nothing in this crate retries; every failure is reported upward with
/// its category intact.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed coordinate syntax in a REST argument string.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Well-formed coordinates that fall outside the dataset. The message
    /// carries the legal image size so the client can correct the request.
    #[error("{0}")]
    Range(String),

    /// Unknown project token or dataset name.
    #[error("token not found: {0}")]
    Token(String),

    /// A storage backend failure, with the underlying diagnostic preserved.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Insert of a freshly materialized cube found a record already at the
    /// key. Surfaced rather than upserted.
    #[error("cube already present at resolution {resolution}, key {key}: {detail}")]
    DuplicateKey {
        resolution: u8,
        key: u64,
        detail: String,
    },

    #[error("index already present at resolution {resolution}, id {id}: {detail}")]
    DuplicateIndex {
        resolution: u8,
        id: u64,
        detail: String,
    },

    /// An exclusive read was requested outside an exclusive session.
    #[error("locked read requires an open exclusive session")]
    LockWithoutSession,

    #[error("no session is open")]
    NoSession,

    #[error("a session is already open")]
    SessionAlreadyOpen,

    #[error("resolution {0} has no geometry level")]
    UnknownResolution(u8),

    #[error("unknown backend kind: {0}")]
    UnknownBackend(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}
