/// Core error type for the forwarder.
///
/// Adapter crates map their specific errors into this type so the pipeline
/// can handle failures consistently (absorbed at intake, classified into a
/// retry decision at delivery).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("notification sink error: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, Error>;
