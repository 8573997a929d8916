use reqwest::StatusCode;

/// Everything a gateway call can fail with. The gateway never recovers on
/// its own; callers decide what a failure means for them.
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// Non-2xx reply carrying the server-supplied message when one was sent.
    #[error("{message} (status {status})")]
    Api { status: StatusCode, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized, session cleared")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("{0}")]
    InvalidMedia(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
