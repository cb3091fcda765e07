use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The inspected target has no document to analyze.
    #[error("no document available for analysis")]
    MissingDocument,

    #[error("backend request '{request}' failed: {message}")]
    Backend { request: &'static str, message: String },

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("invalid url filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("failed to write coverage export: {0}")]
    Export(#[from] serde_json::Error),
}

impl Error {
    pub fn backend(request: &'static str, message: impl Into<String>) -> Self {
        Error::Backend {
            request,
            message: message.into(),
        }
    }
}
