use thiserror::Error;

/// Failures the harness itself can produce. A server answering with any
/// status code (including 4xx/5xx) is never an error: the response is stored
/// and the test author asserts on it. Only a request that could not be
/// completed at all, or harness-side bookkeeping going wrong, ends up here.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("the HTTP call could not be completed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not parse XML body: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("could not parse JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing scenario state: {0}")]
    MissingState(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Gates the retry-once policy in the dispatcher.
    pub fn is_transport(&self) -> bool {
        matches!(self, HarnessError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
