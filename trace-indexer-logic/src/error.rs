use thiserror::Error;

/// Failure taxonomy of the pipeline.
///
/// `Transport` and `Protocol` mark a single unit (transaction or address)
/// unresolved; the pipeline continues with the remaining units. `Config`
/// is fatal and raised before any network call. Reverted transactions are
/// data, not errors, and are flagged during log assembly.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("contract source code not verified: {0}")]
    NotVerified(String),
    #[error("no matching abi entry for {0}")]
    DecodeMiss(String),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("invalid url: {err}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
