use std::io;

use thiserror::Error;

use crate::auth::CacheError;
use crate::platform::PlatformError;

pub const CONFIGURE_HINT: &str = "re-run `chord configure`";

/// Every fatal condition of the client. `main` prints it, closes the session
/// and exits non-zero.
#[derive(Debug, Error)]
pub enum ChordError {
    #[error("input error: {0}")]
    Input(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("channel selection error: {0}")]
    Selection(String),
    #[error("failed to fetch channel history: {0}")]
    Fetch(#[source] PlatformError),
    #[error("failed to send message: {0}")]
    Send(#[source] PlatformError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("{context}: {source}")]
    Platform {
        context: &'static str,
        #[source]
        source: PlatformError,
    },
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

impl ChordError {
    pub fn platform(context: &'static str) -> impl FnOnce(PlatformError) -> ChordError {
        move |source| ChordError::Platform { context, source }
    }
}

impl From<dialoguer::Error> for ChordError {
    fn from(error: dialoguer::Error) -> Self {
        ChordError::Input(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;

    #[test]
    fn platform_context_is_prefixed() {
        let error = ChordError::platform("failed to list channels")(PlatformError::Api(ApiError::Status(503)));
        assert_eq!(error.to_string(), "failed to list channels: unexpected status: 503");
    }

    #[test]
    fn send_error_names_the_cause() {
        let error = ChordError::Send(PlatformError::Closed);
        assert_eq!(error.to_string(), "failed to send message: gateway connection closed");
    }
}
