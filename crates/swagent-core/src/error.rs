use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Failed to initialize session for '{caller_id}': {source}")]
    Initialization {
        caller_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Helper for creating configuration errors
    ///
    /// # Example
    /// ```
    /// use swagent_core::Error;
    /// let err = Error::config_error("Missing contract path");
    /// ```
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Helper for creating general errors with a message
    ///
    /// # Example
    /// ```
    /// use swagent_core::Error;
    /// let err = Error::message("Something went wrong");
    /// ```
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Other(anyhow::anyhow!("{}", msg.into()))
    }

    /// Wrap an initialization failure for a caller
    pub fn initialization(caller_id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Initialization {
            caller_id: caller_id.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_error_display() {
        let err = Error::initialization("alice", anyhow::anyhow!("missing paths"));
        assert_eq!(
            err.to_string(),
            "Failed to initialize session for 'alice': missing paths"
        );
    }

    #[test]
    fn test_message_is_transparent() {
        let err = Error::message("boom");
        assert_eq!(err.to_string(), "boom");
    }
}
