use std::sync::Arc;

use crate::eval::EvaluationError;

/// Represents a result type for operations in the ConfigCat SDK.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// configcat-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the ConfigCat SDK.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Flag definition is broken (e.g. circular prerequisites or invalid comparator). The default
    /// value is served instead.
    #[error(transparent)]
    Evaluation(EvaluationError),

    /// Config JSON has not been fetched or loaded from cache yet.
    #[error("config JSON is not present")]
    ConfigJsonMissing,

    /// The requested setting key does not exist in config JSON.
    #[error("the key '{key}' was not found in config JSON, available keys: [{}]", available_keys.join(", "))]
    SettingNotFound {
        /// Requested key.
        key: String,
        /// Keys present in config JSON.
        available_keys: Vec<String>,
    },

    /// The default value's type does not match the type of the setting.
    #[error("the type of the setting '{key}' ({setting_type}) does not match the requested type")]
    SettingTypeMismatch {
        /// Requested key.
        key: String,
        /// Declared type of the setting.
        setting_type: String,
    },

    /// No setting serves the given variation id.
    #[error("could not find the setting for the specified variation ID: '{0}'")]
    VariationIdNotFound(String),

    /// SDK key does not have the expected format.
    #[error("SDK Key '{0}' is invalid")]
    InvalidSdkKey(String),

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// Config JSON could not be parsed.
    #[error("config JSON parse error: {0}")]
    ConfigJsonParse(String),

    /// Fetching config JSON failed. The message is the one logged by the fetcher.
    #[error("{0}")]
    Fetch(String),

    /// The operation cannot be executed because the client is in offline mode.
    #[error("client is in offline mode, it cannot initiate HTTP calls")]
    Offline,

    /// The client object is already closed.
    #[error("client is closed")]
    ClientClosed,

    /// Indicates that a background thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<EvaluationError> for Error {
    fn from(value: EvaluationError) -> Self {
        Error::Evaluation(value)
    }
}
