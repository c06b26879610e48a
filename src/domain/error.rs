//! Domain error types.

/// Top-level error type for hedgebot.
#[derive(Debug, thiserror::Error)]
pub enum HedgeError {
    #[error("http error calling {service}: {reason}")]
    Http { service: String, reason: String },

    #[error("{service} api error: {reason}")]
    Api { service: String, reason: String },

    #[error("{service} rate limit reached: {message}")]
    RateLimited { service: String, message: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing credential: set {variable}")]
    MissingCredential { variable: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("language model error: {reason}")]
    Llm { reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HedgeError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        HedgeError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&HedgeError> for std::process::ExitCode {
    fn from(err: &HedgeError) -> Self {
        let code: u8 = match err {
            HedgeError::Io(_) | HedgeError::Report { .. } => 1,
            HedgeError::ConfigParse { .. }
            | HedgeError::ConfigMissing { .. }
            | HedgeError::ConfigInvalid { .. }
            | HedgeError::MissingCredential { .. }
            | HedgeError::InvalidInput { .. } => 2,
            HedgeError::Database { .. } | HedgeError::DatabaseQuery { .. } => 3,
            HedgeError::Http { .. }
            | HedgeError::Api { .. }
            | HedgeError::RateLimited { .. }
            | HedgeError::Llm { .. }
            | HedgeError::Broker { .. }
            | HedgeError::Json(_) => 4,
            HedgeError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
