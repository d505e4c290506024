#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("query failed: {0}")]
    QueryFailure(String),

    #[error("No data found for the selected time range (field: {field})")]
    NoData { field: String },

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid stop instant: {0}")]
    InvalidStop(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("malformed result: {0}")]
    MalformedResult(String),

    #[error("chart error: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn missing_env_var(var: &str) -> Self {
        Error::Config(format!("Missing environment variable: {var}"))
    }

    pub fn no_data(field: &str) -> Self {
        Error::NoData {
            field: field.to_string(),
        }
    }

    /// Expected, recoverable by changing the selection.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Error::NoData { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::QueryFailure(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::QueryFailure(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Error {
        Error::QueryFailure(e.to_string())
    }
}
