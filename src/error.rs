use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildLensError {
    /// Non-success HTTP status (status set, message is the response body) or a
    /// transport failure such as DNS, connection reset or timeout (status unset).
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, BuildLensError>;
