use thiserror::Error;

pub type Result<T> = std::result::Result<T, PulseError>;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// Maps a non-success status from the commit API onto the error taxonomy.
    pub fn from_status(status: reqwest::StatusCode, what: &str, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => PulseError::Authentication(format!("{what}: {status}")),
            404 => PulseError::NotFound(what.to_string()),
            _ => PulseError::upstream(status, what, body),
        }
    }

    pub fn upstream(status: reqwest::StatusCode, what: &str, body: &str) -> Self {
        let excerpt: String = body.chars().take(200).collect();
        PulseError::Upstream(format!("{what}: {status} {}", excerpt.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert!(matches!(
            PulseError::from_status(StatusCode::UNAUTHORIZED, "project", ""),
            PulseError::Authentication(_)
        ));
        assert!(matches!(
            PulseError::from_status(StatusCode::FORBIDDEN, "project", ""),
            PulseError::Authentication(_)
        ));
        assert!(matches!(
            PulseError::from_status(StatusCode::NOT_FOUND, "group/repo", ""),
            PulseError::NotFound(ref what) if what == "group/repo"
        ));
        assert!(matches!(
            PulseError::from_status(StatusCode::BAD_GATEWAY, "commits page 3", "oops"),
            PulseError::Upstream(ref msg) if msg.contains("oops")
        ));
    }
}
