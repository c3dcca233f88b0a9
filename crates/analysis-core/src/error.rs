use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
