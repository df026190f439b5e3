// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Pose detector unavailable: {0:#}")]
    Detector(anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Failed to stage upload: {0}")]
    Staging(std::io::Error),
    #[error("Analysis task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to {1}: {0}")]
    Bind(std::io::Error, String),
    #[error("Server stopped: {0}")]
    Serve(std::io::Error),
    #[error("Failed to create upload directory {1}: {0}")]
    UploadDir(std::io::Error, String),
}
