use thiserror::Error;

#[derive(Error, Debug)]
pub enum TetherError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("collaborator not wired for this side: {0}")]
    CollaboratorMissing(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("mission plan error: {0}")]
    Plan(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TetherError>;
