//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session error: {0}")]
    Session(#[from] atm_session::SessionError),

    #[error("Contract error: {0}")]
    Contract(#[from] atm_contract::ContractError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ATM runtime has shut down")]
    RuntimeClosed,
}

impl CoreError {
    /// The session-level failure, if this is one
    pub fn session(&self) -> Option<&atm_session::SessionError> {
        match self {
            CoreError::Session(e) => Some(e),
            _ => None,
        }
    }
}
