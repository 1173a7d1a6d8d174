//! Contract error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Cannot bind contract client: {0}")]
    Binding(String),

    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    #[error("Transaction rejected by user")]
    TransactionRejected,

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Invalid contract ABI: {0}")]
    Abi(String),
}
