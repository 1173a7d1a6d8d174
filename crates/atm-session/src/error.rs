//! Session error types

use atm_contract::ContractError;
use atm_wallet::WalletError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No wallet provider found. Install a wallet to use this ATM.")]
    NoProviderFound,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Cannot bind contract for account: {0}")]
    Binding(String),

    #[error("Balance read failed: {0}")]
    RemoteCall(String),

    #[error("Transaction rejected by user")]
    TransactionRejected,

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("No account connected")]
    NotConnected,

    #[error("Wallet returned no authorized accounts")]
    NoAuthorizedAccounts,

    #[error("Account changed while the operation was in flight; result discarded")]
    Superseded,

    /// The transaction landed; only the follow-up balance read failed
    #[error("Transaction confirmed, but the balance could not be refreshed: {refresh}")]
    Confirmed { refresh: Box<SessionError> },

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Wallet provider error: {0}")]
    Provider(WalletError),
}

impl SessionError {
    pub fn confirmed(refresh: SessionError) -> Self {
        SessionError::Confirmed {
            refresh: Box::new(refresh),
        }
    }

    /// Whether re-invoking the same operation can succeed. A confirmed
    /// transaction is never retryable: resubmitting would apply it twice.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SessionError::NoProviderFound
                | SessionError::InvalidTransition { .. }
                | SessionError::Confirmed { .. }
        )
    }

    /// Whether the requested transaction reached the chain despite the error
    pub fn transaction_landed(&self) -> bool {
        matches!(self, SessionError::Confirmed { .. })
    }
}

impl From<WalletError> for SessionError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::UserRejected => SessionError::UserRejected,
            other => SessionError::Provider(other),
        }
    }
}

impl From<ContractError> for SessionError {
    fn from(e: ContractError) -> Self {
        match e {
            ContractError::Binding(reason) => SessionError::Binding(reason),
            ContractError::Abi(reason) => SessionError::Binding(reason),
            ContractError::RemoteCall(reason) => SessionError::RemoteCall(reason),
            ContractError::TransactionRejected => SessionError::TransactionRejected,
            ContractError::TransactionReverted(reason) => SessionError::TransactionReverted(reason),
        }
    }
}
