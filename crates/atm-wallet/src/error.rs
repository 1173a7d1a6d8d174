//! Wallet error types
//!
//! Provider failures follow the EIP-1193 error codes.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("The requested account has not been authorized")]
    Unauthorized,

    #[error("Unsupported provider method: {0}")]
    Unsupported(String),

    #[error("Provider is disconnected")]
    Disconnected,

    #[error("Account change listener is already registered")]
    AlreadySubscribed,

    #[error("Provider error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl WalletError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;

    /// Map a raw provider error code onto the typed variants
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Self::USER_REJECTED => WalletError::UserRejected,
            Self::UNAUTHORIZED => WalletError::Unauthorized,
            Self::UNSUPPORTED_METHOD => WalletError::Unsupported(message),
            Self::DISCONNECTED => WalletError::Disconnected,
            _ => WalletError::Rpc { code, message },
        }
    }

    /// The provider error code this variant corresponds to, if any
    pub fn code(&self) -> Option<i64> {
        match self {
            WalletError::UserRejected => Some(Self::USER_REJECTED),
            WalletError::Unauthorized => Some(Self::UNAUTHORIZED),
            WalletError::Unsupported(_) => Some(Self::UNSUPPORTED_METHOD),
            WalletError::Disconnected => Some(Self::DISCONNECTED),
            WalletError::AlreadySubscribed => None,
            WalletError::Rpc { code, .. } => Some(*code),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::UserRejected)
    }
}
