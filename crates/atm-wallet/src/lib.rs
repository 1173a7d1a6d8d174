//! ATM Wallet
//!
//! Capability boundary to an injected wallet provider:
//! - Discover whether a provider is present in the environment
//! - List authorized accounts without prompting, or prompt for authorization
//! - Ask the provider to reset account permissions (sign out)
//! - Account-change notifications delivered as typed events on a channel

mod address;
mod error;
mod handle;
mod provider;

pub use address::Address;
pub use error::WalletError;
pub use handle::WalletHandle;
pub use provider::{
    ContractCall, Environment, Provider, Signer, TxHash, TxReceipt, WalletEvent,
};

pub type Result<T> = std::result::Result<T, WalletError>;
