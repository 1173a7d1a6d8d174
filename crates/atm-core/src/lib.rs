//! ATM Core
//!
//! Application layer between the wallet, the ledger contract and whatever
//! renders the page. Owns the session controller; the presentation side only
//! reads snapshots and invokes operations.

mod atm;
mod config;
mod error;
mod receipt;
mod runtime;
mod view;

pub use atm::Atm;
pub use config::Config;
pub use error::CoreError;
pub use receipt::{Receipt, PLACEHOLDER_FIELDS};
pub use runtime::AtmHandle;
pub use view::{Screen, CONNECT_PROMPT, INSTALL_WALLET_MESSAGE, RECONNECT_NOTICE};

// Re-export the layers below
pub use atm_contract::{Amount, ContractAbi, ContractClient, ContractError, TransactionKind};
pub use atm_session::{
    Balance, ConnectionStatus, SessionController, SessionError, SessionSnapshot, SessionState,
};
pub use atm_wallet::{Address, Environment, Provider, WalletError, WalletEvent, WalletHandle};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging. `RUST_LOG` wins over `default_filter`.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be installed (tests, embedding hosts)
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
