//! ATM Session
//!
//! Owns the single account session and keeps it consistent with the wallet:
//! - `Disconnected` → `Connecting` → `Connected(account, balance)`
//! - The contract client exists exactly when an account does
//! - The cached balance is invalidated on every account transition and only
//!   repopulated by an explicit refresh
//! - Results of async calls are discarded if the account changed underneath them

mod controller;
mod error;
mod state;

pub use controller::SessionController;
pub use error::SessionError;
pub use state::{Balance, ConnectedSession, ConnectionStatus, SessionSnapshot, SessionState};

pub type Result<T> = std::result::Result<T, SessionError>;
