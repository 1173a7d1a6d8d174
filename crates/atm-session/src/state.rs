//! Session state machine
//!
//! ```text
//! Disconnected
//!   ↓ connect
//! Connecting
//!   ↓ accounts approved
//! Connected(account, balance)
//! ```
//! `initialize()` and account-change events may move `Disconnected`
//! straight to `Connected`. Any state can fall back to `Disconnected`.

use serde::{Deserialize, Serialize};

use atm_contract::ContractClient;
use atm_wallet::Address;

/// Cached on-chain balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Balance {
    /// Not read since the account was adopted
    #[default]
    Unknown,
    Known(u128),
}

impl Balance {
    pub fn value(&self) -> Option<u128> {
        match self {
            Balance::Known(value) => Some(*value),
            Balance::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Balance::Known(_))
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Balance::Known(value) => write!(f, "{}", value),
            Balance::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectedSession {
    pub account: Address,
    pub contract: ContractClient,
    pub balance: Balance,
}

impl ConnectedSession {
    pub fn new(account: Address, contract: ContractClient) -> Self {
        Self {
            account,
            contract,
            balance: Balance::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Account request in flight
    Connecting,
    Connected(ConnectedSession),
}

impl SessionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            SessionState::Disconnected => ConnectionStatus::Disconnected,
            SessionState::Connecting => ConnectionStatus::Connecting,
            SessionState::Connected(_) => ConnectionStatus::Connected,
        }
    }

    pub fn account(&self) -> Option<&Address> {
        match self {
            SessionState::Connected(session) => Some(&session.account),
            _ => None,
        }
    }

    pub fn balance(&self) -> Balance {
        match self {
            SessionState::Connected(session) => session.balance,
            _ => Balance::Unknown,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.status(),
            account: self.account().cloned(),
            balance: self.balance(),
        }
    }
}

impl ConnectionStatus {
    /// Check if transition to another status is valid
    pub fn can_transition_to(&self, target: ConnectionStatus) -> bool {
        match (self, target) {
            (ConnectionStatus::Disconnected, ConnectionStatus::Connecting) => true,
            // Initial account list or an account-change event
            (ConnectionStatus::Disconnected, ConnectionStatus::Connected) => true,
            (ConnectionStatus::Connecting, ConnectionStatus::Connected) => true,
            (ConnectionStatus::Connecting, ConnectionStatus::Disconnected) => true,
            (ConnectionStatus::Connected, ConnectionStatus::Disconnected) => true,
            // Account swap
            (ConnectionStatus::Connected, ConnectionStatus::Connected) => true,
            (ConnectionStatus::Disconnected, ConnectionStatus::Disconnected) => true,
            _ => false,
        }
    }
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: ConnectionStatus,
    pub account: Option<Address>,
    pub balance: Balance,
}

impl SessionSnapshot {
    pub fn disconnected() -> Self {
        SessionState::Disconnected.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionStatus::Connected
    }
}
