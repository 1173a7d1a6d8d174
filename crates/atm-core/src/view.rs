//! Screen projection
//!
//! What the page shows for a given session. No state lives here.

use serde::Serialize;

use atm_session::{Balance, ConnectionStatus, SessionSnapshot};
use atm_wallet::Address;

use crate::receipt::Receipt;

pub const INSTALL_WALLET_MESSAGE: &str = "Please install a wallet in order to use this ATM.";
pub const CONNECT_PROMPT: &str = "Please connect your wallet";
pub const RECONNECT_NOTICE: &str = "Please connect again to operate.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// No provider was discovered
    InstallWallet { message: String },
    /// Provider present, no account adopted
    Connect {
        prompt: String,
        notice: String,
        /// An account request is in flight
        connecting: bool,
    },
    Account {
        account: Address,
        balance: Balance,
        /// Present while the passbook is open
        passbook: Option<Receipt>,
    },
}

impl Screen {
    pub fn project(
        provider_available: bool,
        snapshot: &SessionSnapshot,
        passbook_open: bool,
    ) -> Self {
        if !provider_available {
            return Screen::InstallWallet {
                message: INSTALL_WALLET_MESSAGE.to_string(),
            };
        }

        match (&snapshot.state, &snapshot.account) {
            (ConnectionStatus::Connected, Some(account)) => Screen::Account {
                account: account.clone(),
                balance: snapshot.balance,
                passbook: passbook_open.then(|| Receipt::new(account.clone(), snapshot.balance)),
            },
            (state, _) => Screen::Connect {
                prompt: CONNECT_PROMPT.to_string(),
                notice: RECONNECT_NOTICE.to_string(),
                connecting: *state == ConnectionStatus::Connecting,
            },
        }
    }

    pub fn is_account(&self) -> bool {
        matches!(self, Screen::Account { .. })
    }
}
