//! Passbook receipt
//!
//! Pure projection of a connected session into the text encoded in the
//! passbook QR code. Everything past the balance is placeholder text.

use serde::Serialize;
use std::fmt;

use atm_session::{Balance, SessionSnapshot};
use atm_wallet::Address;

/// Fixed labels and values printed after the balance
pub const PLACEHOLDER_FIELDS: [(&str, &str); 7] = [
    ("Father", "YourFather"),
    ("Mother", "YourMother"),
    ("Brother", "YourBrother"),
    ("Nominee", "YourNominee"),
    ("TIN", "YourTIN"),
    ("Debt", "YourDebt"),
    ("Opening Date", "YourOpeningDate"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub account: Address,
    pub balance: Balance,
}

impl Receipt {
    pub fn new(account: Address, balance: Balance) -> Self {
        Self { account, balance }
    }

    /// `None` unless the snapshot is connected
    pub fn project(snapshot: &SessionSnapshot) -> Option<Self> {
        if !snapshot.is_connected() {
            return None;
        }
        let account = snapshot.account.clone()?;
        Some(Self::new(account, snapshot.balance))
    }

    /// Label/value pairs in print order
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("Account".to_string(), self.account.to_string()),
            ("Balance".to_string(), self.balance.to_string()),
        ];
        fields.extend(
            PLACEHOLDER_FIELDS
                .iter()
                .map(|(label, value)| (label.to_string(), value.to_string())),
        );
        fields
    }

    /// Newline-separated `Label: value` lines
    pub fn render(&self) -> String {
        self.fields()
            .into_iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
