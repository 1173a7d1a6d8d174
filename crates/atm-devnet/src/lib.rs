//! ATM Devnet
//!
//! An in-memory stand-in for an injected wallet and the ledger contract it
//! talks to. Used for local development and as the scriptable provider in
//! tests:
//! - Keyring of accounts with per-account ledger balances
//! - Prompt rejection (connect / sign / permissions)
//! - Account switching and revocation emitting `accountsChanged`
//! - One-shot gates that stall a balance read or a confirmation

mod chain;
mod gate;
mod wallet;

pub use chain::{Devnet, NoWallet, Prompt, DEFAULT_CONTRACT_ADDRESS};
pub use gate::Gate;
pub use wallet::DevSigner;
