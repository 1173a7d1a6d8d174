//! ATM Contract Client
//!
//! Client for the ledger contract deployed at one fixed address. Reads go
//! through `getBalance()`; `deposit(amount)` / `withdraw(amount)` are
//! submitted through the wallet signer and awaited until mined.

mod abi;
mod client;
mod error;
mod transaction;

pub use abi::{AbiEntry, AbiParam, ContractAbi, DEPOSIT, GET_BALANCE, WITHDRAW};
pub use client::ContractClient;
pub use error::ContractError;
pub use transaction::{Amount, PendingTransaction, TransactionKind};

pub type Result<T> = std::result::Result<T, ContractError>;
