//! Provider and signer capabilities
//!
//! These traits model the injected-wallet contract: method-call
//! request/response plus a subscribe-only account-change event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::address::Address;
use crate::Result;

/// Events emitted by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The authorized account set changed. An empty list signals a full disconnect.
    AccountsChanged(Vec<Address>),
}

/// Where a provider gets injected (the browser window in a web build)
pub trait Environment {
    fn injected_provider(&self) -> Option<Arc<dyn Provider>>;
}

/// A contract method invocation with raw-text arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub function: String,
    pub args: Vec<String>,
}

impl ContractCall {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }
}

pub type TxHash = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    /// Whether the transaction executed without reverting
    pub success: bool,
    pub revert_reason: Option<String>,
}

/// Signs and submits calls on behalf of one account
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> &Address;

    /// Read-only call (`eth_call`)
    async fn call(&self, to: &Address, call: &ContractCall) -> Result<serde_json::Value>;

    /// State-changing call (`eth_sendTransaction`). Prompts the user to sign.
    async fn send_transaction(&self, to: &Address, call: &ContractCall) -> Result<TxHash>;

    /// Resolves once the transaction has been mined
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TxReceipt>;
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// `eth_accounts`: currently authorized accounts, never prompts
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// `eth_requestAccounts`: prompts the user for authorization
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// `wallet_requestPermissions` with `{ eth_accounts: {} }`
    async fn request_permissions(&self) -> Result<()>;

    /// Register a sink for `accountsChanged` notifications
    fn subscribe(&self, events: mpsc::UnboundedSender<WalletEvent>);

    /// Signer for the currently selected account
    fn signer(&self) -> Result<Arc<dyn Signer>>;
}
