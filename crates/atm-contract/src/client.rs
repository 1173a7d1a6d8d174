//! Contract client bound to a wallet signer

use std::sync::Arc;

use atm_wallet::{Address, ContractCall, Signer, TxReceipt, WalletError, WalletHandle};

use crate::abi::{ContractAbi, GET_BALANCE};
use crate::error::ContractError;
use crate::transaction::{Amount, PendingTransaction, TransactionKind};
use crate::Result;

#[derive(Clone)]
pub struct ContractClient {
    address: Address,
    abi: Arc<ContractAbi>,
    signer: Arc<dyn Signer>,
}

impl ContractClient {
    /// Derive a signer from the wallet and bind it to the contract address.
    ///
    /// Fails with [`ContractError::Binding`] when the wallet cannot produce a
    /// signer (e.g. no authorized account).
    pub fn bind(wallet: &WalletHandle, address: Address, abi: Arc<ContractAbi>) -> Result<Self> {
        abi.validate()?;

        let signer = wallet
            .signer()
            .map_err(|e| ContractError::Binding(e.to_string()))?;

        tracing::debug!(
            contract = %address,
            account = %signer.address(),
            "Bound contract client"
        );

        Ok(Self {
            address,
            abi,
            signer,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Account the signer acts for
    pub fn account(&self) -> &Address {
        self.signer.address()
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    pub async fn get_balance(&self) -> Result<u128> {
        let value = self
            .signer
            .call(&self.address, &ContractCall::new(GET_BALANCE))
            .await
            .map_err(|e| ContractError::RemoteCall(e.to_string()))?;

        decode_balance(&value)
    }

    /// Sign and submit without waiting for confirmation
    pub async fn submit(&self, kind: TransactionKind, amount: &Amount) -> Result<PendingTransaction> {
        let call = ContractCall::new(kind.function()).arg(amount.as_str());

        let hash = self
            .signer
            .send_transaction(&self.address, &call)
            .await
            .map_err(|e| match e {
                WalletError::UserRejected => ContractError::TransactionRejected,
                other => ContractError::RemoteCall(other.to_string()),
            })?;

        tracing::info!(
            hash = %hash,
            kind = %kind,
            amount = %amount,
            account = %self.account(),
            "Submitted transaction"
        );

        Ok(PendingTransaction::new(
            hash,
            kind,
            amount.clone(),
            Arc::clone(&self.signer),
        ))
    }

    pub async fn deposit(&self, amount: &Amount) -> Result<TxReceipt> {
        self.submit(TransactionKind::Deposit, amount)
            .await?
            .confirm()
            .await
    }

    pub async fn withdraw(&self, amount: &Amount) -> Result<TxReceipt> {
        self.submit(TransactionKind::Withdraw, amount)
            .await?
            .confirm()
            .await
    }
}

impl std::fmt::Debug for ContractClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractClient")
            .field("address", &self.address)
            .field("account", self.account())
            .finish_non_exhaustive()
    }
}

/// Accepts a JSON number, a decimal string, or a `0x` hex string
fn decode_balance(value: &serde_json::Value) -> Result<u128> {
    let decoded = match value {
        serde_json::Value::Number(n) => n.as_u64().map(u128::from),
        serde_json::Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => u128::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    };

    decoded.ok_or_else(|| ContractError::RemoteCall(format!("unexpected balance value: {}", value)))
}
