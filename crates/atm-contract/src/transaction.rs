//! Amounts and in-flight transactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use atm_wallet::{Signer, TxHash, TxReceipt};

use crate::error::ContractError;
use crate::Result;

/// User-entered quantity, passed to the contract as raw text.
///
/// No parsing happens on this side; malformed input is left for the
/// contract call to reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Amount {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Amount {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    /// Contract function invoked for this kind
    pub fn function(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => crate::abi::DEPOSIT,
            TransactionKind::Withdraw => crate::abi::WITHDRAW,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.function())
    }
}

/// A submitted deposit/withdraw awaiting confirmation.
///
/// Lives only for the duration of the call; consumed by [`confirm`](Self::confirm).
pub struct PendingTransaction {
    pub hash: TxHash,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub submitted_at: DateTime<Utc>,
    signer: Arc<dyn Signer>,
}

impl PendingTransaction {
    pub(crate) fn new(
        hash: TxHash,
        kind: TransactionKind,
        amount: Amount,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            hash,
            kind,
            amount,
            submitted_at: Utc::now(),
            signer,
        }
    }

    /// Wait until mined. A reverted receipt becomes
    /// [`ContractError::TransactionReverted`].
    pub async fn confirm(self) -> Result<TxReceipt> {
        let receipt = self
            .signer
            .wait_for_receipt(&self.hash)
            .await
            .map_err(|e| ContractError::RemoteCall(e.to_string()))?;

        if !receipt.success {
            let reason = receipt
                .revert_reason
                .clone()
                .unwrap_or_else(|| "execution reverted".to_string());

            tracing::warn!(
                hash = %self.hash,
                kind = %self.kind,
                amount = %self.amount,
                reason = %reason,
                "Transaction reverted"
            );

            return Err(ContractError::TransactionReverted(reason));
        }

        tracing::info!(
            hash = %self.hash,
            kind = %self.kind,
            amount = %self.amount,
            elapsed_ms = (Utc::now() - self.submitted_at).num_milliseconds(),
            "Transaction confirmed"
        );

        Ok(receipt)
    }
}

impl std::fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("hash", &self.hash)
            .field("kind", &self.kind)
            .field("amount", &self.amount)
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}
