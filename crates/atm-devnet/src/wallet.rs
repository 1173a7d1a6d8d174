//! Injected wallet backed by the devnet

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use atm_wallet::{
    Address, ContractCall, Provider, Result, Signer, TxHash, TxReceipt, WalletError, WalletEvent,
};

use crate::chain::{Devnet, Prompt};

const EXECUTION_REVERTED: i64 = -32000;
const UNKNOWN_TRANSACTION: i64 = -32602;

#[async_trait]
impl Provider for Devnet {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.authorized_accounts())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if self.take_rejection(Prompt::Connect) {
            return Err(WalletError::UserRejected);
        }

        let (accounts, changed) = self.authorize_default();
        if changed {
            self.emit(accounts.clone());
        }
        Ok(accounts)
    }

    async fn request_permissions(&self) -> Result<()> {
        if self.permissions_unsupported() {
            return Err(WalletError::Unsupported(
                "wallet_requestPermissions".to_string(),
            ));
        }
        if self.take_rejection(Prompt::Permissions) {
            return Err(WalletError::UserRejected);
        }

        if let Some(account) = self.reset_permissions() {
            self.emit(vec![account]);
        }
        Ok(())
    }

    fn subscribe(&self, events: mpsc::UnboundedSender<WalletEvent>) {
        Devnet::subscribe(self, events);
    }

    fn signer(&self) -> Result<Arc<dyn Signer>> {
        let account = self
            .authorized_accounts()
            .into_iter()
            .next()
            .ok_or(WalletError::Unauthorized)?;

        Ok(Arc::new(DevSigner {
            account,
            devnet: self.clone(),
        }))
    }
}

/// Signer for one devnet account
pub struct DevSigner {
    account: Address,
    devnet: Devnet,
}

impl DevSigner {
    fn check_target(&self, to: &Address) -> Result<()> {
        if to != self.devnet.contract_address() {
            return Err(WalletError::Rpc {
                code: EXECUTION_REVERTED,
                message: format!("no contract deployed at {}", to),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Signer for DevSigner {
    fn address(&self) -> &Address {
        &self.account
    }

    async fn call(&self, to: &Address, call: &ContractCall) -> Result<serde_json::Value> {
        self.check_target(to)?;

        match call.function.as_str() {
            "getBalance" => {
                let (balance, gate) = self.devnet.read_balance(&self.account);
                if let Some(gate) = gate {
                    gate.pass().await;
                }
                Ok(serde_json::Value::String(balance.to_string()))
            }
            other => Err(WalletError::Rpc {
                code: EXECUTION_REVERTED,
                message: format!("execution reverted: unknown view {}", other),
            }),
        }
    }

    async fn send_transaction(&self, to: &Address, call: &ContractCall) -> Result<TxHash> {
        self.check_target(to)?;

        if !self.devnet.is_authorized(&self.account) {
            return Err(WalletError::Unauthorized);
        }
        if self.devnet.take_rejection(Prompt::Sign) {
            return Err(WalletError::UserRejected);
        }

        Ok(self.devnet.submit(&self.account, call))
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TxReceipt> {
        if let Some(gate) = self.devnet.take_confirm_gate() {
            gate.pass().await;
        }

        self.devnet.mine(hash).ok_or_else(|| WalletError::Rpc {
            code: UNKNOWN_TRANSACTION,
            message: format!("unknown transaction {}", hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_authorizes_first_keyring_account() {
        let devnet = Devnet::new()
            .with_account("0xAAA", 100)
            .with_account("0xBBB", 5);
        let (tx, mut rx) = mpsc::unbounded_channel();
        Provider::subscribe(&devnet, tx);

        assert!(devnet.accounts().await.unwrap().is_empty());
        assert!(devnet.signer().is_err());

        let accounts = devnet.request_accounts().await.unwrap();
        assert_eq!(accounts, vec![Address::from("0xAAA")]);
        assert_eq!(
            rx.try_recv().unwrap(),
            WalletEvent::AccountsChanged(vec![Address::from("0xAAA")])
        );

        // Already authorized: no second notification
        devnet.request_accounts().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scripted_rejections() {
        let devnet = Devnet::new().with_account("0xAAA", 100);

        devnet.reject_next(Prompt::Connect);
        assert_eq!(
            devnet.request_accounts().await.unwrap_err(),
            WalletError::UserRejected
        );
        devnet.request_accounts().await.unwrap();

        let signer = devnet.signer().unwrap();
        let contract = devnet.contract_address().clone();
        devnet.reject_next(Prompt::Sign);
        let call = ContractCall::new("deposit").arg("1");
        assert_eq!(
            signer.send_transaction(&contract, &call).await.unwrap_err(),
            WalletError::UserRejected
        );
        assert_eq!(devnet.submitted_transactions(), 0);

        devnet.set_permissions_unsupported(true);
        assert!(matches!(
            devnet.request_permissions().await,
            Err(WalletError::Unsupported(_))
        ));
        devnet.set_permissions_unsupported(false);
        devnet.request_permissions().await.unwrap();
        assert!(devnet.authorized_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_signer_round_trip() {
        let devnet = Devnet::new().with_account("0xAAA", 100);
        devnet.authorize("0xAAA");
        let signer = devnet.signer().unwrap();
        let contract = devnet.contract_address().clone();

        let hash = signer
            .send_transaction(&contract, &ContractCall::new("withdraw").arg("40"))
            .await
            .unwrap();
        let receipt = signer.wait_for_receipt(&hash).await.unwrap();
        assert!(receipt.success);

        let balance = signer
            .call(&contract, &ContractCall::new("getBalance"))
            .await
            .unwrap();
        assert_eq!(balance, serde_json::json!("60"));
        assert_eq!(devnet.balance_reads(), 1);

        let wrong = Address::from("0xDEAD");
        assert!(signer
            .call(&wrong, &ContractCall::new("getBalance"))
            .await
            .is_err());
    }
}
