//! Wallet handle
//!
//! Owned wrapper around a discovered provider. The account-change listener
//! can be registered once per handle; clones share that registration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::address::Address;
use crate::error::WalletError;
use crate::provider::{Environment, Provider, Signer, WalletEvent};
use crate::Result;

#[derive(Clone)]
pub struct WalletHandle {
    provider: Arc<dyn Provider>,
    subscribed: Arc<AtomicBool>,
}

impl WalletHandle {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            subscribed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Look for an injected provider. No side effects.
    pub fn discover<E: Environment + ?Sized>(env: &E) -> Option<Self> {
        match env.injected_provider() {
            Some(provider) => {
                tracing::debug!("Discovered injected wallet provider");
                Some(Self::new(provider))
            }
            None => {
                tracing::debug!("No wallet provider in environment");
                None
            }
        }
    }

    pub async fn list_accounts(&self) -> Result<Vec<Address>> {
        let accounts = self.provider.accounts().await?;
        tracing::debug!(count = accounts.len(), "Listed authorized accounts");
        Ok(accounts)
    }

    pub async fn request_accounts(&self) -> Result<Vec<Address>> {
        match self.provider.request_accounts().await {
            Ok(accounts) => {
                tracing::debug!(count = accounts.len(), "Account request approved");
                Ok(accounts)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Account request failed");
                Err(e)
            }
        }
    }

    /// Ask the provider to revoke/reset the account permission
    pub async fn request_disconnect_permission(&self) -> Result<()> {
        self.provider.request_permissions().await
    }

    /// Register the account-change listener.
    ///
    /// Returns the receiving end of the event channel. Fails with
    /// [`WalletError::AlreadySubscribed`] on a second call.
    pub fn on_accounts_changed(&self) -> Result<mpsc::UnboundedReceiver<WalletEvent>> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(WalletError::AlreadySubscribed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.provider.subscribe(tx);
        tracing::debug!("Registered account change listener");

        Ok(rx)
    }

    pub fn signer(&self) -> Result<Arc<dyn Signer>> {
        self.provider.signer()
    }
}

impl std::fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletHandle")
            .field("subscribed", &self.subscribed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
