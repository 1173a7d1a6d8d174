//! ATM container
//!
//! Owns the session controller and the passbook toggle, and projects both
//! into receipts and screens.

use std::sync::Arc;
use tokio::sync::watch;

use atm_contract::Amount;
use atm_session::{SessionController, SessionError, SessionSnapshot};
use atm_wallet::{Environment, WalletEvent, WalletHandle};

use crate::config::Config;
use crate::receipt::Receipt;
use crate::view::Screen;
use crate::Result;

pub struct Atm {
    config: Config,
    controller: SessionController,
    passbook_open: bool,
}

impl Atm {
    /// Discover the injected provider and prepare a disconnected session
    pub fn new<E: Environment + ?Sized>(config: Config, env: &E) -> Result<Self> {
        config.validate()?;
        let abi = config.load_abi()?;
        let wallet = WalletHandle::discover(env);

        tracing::info!(
            contract = %config.contract_address,
            provider = wallet.is_some(),
            "ATM created"
        );

        let controller = SessionController::new(wallet, config.contract_address(), Arc::new(abi));

        Ok(Self {
            config,
            controller,
            passbook_open: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.controller.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.controller.is_listening()
    }

    pub async fn initialize(&mut self) -> Result<SessionSnapshot> {
        let snapshot = self.controller.initialize().await?;
        Ok(self.auto_refresh(snapshot).await)
    }

    pub async fn connect(&mut self) -> Result<SessionSnapshot> {
        let snapshot = self.controller.connect().await?;
        Ok(self.auto_refresh(snapshot).await)
    }

    pub async fn disconnect(&mut self) -> Result<SessionSnapshot> {
        let snapshot = self.controller.disconnect().await?;
        self.sync_passbook();
        Ok(snapshot)
    }

    pub async fn refresh_balance(&mut self) -> Result<SessionSnapshot> {
        let snapshot = self.controller.refresh_balance().await;
        self.sync_passbook();
        Ok(snapshot?)
    }

    pub async fn deposit(&mut self, amount: impl Into<Amount>) -> Result<SessionSnapshot> {
        let snapshot = self.controller.deposit(amount.into()).await;
        self.sync_passbook();
        Ok(snapshot?)
    }

    pub async fn withdraw(&mut self, amount: impl Into<Amount>) -> Result<SessionSnapshot> {
        let snapshot = self.controller.withdraw(amount.into()).await;
        self.sync_passbook();
        Ok(snapshot?)
    }

    pub async fn next_event(&mut self) -> Option<WalletEvent> {
        self.controller.next_event().await
    }

    /// Apply a wallet event; a newly adopted account gets its balance read
    pub async fn handle_event(&mut self, event: WalletEvent) -> Result<SessionSnapshot> {
        let before = self.controller.snapshot().account;
        let snapshot = self.controller.handle_event(event);
        self.sync_passbook();
        let snapshot = snapshot?;

        if snapshot.account.is_some() && snapshot.account != before {
            return Ok(self.auto_refresh(snapshot).await);
        }
        Ok(snapshot)
    }

    pub fn receipt(&self) -> Option<Receipt> {
        Receipt::project(&self.snapshot())
    }

    pub fn screen(&self) -> Screen {
        Screen::project(
            self.controller.provider_available(),
            &self.snapshot(),
            self.passbook_open,
        )
    }

    pub fn passbook_open(&self) -> bool {
        self.passbook_open
    }

    pub fn open_passbook(&mut self) -> Result<Receipt> {
        let receipt = self.receipt().ok_or(SessionError::NotConnected)?;
        self.passbook_open = true;
        Ok(receipt)
    }

    pub fn close_passbook(&mut self) {
        self.passbook_open = false;
    }

    /// The passbook closes with the session
    fn sync_passbook(&mut self) {
        if self.passbook_open && !self.snapshot().is_connected() {
            self.passbook_open = false;
        }
    }

    async fn auto_refresh(&mut self, snapshot: SessionSnapshot) -> SessionSnapshot {
        if !self.config.auto_refresh || !snapshot.is_connected() || snapshot.balance.is_known() {
            self.sync_passbook();
            return snapshot;
        }

        let refreshed = match self.controller.refresh_balance().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // The session stays up with an unknown balance
                tracing::warn!(error = %e, "Automatic balance refresh failed");
                self.controller.snapshot()
            }
        };
        self.sync_passbook();
        refreshed
    }
}

impl std::fmt::Debug for Atm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atm")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot())
            .field("passbook_open", &self.passbook_open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::view::{CONNECT_PROMPT, INSTALL_WALLET_MESSAGE};
    use atm_devnet::{Devnet, NoWallet, Prompt};
    use atm_session::{Balance, ConnectionStatus};
    use atm_wallet::Address;

    fn config(devnet: &Devnet) -> Config {
        Config {
            contract_address: devnet.contract_address().to_string(),
            ..Config::default()
        }
    }

    fn devnet() -> Devnet {
        Devnet::new()
            .with_account("0xAAA", 100)
            .with_account("0xBBB", 7)
    }

    #[tokio::test]
    async fn test_no_wallet_screen() {
        let mut atm = Atm::new(Config::default(), &NoWallet).unwrap();
        atm.initialize().await.unwrap();

        assert_eq!(
            atm.screen(),
            Screen::InstallWallet {
                message: INSTALL_WALLET_MESSAGE.to_string()
            }
        );
        let err = atm.connect().await.unwrap_err();
        assert!(matches!(
            err.session(),
            Some(SessionError::NoProviderFound)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            contract_address: " ".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            Atm::new(config, &NoWallet),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_queued_switches_keep_passbook_open() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();
        atm.open_passbook().unwrap();

        devnet.switch_account("0xBBB");
        devnet.switch_account("0xCCC");
        devnet.set_balance("0xCCC", 3);
        let event = atm.next_event().await.unwrap();
        let snapshot = atm.handle_event(event).await.unwrap();

        assert_eq!(snapshot.account, Some(Address::from("0xCCC")));
        assert_eq!(snapshot.balance, Balance::Known(3));
        assert!(atm.passbook_open());
    }

    #[tokio::test]
    async fn test_initialize_refreshes_balance() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        let snapshot = atm.initialize().await.unwrap();

        assert_eq!(snapshot.balance, Balance::Known(100));
        assert_eq!(devnet.balance_reads(), 1);
    }

    #[tokio::test]
    async fn test_auto_refresh_disabled() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let config = Config {
            auto_refresh: false,
            ..config(&devnet)
        };
        let mut atm = Atm::new(config, &devnet).unwrap();
        let snapshot = atm.initialize().await.unwrap();

        assert!(snapshot.is_connected());
        assert_eq!(snapshot.balance, Balance::Unknown);
        assert_eq!(devnet.balance_reads(), 0);
    }

    #[tokio::test]
    async fn test_connect_flow() {
        let devnet = devnet();
        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();

        match atm.screen() {
            Screen::Connect { prompt, .. } => assert_eq!(prompt, CONNECT_PROMPT),
            other => panic!("unexpected screen: {:?}", other),
        }

        let snapshot = atm.connect().await.unwrap();
        assert_eq!(snapshot.account, Some(Address::from("0xAAA")));
        assert_eq!(snapshot.balance, Balance::Known(100));

        atm.deposit("50").await.unwrap();
        let snapshot = atm.withdraw("30").await.unwrap();
        assert_eq!(snapshot.balance, Balance::Known(120));
        assert_eq!(devnet.balance_of(&Address::from("0xAAA")), 120);
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let devnet = devnet();
        devnet.reject_next(Prompt::Connect);

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();

        let err = atm.connect().await.unwrap_err();
        assert!(matches!(err.session(), Some(SessionError::UserRejected)));
        assert_eq!(atm.snapshot().state, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_event_adoption_refreshes() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();

        devnet.switch_account("0xBBB");
        let event = atm.next_event().await.unwrap();
        let snapshot = atm.handle_event(event).await.unwrap();

        assert_eq!(snapshot.account, Some(Address::from("0xBBB")));
        assert_eq!(snapshot.balance, Balance::Known(7));
        assert_eq!(devnet.balance_reads(), 2);
    }

    #[tokio::test]
    async fn test_passbook() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        assert!(matches!(
            atm.open_passbook(),
            Err(CoreError::Session(SessionError::NotConnected))
        ));

        atm.initialize().await.unwrap();
        let receipt = atm.open_passbook().unwrap();
        assert_eq!(receipt, Receipt::new(Address::from("0xAAA"), Balance::Known(100)));
        assert!(matches!(
            atm.screen(),
            Screen::Account {
                passbook: Some(_),
                ..
            }
        ));

        atm.close_passbook();
        assert!(matches!(
            atm.screen(),
            Screen::Account { passbook: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_passbook_closes_on_disconnect() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();
        atm.open_passbook().unwrap();

        atm.disconnect().await.unwrap();
        assert!(!atm.passbook_open());
        assert!(atm.receipt().is_none());
        assert!(matches!(atm.screen(), Screen::Connect { .. }));
    }

    #[tokio::test]
    async fn test_passbook_closes_when_wallet_revokes() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();
        atm.open_passbook().unwrap();

        devnet.revoke_all();
        let event = atm.next_event().await.unwrap();
        atm.handle_event(event).await.unwrap();

        assert!(!atm.passbook_open());
        assert_eq!(atm.snapshot(), SessionSnapshot::disconnected());
    }

    #[tokio::test]
    async fn test_reverted_withdraw_surfaces() {
        let devnet = devnet();
        devnet.authorize("0xAAA");

        let mut atm = Atm::new(config(&devnet), &devnet).unwrap();
        atm.initialize().await.unwrap();

        let err = atm.withdraw("1000").await.unwrap_err();
        assert!(matches!(
            err.session(),
            Some(SessionError::TransactionReverted(_))
        ));
        assert_eq!(atm.snapshot().balance, Balance::Known(100));
    }
}
