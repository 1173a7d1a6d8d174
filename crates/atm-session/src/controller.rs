//! Session Controller
//!
//! The only writer of session state. Wallet account changes arrive as events
//! on a channel with this controller as the single consumer; queued events are
//! applied before any async operation commits its result, and an operation
//! whose account (or account generation) changed meanwhile has its result
//! discarded.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use atm_contract::{Amount, ContractAbi, ContractClient, TransactionKind};
use atm_wallet::{Address, WalletEvent, WalletHandle};

use crate::error::SessionError;
use crate::state::{Balance, ConnectedSession, SessionSnapshot, SessionState};
use crate::Result;

pub struct SessionController {
    /// Absent when no provider was discovered
    wallet: Option<WalletHandle>,
    contract_address: Address,
    abi: Arc<ContractAbi>,
    state: SessionState,
    /// Bumped on every state transition; async results captured under an
    /// older generation are stale
    generation: u64,
    events: Option<mpsc::UnboundedReceiver<WalletEvent>>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        wallet: Option<WalletHandle>,
        contract_address: Address,
        abi: Arc<ContractAbi>,
    ) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::disconnected());

        Self {
            wallet,
            contract_address,
            abi,
            state: SessionState::Disconnected,
            generation: 0,
            events: None,
            snapshots,
        }
    }

    pub fn provider_available(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Observe every published snapshot, including the transient `Connecting`
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the account-change listener is registered and still open
    pub fn is_listening(&self) -> bool {
        self.events.is_some()
    }

    /// Startup: register the account-change listener (once) and adopt an
    /// already-authorized account without prompting.
    pub async fn initialize(&mut self) -> Result<SessionSnapshot> {
        let Some(wallet) = self.wallet.clone() else {
            tracing::warn!("No wallet provider found");
            return Ok(self.snapshot());
        };

        if self.events.is_none() {
            self.events = Some(wallet.on_accounts_changed()?);
        }

        let generation = self.generation;
        let accounts = wallet.list_accounts().await?;

        self.process_pending_events();
        if self.generation != generation {
            tracing::debug!("Initial account list superseded by wallet event");
            return Ok(self.snapshot());
        }

        match accounts.into_iter().next() {
            Some(account) => self.adopt(account, false)?,
            None => tracing::info!("No authorized account; waiting for connect"),
        }

        Ok(self.snapshot())
    }

    /// Prompt the user for an account. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<SessionSnapshot> {
        let wallet = self.wallet.clone().ok_or(SessionError::NoProviderFound)?;

        self.process_pending_events();
        if let SessionState::Connected(session) = &self.state {
            tracing::debug!(account = %session.account, "Already connected");
            return Ok(self.snapshot());
        }

        self.transition(SessionState::Connecting)?;
        let generation = self.generation;

        let result = wallet.request_accounts().await;

        self.process_pending_events();
        if self.generation != generation {
            // A wallet event settled the session while the prompt was open
            return match &self.state {
                SessionState::Connected(session) => {
                    tracing::info!(account = %session.account, "Connected via wallet event");
                    Ok(self.snapshot())
                }
                _ => {
                    tracing::warn!("Account request superseded by wallet event");
                    Err(SessionError::Superseded)
                }
            };
        }

        let accounts = match result {
            Ok(accounts) => accounts,
            Err(e) => {
                self.transition(SessionState::Disconnected)?;
                tracing::info!(error = %e, "Account request failed");
                return Err(e.into());
            }
        };

        let Some(account) = accounts.into_iter().next() else {
            self.transition(SessionState::Disconnected)?;
            return Err(SessionError::NoAuthorizedAccounts);
        };

        self.adopt(account, false)?;
        Ok(self.snapshot())
    }

    /// Ask the wallet to reset permissions, then drop the session
    pub async fn disconnect(&mut self) -> Result<SessionSnapshot> {
        let wallet = self.wallet.clone().ok_or(SessionError::NoProviderFound)?;

        self.process_pending_events();
        let (account, _, _) = self.connected_context()?;

        if let Err(e) = wallet.request_disconnect_permission().await {
            self.process_pending_events();
            tracing::warn!(account = %account, error = %e, "Disconnect request failed");
            return Err(e.into());
        }

        // An explicit sign-out wins over anything the wallet queued meanwhile
        let skipped = self.discard_pending_events();
        if skipped > 0 {
            tracing::debug!(skipped, "Ignored queued wallet events on disconnect");
        }

        self.teardown()?;
        tracing::info!(account = %account, "Disconnected from wallet");

        Ok(self.snapshot())
    }

    /// Read the balance for the current account and cache it
    pub async fn refresh_balance(&mut self) -> Result<SessionSnapshot> {
        self.process_pending_events();
        let (account, contract, generation) = self.connected_context()?;

        let result = contract.get_balance().await;

        self.process_pending_events();
        if !self.is_current(&account, generation) {
            tracing::warn!(account = %account, "Discarding balance read for superseded account");
            return Err(SessionError::Superseded);
        }

        let balance = result?;
        if let SessionState::Connected(session) = &mut self.state {
            session.balance = Balance::Known(balance);
        }
        self.publish();

        tracing::info!(account = %account, balance, "Balance refreshed");

        Ok(self.snapshot())
    }

    pub async fn deposit(&mut self, amount: Amount) -> Result<SessionSnapshot> {
        self.transact(TransactionKind::Deposit, amount).await
    }

    pub async fn withdraw(&mut self, amount: Amount) -> Result<SessionSnapshot> {
        self.transact(TransactionKind::Withdraw, amount).await
    }

    async fn transact(&mut self, kind: TransactionKind, amount: Amount) -> Result<SessionSnapshot> {
        self.process_pending_events();
        let (account, contract, generation) = self.connected_context()?;

        let outcome = match kind {
            TransactionKind::Deposit => contract.deposit(&amount).await,
            TransactionKind::Withdraw => contract.withdraw(&amount).await,
        };

        self.process_pending_events();

        if let Err(e) = outcome {
            tracing::warn!(
                account = %account,
                kind = %kind,
                amount = %amount,
                error = %e,
                "Transaction failed"
            );
            return Err(e.into());
        }

        // Confirmed on-chain from here on
        if !self.is_current(&account, generation) {
            tracing::warn!(
                account = %account,
                kind = %kind,
                "Transaction confirmed after account change; result ignored"
            );
            return Err(SessionError::confirmed(SessionError::Superseded));
        }

        match self.refresh_balance().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                if self.is_current(&account, generation) {
                    self.forget_balance();
                }
                tracing::warn!(
                    account = %account,
                    kind = %kind,
                    error = %e,
                    "Transaction confirmed but balance refresh failed"
                );
                Err(SessionError::confirmed(e))
            }
        }
    }

    /// The cached balance predates a confirmed transaction
    fn forget_balance(&mut self) {
        if let SessionState::Connected(session) = &mut self.state {
            session.balance = Balance::Unknown;
        }
        self.publish();
    }

    /// Wait for the next wallet event. `None` once the listener is gone.
    pub async fn next_event(&mut self) -> Option<WalletEvent> {
        let event = match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => return None,
        };

        if event.is_none() {
            tracing::debug!("Wallet event stream closed");
            self.events = None;
        }

        event
    }

    /// Apply `event`, or the newest event queued behind it
    pub fn handle_event(&mut self, event: WalletEvent) -> Result<SessionSnapshot> {
        let (event, _, rebind) = self.latest_event(event);
        self.apply_event(event, rebind)?;
        Ok(self.snapshot())
    }

    /// Apply queued wallet events, newest list wins. Returns how many were
    /// consumed.
    pub fn process_pending_events(&mut self) -> usize {
        let Some(event) = self.try_next_event() else {
            return 0;
        };

        let (event, skipped, rebind) = self.latest_event(event);
        if let Err(e) = self.apply_event(event, rebind) {
            tracing::warn!(error = %e, "Failed to apply wallet event");
        }

        skipped + 1
    }

    /// Each account list is complete, so only the newest queued one is adopted.
    /// The wallet signs for its current selection only; binding an older list
    /// would fail. The flag is set when a skipped list moved away from the
    /// session account, which forces a rebind even if the newest list names
    /// it again.
    fn latest_event(&mut self, mut event: WalletEvent) -> (WalletEvent, usize, bool) {
        let mut skipped = 0;
        let mut moved = false;

        while let Some(newer) = self.try_next_event() {
            moved |= self.leaves_session(&event);
            event = newer;
            skipped += 1;
        }

        if skipped > 0 {
            tracing::debug!(skipped, moved, "Coalesced queued wallet events");
        }

        (event, skipped, moved)
    }

    fn leaves_session(&self, event: &WalletEvent) -> bool {
        match event {
            WalletEvent::AccountsChanged(accounts) => accounts.first() != self.state.account(),
        }
    }

    fn apply_event(&mut self, event: WalletEvent, rebind: bool) -> Result<()> {
        match event {
            WalletEvent::AccountsChanged(accounts) => self.apply_accounts_changed(accounts, rebind),
        }
    }

    fn try_next_event(&mut self) -> Option<WalletEvent> {
        self.events.as_mut()?.try_recv().ok()
    }

    fn discard_pending_events(&mut self) -> usize {
        let mut skipped = 0;
        while self.try_next_event().is_some() {
            skipped += 1;
        }
        skipped
    }

    fn apply_accounts_changed(&mut self, accounts: Vec<Address>, rebind: bool) -> Result<()> {
        match accounts.into_iter().next() {
            Some(account) => self.adopt(account, rebind),
            None => {
                if !matches!(self.state, SessionState::Disconnected) {
                    tracing::info!("Wallet removed all accounts");
                    self.teardown()?;
                }
                Ok(())
            }
        }
    }

    /// Make `account` the session account, binding a fresh contract client.
    /// The same account is a no-op unless `rebind`; a binding failure ends the
    /// session.
    fn adopt(&mut self, account: Address, rebind: bool) -> Result<()> {
        if !rebind && self.state.account() == Some(&account) {
            return Ok(());
        }

        let wallet = self.wallet.as_ref().ok_or(SessionError::NoProviderFound)?;
        let bound = ContractClient::bind(wallet, self.contract_address.clone(), Arc::clone(&self.abi))
            .map_err(SessionError::from)
            .and_then(|contract| {
                if contract.account() == &account {
                    Ok(contract)
                } else {
                    Err(SessionError::Binding(format!(
                        "signer is {} but the wallet reported {}",
                        contract.account(),
                        account
                    )))
                }
            });

        match bound {
            Ok(contract) => {
                let previous = self.state.account().cloned();
                self.transition(SessionState::Connected(ConnectedSession::new(
                    account.clone(),
                    contract,
                )))?;

                tracing::info!(
                    account = %account,
                    previous = ?previous,
                    generation = self.generation,
                    "Account connected"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Cannot bind account");
                self.teardown()?;
                Err(e)
            }
        }
    }

    fn teardown(&mut self) -> Result<()> {
        if matches!(self.state, SessionState::Disconnected) {
            return Ok(());
        }
        self.transition(SessionState::Disconnected)
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        let from = self.state.status();
        let to = next.status();

        if !from.can_transition_to(to) {
            return Err(SessionError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.state = next;
        self.generation += 1;

        tracing::debug!(
            from = %from,
            to = %to,
            generation = self.generation,
            "Session state transition"
        );

        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.snapshot());
    }

    fn connected_context(&self) -> Result<(Address, ContractClient, u64)> {
        match &self.state {
            SessionState::Connected(session) => Ok((
                session.account.clone(),
                session.contract.clone(),
                self.generation,
            )),
            _ => Err(SessionError::NotConnected),
        }
    }

    fn is_current(&self, account: &Address, generation: u64) -> bool {
        self.generation == generation && self.state.account() == Some(account)
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("contract_address", &self.contract_address)
            .field("state", &self.state.status())
            .field("generation", &self.generation)
            .field("listening", &self.events.is_some())
            .finish_non_exhaustive()
    }
}
