//! In-memory chain state
//!
//! Holds the wallet keyring, the authorization state the injected provider
//! reports, and a ledger contract with per-account balances.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use atm_wallet::{Address, ContractCall, Environment, Provider, TxHash, TxReceipt, WalletEvent};

use crate::gate::Gate;

/// Address the ledger contract is deployed at unless configured otherwise
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// User-facing prompts that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    /// `eth_requestAccounts`
    Connect,
    /// Transaction signature
    Sign,
    /// `wallet_requestPermissions`
    Permissions,
}

#[derive(Debug, Clone)]
struct SubmittedTx {
    from: Address,
    call: ContractCall,
}

#[derive(Default)]
pub(crate) struct ChainState {
    keyring: Vec<Address>,
    authorized: Vec<Address>,
    balances: HashMap<Address, u128>,
    listeners: Vec<mpsc::UnboundedSender<WalletEvent>>,
    rejections: HashMap<Prompt, usize>,
    permissions_unsupported: bool,
    reselect_on_permissions: Option<Address>,
    pending: HashMap<TxHash, SubmittedTx>,
    nonce: u64,
    balance_reads: usize,
    submitted: usize,
    read_gate: Option<Gate>,
    confirm_gate: Option<Gate>,
}

/// Shared handle to the in-memory chain and its injected wallet
#[derive(Clone)]
pub struct Devnet {
    contract: Address,
    pub(crate) state: Arc<Mutex<ChainState>>,
}

impl Devnet {
    pub fn new() -> Self {
        Self::with_contract(DEFAULT_CONTRACT_ADDRESS)
    }

    pub fn with_contract(contract: impl Into<Address>) -> Self {
        Self {
            contract: contract.into(),
            state: Arc::new(Mutex::new(ChainState::default())),
        }
    }

    /// Add an account to the wallet keyring with an opening ledger balance
    pub fn with_account(self, account: impl Into<Address>, balance: u128) -> Self {
        let account = account.into();
        {
            let mut state = self.state.lock();
            if !state.keyring.contains(&account) {
                state.keyring.push(account.clone());
            }
            state.balances.insert(account, balance);
        }
        self
    }

    /// Pre-authorize an account, as if the user connected in an earlier visit.
    /// No event is emitted.
    pub fn authorize(&self, account: impl Into<Address>) {
        let account = account.into();
        let mut state = self.state.lock();
        if !state.keyring.contains(&account) {
            state.keyring.push(account.clone());
        }
        state.authorized.retain(|a| a != &account);
        state.authorized.insert(0, account);
    }

    pub fn contract_address(&self) -> &Address {
        &self.contract
    }

    /// Select a different account in the wallet and notify listeners
    pub fn switch_account(&self, account: impl Into<Address>) {
        let account = account.into();
        let accounts = {
            let mut state = self.state.lock();
            if !state.keyring.contains(&account) {
                state.keyring.push(account.clone());
            }
            state.authorized = vec![account];
            state.authorized.clone()
        };
        self.emit(accounts);
    }

    /// Revoke every authorization from the wallet side and notify listeners
    pub fn revoke_all(&self) {
        self.state.lock().authorized.clear();
        self.emit(Vec::new());
    }

    /// Deliver an arbitrary `accountsChanged` payload
    pub fn emit(&self, accounts: Vec<Address>) {
        let mut state = self.state.lock();
        tracing::debug!(count = accounts.len(), "devnet: accountsChanged");
        state
            .listeners
            .retain(|tx| tx.send(WalletEvent::AccountsChanged(accounts.clone())).is_ok());
    }

    /// Make the next prompt of this kind fail with a user rejection
    pub fn reject_next(&self, prompt: Prompt) {
        *self.state.lock().rejections.entry(prompt).or_insert(0) += 1;
    }

    /// Answer `wallet_requestPermissions` with "unsupported method"
    pub fn set_permissions_unsupported(&self, unsupported: bool) {
        self.state.lock().permissions_unsupported = unsupported;
    }

    /// Make `wallet_requestPermissions` re-select this account (and notify)
    /// instead of clearing the authorization
    pub fn reselect_on_permissions(&self, account: impl Into<Address>) {
        self.state.lock().reselect_on_permissions = Some(account.into());
    }

    /// Stall the next `getBalance` read until the returned gate is released
    pub fn hold_next_balance_read(&self) -> Gate {
        let gate = Gate::new();
        self.state.lock().read_gate = Some(gate.clone());
        gate
    }

    /// Stall the next transaction confirmation until the returned gate is released
    pub fn hold_next_confirmation(&self) -> Gate {
        let gate = Gate::new();
        self.state.lock().confirm_gate = Some(gate.clone());
        gate
    }

    /// Overwrite a ledger balance from outside the wallet
    pub fn set_balance(&self, account: impl Into<Address>, balance: u128) {
        self.state.lock().balances.insert(account.into(), balance);
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.state
            .lock()
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    pub fn authorized_accounts(&self) -> Vec<Address> {
        self.state.lock().authorized.clone()
    }

    /// Number of `getBalance` calls served so far
    pub fn balance_reads(&self) -> usize {
        self.state.lock().balance_reads
    }

    /// Number of transactions signed and submitted so far
    pub fn submitted_transactions(&self) -> usize {
        self.state.lock().submitted
    }

    pub(crate) fn take_rejection(&self, prompt: Prompt) -> bool {
        let mut state = self.state.lock();
        match state.rejections.get_mut(&prompt) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn permissions_unsupported(&self) -> bool {
        self.state.lock().permissions_unsupported
    }

    pub(crate) fn subscribe(&self, events: mpsc::UnboundedSender<WalletEvent>) {
        self.state.lock().listeners.push(events);
    }

    /// Authorize the first keyring account if nothing is authorized yet.
    /// Returns the authorized list and whether it changed.
    pub(crate) fn authorize_default(&self) -> (Vec<Address>, bool) {
        let mut state = self.state.lock();
        if state.authorized.is_empty() {
            if let Some(first) = state.keyring.first().cloned() {
                state.authorized.push(first);
                return (state.authorized.clone(), true);
            }
        }
        (state.authorized.clone(), false)
    }

    /// Reset permissions. Returns the re-selected account, if one is configured.
    pub(crate) fn reset_permissions(&self) -> Option<Address> {
        let mut state = self.state.lock();
        match state.reselect_on_permissions.clone() {
            Some(account) => {
                state.authorized = vec![account.clone()];
                Some(account)
            }
            None => {
                state.authorized.clear();
                None
            }
        }
    }

    pub(crate) fn is_authorized(&self, account: &Address) -> bool {
        self.state.lock().authorized.contains(account)
    }

    pub(crate) fn read_balance(&self, account: &Address) -> (u128, Option<Gate>) {
        let mut state = self.state.lock();
        state.balance_reads += 1;
        let balance = state.balances.get(account).copied().unwrap_or_default();
        (balance, state.read_gate.take())
    }

    pub(crate) fn submit(&self, from: &Address, call: &ContractCall) -> TxHash {
        let mut state = self.state.lock();
        state.nonce += 1;
        state.submitted += 1;

        let mut hasher = Sha256::new();
        hasher.update(state.nonce.to_be_bytes());
        hasher.update(from.as_str().as_bytes());
        hasher.update(call.function.as_bytes());
        for arg in &call.args {
            hasher.update(arg.as_bytes());
        }
        let hash = format!("0x{:x}", hasher.finalize());

        state.pending.insert(
            hash.clone(),
            SubmittedTx {
                from: from.clone(),
                call: call.clone(),
            },
        );
        hash
    }

    pub(crate) fn take_confirm_gate(&self) -> Option<Gate> {
        self.state.lock().confirm_gate.take()
    }

    /// Mine a submitted transaction. `None` if the hash is unknown.
    pub(crate) fn mine(&self, hash: &TxHash) -> Option<TxReceipt> {
        let mut state = self.state.lock();
        let tx = state.pending.remove(hash)?;

        let outcome = execute(&mut state.balances, &tx.from, &tx.call);
        let receipt = match outcome {
            Ok(()) => TxReceipt {
                hash: hash.clone(),
                success: true,
                revert_reason: None,
            },
            Err(reason) => TxReceipt {
                hash: hash.clone(),
                success: false,
                revert_reason: Some(reason),
            },
        };

        tracing::debug!(
            hash = %hash,
            function = %tx.call.function,
            success = receipt.success,
            "devnet: mined transaction"
        );

        Some(receipt)
    }
}

impl Default for Devnet {
    fn default() -> Self {
        Self::new()
    }
}

fn execute(
    balances: &mut HashMap<Address, u128>,
    from: &Address,
    call: &ContractCall,
) -> std::result::Result<(), String> {
    let amount: u128 = call
        .args
        .first()
        .ok_or_else(|| "missing amount".to_string())?
        .trim()
        .parse()
        .map_err(|_| "invalid amount".to_string())?;

    let balance = balances.entry(from.clone()).or_insert(0);
    match call.function.as_str() {
        "deposit" => {
            *balance = balance
                .checked_add(amount)
                .ok_or_else(|| "arithmetic overflow".to_string())?;
            Ok(())
        }
        "withdraw" => {
            if *balance < amount {
                return Err(format!(
                    "InsufficientBalance(balance: {}, withdrawAmount: {})",
                    balance, amount
                ));
            }
            *balance -= amount;
            Ok(())
        }
        other => Err(format!("unknown function: {}", other)),
    }
}

impl Environment for Devnet {
    fn injected_provider(&self) -> Option<Arc<dyn Provider>> {
        Some(Arc::new(self.clone()))
    }
}

/// An environment with no wallet installed
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWallet;

impl Environment for NoWallet {
    fn injected_provider(&self) -> Option<Arc<dyn Provider>> {
        None
    }
}
