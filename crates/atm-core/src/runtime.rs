//! ATM runtime
//!
//! Runs an [`Atm`] on its own task. Commands from any number of handles and
//! wallet events share one loop, so session state keeps a single writer.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use atm_contract::Amount;
use atm_session::SessionSnapshot;

use crate::atm::Atm;
use crate::error::CoreError;
use crate::receipt::Receipt;
use crate::view::Screen;
use crate::Result;

const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Connect(Reply<SessionSnapshot>),
    Disconnect(Reply<SessionSnapshot>),
    RefreshBalance(Reply<SessionSnapshot>),
    Deposit(Amount, Reply<SessionSnapshot>),
    Withdraw(Amount, Reply<SessionSnapshot>),
    Screen(oneshot::Sender<Screen>),
    OpenPassbook(Reply<Receipt>),
    ClosePassbook(oneshot::Sender<()>),
}

/// Cloneable front for a running ATM
#[derive(Clone)]
pub struct AtmHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl AtmHandle {
    /// Install logging with the configured filter, initialize the ATM, then
    /// move it onto a task. The task ends once every handle is dropped.
    pub async fn start(mut atm: Atm) -> Result<(Self, JoinHandle<()>)> {
        crate::init_logging(&atm.config().log_filter);
        atm.initialize().await?;

        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let snapshots = atm.subscribe();
        let task = tokio::spawn(run(atm, receiver));

        Ok((
            Self {
                commands,
                snapshots,
            },
            task,
        ))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub async fn connect(&self) -> Result<SessionSnapshot> {
        self.request(Command::Connect).await?
    }

    pub async fn disconnect(&self) -> Result<SessionSnapshot> {
        self.request(Command::Disconnect).await?
    }

    pub async fn refresh_balance(&self) -> Result<SessionSnapshot> {
        self.request(Command::RefreshBalance).await?
    }

    pub async fn deposit(&self, amount: impl Into<Amount>) -> Result<SessionSnapshot> {
        let amount = amount.into();
        self.request(|reply| Command::Deposit(amount, reply)).await?
    }

    pub async fn withdraw(&self, amount: impl Into<Amount>) -> Result<SessionSnapshot> {
        let amount = amount.into();
        self.request(|reply| Command::Withdraw(amount, reply)).await?
    }

    pub async fn screen(&self) -> Result<Screen> {
        self.request(Command::Screen).await
    }

    pub async fn open_passbook(&self) -> Result<Receipt> {
        self.request(Command::OpenPassbook).await?
    }

    pub async fn close_passbook(&self) -> Result<()> {
        self.request(Command::ClosePassbook).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CoreError::RuntimeClosed)?;
        response.await.map_err(|_| CoreError::RuntimeClosed)
    }
}

impl std::fmt::Debug for AtmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtmHandle")
            .field("snapshot", &*self.snapshots.borrow())
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

async fn run(mut atm: Atm, mut commands: mpsc::Receiver<Command>) {
    tracing::info!("ATM runtime started");

    loop {
        tokio::select! {
            biased;

            event = atm.next_event(), if atm.is_listening() => {
                if let Some(event) = event {
                    if let Err(e) = atm.handle_event(event).await {
                        tracing::warn!(error = %e, "Failed to apply wallet event");
                    }
                }
            }

            command = commands.recv() => match command {
                Some(command) => execute(&mut atm, command).await,
                None => break,
            },
        }
    }

    tracing::info!("ATM runtime stopped");
}

async fn execute(atm: &mut Atm, command: Command) {
    // A dropped reply receiver means the caller stopped waiting
    match command {
        Command::Connect(reply) => {
            let _ = reply.send(atm.connect().await);
        }
        Command::Disconnect(reply) => {
            let _ = reply.send(atm.disconnect().await);
        }
        Command::RefreshBalance(reply) => {
            let _ = reply.send(atm.refresh_balance().await);
        }
        Command::Deposit(amount, reply) => {
            let _ = reply.send(atm.deposit(amount).await);
        }
        Command::Withdraw(amount, reply) => {
            let _ = reply.send(atm.withdraw(amount).await);
        }
        Command::Screen(reply) => {
            let _ = reply.send(atm.screen());
        }
        Command::OpenPassbook(reply) => {
            let _ = reply.send(atm.open_passbook());
        }
        Command::ClosePassbook(reply) => {
            atm.close_passbook();
            let _ = reply.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use atm_devnet::{Devnet, NoWallet};
    use atm_session::{Balance, SessionError};
    use atm_wallet::Address;

    async fn started(devnet: &Devnet) -> (AtmHandle, JoinHandle<()>) {
        let config = Config {
            contract_address: devnet.contract_address().to_string(),
            ..Config::default()
        };
        let atm = Atm::new(config, devnet).unwrap();
        AtmHandle::start(atm).await.unwrap()
    }

    fn devnet() -> Devnet {
        let devnet = Devnet::new()
            .with_account("0xAAA", 100)
            .with_account("0xBBB", 7);
        devnet.authorize("0xAAA");
        devnet
    }

    #[tokio::test]
    async fn test_start_initializes() {
        let devnet = devnet();
        let (handle, _task) = started(&devnet).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.account, Some(Address::from("0xAAA")));
        assert_eq!(snapshot.balance, Balance::Known(100));
    }

    #[tokio::test]
    async fn test_commands() {
        let devnet = devnet();
        let (handle, _task) = started(&devnet).await;

        let snapshot = handle.deposit("25").await.unwrap();
        assert_eq!(snapshot.balance, Balance::Known(125));

        let receipt = handle.open_passbook().await.unwrap();
        assert!(receipt.render().contains("Balance: 125"));
        assert!(matches!(
            handle.screen().await.unwrap(),
            Screen::Account {
                passbook: Some(_),
                ..
            }
        ));

        handle.close_passbook().await.unwrap();
        let snapshot = handle.disconnect().await.unwrap();
        assert!(!snapshot.is_connected());
        assert!(matches!(
            handle.open_passbook().await,
            Err(CoreError::Session(SessionError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_wallet_events_applied() {
        let devnet = devnet();
        let (handle, _task) = started(&devnet).await;
        let mut snapshots = handle.snapshots();

        devnet.switch_account("0xBBB");
        snapshots
            .wait_for(|s| s.account == Some(Address::from("0xBBB")) && s.balance.is_known())
            .await
            .unwrap();

        assert_eq!(handle.snapshot().balance, Balance::Known(7));
    }

    #[tokio::test]
    async fn test_clones_share_runtime() {
        let devnet = devnet();
        let (handle, _task) = started(&devnet).await;
        let other = handle.clone();

        let (a, b) = tokio::join!(handle.deposit("10"), other.deposit("20"));
        a.unwrap();
        b.unwrap();

        assert_eq!(devnet.balance_of(&Address::from("0xAAA")), 130);
        assert_eq!(
            handle.refresh_balance().await.unwrap().balance,
            Balance::Known(130)
        );
    }

    #[tokio::test]
    async fn test_start_installs_logging() {
        let config = Config {
            log_filter: "atm_core=debug".to_string(),
            ..Config::default()
        };
        let atm = Atm::new(config, &NoWallet).unwrap();
        let (_handle, _task) = AtmHandle::start(atm).await.unwrap();

        assert!(tracing::dispatcher::has_been_set());
    }

    #[tokio::test]
    async fn test_stops_when_handles_dropped() {
        let atm = Atm::new(Config::default(), &NoWallet).unwrap();
        let (handle, task) = AtmHandle::start(atm).await.unwrap();

        assert!(matches!(
            handle.screen().await.unwrap(),
            Screen::InstallWallet { .. }
        ));

        drop(handle);
        task.await.unwrap();
    }
}
