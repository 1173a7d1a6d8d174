//! ATM configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use atm_contract::ContractAbi;
use atm_wallet::Address;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the ledger contract is deployed at
    pub contract_address: String,
    /// Compiled contract artifact; the built-in ABI is used when absent
    pub artifact_path: Option<PathBuf>,
    /// Read the balance right after an account is adopted
    pub auto_refresh: bool,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Config {
    pub const DEFAULT_CONTRACT_ADDRESS: &'static str =
        "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `ATM_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contract_address.trim().is_empty() {
            return Err(CoreError::Config("contract address cannot be empty".to_string()));
        }

        EnvFilter::try_new(&self.log_filter)
            .map_err(|e| CoreError::Config(format!("log filter {:?}: {}", self.log_filter, e)))?;

        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("ATM_CONTRACT_ADDRESS") {
            if address.trim().is_empty() {
                return Err(CoreError::Config(
                    "ATM_CONTRACT_ADDRESS cannot be empty".to_string(),
                ));
            }
            self.contract_address = address.trim().to_string();
        }

        if let Some(path) = lookup("ATM_ARTIFACT_PATH") {
            self.artifact_path = Some(PathBuf::from(path));
        }

        if let Some(flag) = lookup("ATM_AUTO_REFRESH") {
            self.auto_refresh = parse_flag(&flag).ok_or_else(|| {
                CoreError::Config(format!("ATM_AUTO_REFRESH: not a boolean: {}", flag))
            })?;
        }

        if let Some(filter) = lookup("ATM_LOG") {
            self.log_filter = filter;
        }

        Ok(())
    }

    pub fn contract_address(&self) -> Address {
        Address::new(self.contract_address.clone())
    }

    /// Load and validate the contract ABI
    pub fn load_abi(&self) -> Result<ContractAbi> {
        match &self.artifact_path {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                let abi = ContractAbi::from_artifact(&json)?;
                tracing::debug!(path = %path.display(), "Loaded contract artifact");
                Ok(abi)
            }
            None => Ok(ContractAbi::ledger()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract_address: Self::DEFAULT_CONTRACT_ADDRESS.to_string(),
            artifact_path: None,
            auto_refresh: true,
            log_filter: "info".to_string(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
