//! Contract ABI
//!
//! Loaded from a compiled artifact (`{"contractName": .., "abi": [..]}`) or a
//! bare ABI array. Only the three functions the client calls are checked.

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::Result;

pub const GET_BALANCE: &str = "getBalance";
pub const DEPOSIT: &str = "deposit";
pub const WITHDRAW: &str = "withdraw";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability", default)]
    pub state_mutability: Option<String>,
}

impl AbiEntry {
    fn function(name: &str, inputs: &[(&str, &str)], outputs: &[&str], mutability: &str) -> Self {
        Self {
            kind: "function".to_string(),
            name: Some(name.to_string()),
            inputs: inputs
                .iter()
                .map(|(name, kind)| AbiParam {
                    name: name.to_string(),
                    kind: kind.to_string(),
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|kind| AbiParam {
                    name: String::new(),
                    kind: kind.to_string(),
                })
                .collect(),
            state_mutability: Some(mutability.to_string()),
        }
    }

    fn is_function(&self, name: &str) -> bool {
        self.kind == "function" && self.name.as_deref() == Some(name)
    }

    fn is_read_only(&self) -> bool {
        matches!(self.state_mutability.as_deref(), Some("view") | Some("pure"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    Compiled {
        #[serde(rename = "contractName", default)]
        contract_name: Option<String>,
        abi: Vec<AbiEntry>,
    },
    Bare(Vec<AbiEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractAbi {
    pub contract_name: Option<String>,
    pub entries: Vec<AbiEntry>,
}

impl ContractAbi {
    /// Built-in ABI of the ledger contract
    pub fn ledger() -> Self {
        Self {
            contract_name: Some("Assessment".to_string()),
            entries: vec![
                AbiEntry::function(GET_BALANCE, &[], &["uint256"], "view"),
                AbiEntry::function(DEPOSIT, &[("_amount", "uint256")], &[], "payable"),
                AbiEntry::function(WITHDRAW, &[("_withdrawAmount", "uint256")], &[], "nonpayable"),
            ],
        }
    }

    /// Parse a compiled artifact or a bare ABI array, then validate it
    pub fn from_artifact(json: &str) -> Result<Self> {
        let file: ArtifactFile =
            serde_json::from_str(json).map_err(|e| ContractError::Abi(e.to_string()))?;

        let abi = match file {
            ArtifactFile::Compiled { contract_name, abi } => Self {
                contract_name,
                entries: abi,
            },
            ArtifactFile::Bare(entries) => Self {
                contract_name: None,
                entries,
            },
        };

        abi.validate()?;
        Ok(abi)
    }

    pub fn function(&self, name: &str) -> Option<&AbiEntry> {
        self.entries.iter().find(|entry| entry.is_function(name))
    }

    /// Check that `getBalance()`, `deposit(uint)` and `withdraw(uint)` exist
    /// with the expected shapes
    pub fn validate(&self) -> Result<()> {
        let get_balance = self
            .function(GET_BALANCE)
            .ok_or_else(|| missing(GET_BALANCE))?;
        if !get_balance.inputs.is_empty()
            || get_balance.outputs.len() != 1
            || !get_balance.is_read_only()
        {
            return Err(ContractError::Abi(format!(
                "{} must be a read-only function with no inputs and one output",
                GET_BALANCE
            )));
        }

        for name in [DEPOSIT, WITHDRAW] {
            let entry = self.function(name).ok_or_else(|| missing(name))?;
            let takes_uint = entry.inputs.len() == 1 && entry.inputs[0].kind.starts_with("uint");
            if !takes_uint || entry.is_read_only() {
                return Err(ContractError::Abi(format!(
                    "{} must be a state-changing function taking one unsigned integer",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl Default for ContractAbi {
    fn default() -> Self {
        Self::ledger()
    }
}

fn missing(name: &str) -> ContractError {
    ContractError::Abi(format!("missing function {}", name))
}
