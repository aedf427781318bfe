//! Explicit configuration of a provisioning run.
use std::{fmt, path::PathBuf};

use alloy::primitives::Address;

use crate::{
    artifact::ContractArtifact,
    confirm::ConfirmPolicy,
    error::Result,
    token::{TokenSpec, TransferAmount},
};

/// Where downstream tooling expects the deployed address.
pub const DEFAULT_OUTPUT_PATH: &str = "/data/erc20_address.txt";
pub const DEFAULT_ABI_PATH: &str = "erc20.abi";
pub const DEFAULT_BYTECODE_PATH: &str = "erc20.bin";

/// Hex private key as supplied by the caller. Never printed.
#[derive(Clone)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for PrivateKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Separate JSON ABI and hex bytecode files.
    Split { abi: PathBuf, bytecode: PathBuf },
    /// One compiler output JSON with `abi` and `bytecode`.
    CompilerOutput(PathBuf),
}

impl Default for ArtifactSource {
    fn default() -> Self {
        Self::Split {
            abi: DEFAULT_ABI_PATH.into(),
            bytecode: DEFAULT_BYTECODE_PATH.into(),
        }
    }
}

impl ArtifactSource {
    pub fn load(&self) -> Result<ContractArtifact> {
        match self {
            Self::Split { abi, bytecode } => ContractArtifact::load(abi, bytecode),
            Self::CompilerOutput(path) => ContractArtifact::from_compiler_output(path),
        }
    }
}

/// Everything a run needs. `endpoint`, `private_key` and `token` are
/// required; the rest default as in [`ProvisionConfig::new`].
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub endpoint: String,
    pub private_key: PrivateKey,
    pub token: TokenSpec,
    /// Funded in this order; empty skips distribution.
    pub recipients: Vec<Address>,
    pub amount: TransferAmount,
    pub artifact: ArtifactSource,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub confirm: ConfirmPolicy,
}

impl ProvisionConfig {
    pub fn new(endpoint: impl Into<String>, private_key: PrivateKey, token: TokenSpec) -> Self {
        Self {
            endpoint: endpoint.into(),
            private_key,
            token,
            recipients: Vec::new(),
            amount: TransferAmount::default(),
            artifact: ArtifactSource::default(),
            output_path: DEFAULT_OUTPUT_PATH.into(),
            report_path: None,
            confirm: ConfirmPolicy::default(),
        }
    }
}
