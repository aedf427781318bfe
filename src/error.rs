//! Error taxonomy of a provisioning run.
use std::{fmt, io, path::PathBuf, time::Duration};

use alloy::{
    network::{Ethereum, TransactionBuilderError},
    primitives::{Address, TxHash},
    providers::PendingTransactionError,
    signers::local::LocalSignerError,
    transports::TransportError,
};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The step of a run a chain transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Deployment,
    Transfer { index: usize, recipient: Address },
}

impl Stage {
    /// Wrap a chain-level failure into the error of this stage.
    pub fn fail(self, source: ChainFailure) -> Error {
        match self {
            Stage::Deployment => Error::Deployment(source),
            Stage::Transfer { index, recipient } => Error::Transfer {
                index,
                recipient,
                source,
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Deployment => f.write_str("contract deployment"),
            Stage::Transfer { index, recipient } => write!(f, "transfer #{index} to {recipient}"),
        }
    }
}

/// Why a transaction did not make it on chain.
#[derive(Debug, Error)]
pub enum ChainFailure {
    #[error("rpc request failed: {0}")]
    Rpc(#[from] TransportError),

    #[error("failed to await receipt: {0}")]
    Receipt(#[from] PendingTransactionError),

    #[error("failed to sign transaction: {0}")]
    Signing(#[from] TransactionBuilderError<Ethereum>),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("no contract code at {0}")]
    NoCode(Address),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed rpc endpoint {endpoint:?}: {reason}")]
    MalformedEndpoint { endpoint: String, reason: String },

    #[error("cannot reach rpc endpoint {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid private key: {0}")]
    InvalidKey(#[source] LocalSignerError),

    #[error("abi encoding failed: {0}")]
    Encoding(String),

    #[error("cannot load contract artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("contract deployment failed: {0}")]
    Deployment(#[source] ChainFailure),

    #[error("transfer #{index} to {recipient} failed: {source}")]
    Transfer {
        index: usize,
        recipient: Address,
        #[source]
        source: ChainFailure,
    },

    #[error("`{call}` state read failed: {source}")]
    Read {
        call: String,
        #[source]
        source: ChainFailure,
    },

    #[error("cannot write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("token deployed at {address} but its address was not saved: {source}")]
    Unrecorded {
        address: Address,
        #[source]
        source: Box<Error>,
    },

    #[error("{stage} not confirmed within {after:?} (tx {tx_hash})")]
    Timeout {
        stage: Stage,
        tx_hash: TxHash,
        after: Duration,
    },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage, tx_hash: Option<TxHash> },
}

impl Error {
    /// Hash of a transaction that was broadcast but whose outcome is unknown.
    /// It may still be mined after this error is returned.
    pub fn unconfirmed_tx(&self) -> Option<TxHash> {
        match self {
            Error::Timeout { tx_hash, .. } => Some(*tx_hash),
            Error::Cancelled { tx_hash, .. } => *tx_hash,
            _ => None,
        }
    }

    pub(crate) fn encoding(err: impl fmt::Display) -> Self {
        Error::Encoding(err.to_string())
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Error::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
