//! Token provisioning: deploy an ERC-20 contract, record where it lives and
//! hand the first tokens out.
//!
//! A run signs every transaction with one [`Identity`] and talks to one
//! endpoint through a [`ChainClient`]. Transactions are strictly sequential:
//! the next one is prepared only after the previous one has been mined, so
//! the account nonce never has more than one transaction in flight.

pub mod artifact;
pub mod config;
pub mod confirm;
pub mod deployer;
pub mod distributor;
pub mod error;
pub mod persist;
pub mod provider;
pub mod provision;
pub mod signer;
pub mod token;

#[cfg(test)]
mod testing;

pub use artifact::ContractArtifact;
pub use config::{ArtifactSource, PrivateKey, ProvisionConfig};
pub use confirm::{CancelHandle, Cancellation, ConfirmPolicy, cancellation};
pub use distributor::DistributionReport;
pub use error::{ChainFailure, Error, Result, Stage};
pub use provider::{ChainClient, Inclusion, RpcClient, connect};
pub use provision::{ProvisionReport, provision, run};
pub use signer::Identity;
pub use token::{DeployedToken, TokenSpec, TransferAmount};
