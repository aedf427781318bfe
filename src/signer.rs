//! Transaction-signing identity derived from a private key.
use std::{fmt, str::FromStr};

use alloy::{
    consensus::TxEnvelope,
    network::{EthereumWallet, TransactionBuilder},
    primitives::Address,
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};

use crate::error::{ChainFailure, Error, Result};

/// The account every transaction of a run is sent from.
///
/// Key material never leaves this type: `Debug` only shows the address.
#[derive(Clone)]
pub struct Identity {
    address: Address,
    wallet: EthereumWallet,
}

impl Identity {
    /// Parse a hex-encoded secp256k1 key, with or without `0x`.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(key.trim()).map_err(Error::InvalidKey)?;
        Ok(Self::from(signer))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a fully prepared request. Pure: no network access.
    pub async fn sign(&self, request: TransactionRequest) -> Result<TxEnvelope, ChainFailure> {
        let request = request.with_from(self.address);
        Ok(request.build(&self.wallet).await?)
    }
}

impl From<PrivateKeySigner> for Identity {
    fn from(signer: PrivateKeySigner) -> Self {
        Self {
            address: signer.address(),
            wallet: EthereumWallet::from(signer),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
