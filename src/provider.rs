//! Chain connector: a thin client over an Ethereum JSON-RPC
//! [provider](https://docs.rs/alloy/latest/alloy/providers/trait.Provider.html).
//!
//! The deployer and the distributor only talk to the chain through
//! [`ChainClient`], which keeps them independent of the transport.

use std::future::Future;

use alloy::{
    consensus::TxEnvelope,
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    providers::{PendingTransactionBuilder, Provider, RootProvider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    transports::http::reqwest::Url,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ChainFailure, Error, Result};

/// Provider connected to a blockchain URL. Transactions are filled and
/// signed locally, so no filler layers are installed.
pub type HttpProvider = RootProvider<Ethereum>;

/// What the network reports once a transaction is part of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inclusion {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
    pub contract_address: Option<Address>,
}

impl From<&TransactionReceipt> for Inclusion {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success: receipt.status(),
            contract_address: receipt.contract_address,
        }
    }
}

/// Request/response channel to a single chain endpoint.
///
/// Nothing here retries; failures surface to the caller as they happen.
pub trait ChainClient: Sync {
    fn chain_id(&self) -> u64;

    /// Fill nonce, chain id, gas limit and fees of `request` for its `from` account.
    fn prepare(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<TransactionRequest, ChainFailure>> + Send;

    /// Broadcast a signed transaction and return its hash.
    fn submit(&self, tx: TxEnvelope) -> impl Future<Output = Result<TxHash, ChainFailure>> + Send;

    /// Resolve once `tx_hash` is included in a block. Never times out by itself.
    fn wait_for_inclusion(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Inclusion, ChainFailure>> + Send;

    /// Execute a read-only call against the latest state.
    fn read(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<Bytes, ChainFailure>> + Send;

    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, ChainFailure>> + Send;
}

/// [`ChainClient`] backed by an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    provider: HttpProvider,
    chain_id: u64,
}

/// Connect to `endpoint`, checking that it parses and answers `eth_chainId`.
pub async fn connect(endpoint: &str) -> Result<RpcClient> {
    let url = Url::parse(endpoint).map_err(|err| Error::MalformedEndpoint {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::MalformedEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }

    let provider = RootProvider::<Ethereum>::new_http(url);
    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|source| Error::Connection {
            endpoint: endpoint.to_string(),
            source,
        })?;
    info!(%endpoint, chain_id, "connected to chain");
    Ok(RpcClient { provider, chain_id })
}

impl ChainClient for RpcClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn prepare(&self, request: TransactionRequest) -> Result<TransactionRequest, ChainFailure> {
        let from = request.from.unwrap_or_default();
        // the previous transaction of this account is confirmed before we get
        // here, so the pending count is the next usable nonce
        let nonce = self.provider.get_transaction_count(from).pending().await?;
        let gas = self.provider.estimate_gas(request.clone()).await?;
        let fees = self.provider.estimate_eip1559_fees().await?;
        debug!(%from, nonce, gas, max_fee = fees.max_fee_per_gas, "prepared tx");

        Ok(request
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(gas)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas))
    }

    async fn submit(&self, tx: TxEnvelope) -> Result<TxHash, ChainFailure> {
        let pending = self.provider.send_tx_envelope(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<Inclusion, ChainFailure> {
        let receipt = PendingTransactionBuilder::new(self.provider.clone(), tx_hash)
            .get_receipt()
            .await?;
        Ok(Inclusion::from(&receipt))
    }

    async fn read(&self, request: TransactionRequest) -> Result<Bytes, ChainFailure> {
        Ok(self.provider.call(request).await?)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainFailure> {
        Ok(self.provider.get_code_at(address).await?)
    }
}
