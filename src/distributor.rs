//! Sequential, confirmed token distribution.
//!
//! Transfers go out strictly in input order and each one is mined before the
//! next is prepared. The first failure stops the run; everything from the
//! failing recipient on is handed back for a later resume.
use alloy::{
    network::TransactionBuilder,
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    confirm::{Cancellation, ConfirmPolicy, submit_and_confirm},
    error::{Error, Result, Stage},
    provider::ChainClient,
    signer::Identity,
    token::DeployedToken,
};

/// A confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundedTransfer {
    pub recipient: Address,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// The transfer that stopped the distribution.
#[derive(Debug)]
pub struct TransferFailure {
    pub index: usize,
    pub recipient: Address,
    pub error: Error,
    /// Set when the transfer was broadcast but the wait for it was abandoned.
    /// The recipient may already be funded once this tx is mined.
    pub in_flight: Option<TxHash>,
}

#[derive(Debug)]
pub struct DistributionReport {
    /// Amount sent to each recipient, in the token's smallest unit.
    pub amount: U256,
    pub funded: Vec<FundedTransfer>,
    pub failure: Option<TransferFailure>,
    /// Recipients not funded, in input order, starting with the failing one.
    pub remaining: Vec<Address>,
    pub balance_before: Option<U256>,
    pub balance_after: Option<U256>,
}

impl DistributionReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn funded_count(&self) -> usize {
        self.funded.len()
    }

    /// Recipients that can be funded again without risk of paying twice:
    /// `remaining` minus a failing recipient whose transfer is still in flight.
    pub fn resumable(&self) -> &[Address] {
        match &self.failure {
            Some(failure) if failure.in_flight.is_some() => {
                self.remaining.get(1..).unwrap_or_default()
            }
            _ => &self.remaining,
        }
    }
}

/// Best-effort balance read for the log; never fails the run.
async fn observe_balance<C: ChainClient>(
    client: &C,
    token: &DeployedToken,
    owner: Address,
    when: &str,
) -> Option<U256> {
    match token.balance_of(client, owner).await {
        Ok(balance) => {
            info!(%owner, %balance, "token balance {when} distribution");
            Some(balance)
        }
        Err(err) => {
            warn!(%owner, %err, "could not read token balance {when} distribution");
            None
        }
    }
}

/// Send `amount` of `token` to every recipient, one confirmed transfer at a time.
///
/// Returns `Err` only when nothing could be attempted (the ABI has no usable
/// `transfer`). Failures of individual transfers end up in the report.
pub async fn distribute<C: ChainClient>(
    client: &C,
    identity: &Identity,
    token: &DeployedToken,
    recipients: &[Address],
    amount: U256,
    policy: &ConfirmPolicy,
    cancel: &Cancellation,
) -> Result<DistributionReport> {
    let mut report = DistributionReport {
        amount,
        funded: Vec::with_capacity(recipients.len()),
        failure: None,
        remaining: Vec::new(),
        balance_before: None,
        balance_after: None,
    };
    if recipients.is_empty() {
        return Ok(report);
    }

    // surface a missing entry point before anything is sent
    token.transfer_call(Address::ZERO, amount)?;

    let sender = identity.address();
    report.balance_before = observe_balance(client, token, sender, "before").await;

    for (index, &recipient) in recipients.iter().enumerate() {
        let stage = Stage::Transfer { index, recipient };
        let outcome = async {
            let input = token.transfer_call(recipient, amount)?;
            let request = TransactionRequest::default()
                .with_to(token.address)
                .with_input(input);
            info!(%recipient, %amount, index, "transferring tokens");
            submit_and_confirm(client, identity, request, stage, policy, cancel).await
        }
        .await;

        match outcome {
            Ok((_, inclusion)) => {
                info!(%recipient, tx_hash = %inclusion.tx_hash, "transfer confirmed");
                report.funded.push(FundedTransfer {
                    recipient,
                    tx_hash: inclusion.tx_hash,
                    block_number: inclusion.block_number,
                });
            }
            Err(error) => {
                let in_flight = error.unconfirmed_tx();
                warn!(%recipient, index, %error, "transfer failed, stopping distribution");
                if let Some(tx_hash) = in_flight {
                    warn!(%recipient, %tx_hash, "transfer was broadcast and may still be mined");
                }
                report.failure = Some(TransferFailure {
                    index,
                    recipient,
                    error,
                    in_flight,
                });
                report.remaining = recipients[index..].to_vec();
                break;
            }
        }
    }

    report.balance_after = observe_balance(client, token, sender, "after").await;
    info!(
        funded = report.funded_count(),
        total = recipients.len(),
        "distribution finished"
    );
    Ok(report)
}
