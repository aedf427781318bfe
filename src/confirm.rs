//! Bounded, cancellable waits for transaction inclusion.
use std::time::Duration;

use alloy::{network::TransactionBuilder, primitives::TxHash, rpc::types::TransactionRequest};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    error::{ChainFailure, Error, Result, Stage},
    provider::{ChainClient, Inclusion},
    signer::Identity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    /// Upper bound for a single inclusion wait.
    pub timeout: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

/// Requests cancellation of every wait observing the paired [`Cancellation`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observer side of a cancellation request; cheap to clone.
#[derive(Debug, Clone)]
pub struct Cancellation(watch::Receiver<bool>);

/// Create a connected cancel handle and observer.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), Cancellation(rx))
}

impl Cancellation {
    /// An observer that is never cancelled.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for `tx_hash` to be included, bounded by `policy` and `cancel`.
///
/// The inclusion is returned as reported; checking its status is up to the caller.
pub async fn await_inclusion<C: ChainClient>(
    client: &C,
    stage: Stage,
    tx_hash: TxHash,
    policy: &ConfirmPolicy,
    cancel: &Cancellation,
) -> Result<Inclusion> {
    info!(%tx_hash, %stage, "waiting for tx to be mined");
    tokio::select! {
        res = tokio::time::timeout(policy.timeout, client.wait_for_inclusion(tx_hash)) => match res {
            Ok(Ok(inclusion)) => {
                info!(gas_used = inclusion.gas_used, %tx_hash, "tx mined");
                Ok(inclusion)
            }
            Ok(Err(err)) => Err(stage.fail(err)),
            Err(_) => {
                warn!(%tx_hash, %stage, timeout = ?policy.timeout, "gave up waiting for tx");
                Err(Error::Timeout { stage, tx_hash, after: policy.timeout })
            }
        },
        _ = cancel.cancelled() => {
            warn!(%tx_hash, %stage, "wait cancelled, tx may still be mined");
            Err(Error::Cancelled { stage, tx_hash: Some(tx_hash) })
        }
    }
}

/// Prepare, sign and submit `request` from `identity`, then wait until it is
/// mined. A reverted transaction is an error of `stage`.
///
/// Returns the nonce the transaction was sent with and its inclusion. Only one
/// transaction of `identity` is ever in flight: callers await this before
/// preparing the next one, which keeps nonces sequential.
pub(crate) async fn submit_and_confirm<C: ChainClient>(
    client: &C,
    identity: &Identity,
    request: TransactionRequest,
    stage: Stage,
    policy: &ConfirmPolicy,
    cancel: &Cancellation,
) -> Result<(u64, Inclusion)> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled {
            stage,
            tx_hash: None,
        });
    }

    let request = client
        .prepare(request.with_from(identity.address()))
        .await
        .map_err(|err| stage.fail(err))?;
    let nonce = request.nonce.unwrap_or_default();
    let tx = identity.sign(request).await.map_err(|err| stage.fail(err))?;
    let tx_hash = client.submit(tx).await.map_err(|err| stage.fail(err))?;

    let inclusion = await_inclusion(client, stage, tx_hash, policy, cancel).await?;
    if !inclusion.success {
        return Err(stage.fail(ChainFailure::Reverted(tx_hash)));
    }
    Ok((nonce, inclusion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, MockChain};

    #[tokio::test]
    async fn cancellation_is_observed() {
        let (handle, cancel) = cancellation();
        assert!(!cancel.is_cancelled());
        handle.cancel();
        assert!(cancel.is_cancelled());
        cancel.cancelled().await;
        assert!(!Cancellation::never().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_transaction_times_out() {
        let chain = MockChain::new();
        chain.set_default(Behavior::NeverMined);
        let policy = ConfirmPolicy {
            timeout: Duration::from_secs(30),
        };
        let tx_hash = TxHash::repeat_byte(1);

        let err = await_inclusion(&chain, Stage::Deployment, tx_hash, &policy, &Cancellation::never())
            .await
            .unwrap_err();
        match err {
            Error::Timeout { stage, tx_hash: hash, after } => {
                assert_eq!(stage, Stage::Deployment);
                assert_eq!(hash, tx_hash);
                assert_eq!(after, Duration::from_secs(30));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_wait() {
        let chain = MockChain::new();
        chain.set_default(Behavior::NeverMined);
        let (handle, cancel) = cancellation();
        let tx_hash = TxHash::repeat_byte(2);
        let policy = ConfirmPolicy::default();

        let wait = await_inclusion(&chain, Stage::Deployment, tx_hash, &policy, &cancel);
        handle.cancel();
        let err = wait.await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { tx_hash: Some(h), .. } if h == tx_hash));
    }
}
