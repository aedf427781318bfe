//! Top-level orchestration: deploy, persist, verify, distribute.
use alloy::primitives::Address;
use tracing::{error, info, warn};

use crate::{
    artifact::ContractArtifact,
    config::ProvisionConfig,
    confirm::Cancellation,
    deployer::deploy_token,
    distributor::{DistributionReport, distribute},
    error::{Error, Result},
    persist::{persist_address, write_report},
    provider::{ChainClient, Inclusion, connect},
    signer::Identity,
    token::DeployedToken,
};

/// Outcome of a run whose deployment succeeded.
#[derive(Debug)]
pub struct ProvisionReport {
    pub chain_id: u64,
    pub deployer: Address,
    pub token_address: Address,
    pub deployment: Inclusion,
    /// `None` when no recipients were configured.
    pub distribution: Option<DistributionReport>,
    /// Set when the JSON report could not be written. The run itself is
    /// still described by the fields above.
    pub report_error: Option<Error>,
}

impl ProvisionReport {
    pub fn is_complete(&self) -> bool {
        self.distribution
            .as_ref()
            .is_none_or(DistributionReport::is_complete)
    }

    /// Complete and fully recorded.
    pub fn succeeded(&self) -> bool {
        self.is_complete() && self.report_error.is_none()
    }
}

/// Read back the token metadata for the log. Failures are logged only.
async fn log_token_state<C: ChainClient>(client: &C, token: &DeployedToken) {
    for call in ["name", "symbol", "decimals", "totalSupply"] {
        match token.read(client, call, &[]).await {
            Ok(values) => info!(token = %token.address, "{call}() = {values:?}"),
            Err(err) => warn!(token = %token.address, %err, "could not read {call}()"),
        }
    }
}

/// Deploy the configured token, record its address and fund the recipients.
///
/// All transactions are sent from `identity`, one at a time. A failed
/// distribution or report write is recorded in the returned value, not as
/// `Err`, because the token exists at that point.
pub async fn provision<C: ChainClient>(
    client: &C,
    identity: &Identity,
    artifact: &ContractArtifact,
    config: &ProvisionConfig,
    cancel: &Cancellation,
) -> Result<ProvisionReport> {
    // everything that can be checked offline is checked before deploying
    let amount = config.amount.resolve(config.token.decimals)?;
    if !config.recipients.is_empty() && artifact.abi.function("transfer").is_none() {
        return Err(Error::Encoding("abi has no `transfer` function".to_string()));
    }

    let token = deploy_token(
        client,
        identity,
        artifact,
        &config.token,
        &config.confirm,
        cancel,
    )
    .await?;
    persist_address(token.address, &config.output_path).map_err(|source| Error::Unrecorded {
        address: token.address,
        source: Box::new(source),
    })?;
    log_token_state(client, &token).await;

    let distribution = if config.recipients.is_empty() {
        info!("no recipients given, skipping distribution");
        None
    } else {
        let report = distribute(
            client,
            identity,
            &token,
            &config.recipients,
            amount,
            &config.confirm,
            cancel,
        )
        .await?;
        Some(report)
    };

    let mut report = ProvisionReport {
        chain_id: client.chain_id(),
        deployer: identity.address(),
        token_address: token.address,
        deployment: token.deployment,
        distribution,
        report_error: None,
    };
    if let Some(path) = &config.report_path {
        if let Err(err) = write_report(&report, path) {
            error!(%err, "run report not written");
            report.report_error = Some(err);
        }
    }
    Ok(report)
}

/// Run a full provisioning against the configured endpoint.
///
/// The key is parsed before any I/O, so a bad key never reaches the network.
pub async fn run(config: &ProvisionConfig, cancel: &Cancellation) -> Result<ProvisionReport> {
    let identity = Identity::from_private_key(config.private_key.expose())?;
    info!(address = %identity.address(), "using signer");

    let artifact = config.artifact.load()?;
    let client = connect(&config.endpoint).await?;

    provision(&client, &identity, &artifact, config, cancel).await
}
