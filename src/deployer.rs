//! Contract deployment
use std::sync::Arc;

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    network::TransactionBuilder,
    primitives::Bytes,
    rpc::types::TransactionRequest,
};
use tracing::info;

use crate::{
    artifact::ContractArtifact,
    confirm::{Cancellation, ConfirmPolicy, submit_and_confirm},
    error::{ChainFailure, Error, Result, Stage},
    provider::ChainClient,
    signer::Identity,
    token::{DeployedToken, TokenSpec},
};

/// Creation input: the bytecode followed by the ABI-encoded constructor arguments.
pub fn encode_deploy_input(artifact: &ContractArtifact, args: &[DynSolValue]) -> Result<Bytes> {
    let encoded = match artifact.abi.constructor() {
        Some(constructor) => constructor
            .abi_encode_input(args)
            .map_err(|err| Error::Encoding(format!("constructor arguments: {err}")))?,
        None if args.is_empty() => Vec::new(),
        None => {
            return Err(Error::Encoding(format!(
                "abi declares no constructor but {} arguments were given",
                args.len()
            )));
        }
    };

    let mut input = Vec::with_capacity(artifact.bytecode.len() + encoded.len());
    input.extend_from_slice(&artifact.bytecode);
    input.extend_from_slice(&encoded);
    Ok(input.into())
}

/// Deploy `artifact` with `args` and wait until the creation is mined.
///
/// The returned handle always refers to a confirmed transaction that left
/// code at the contract address.
pub async fn deploy<C: ChainClient>(
    client: &C,
    identity: &Identity,
    artifact: &ContractArtifact,
    args: &[DynSolValue],
    policy: &ConfirmPolicy,
    cancel: &Cancellation,
) -> Result<DeployedToken> {
    let input = encode_deploy_input(artifact, args)?;
    info!(deployer = %identity.address(), input_len = input.len(), "deploying token contract");

    let request = TransactionRequest::default().with_deploy_code(input);
    let (nonce, inclusion) =
        submit_and_confirm(client, identity, request, Stage::Deployment, policy, cancel).await?;

    // nodes may leave `contractAddress` out of the receipt; creation
    // addresses only depend on sender and nonce
    let address = inclusion
        .contract_address
        .unwrap_or_else(|| identity.address().create(nonce));

    let code = client.code_at(address).await.map_err(Error::Deployment)?;
    if code.is_empty() {
        return Err(Error::Deployment(ChainFailure::NoCode(address)));
    }

    info!(tx_hash = %inclusion.tx_hash, gas_used = inclusion.gas_used, "deployed token at {address:#x}");
    Ok(DeployedToken {
        address,
        abi: Arc::new(artifact.abi.clone()),
        deployment: inclusion,
    })
}

/// Deploy the token described by `spec`, binding it to the ABI constructor.
pub async fn deploy_token<C: ChainClient>(
    client: &C,
    identity: &Identity,
    artifact: &ContractArtifact,
    spec: &TokenSpec,
    policy: &ConfirmPolicy,
    cancel: &Cancellation,
) -> Result<DeployedToken> {
    let constructor = artifact
        .abi
        .constructor()
        .ok_or_else(|| Error::Encoding("abi declares no constructor".to_string()))?;
    let args = spec.constructor_args(constructor)?;
    info!(
        name = %spec.name,
        symbol = %spec.symbol,
        decimals = spec.decimals,
        total_supply = %spec.total_supply,
        "token parameters"
    );
    deploy(client, identity, artifact, &args, policy, cancel).await
}
