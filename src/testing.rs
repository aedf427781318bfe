//! Scripted in-memory chain used by the unit tests.
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy::{
    consensus::{Transaction, TxEnvelope},
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, TxKind, U256},
    rpc::types::TransactionRequest,
    transports::TransportErrorKind,
};

use crate::{
    artifact::tests::erc20,
    error::ChainFailure,
    provider::{ChainClient, Inclusion},
    signer::tests::DEV_ADDRESS,
};

pub(crate) const CHAIN_ID: u64 = 31337;

/// How the chain treats a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Mined,
    Reverted,
    NeverMined,
    SubmitFails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Create,
    Transfer(Address),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Submitted(Target),
    Mined(Target),
}

struct Pending {
    target: Target,
    from: Address,
    nonce: u64,
    amount: U256,
    behavior: Behavior,
}

struct State {
    default: Behavior,
    deploy: Behavior,
    per_recipient: HashMap<Address, Behavior>,
    receipt_has_address: bool,
    deploys_code: bool,
    fail_reads: bool,
    nonce: u64,
    supply: U256,
    balances: HashMap<Address, U256>,
    contracts: HashSet<Address>,
    pending: HashMap<TxHash, Pending>,
    events: Vec<Event>,
}

pub(crate) struct MockChain {
    abi: JsonAbi,
    state: Mutex<State>,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        Self {
            abi: erc20().abi,
            state: Mutex::new(State {
                default: Behavior::Mined,
                deploy: Behavior::Mined,
                per_recipient: HashMap::new(),
                receipt_has_address: true,
                deploys_code: true,
                fail_reads: false,
                nonce: 0,
                supply: U256::ZERO,
                balances: HashMap::new(),
                contracts: HashSet::new(),
                pending: HashMap::new(),
                events: Vec::new(),
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// Tokens minted to the deployer when a contract creation is mined.
    pub(crate) fn set_supply(&self, supply: U256) {
        self.with(|s| s.supply = supply);
    }

    pub(crate) fn set_default(&self, behavior: Behavior) {
        self.with(|s| s.default = behavior);
    }

    pub(crate) fn set_deploy(&self, behavior: Behavior) {
        self.with(|s| s.deploy = behavior);
    }

    pub(crate) fn set_recipient(&self, recipient: Address, behavior: Behavior) {
        self.with(|s| s.per_recipient.insert(recipient, behavior));
    }

    pub(crate) fn omit_receipt_address(&self) {
        self.with(|s| s.receipt_has_address = false);
    }

    pub(crate) fn deploy_without_code(&self) {
        self.with(|s| s.deploys_code = false);
    }

    pub(crate) fn fail_reads(&self) {
        self.with(|s| s.fail_reads = true);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.with(|s| s.events.clone())
    }

    pub(crate) fn balance(&self, owner: Address) -> U256 {
        self.with(|s| s.balances.get(&owner).copied().unwrap_or_default())
    }

    fn rpc_error(msg: &'static str) -> ChainFailure {
        ChainFailure::Rpc(TransportErrorKind::custom_str(msg))
    }

    fn output(value: DynSolValue) -> Bytes {
        DynSolValue::Tuple(vec![value]).abi_encode_params().into()
    }
}

fn decode_transfer(input: &[u8]) -> Option<(Address, U256)> {
    (input.len() >= 68 && input[..4] == [0xa9, 0x05, 0x9c, 0xbb])
        .then(|| (Address::from_slice(&input[16..36]), U256::from_be_slice(&input[36..68])))
}

impl ChainClient for MockChain {
    fn chain_id(&self) -> u64 {
        CHAIN_ID
    }

    async fn prepare(&self, request: TransactionRequest) -> Result<TransactionRequest, ChainFailure> {
        let nonce = self.with(|s| s.nonce);
        Ok(request
            .with_nonce(nonce)
            .with_chain_id(CHAIN_ID)
            .with_gas_limit(1_000_000)
            .with_max_fee_per_gas(2_000_000_000)
            .with_max_priority_fee_per_gas(1_000_000_000))
    }

    async fn submit(&self, tx: TxEnvelope) -> Result<TxHash, ChainFailure> {
        let (target, amount) = match tx.kind() {
            TxKind::Create => (Target::Create, U256::ZERO),
            TxKind::Call(_) => {
                let (recipient, amount) =
                    decode_transfer(tx.input()).ok_or_else(|| Self::rpc_error("unexpected call"))?;
                (Target::Transfer(recipient), amount)
            }
        };

        self.with(|s| {
            s.events.push(Event::Submitted(target));
            let behavior = match target {
                Target::Create => s.deploy,
                Target::Transfer(recipient) => {
                    s.per_recipient.get(&recipient).copied().unwrap_or(s.default)
                }
            };
            if behavior == Behavior::SubmitFails {
                return Err(Self::rpc_error("insufficient funds for gas"));
            }
            if tx.nonce() != s.nonce {
                return Err(Self::rpc_error("nonce too low"));
            }
            s.nonce += 1;

            let tx_hash = *tx.tx_hash();
            s.pending.insert(
                tx_hash,
                Pending {
                    target,
                    from: DEV_ADDRESS,
                    nonce: tx.nonce(),
                    amount,
                    behavior,
                },
            );
            Ok(tx_hash)
        })
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<Inclusion, ChainFailure> {
        let outcome = self.with(|s| {
            let pending = s.pending.remove(&tx_hash)?;
            if pending.behavior == Behavior::NeverMined {
                return None;
            }
            let success = pending.behavior == Behavior::Mined;
            let mut contract_address = None;
            if success {
                s.events.push(Event::Mined(pending.target));
                match pending.target {
                    Target::Create => {
                        let address = pending.from.create(pending.nonce);
                        if s.deploys_code {
                            s.contracts.insert(address);
                        }
                        s.balances.insert(pending.from, s.supply);
                        if s.receipt_has_address {
                            contract_address = Some(address);
                        }
                    }
                    Target::Transfer(recipient) => {
                        let from = s.balances.entry(pending.from).or_default();
                        *from = from.saturating_sub(pending.amount);
                        *s.balances.entry(recipient).or_default() += pending.amount;
                    }
                }
            }
            Some(Inclusion {
                tx_hash,
                block_number: Some(pending.nonce + 1),
                gas_used: 21_000,
                success,
                contract_address,
            })
        });

        match outcome {
            Some(inclusion) => Ok(inclusion),
            None => std::future::pending().await,
        }
    }

    async fn read(&self, request: TransactionRequest) -> Result<Bytes, ChainFailure> {
        let input = request.input.input().cloned().unwrap_or_default();
        let selector = input.get(..4).unwrap_or_default();
        let function = self
            .abi
            .functions()
            .find(|f| f.selector().as_slice() == selector)
            .ok_or_else(|| Self::rpc_error("execution reverted"))?;

        self.with(|s| {
            if s.fail_reads {
                return Err(Self::rpc_error("header not found"));
            }
            let value = match function.name.as_str() {
                "balanceOf" => {
                    let owner = Address::from_slice(&input[16..36]);
                    DynSolValue::Uint(s.balances.get(&owner).copied().unwrap_or_default(), 256)
                }
                "totalSupply" => DynSolValue::Uint(s.supply, 256),
                "decimals" => DynSolValue::Uint(U256::from(18), 8),
                "name" => DynSolValue::String("Test".into()),
                "symbol" => DynSolValue::String("TST".into()),
                _ => return Err(Self::rpc_error("execution reverted")),
            };
            Ok(Self::output(value))
        })
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainFailure> {
        Ok(self.with(|s| {
            if s.contracts.contains(&address) {
                erc20().bytecode
            } else {
                Bytes::new()
            }
        }))
    }
}
