//! Token parameters, constructor binding and the deployed token handle.
use std::sync::Arc;

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier},
    json_abi::{Constructor, Function, JsonAbi},
    primitives::{Address, Bytes, U256},
    rpc::types::TransactionRequest,
};

use crate::{
    error::{Error, Result},
    provider::{ChainClient, Inclusion},
};

/// Parameters handed to the token constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenField {
    Name,
    Symbol,
    Decimals,
    TotalSupply,
}

impl TokenField {
    /// Argument order of the reference token constructor.
    const POSITIONAL: [Self; 4] = [Self::TotalSupply, Self::Name, Self::Decimals, Self::Symbol];

    fn from_param(name: &str) -> Option<Self> {
        let name = name.replace('_', "").to_ascii_lowercase();
        if name.contains("symbol") {
            Some(Self::Symbol)
        } else if name.contains("decimal") {
            Some(Self::Decimals)
        } else if name.contains("supply") {
            Some(Self::TotalSupply)
        } else if name.contains("name") {
            Some(Self::Name)
        } else {
            None
        }
    }
}

impl TokenSpec {
    fn raw(&self, field: TokenField) -> String {
        match field {
            TokenField::Name => self.name.clone(),
            TokenField::Symbol => self.symbol.clone(),
            TokenField::Decimals => self.decimals.to_string(),
            TokenField::TotalSupply => self.total_supply.to_string(),
        }
    }

    /// Bind the spec to `constructor`'s inputs by parameter name, in declared
    /// order, coercing each value into the declared Solidity type.
    ///
    /// An ABI without parameter names is bound by position in the reference
    /// order `(totalSupply, name, decimals, symbol)`.
    pub fn constructor_args(&self, constructor: &Constructor) -> Result<Vec<DynSolValue>> {
        let unnamed = !constructor.inputs.is_empty()
            && constructor.inputs.iter().all(|param| param.name.is_empty());
        if unnamed && constructor.inputs.len() != TokenField::POSITIONAL.len() {
            return Err(Error::Encoding(format!(
                "constructor takes {} unnamed parameters, expected {}",
                constructor.inputs.len(),
                TokenField::POSITIONAL.len()
            )));
        }

        constructor
            .inputs
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let field = if unnamed {
                    Some(TokenField::POSITIONAL[i])
                } else {
                    TokenField::from_param(&param.name)
                };
                let field = field.ok_or_else(|| {
                    Error::Encoding(format!(
                        "unrecognized constructor parameter `{} {}`",
                        param.ty, param.name
                    ))
                })?;
                let ty = param.resolve().map_err(Error::encoding)?;
                coerce(&ty, &self.raw(field)).map_err(|err| {
                    Error::Encoding(format!("constructor parameter #{i} `{}`: {err}", param.name))
                })
            })
            .collect()
    }
}

fn coerce(ty: &DynSolType, raw: &str) -> Result<DynSolValue, String> {
    match ty {
        // take strings verbatim; the coercion parser would strip quotes and whitespace
        DynSolType::String => Ok(DynSolValue::String(raw.to_string())),
        _ => ty.coerce_str(raw).map_err(|err| err.to_string()),
    }
}

/// Per-recipient transfer amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAmount {
    pub units: U256,
    /// Whether `units` are whole tokens, to be multiplied by `10^decimals`.
    pub scaled: bool,
}

impl Default for TransferAmount {
    fn default() -> Self {
        Self {
            units: U256::from(1000),
            scaled: true,
        }
    }
}

impl TransferAmount {
    /// Amount in the token's smallest unit.
    pub fn resolve(&self, decimals: u8) -> Result<U256> {
        if !self.scaled {
            return Ok(self.units);
        }
        U256::from(10)
            .checked_pow(U256::from(decimals))
            .and_then(|scale| self.units.checked_mul(scale))
            .ok_or_else(|| {
                Error::Encoding(format!(
                    "transfer amount {} with {decimals} decimals overflows uint256",
                    self.units
                ))
            })
    }
}

/// A confirmed token contract. Immutable once the deployment is included.
#[derive(Debug, Clone)]
pub struct DeployedToken {
    pub address: Address,
    pub abi: Arc<JsonAbi>,
    pub deployment: Inclusion,
}

impl DeployedToken {
    fn function(&self, name: &str) -> Result<&Function> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| Error::Encoding(format!("abi has no `{name}` function")))
    }

    /// Calldata for `name(args..)`, selector included.
    pub fn encode_call(&self, name: &str, args: &[DynSolValue]) -> Result<Bytes> {
        let function = self.function(name)?;
        function
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|err| Error::Encoding(format!("{}: {err}", function.signature())))
    }

    pub fn transfer_call(&self, to: Address, amount: U256) -> Result<Bytes> {
        self.encode_call(
            "transfer",
            &[DynSolValue::Address(to), DynSolValue::Uint(amount, 256)],
        )
    }

    /// Run a view function through `eth_call` and decode its outputs.
    pub async fn read<C: ChainClient>(
        &self,
        client: &C,
        name: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>> {
        let input = self.encode_call(name, args)?;
        let request = TransactionRequest::default()
            .to(self.address)
            .input(input.into());
        let output = client.read(request).await.map_err(|source| Error::Read {
            call: name.to_string(),
            source,
        })?;
        self.function(name)?
            .abi_decode_output(&output)
            .map_err(|err| Error::Encoding(format!("decoding `{name}` output: {err}")))
    }

    pub async fn balance_of<C: ChainClient>(&self, client: &C, owner: Address) -> Result<U256> {
        let values = self
            .read(client, "balanceOf", &[DynSolValue::Address(owner)])
            .await?;
        values
            .first()
            .and_then(DynSolValue::as_uint)
            .map(|(balance, _)| balance)
            .ok_or_else(|| Error::Encoding("`balanceOf` did not return a uint".to_string()))
    }
}
