//! Compiled contract inputs: the JSON ABI and the creation bytecode.
use std::{fs, path::Path};

use alloy::{hex, json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// ABI plus creation bytecode, as produced by an external compiler.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

/// Hardhat and Foundry artifacts store bytecode either as a string or under `object`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Object { object: String },
}

#[derive(Deserialize)]
struct CompilerOutput {
    abi: JsonAbi,
    bytecode: BytecodeField,
}

impl ContractArtifact {
    /// Read a JSON ABI file and a hex bytecode file.
    pub fn load(abi_path: impl AsRef<Path>, bytecode_path: impl AsRef<Path>) -> Result<Self> {
        let (abi_path, bytecode_path) = (abi_path.as_ref(), bytecode_path.as_ref());

        let abi_json = fs::read_to_string(abi_path).map_err(|err| Error::artifact(abi_path, err))?;
        let abi: JsonAbi =
            serde_json::from_str(&abi_json).map_err(|err| Error::artifact(abi_path, err))?;

        let code = fs::read_to_string(bytecode_path)
            .map_err(|err| Error::artifact(bytecode_path, err))?;
        let bytecode = decode_bytecode(&code).map_err(|reason| Error::artifact(bytecode_path, reason))?;

        debug!(
            abi = %abi_path.display(),
            bytecode = %bytecode_path.display(),
            code_len = bytecode.len(),
            "loaded contract artifact"
        );
        Ok(Self { abi, bytecode })
    }

    /// Read a single compiler output JSON carrying both `abi` and `bytecode`.
    pub fn from_compiler_output(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| Error::artifact(path, err))?;
        let output: CompilerOutput =
            serde_json::from_str(&json).map_err(|err| Error::artifact(path, err))?;
        let code = match output.bytecode {
            BytecodeField::Hex(code) | BytecodeField::Object { object: code } => code,
        };
        let bytecode = decode_bytecode(&code).map_err(|reason| Error::artifact(path, reason))?;
        Ok(Self {
            abi: output.abi,
            bytecode,
        })
    }
}

fn decode_bytecode(code: &str) -> Result<Bytes, String> {
    let bytes = hex::decode(code.trim()).map_err(|err| format!("invalid bytecode hex: {err}"))?;
    if bytes.is_empty() {
        return Err("bytecode is empty".to_string());
    }
    Ok(bytes.into())
}
