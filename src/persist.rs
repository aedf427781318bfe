//! Durable run outputs: the deployed address file and the optional JSON report.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    error::{Error, Result},
    provision::ProvisionReport,
};

fn persistence_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// Mode of the file that is about to be replaced, or `0644` for a new one.
/// Temp files start out owner-only.
#[cfg(unix)]
fn target_permissions(path: &Path) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.permissions())
        .unwrap_or_else(|_| fs::Permissions::from_mode(0o644))
}

/// Replace the content of `path` with `contents` via a temp file and rename,
/// so readers never observe a partial write.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut file = NamedTempFile::new_in(&dir).map_err(persistence_error(path))?;
    #[cfg(unix)]
    file.as_file()
        .set_permissions(target_permissions(path))
        .map_err(persistence_error(path))?;
    file.write_all(contents).map_err(persistence_error(path))?;
    file.as_file().sync_all().map_err(persistence_error(path))?;
    file.persist(path)
        .map_err(|err| persistence_error(path)(err.error))?;
    Ok(())
}

/// Write the checksummed `0x` address, without trailing newline, to `path`.
pub fn persist_address(address: Address, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_atomic(path, address.to_checksum(None).as_bytes())?;
    info!(%address, path = %path.display(), "saved contract address");
    Ok(())
}

/// Write a machine-readable summary of the run to `path`.
pub fn write_report(report: &ProvisionReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let distribution = report.distribution.as_ref().map(|d| {
        json!({
            "amount": d.amount,
            "funded": d.funded,
            "failure": d.failure.as_ref().map(|f| json!({
                "index": f.index,
                "recipient": f.recipient,
                "error": f.error.to_string(),
                "inFlightTx": f.in_flight,
            })),
            "remaining": d.remaining,
            "resumable": d.resumable(),
            "balanceBefore": d.balance_before,
            "balanceAfter": d.balance_after,
        })
    });
    let value = json!({
        "chainId": report.chain_id,
        "deployer": report.deployer,
        "token": report.token_address,
        "deployment": report.deployment,
        "distribution": distribution,
    });

    let mut contents =
        serde_json::to_vec_pretty(&value).map_err(|err| persistence_error(path)(err.into()))?;
    contents.push(b'\n');
    write_atomic(path, &contents)?;
    info!(path = %path.display(), "saved run report");
    Ok(())
}
