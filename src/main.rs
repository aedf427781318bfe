use std::{path::PathBuf, process::ExitCode, time::Duration};

use alloy::primitives::{Address, U256};
use anyhow::Result;
use clap::Parser;
use token_provisioner::{
    ArtifactSource, PrivateKey, ProvisionConfig, ProvisionReport, TokenSpec, TransferAmount,
    cancellation, config::DEFAULT_OUTPUT_PATH, run,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Deploy an ERC-20 token and fund an initial list of holders.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// JSON-RPC endpoint of the chain, e.g. http://localhost:8545
    endpoint: String,

    /// Hex private key of the deploying account
    private_key: PrivateKey,

    name: String,

    symbol: String,

    decimals: u8,

    /// Total supply in the token's smallest unit
    total_supply: U256,

    /// Comma-separated recipient addresses, funded in this order
    #[clap(value_delimiter = ',')]
    recipients: Vec<Address>,

    /// JSON ABI of the token contract
    #[clap(long, default_value = "erc20.abi", conflicts_with = "artifact")]
    abi: PathBuf,

    /// Hex creation bytecode of the token contract
    #[clap(long = "bin", default_value = "erc20.bin", conflicts_with = "artifact")]
    bytecode: PathBuf,

    /// Compiler output JSON with both `abi` and `bytecode`
    #[clap(long)]
    artifact: Option<PathBuf>,

    /// File receiving the deployed contract address
    #[clap(long, default_value = DEFAULT_OUTPUT_PATH)]
    out: PathBuf,

    /// Also write a JSON summary of the run here
    #[clap(long)]
    report: Option<PathBuf>,

    /// Tokens sent to each recipient
    #[clap(long, default_value_t = U256::from(1000))]
    amount: U256,

    /// Take --amount in the smallest unit instead of whole tokens
    #[clap(long)]
    raw_amount: bool,

    /// Seconds to wait for each transaction to be mined
    #[clap(long, default_value_t = 120)]
    confirm_timeout: u64,
}

impl Cli {
    fn into_config(self) -> ProvisionConfig {
        let token = TokenSpec {
            name: self.name,
            symbol: self.symbol,
            decimals: self.decimals,
            total_supply: self.total_supply,
        };
        let mut config = ProvisionConfig::new(self.endpoint, self.private_key, token);
        config.recipients = self.recipients;
        config.amount = TransferAmount {
            units: self.amount,
            scaled: !self.raw_amount,
        };
        config.artifact = match self.artifact {
            Some(path) => ArtifactSource::CompilerOutput(path),
            None => ArtifactSource::Split {
                abi: self.abi,
                bytecode: self.bytecode,
            },
        };
        config.output_path = self.out;
        config.report_path = self.report;
        config.confirm.timeout = Duration::from_secs(self.confirm_timeout);
        config
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Log what a failed or partial run left behind so it can be resumed.
fn summarize(report: &ProvisionReport) -> bool {
    if let Some(err) = &report.report_error {
        error!(token = %report.token_address, %err, "run report missing, outcome below");
    }
    let Some(distribution) = &report.distribution else {
        return report.succeeded();
    };
    let Some(failure) = &distribution.failure else {
        info!(
            token = %report.token_address,
            funded = distribution.funded_count(),
            "all recipients funded"
        );
        return report.succeeded();
    };

    error!(
        token = %report.token_address,
        funded = distribution.funded_count(),
        failed_recipient = %failure.recipient,
        error = %failure.error,
        "distribution incomplete"
    );
    if let Some(tx_hash) = failure.in_flight {
        warn!(
            recipient = %failure.recipient,
            %tx_hash,
            "transfer may still be mined, check it before funding this recipient again"
        );
    }
    let resumable = distribution
        .resumable()
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",");
    warn!("resume with recipients: {resumable}");
    false
}

async fn run_cli(cli: Cli) -> Result<bool> {
    let config = cli.into_config();
    let (handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current wait");
            handle.cancel();
        }
    });

    let report = run(&config, &cancel).await?;
    info!(token = %report.token_address, path = %config.output_path.display(), "token deployed");
    Ok(summarize(&report))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("provisioning failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use clap::CommandFactory;

    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_positional_arguments() {
        let cli = Cli::try_parse_from([
            "token-provisioner",
            "http://localhost:8545",
            KEY,
            "Test",
            "TST",
            "18",
            "1000000",
            "0x00000000000000000000000000000000000000aa,0x00000000000000000000000000000000000000bb",
        ])
        .unwrap();
        let config = cli.into_config();

        assert_eq!(config.token.decimals, 18);
        assert_eq!(config.token.total_supply, U256::from(1_000_000));
        assert_eq!(config.recipients.len(), 2);
        assert_eq!(config.recipients[1], address!("0x00000000000000000000000000000000000000bb"));
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.amount, TransferAmount::default());
        assert_eq!(config.confirm.timeout, Duration::from_secs(120));
    }

    #[test]
    fn debug_output_hides_private_key() {
        let cli = Cli::try_parse_from([
            "token-provisioner",
            "http://localhost:8545",
            KEY,
            "Test",
            "TST",
            "18",
            "1",
        ])
        .unwrap();
        let shown = format!("{cli:?}");
        assert!(!shown.contains(&KEY[2..]));
        assert_eq!(cli.into_config().private_key.expose(), KEY);
    }

    #[test]
    fn recipients_are_optional() {
        let cli = Cli::try_parse_from([
            "token-provisioner",
            "http://localhost:8545",
            KEY,
            "Test",
            "TST",
            "0",
            "0",
            "--raw-amount",
            "--artifact",
            "Token.json",
        ])
        .unwrap();
        let config = cli.into_config();
        assert!(config.recipients.is_empty());
        assert!(!config.amount.scaled);
        assert_eq!(config.artifact, ArtifactSource::CompilerOutput("Token.json".into()));
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["token-provisioner", "http://localhost:8545", KEY]).is_err());
        assert!(
            Cli::try_parse_from([
                "token-provisioner",
                "http://localhost:8545",
                KEY,
                "Test",
                "TST",
                "eighteen",
                "1",
            ])
            .is_err()
        );
    }
}
