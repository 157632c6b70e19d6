use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use counter_client::{client::DEFAULT_PROGRAM_ID, ClientConfig};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, help = "Base58 private key of the paying wallet")]
    pub private_key: Option<String>,
    #[arg(long, help = "Path to a keypair file for the paying wallet")]
    pub keypair: Option<String>,
    #[arg(long, help = "Solana cluster URL")]
    pub cluster: Option<String>,
    #[arg(long, help = "Address of the counter program")]
    pub program_id: Option<String>,
    #[arg(long, help = "Commitment to wait for: processed, confirmed or finalized")]
    pub commitment: Option<String>,
    #[arg(long, help = "Seconds to wait for a transaction to be confirmed")]
    pub timeout_secs: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the wallet address and its balance
    Balance,
    /// Create a fresh counter account and increment it once
    Run,
    /// Increment an existing counter account
    Increment { address: String },
    /// Decode and print a counter account
    Show { address: String },
}

pub fn get_solana_cluster(cli_cluster: Option<String>) -> String {
    std::env::var("SOLANA_CLUSTER")
        .ok()
        .or(cli_cluster)
        .unwrap_or_else(|| "https://api.devnet.solana.com".to_string())
}

pub fn get_program_id(cli_program_id: Option<String>) -> anyhow::Result<Pubkey> {
    match std::env::var("COUNTER_PROGRAM_ID").ok().or(cli_program_id) {
        Some(program_id) => parse_pubkey(&program_id),
        None => Ok(DEFAULT_PROGRAM_ID),
    }
}

pub fn get_commitment(cli_commitment: Option<String>) -> anyhow::Result<CommitmentConfig> {
    let commitment = std::env::var("COUNTER_COMMITMENT")
        .ok()
        .or(cli_commitment)
        .unwrap_or_else(|| "confirmed".to_string());
    parse_commitment(&commitment)
}

pub fn get_confirm_timeout(cli_timeout: Option<u64>) -> anyhow::Result<Duration> {
    let secs = match std::env::var("COUNTER_CONFIRM_TIMEOUT_SECS").ok() {
        Some(secs) => secs
            .parse()
            .with_context(|| format!("invalid COUNTER_CONFIRM_TIMEOUT_SECS {secs:?}"))?,
        None => cli_timeout.unwrap_or(60),
    };
    Ok(Duration::from_secs(secs))
}

/// Loads the paying wallet, falling back to a throwaway keypair.
pub fn get_payer(cli_key: Option<String>, cli_keypair: Option<String>) -> anyhow::Result<Keypair> {
    if let Some(path) = std::env::var("COUNTER_KEYPAIR").ok().or(cli_keypair) {
        return read_keypair_file(&path)
            .map_err(|err| anyhow!("failed to read keypair file {path}: {err}"));
    }
    let private_key = std::env::var("COUNTER_PRIVATE_KEY")
        .ok()
        .or(cli_key)
        .unwrap_or(Keypair::new().to_base58_string());
    // from_base58_string panics on bad input, so validate the length first
    let bytes = bs58_len(&private_key)?;
    if bytes != 64 {
        bail!("private key must decode to 64 bytes, got {bytes}");
    }
    Ok(Keypair::from_base58_string(&private_key))
}

pub fn client_config(args: &Args) -> anyhow::Result<ClientConfig> {
    Ok(ClientConfig {
        program_id: get_program_id(args.program_id.clone())?,
        commitment: get_commitment(args.commitment.clone())?,
        confirm_timeout: get_confirm_timeout(args.timeout_secs)?,
        ..ClientConfig::default()
    })
}

pub fn parse_pubkey(address: &str) -> anyhow::Result<Pubkey> {
    Pubkey::from_str(address).with_context(|| format!("invalid address {address:?}"))
}

pub fn parse_commitment(commitment: &str) -> anyhow::Result<CommitmentConfig> {
    match commitment.trim().to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => bail!("unknown commitment level {other:?}"),
    }
}

fn bs58_len(encoded: &str) -> anyhow::Result<usize> {
    bs58::decode(encoded)
        .into_vec()
        .map(|bytes| bytes.len())
        .context("private key is not valid base58")
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;

    #[test]
    fn commitment_levels() {
        assert_eq!(parse_commitment("processed").unwrap(), CommitmentConfig::processed());
        assert_eq!(parse_commitment(" Confirmed ").unwrap(), CommitmentConfig::confirmed());
        assert_eq!(parse_commitment("finalized").unwrap(), CommitmentConfig::finalized());
        assert!(parse_commitment("recent-ish").is_err());
    }

    #[test]
    fn private_key_round_trip() {
        let keypair = Keypair::new();
        let payer = get_payer(Some(keypair.to_base58_string()), None).unwrap();
        assert_eq!(payer.pubkey(), keypair.pubkey());
    }

    #[test]
    fn rejects_bad_private_keys() {
        assert!(get_payer(Some("not-base58-0OIl".to_string()), None).is_err());
        assert!(get_payer(Some("3yZe7d".to_string()), None).is_err());
    }

    #[test]
    fn rejects_bad_program_id() {
        assert!(parse_pubkey("counter").is_err());
        assert_eq!(
            parse_pubkey("3wGUG3qnLtCZFg3ukqeQXNhVYjrr3Jai4RnzEDyqjphc").unwrap(),
            DEFAULT_PROGRAM_ID
        );
    }
}
