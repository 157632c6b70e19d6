mod args;

use clap::Parser;
use counter_client::CounterClient;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL,
    signature::{Keypair, Signer},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::args::{client_config, get_payer, get_solana_cluster, parse_pubkey, Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = client_config(&args)?;
    let cluster_url = get_solana_cluster(args.cluster.clone());
    let payer = get_payer(args.private_key.clone(), args.keypair.clone())?;
    info!(wallet_pubkey = %payer.pubkey(), cluster = %cluster_url, "Identity initialized");

    let rpc = RpcClient::new_with_commitment(cluster_url, config.commitment);
    let client = CounterClient::new(rpc, config);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let result = match args.command {
        Command::Balance => client.balance(&payer.pubkey()).await.map(|lamports| {
            println!("My address: {}", payer.pubkey());
            println!("My balance: {} SOL", lamports as f64 / LAMPORTS_PER_SOL as f64);
        }),
        Command::Run => {
            let counter = Keypair::new();
            info!(counter = %counter.pubkey(), "Generated counter identity");
            client
                .create_and_increment(&payer, &counter, &cancel)
                .await
                .map(|count| println!("Counter {} is at {}", counter.pubkey(), count))
        }
        Command::Increment { address } => {
            let counter = parse_pubkey(&address)?;
            client
                .increment(&payer, &counter, &cancel)
                .await
                .map(|count| println!("Counter {} is at {}", counter, count))
        }
        Command::Show { address } => {
            let counter = parse_pubkey(&address)?;
            client
                .fetch_counter(&counter)
                .await
                .map(|count| println!("Counter {} is at {}", counter, count))
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Counter workflow failed");
    }
    Ok(result?)
}
