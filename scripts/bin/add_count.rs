//! Add an encrypted amount to the deployed counter

use clap::Parser;
use helpers::{AccountIndex, Plaintext};
use scripts::NetworkArgs;

#[derive(Parser)]
#[command(name = "add_count", about = "Add amount to the counter", long_about = None)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    /// Amount to add to the counter (plaintext number)
    #[arg(long)]
    amount: u64,

    /// Which account to sign with [0, 9]
    #[arg(long)]
    account: AccountIndex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let setup = cli.network.setup().await?;

    let address = setup.env.counter_address().await?;
    let signer = setup.env.account(cli.account).await?;
    println!("contract at: {address}, for signer: {}", signer.address);

    setup
        .env
        .add_count(&address, cli.account, Plaintext(cli.amount))
        .await?;
    println!("Added {} to counter!", cli.amount);

    setup.finish().await?;
    Ok(())
}
