//! Read and decrypt the deployed counter

use clap::Parser;
use helpers::AccountIndex;
use scripts::NetworkArgs;

#[derive(Parser)]
#[command(name = "get_count", about = "Get the counter value", long_about = None)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    /// Which account to read with [0, 9]
    #[arg(long)]
    account: AccountIndex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let setup = cli.network.setup().await?;

    let address = setup.env.counter_address().await?;
    let amount = setup.env.get_count(&address, cli.account).await?;
    println!("Current counter: {amount}");

    setup.finish().await?;
    Ok(())
}
