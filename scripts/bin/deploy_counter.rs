//! Deploy a fresh Counter contract from the deployer account

use clap::Parser;
use helpers::AccountIndex;
use scripts::NetworkArgs;

#[derive(Parser)]
#[command(name = "deploy_counter", about = "Deploy the confidential counter", long_about = None)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    /// Deployer account index
    #[arg(long, default_value = "0")]
    from: AccountIndex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let setup = cli.network.setup().await?;

    setup.env.ensure_funded(cli.from).await?;
    let counter = setup.env.deploy_counter(cli.from).await?;
    println!("Counter contract: {}", counter.address);

    setup.finish().await?;
    Ok(())
}
