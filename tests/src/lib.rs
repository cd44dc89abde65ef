//! Fixtures shared by the integration tests

use std::sync::Arc;

use helpers::{
    setup_script, AccountIndex, Address, DevNetwork, Environment, HarnessConfig, ScriptSetup,
};

/// Account that deploys and administers the counter
pub const ADMIN: AccountIndex = AccountIndex(0);

/// A freshly deployed counter and the network it lives on
pub struct CounterFixture {
    pub env: Environment,
    pub devnet: Arc<DevNetwork>,
    pub address: Address,
}

/// Fast blocks and polling so tests do not sit idle
pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.network.block_time_ms = 20;
    config.confirmation.poll_interval_ms = 5;
    config.confirmation.timeout_ms = Some(5_000);
    config
}

/// Fund the admin from the faucet if this is `localfhenix` and it has no balance
pub async fn get_tokens_from_faucet(env: &Environment) -> anyhow::Result<bool> {
    Ok(env.ensure_funded(ADMIN).await?)
}

/// Start a network, fund the admin, deploy a counter and wait for the
/// deployment block to pass
pub async fn deploy_counter_fixture(config: &HarnessConfig) -> anyhow::Result<CounterFixture> {
    let ScriptSetup { env, devnet } = setup_script(config).await?;

    get_tokens_from_faucet(&env).await?;

    let deployment = env.deploy_counter(ADMIN).await?;
    env.wait_for_block(None).await?;

    Ok(CounterFixture {
        env,
        devnet,
        address: deployment.address,
    })
}
