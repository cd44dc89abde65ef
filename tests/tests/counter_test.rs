use std::time::Duration;

use helpers::{
    config::HarnessConfig, devnet::FAUCET_AMOUNT, provider::AccountProvider,
    provider::ChainOracle, provider::EncryptionService, setup_script, AccountIndex, Confirmation,
    HarnessError, Plaintext, WaitOptions,
};
use tests::{deploy_counter_fixture, test_config, CounterFixture, ADMIN};
use tokio::sync::watch;

#[tokio::test]
async fn test_add_and_read_counter() -> anyhow::Result<()> {
    let CounterFixture {
        env,
        devnet,
        address,
    } = deploy_counter_fixture(&test_config()).await?;

    env.add_count(&address, ADMIN, Plaintext(10)).await?;
    assert_eq!(env.get_count(&address, ADMIN).await?, Plaintext(10));

    env.add_count(&address, ADMIN, Plaintext(5)).await?;
    assert_eq!(env.get_count(&address, ADMIN).await?, Plaintext(15));

    // the stored total was never sealed for a fresh session
    let stranger = devnet.create_session(&address).await?;
    let raw = devnet.raw_counter(&address)?;
    let err = stranger.decrypt(&address, &raw).unwrap_err();
    assert!(matches!(err, HarnessError::Decoding(_)));
    Ok(())
}

#[tokio::test]
async fn test_increments_from_several_accounts_add_up() -> anyhow::Result<()> {
    let CounterFixture { env, address, .. } = deploy_counter_fixture(&test_config()).await?;

    let start = env.get_count(&address, AccountIndex(3)).await?;
    let amounts = [(0, 4u64), (1, 9), (2, 1), (1, 100)];
    for (account, amount) in amounts {
        env.add_count(&address, AccountIndex(account), Plaintext(amount))
            .await?;
    }

    let expected = start.0 + amounts.iter().map(|(_, amount)| amount).sum::<u64>();
    assert_eq!(env.get_count(&address, AccountIndex(3)).await?, Plaintext(expected));
    Ok(())
}

#[tokio::test]
async fn test_ciphertext_from_one_session_is_useless_to_another() -> anyhow::Result<()> {
    let CounterFixture {
        devnet, address, ..
    } = deploy_counter_fixture(&test_config()).await?;

    let alice = devnet.create_session(&address).await?;
    let bob = devnet.create_session(&address).await?;
    let ciphertext = alice.encrypt(Plaintext(77))?;

    assert_eq!(alice.decrypt(&address, &ciphertext)?, Plaintext(77));
    assert!(matches!(
        bob.decrypt(&address, &ciphertext),
        Err(HarnessError::Decoding(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_barrier_waits_for_a_new_block() -> anyhow::Result<()> {
    let CounterFixture { env, devnet, .. } = deploy_counter_fixture(&test_config()).await?;

    let entry = devnet.current_height().await?;
    let confirmed = env.wait_for_block(None).await?;
    assert!(confirmed > entry);
    assert!(devnet.current_height().await? >= confirmed);
    Ok(())
}

#[tokio::test]
async fn test_localfhenix_admin_is_funded_from_faucet() -> anyhow::Result<()> {
    let mut config = HarnessConfig::localfhenix();
    config.network.block_time_ms = 20;
    config.confirmation.poll_interval_ms = 5;

    let CounterFixture {
        env,
        devnet,
        address,
    } = deploy_counter_fixture(&config).await?;
    let admin = env.account(ADMIN).await?;
    assert_eq!(devnet.balance(&admin.address).await?, FAUCET_AMOUNT);

    env.add_count(&address, ADMIN, Plaintext(2)).await?;
    assert_eq!(env.get_count(&address, ADMIN).await?, Plaintext(2));

    // account 1 was never funded on this network
    let err = env
        .add_count(&address, AccountIndex(1), Plaintext(2))
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::SubmissionRejected(_)));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_chain_aborts_workflows() -> anyhow::Result<()> {
    let CounterFixture {
        env,
        devnet,
        address,
    } = deploy_counter_fixture(&test_config()).await?;

    devnet.set_reachable(false);
    assert!(matches!(
        env.add_count(&address, ADMIN, Plaintext(1)).await,
        Err(HarnessError::ChainUnavailable(_))
    ));
    assert!(matches!(
        env.get_count(&address, ADMIN).await,
        Err(HarnessError::ChainUnavailable(_))
    ));

    devnet.set_reachable(true);
    assert_eq!(env.get_count(&address, ADMIN).await?, Plaintext(0));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_wait_reports_cancellation() -> anyhow::Result<()> {
    let CounterFixture { env, devnet, .. } = deploy_counter_fixture(&test_config()).await?;
    devnet.pause_mining();

    let (cancel, rx) = watch::channel(false);
    let env = env.with_wait_options(
        WaitOptions::default()
            .with_timeout(None)
            .with_cancel(rx),
    );

    let waiter = tokio::spawn(async move { env.confirm(None).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.send(true)?;

    let outcome = waiter.await??;
    assert!(matches!(outcome, Confirmation::Cancelled { .. }));
    Ok(())
}

#[tokio::test]
async fn test_separate_runs_share_persisted_chain() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config();
    config.network.data_dir = Some(dir.path().join("chain"));
    config.deployments.dir = Some(dir.path().join("deployments"));

    // deploy_counter
    let setup = setup_script(&config).await?;
    let deployed = setup.env.deploy_counter(ADMIN).await?;
    setup.finish().await?;

    // add_count --amount 10 --account 0
    let setup = setup_script(&config).await?;
    let address = setup.env.counter_address().await?;
    assert_eq!(address, deployed.address);
    setup.env.add_count(&address, ADMIN, Plaintext(10)).await?;
    setup.finish().await?;

    // get_count --account 4
    let setup = setup_script(&config).await?;
    let address = setup.env.counter_address().await?;
    assert_eq!(setup.env.get_count(&address, AccountIndex(4)).await?, Plaintext(10));
    setup.finish().await?;
    Ok(())
}
