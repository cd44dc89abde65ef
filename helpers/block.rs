//! Confirmation barrier
//!
//! [`wait_for_block`] polls the chain oracle until the chain has moved strictly
//! past a target height. Callers use it to order a state-mutating call before
//! a dependent read. The wait is bounded by an optional deadline and can be
//! cancelled through a `watch` channel.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{HarnessError, Result};
use crate::provider::ChainOracle;
use crate::types::BlockHeight;

/// Default delay between two height samples
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long and how often to poll
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` waits forever
    pub timeout: Option<Duration>,
    /// Sending `true` on the paired sender cancels the wait
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(Duration::from_secs(60)),
            cancel: None,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Outcome of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The chain reached `height`, which is strictly above `target`
    Confirmed { target: BlockHeight, height: BlockHeight },
    TimedOut {
        target: BlockHeight,
        last_seen: BlockHeight,
        waited: Duration,
    },
    Cancelled { target: BlockHeight },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed { .. })
    }

    /// Turn the non-confirmed outcomes into errors
    pub fn into_result(self) -> Result<BlockHeight> {
        match self {
            Confirmation::Confirmed { height, .. } => Ok(height),
            Confirmation::TimedOut {
                target,
                last_seen,
                waited,
            } => Err(HarnessError::ConfirmationTimeout {
                target,
                last_seen,
                waited_ms: waited.as_millis(),
            }),
            Confirmation::Cancelled { target } => Err(HarnessError::Cancelled { target }),
        }
    }
}

/// Wait until the chain height is strictly greater than `target`, or than the
/// height sampled on entry when `target` is `None`.
///
/// Oracle failures abort the wait and are returned as errors.
pub async fn wait_for_block(
    oracle: &dyn ChainOracle,
    target: Option<BlockHeight>,
    options: &WaitOptions,
) -> Result<Confirmation> {
    let started = Instant::now();
    let target = match target {
        Some(height) => height,
        None => oracle.current_height().await?,
    };
    let deadline = options.timeout.map(|timeout| started + timeout);
    let mut cancel = options.cancel.clone();

    loop {
        let height = oracle.current_height().await?;
        if height > target {
            debug!(%target, %height, "block confirmed");
            return Ok(Confirmation::Confirmed { target, height });
        }

        if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            debug!(%target, "wait for block cancelled");
            return Ok(Confirmation::Cancelled { target });
        }

        let now = Instant::now();
        let sleep_for = match deadline {
            Some(deadline) if now >= deadline => {
                let waited = now - started;
                warn!(%target, last_seen = %height, ?waited, "timed out waiting for block");
                return Ok(Confirmation::TimedOut {
                    target,
                    last_seen: height,
                    waited,
                });
            }
            Some(deadline) => options.poll_interval.min(deadline - now),
            None => options.poll_interval,
        };

        debug!(%target, %height, "block not yet confirmed, polling");
        let sender_gone = match cancel.as_mut() {
            Some(rx) => {
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => false,
                    changed = rx.changed() => changed.is_err(),
                }
            }
            None => {
                tokio::time::sleep(sleep_for).await;
                false
            }
        };
        // A dropped sender can never cancel; stop watching it so `changed()`
        // does not resolve immediately on every iteration.
        if sender_gone {
            cancel = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Height advances by one every `step` samples
    struct SteppingOracle {
        samples: AtomicUsize,
        step: usize,
        start: u64,
    }

    impl SteppingOracle {
        fn new(start: u64, step: usize) -> Self {
            Self {
                samples: AtomicUsize::new(0),
                step,
                start,
            }
        }
    }

    #[async_trait]
    impl ChainOracle for SteppingOracle {
        async fn current_height(&self) -> Result<BlockHeight> {
            let n = self.samples.fetch_add(1, Ordering::SeqCst);
            Ok(BlockHeight(self.start + (n / self.step) as u64))
        }
    }

    struct StalledOracle(AtomicU64);

    #[async_trait]
    impl ChainOracle for StalledOracle {
        async fn current_height(&self) -> Result<BlockHeight> {
            Ok(BlockHeight(self.0.load(Ordering::SeqCst)))
        }
    }

    struct OfflineOracle;

    #[async_trait]
    impl ChainOracle for OfflineOracle {
        async fn current_height(&self) -> Result<BlockHeight> {
            Err(HarnessError::ChainUnavailable("connection refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_past_height_sampled_on_entry() {
        let oracle = SteppingOracle::new(5, 3);
        let confirmation = wait_for_block(&oracle, None, &WaitOptions::default())
            .await
            .unwrap();
        match confirmation {
            Confirmation::Confirmed { target, height } => {
                assert_eq!(target, BlockHeight(5));
                assert!(height > target);
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_target_is_honoured() {
        let oracle = SteppingOracle::new(0, 1);
        let confirmation = wait_for_block(&oracle, Some(BlockHeight(10)), &WaitOptions::default())
            .await
            .unwrap();
        assert_eq!(
            confirmation,
            Confirmation::Confirmed {
                target: BlockHeight(10),
                height: BlockHeight(11)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn already_passed_target_returns_without_sleeping() {
        let oracle = StalledOracle(AtomicU64::new(20));
        let started = Instant::now();
        let confirmation = wait_for_block(&oracle, Some(BlockHeight(3)), &WaitOptions::default())
            .await
            .unwrap();
        assert!(confirmation.is_confirmed());
        assert_eq!(Instant::now(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_at_the_configured_interval() {
        let oracle = SteppingOracle::new(0, 4);
        let started = Instant::now();
        wait_for_block(&oracle, None, &WaitOptions::default())
            .await
            .unwrap();
        // entry sample plus three unsuccessful polls before the height moves
        assert_eq!(Instant::now() - started, DEFAULT_POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_chain_times_out() {
        let oracle = StalledOracle(AtomicU64::new(7));
        let options = WaitOptions::default().with_timeout(Some(Duration::from_millis(500)));
        let confirmation = wait_for_block(&oracle, None, &options).await.unwrap();
        match confirmation {
            Confirmation::TimedOut {
                target,
                last_seen,
                waited,
            } => {
                assert_eq!(target, BlockHeight(7));
                assert_eq!(last_seen, BlockHeight(7));
                assert_eq!(waited, Duration::from_millis(500));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(matches!(
            confirmation.into_result(),
            Err(HarnessError::ConfirmationTimeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let oracle = StalledOracle(AtomicU64::new(1));
        let (tx, rx) = watch::channel(false);
        let options = WaitOptions::default().with_timeout(None).with_cancel(rx);

        let handle = tokio::spawn(async move {
            wait_for_block(&oracle, None, &options).await
        });
        tokio::time::sleep(Duration::from_millis(120)).await;
        tx.send(true).unwrap();

        let confirmation = handle.await.unwrap().unwrap();
        assert_eq!(confirmation, Confirmation::Cancelled { target: BlockHeight(1) });
        assert!(matches!(
            confirmation.into_result(),
            Err(HarnessError::Cancelled { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_cancel_sender_keeps_waiting() {
        let oracle = SteppingOracle::new(0, 5);
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let options = WaitOptions::default().with_cancel(rx);
        let confirmation = wait_for_block(&oracle, None, &options).await.unwrap();
        assert!(confirmation.is_confirmed());
    }

    #[tokio::test]
    async fn oracle_failure_is_surfaced() {
        let err = wait_for_block(&OfflineOracle, None, &WaitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ChainUnavailable(_)));
    }
}
