//! Bounded-concurrency fan-out with fail-fast aggregation.
//!
//! Every item becomes one chain spawned on a [`JoinSet`]. A [`Semaphore`]
//! caps how many chains are in flight. The first failure stops new chains
//! from starting; chains already running are either drained or aborted
//! depending on [`FanOutPolicy::abort_siblings_on_failure`]. Cancelling the
//! token aborts everything in flight.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PipelineError;
use crate::stage::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutPolicy {
    /// Maximum chains in flight at once.
    pub limit: usize,
    pub abort_siblings_on_failure: bool,
}

/// Run `chain` for every item and return how many chains succeeded.
pub async fn fan_out<T, F, Fut>(
    items: Vec<T>,
    policy: FanOutPolicy,
    cancel: &CancellationToken,
    mut chain: F,
) -> Result<usize, PipelineError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), StageError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(policy.limit.max(1)));
    let mut in_flight = JoinSet::new();
    let mut pending = items.into_iter().peekable();
    let mut completed = 0;
    let mut failure: Option<PipelineError> = None;

    while failure.is_none() && pending.peek().is_some() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => failure = Some(PipelineError::Cancelled),
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                record(joined, &mut completed, &mut failure);
            }
            permit = Arc::clone(&semaphore).acquire_owned() => {
                let Ok(permit) = permit else { break };
                if let Some(item) = pending.next() {
                    let task = chain(item);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        task.await
                    });
                }
            }
        }
    }

    let mut aborted = matches!(failure, Some(PipelineError::Cancelled))
        || (failure.is_some() && policy.abort_siblings_on_failure);
    if aborted {
        debug!(in_flight = in_flight.len(), "aborting in-flight chains");
        in_flight.abort_all();
    }

    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled(), if !aborted => {
                in_flight.abort_all();
                aborted = true;
                failure.get_or_insert(PipelineError::Cancelled);
                continue;
            }
            joined = in_flight.join_next() => joined,
        };
        match joined {
            Some(joined) => record(joined, &mut completed, &mut failure),
            None => break,
        }
        // Every chain may already be in flight when the first one fails.
        if failure.is_some() && policy.abort_siblings_on_failure && !aborted {
            debug!(in_flight = in_flight.len(), "aborting in-flight chains");
            in_flight.abort_all();
            aborted = true;
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(completed),
    }
}

fn record(
    joined: Result<Result<(), StageError>, JoinError>,
    completed: &mut usize,
    failure: &mut Option<PipelineError>,
) {
    match joined {
        Ok(Ok(())) => *completed += 1,
        Ok(Err(err)) => {
            if failure.is_some() {
                debug!(error = %err, "sibling chain also failed");
            } else {
                *failure = Some(err.into());
            }
        }
        Err(err) if err.is_cancelled() => {}
        Err(err) => {
            failure.get_or_insert(PipelineError::ChainPanicked(err.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn policy(limit: usize) -> FanOutPolicy {
        FanOutPolicy {
            limit,
            abort_siblings_on_failure: false,
        }
    }

    fn failure(index: usize) -> StageError {
        StageError::Rejected {
            stage: Stage::Generate,
            status: 500,
            message: format!("document {index}"),
        }
    }

    #[derive(Default)]
    struct Gauge {
        now: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl Gauge {
        async fn hold(&self, delay: Duration) {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.now.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn empty_input_succeeds_with_zero() {
        let token = CancellationToken::new();
        let done = fan_out(Vec::<usize>::new(), policy(4), &token, |_| async {
            Ok::<(), StageError>(())
        })
        .await
        .unwrap();
        assert_eq!(done, 0);
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let gauge = Arc::new(Gauge::default());
        let token = CancellationToken::new();

        let done = fan_out((0..24).collect(), policy(3), &token, |_: usize| {
            let gauge = Arc::clone(&gauge);
            async move {
                gauge.hold(Duration::from_millis(5)).await;
                Ok::<(), StageError>(())
            }
        })
        .await
        .unwrap();

        assert_eq!(done, 24);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {peak}");
        assert!(peak >= 2, "chains never overlapped");
    }

    #[tokio::test]
    async fn single_failure_fails_the_fan_out() {
        let token = CancellationToken::new();
        let result = fan_out((0..10).collect(), policy(4), &token, |i: usize| async move {
            if i == 3 { Err(failure(i)) } else { Ok(()) }
        })
        .await;

        match result {
            Err(PipelineError::Stage(StageError::Rejected { message, .. })) => {
                assert_eq!(message, "document 3");
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_stops_scheduling_new_chains() {
        let gauge = Arc::new(Gauge::default());
        let token = CancellationToken::new();

        let result = fan_out((0..50).collect(), policy(1), &token, |i: usize| {
            let gauge = Arc::clone(&gauge);
            async move {
                gauge.hold(Duration::from_millis(1)).await;
                if i == 2 { Err(failure(i)) } else { Ok(()) }
            }
        })
        .await;

        assert!(result.is_err());
        assert!(gauge.started.load(Ordering::SeqCst) < 50);
    }

    #[tokio::test]
    async fn in_flight_siblings_are_drained_by_default() {
        let gauge = Arc::new(Gauge::default());
        let token = CancellationToken::new();

        let result = fan_out((0..4).collect(), policy(4), &token, |i: usize| {
            let gauge = Arc::clone(&gauge);
            async move {
                if i == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    return Err(failure(i));
                }
                gauge.hold(Duration::from_millis(20)).await;
                Ok(())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn abort_policy_cancels_in_flight_siblings() {
        let gauge = Arc::new(Gauge::default());
        let token = CancellationToken::new();
        let abort = FanOutPolicy {
            limit: 4,
            abort_siblings_on_failure: true,
        };

        let result = fan_out((0..4).collect(), abort, &token, |i: usize| {
            let gauge = Arc::clone(&gauge);
            async move {
                if i == 3 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    return Err(failure(i));
                }
                gauge.hold(Duration::from_secs(10)).await;
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Stage(_))));
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abort_policy_applies_when_all_chains_start_at_once() {
        let gauge = Arc::new(Gauge::default());
        let token = CancellationToken::new();
        let abort = FanOutPolicy {
            limit: 10,
            abort_siblings_on_failure: true,
        };
        let started = tokio::time::Instant::now();

        let result = fan_out((0..3).collect(), abort, &token, |i: usize| {
            let gauge = Arc::clone(&gauge);
            async move {
                if i == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    return Err(failure(i));
                }
                gauge.hold(Duration::from_millis(500)).await;
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Stage(_))));
        assert_eq!(gauge.started.load(Ordering::SeqCst), 2);
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 0);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn cancellation_aborts_and_reports_cancelled() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            fan_out((0..8).collect(), policy(2), &token, |_: usize| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<(), StageError>(())
            }),
        )
        .await
        .expect("cancellation must not hang");

        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn panicking_chain_is_a_failure() {
        let token = CancellationToken::new();
        let result = fan_out((0..2).collect(), policy(2), &token, |i: usize| async move {
            if i == 1 {
                panic!("chain exploded");
            }
            Ok::<(), StageError>(())
        })
        .await;

        assert!(matches!(result, Err(PipelineError::ChainPanicked(_))));
    }
}
