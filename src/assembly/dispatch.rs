//! Bounded fan-out of independent engine calls.
//!
//! Every per-seed, per-pair or per-probe request is independent and
//! read-only, so they run concurrently up to `max_concurrency`, each under
//! its own timeout. Results come back to the single caller task, indexed by
//! unit, and are merged there; no shared accumulator is touched while calls
//! are in flight.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::config::ExplorerConfig;
use crate::{Error, Result};

/// Concurrency and timeout for one fan-out.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DispatchLimits {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl DispatchLimits {
    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self {
            concurrency: config.max_concurrency.max(1),
            timeout: config.request_timeout(),
        }
    }
}

/// Run one engine call under a timeout. Expiry becomes `Error::Timeout`.
pub(crate) async fn call_with_timeout<T, Fut>(
    timeout: Duration,
    operation: &'static str,
    call: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::Timeout { operation: operation.into(), after: timeout }),
    }
}

/// Run `call` for every unit with bounded concurrency.
///
/// The returned outcomes are in unit order, regardless of completion order.
pub(crate) async fn dispatch_bounded<I, T, F, Fut>(
    units: Vec<I>,
    limits: DispatchLimits,
    operation: &'static str,
    call: F,
) -> Vec<Result<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut outcomes: Vec<(usize, Result<T>)> = stream::iter(units.into_iter().enumerate())
        .map(|(idx, unit)| {
            let pending = call_with_timeout(limits.timeout, operation, call(unit));
            async move { (idx, pending.await) }
        })
        .buffer_unordered(limits.concurrency)
        .collect()
        .await;

    outcomes.sort_by_key(|(idx, _)| *idx);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Success/failure bookkeeping for a multi-request operation.
///
/// The operation fails outright only when every attempted unit failed.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    attempted: usize,
    succeeded: usize,
    last_error: Option<Error>,
}

impl Tally {
    pub fn success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn failure(&mut self, err: Error) {
        self.attempted += 1;
        self.last_error = Some(err);
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn finish(self) -> Result<()> {
        match self.last_error {
            Some(last) if self.succeeded == 0 => Err(Error::AllRequestsFailed {
                attempted: self.attempted,
                last: Box::new(last),
            }),
            _ => Ok(()),
        }
    }
}
