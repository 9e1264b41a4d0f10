//! Bounded-concurrency execution of verification tasks
//!
//! Tasks run in fixed-size batches: everything in a batch runs concurrently,
//! and the next batch starts only once every task of the current one has
//! settled. A failing, timed-out or panicking task is recorded and its
//! siblings carry on.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, error};

use crate::error::VerifyError;

/// A task that did not produce a value.
#[derive(Debug)]
pub struct TaskFailure {
    /// Position of the task's item in the input
    pub index: usize,
    pub error: VerifyError,
}

/// Settled results of a chunked run.
#[derive(Debug)]
pub struct ChunkOutcome<T> {
    /// Successful results with their input positions, in input order
    pub successes: Vec<(usize, T)>,
    pub failures: Vec<TaskFailure>,
    pub batches: usize,
}

impl<T> ChunkOutcome<T> {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Run `task` over every item in batches of `chunk_size`.
///
/// Each task is bounded by `timeout`; `label` names the items in logs and
/// timeout errors. This never fails as a whole.
pub async fn run_chunked<'a, I, T, F, Fut>(
    label: &str,
    items: &'a [I],
    chunk_size: usize,
    timeout: Duration,
    task: F,
) -> ChunkOutcome<T>
where
    F: Fn(usize, &'a I) -> Fut,
    Fut: Future<Output = Result<T, VerifyError>>,
{
    let chunk_size = chunk_size.max(1);
    let total_batches = items.len().div_ceil(chunk_size);
    let mut outcome = ChunkOutcome {
        successes: Vec::with_capacity(items.len()),
        failures: Vec::new(),
        batches: 0,
    };

    for (batch, chunk) in items.chunks(chunk_size).enumerate() {
        let offset = batch * chunk_size;
        let settled = join_all(chunk.iter().enumerate().map(|(i, item)| {
            let index = offset + i;
            let fut = AssertUnwindSafe(task(index, item)).catch_unwind();
            async move { (index, tokio::time::timeout(timeout, fut).await) }
        }))
        .await;

        for (index, result) in settled {
            match result {
                Ok(Ok(Ok(value))) => outcome.successes.push((index, value)),
                Ok(Ok(Err(error))) => outcome.failures.push(TaskFailure { index, error }),
                Ok(Err(panic)) => outcome.failures.push(TaskFailure {
                    index,
                    error: VerifyError::Panicked {
                        index,
                        message: panic_message(panic.as_ref()),
                    },
                }),
                Err(_) => outcome.failures.push(TaskFailure {
                    index,
                    error: VerifyError::Timeout {
                        record: format!("{} #{}", label, index),
                        secs: timeout.as_secs(),
                    },
                }),
            }
        }
        outcome.batches += 1;
        debug!(label, batch = batch + 1, total_batches, "Batch settled");
    }

    for failure in &outcome.failures {
        error!(label, index = failure.index, error = %failure.error, "Verification task failed");
    }
    outcome
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
