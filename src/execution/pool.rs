use std::{
    any::Any,
    io,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicUsize, Ordering},
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{Result, SolverErr};

const NO_FAILURE: usize = usize::MAX;

/// A fixed set of long-lived worker threads that evaluate independent jobs and hand
/// their results back in submission order.
///
/// Workers never observe the solver's stop signal: interruption is decided by the
/// orchestrator between steps, which then terminates the whole pool. A failed job
/// terminates the pool as well, so a `WorkerPool` is single-use after any failure.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
    threads: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Creates a new `WorkerPool`.
    ///
    /// # Arguments
    /// * `size` - The amount of worker threads.
    ///
    /// # Returns
    /// An io error if the threads couldn't be spawned.
    pub fn new(size: NonZeroUsize) -> Result<Self> {
        let mut threads = Vec::with_capacity(size.get());

        let pool = ThreadPoolBuilder::new()
            .num_threads(size.get())
            .spawn_handler(|worker| {
                let handle = thread::Builder::new()
                    .name(format!("solver-worker-{}", worker.index()))
                    .spawn(move || worker.run())?;

                threads.push(handle);
                Ok(())
            })
            .build()
            .map_err(io::Error::other)?;

        debug!(workers = size.get(); "worker pool started");

        Ok(Self {
            pool: Some(pool),
            threads,
            size: size.get(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the pool can still take jobs.
    pub fn is_alive(&self) -> bool {
        self.pool.is_some()
    }

    /// Runs `f` over every job in parallel and blocks until all of them are done.
    ///
    /// If any job fails or panics, jobs that haven't started yet are skipped, the pool
    /// is terminated and the first failure is returned. Partial results are discarded.
    ///
    /// # Arguments
    /// * `jobs` - The inputs, one per job.
    /// * `f` - The evaluation to run for each input, it may only read shared state.
    ///
    /// # Returns
    /// The results in the same order as `jobs`.
    pub fn run<J, T, F>(&mut self, jobs: Vec<J>, f: F) -> Result<Vec<T>>
    where
        J: Send,
        T: Send,
        F: Fn(J) -> Result<T> + Sync,
    {
        let pool = self.pool.as_ref().ok_or(SolverErr::PoolTerminated)?;

        let first_failure = AtomicUsize::new(NO_FAILURE);
        let mut slots: Vec<Option<Result<T>>> = jobs.iter().map(|_| None).collect();

        pool.scope(|s| {
            for (shard, (job, slot)) in jobs.into_iter().zip(slots.iter_mut()).enumerate() {
                let f = &f;
                let first_failure = &first_failure;

                s.spawn(move |_| {
                    if first_failure.load(Ordering::Acquire) != NO_FAILURE {
                        return;
                    }

                    let result = match panic::catch_unwind(AssertUnwindSafe(|| f(job))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(SolverErr::Worker {
                            shard,
                            source: Box::new(e),
                        }),
                        Err(payload) => Err(SolverErr::WorkerPanicked {
                            shard,
                            detail: panic_detail(payload.as_ref()),
                        }),
                    };

                    if result.is_err() {
                        let _ = first_failure.compare_exchange(
                            NO_FAILURE,
                            shard,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                    }

                    *slot = Some(result);
                });
            }
        });

        let failed = first_failure.into_inner();
        if failed != NO_FAILURE {
            let err = match slots.get_mut(failed).and_then(Option::take) {
                Some(Err(e)) => e,
                _ => SolverErr::PoolTerminated,
            };

            warn!(shard = failed; "worker job failed, terminating pool: {err}");
            self.terminate();
            return Err(err);
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(SolverErr::PoolTerminated)))
            .collect()
    }

    /// Stops every worker thread and joins it. Further calls to `run` fail with
    /// `PoolTerminated`.
    pub fn terminate(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };

        // Dropping the pool only signals its threads to exit.
        drop(pool);

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("a worker thread panicked while shutting down");
            }
        }

        debug!(workers = self.size; "worker pool terminated");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
