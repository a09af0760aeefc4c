//! Sync-over-async execution bridge.
//!
//! # Responsibility
//! - Run async operations to completion for synchronous callers on a
//!   dedicated worker pool, independent of any scheduler the caller is on.
//! - Offload blocking work from async callers onto the same pool.
//! - Carry the caller's locale into the bridged execution.
//!
//! # Invariants
//! - `run` never polls the caller's scheduler, so a caller sitting on a
//!   single-threaded runtime cannot deadlock itself.
//! - `run` refuses to execute on a pool thread (`BridgeError::Reentrant`).
//! - The operation's own error is returned unchanged; a panic inside the
//!   operation is resumed on the caller with its original payload.
//! - Dropping the bridge never blocks.

use crate::config::BridgeConfig;
use crate::locale::{self, Locale};
use log::{debug, error, info};
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Instant;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinError;

thread_local! {
    static ON_BRIDGE_POOL: Cell<bool> = const { Cell::new(false) };
}

/// Bridge failures that are not the bridged operation's own error.
#[derive(Debug)]
pub enum BridgeError {
    /// Called from a thread that belongs to a bridge pool.
    Reentrant,
    /// Pool already shut down.
    ShutDown,
    /// Task was cancelled before completion.
    Cancelled,
    /// Worker pool could not be started.
    Runtime(std::io::Error),
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reentrant => write!(f, "bridge invoked from its own worker pool"),
            Self::ShutDown => write!(f, "bridge worker pool is shut down"),
            Self::Cancelled => write!(f, "bridged operation was cancelled"),
            Self::Runtime(err) => write!(f, "failed to start bridge worker pool: {err}"),
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Runtime(err) => Some(err),
            Self::Reentrant | Self::ShutDown | Self::Cancelled => None,
        }
    }
}

/// Dedicated worker pool for sync/async boundary crossings.
pub struct SyncAsyncBridge {
    runtime: Option<Runtime>,
    thread_name: String,
}

impl SyncAsyncBridge {
    /// Starts the worker pool described by `config`.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .on_thread_start(|| ON_BRIDGE_POOL.with(|flag| flag.set(true)))
            .enable_all()
            .build()
            .map_err(|err| {
                error!(
                    "event=bridge_start module=bridge status=error error_code=runtime_build_failed error={err}"
                );
                BridgeError::Runtime(err)
            })?;

        info!(
            "event=bridge_start module=bridge status=ok workers={} thread_name={}",
            config.worker_threads, config.thread_name
        );
        Ok(Self {
            runtime: Some(runtime),
            thread_name: config.thread_name.clone(),
        })
    }

    /// Whether the current thread belongs to a bridge pool.
    pub fn on_pool_thread() -> bool {
        ON_BRIDGE_POOL.with(Cell::get)
    }

    /// Runs `operation` on the pool and blocks the calling thread until it
    /// completes.
    ///
    /// # Errors
    /// - Returns the operation's own error unchanged.
    /// - Returns `BridgeError` (converted into `E`) when called from a pool
    ///   thread, after shutdown, or when the task is cancelled.
    ///
    /// # Panics
    /// Resumes a panic raised inside `operation`.
    pub fn run<Fut, T, E>(&self, operation: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        if Self::on_pool_thread() {
            error!(
                "event=bridge_run module=bridge status=error error_code=reentrant pool={}",
                self.thread_name
            );
            return Err(BridgeError::Reentrant.into());
        }
        let runtime = self.runtime.as_ref().ok_or(BridgeError::ShutDown)?;

        let started_at = Instant::now();
        let caller_locale = Locale::current();
        let handle = runtime.spawn(locale::scope(caller_locale, operation));
        let joined = futures::executor::block_on(handle);
        debug!(
            "event=bridge_run module=bridge status=done duration_ms={}",
            started_at.elapsed().as_millis()
        );

        match joined {
            Ok(result) => result,
            Err(err) => Err(unwind_or_cancel(err).into()),
        }
    }

    /// Runs blocking `work` on the pool's blocking threads and awaits it.
    ///
    /// The caller's locale is applied as the worker thread's locale.
    pub async fn offload<F, T>(&self, work: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let runtime = self.runtime.as_ref().ok_or(BridgeError::ShutDown)?;
        let caller_locale = Locale::current();
        let handle = runtime.spawn_blocking(move || locale::with_thread_locale(caller_locale, work));
        handle.await.map_err(unwind_or_cancel)
    }
}

impl Drop for SyncAsyncBridge {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            info!(
                "event=bridge_stop module=bridge status=ok thread_name={}",
                self.thread_name
            );
        }
    }
}

fn unwind_or_cancel(err: JoinError) -> BridgeError {
    if err.is_panic() {
        std::panic::resume_unwind(err.into_panic());
    }
    BridgeError::Cancelled
}

#[cfg(test)]
mod tests {
    use super::{BridgeError, SyncAsyncBridge};
    use crate::config::BridgeConfig;

    #[test]
    fn caller_thread_is_not_a_pool_thread() {
        let _bridge = SyncAsyncBridge::new(&BridgeConfig::default()).unwrap();
        assert!(!SyncAsyncBridge::on_pool_thread());
    }

    #[test]
    fn run_returns_operation_value() {
        let bridge = SyncAsyncBridge::new(&BridgeConfig::default()).unwrap();
        let value: Result<u32, BridgeError> = bridge.run(async { Ok(7) });
        assert_eq!(value.unwrap(), 7);
    }
}
