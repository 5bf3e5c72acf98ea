use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use webthings_drivers::{ReadError, SensorDriver};

use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

use tokio_util::sync::CancellationToken;

use tracing::{debug, error};

use crate::error::{Error, ErrorKind, Result};

/// The lifecycle state of a [`PollingScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not started yet.
    Idle,
    /// Polling its driver.
    Running,
    /// Cancelled. No further ticks fire.
    Cancelled,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Reads a [`SensorDriver`] at a fixed interval.
///
/// Each tick reads the driver on the `tokio` blocking pool and hands the
/// outcome to the `on_reading` or `on_error` callback before the next tick
/// is awaited, so reads of the same driver never overlap: a slow read delays
/// the following tick instead of doubling it up.
///
/// A failed read never stops the scheduler. Only [`cancel`](Self::cancel)
/// does, and a read still in flight at that moment is abandoned: its outcome
/// is dropped without invoking any callback.
#[derive(Debug)]
pub struct PollingScheduler {
    state: SchedulerState,
    cancellation_token: CancellationToken,
    // Held while a callback runs and while cancelling.
    callback_lock: Arc<Mutex<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingScheduler {
    /// Creates an idle [`PollingScheduler`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            cancellation_token: CancellationToken::new(),
            callback_lock: Arc::new(Mutex::new(())),
            handle: None,
        }
    }

    /// Returns the current [`SchedulerState`].
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Starts polling `driver` every `interval`.
    ///
    /// The first read happens one `interval` after this call.
    ///
    /// # Errors
    ///
    /// An error is returned if:
    /// - The scheduler is not idle
    /// - `interval` is zero
    /// - The method is not called from within a `tokio` runtime
    pub fn start<D, R, E>(
        &mut self,
        driver: D,
        on_reading: R,
        on_error: E,
        interval: Duration,
    ) -> Result<()>
    where
        D: SensorDriver,
        R: FnMut(D::Reading) + Send + 'static,
        E: FnMut(ReadError) + Send + 'static,
    {
        if self.state != SchedulerState::Idle {
            return Err(Error::new(
                ErrorKind::Scheduler,
                format!("Unable to start a {} scheduler", self.state),
            ));
        }

        if interval.is_zero() {
            return Err(Error::new(
                ErrorKind::Scheduler,
                "The polling interval must be greater than zero",
            ));
        }

        let runtime = Handle::try_current().map_err(|e| {
            Error::with_info(
                ErrorKind::Scheduler,
                "Unable to start a scheduler outside of a runtime",
                e.to_string(),
            )
        })?;

        debug!(
            "Start polling `{}` every {} ms",
            driver.name(),
            interval.as_millis()
        );

        self.handle = Some(runtime.spawn(run_polling_loop(
            Arc::new(driver),
            on_reading,
            on_error,
            interval,
            self.cancellation_token.clone(),
            Arc::clone(&self.callback_lock),
        )));
        self.state = SchedulerState::Running;

        Ok(())
    }

    /// Cancels the scheduler.
    ///
    /// No tick fires after this call and the outcome of a read in flight is
    /// dropped. A callback already running is waited for, so none runs once
    /// this call returns. Cancelling more than once has no further effect.
    pub fn cancel(&mut self) {
        if self.state == SchedulerState::Cancelled {
            return;
        }

        let _callback = lock(&self.callback_lock);
        self.cancellation_token.cancel();
        self.state = SchedulerState::Cancelled;
    }

    /// Cancels the scheduler and waits for its task to terminate.
    ///
    /// A blocking read in flight is not awaited.
    pub async fn stop(mut self) {
        self.cancel();

        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!("Failed to await the polling task: {e}");
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        // Stop the polling task along with its owner.
        let _callback = lock(&self.callback_lock);
        self.cancellation_token.cancel();
    }
}

// A callback panic poisons the lock without breaking its invariant.
fn lock(callback_lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    callback_lock
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

async fn run_polling_loop<D, R, E>(
    driver: Arc<D>,
    mut on_reading: R,
    mut on_error: E,
    interval: Duration,
    cancellation_token: CancellationToken,
    callback_lock: Arc<Mutex<()>>,
) where
    D: SensorDriver,
    R: FnMut(D::Reading) + Send + 'static,
    E: FnMut(ReadError) + Send + 'static,
{
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            _ = ticker.tick() => {}
        }

        let task_driver = Arc::clone(&driver);
        let read = task::spawn_blocking(move || task_driver.read());

        let outcome = tokio::select! {
            biased;
            // The blocking read keeps running, but its outcome is dropped.
            () = cancellation_token.cancelled() => { break; }
            outcome = read => outcome,
        };

        {
            let _callback = lock(&callback_lock);

            // A read racing with a cancellation is dropped as well.
            if cancellation_token.is_cancelled() {
                break;
            }

            match outcome {
                Ok(Ok(reading)) => on_reading(reading),
                Ok(Err(e)) => on_error(e),
                Err(e) => error!("The read of `{}` panicked: {e}", driver.name()),
            }
        }
    }

    debug!("Stop polling `{}`", driver.name());
}
