//! Trailing-edge throttling for high-frequency callbacks.
//!
//! Producers can call [`Throttle::call`] as often as they like; the wrapped
//! callback runs at most once per interval, always with the most recent
//! value, and the last value before a quiet period is always delivered.

use engine_core::progress::{BatchProgress, ProgressCallback};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    time::{Instant, sleep},
};

struct ThrottleState<T> {
    latest: Option<T>,
    last_delivery: Option<Instant>,
    trailing_armed: bool,
}

struct Inner<T> {
    interval: Duration,
    callback: Box<dyn Fn(T) + Send + Sync>,
    handle: Handle,
    state: Mutex<ThrottleState<T>>,
}

/// Caps delivery frequency of a callback without blocking producers.
///
/// Cloning yields another handle to the same throttle window.
pub struct Throttle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Throttle<T> {
    fn clone(&self) -> Self {
        Throttle {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Throttle<T> {
    /// Must be constructed on a tokio runtime; deliveries are spawned onto
    /// it so producer threads never run the callback inline.
    pub fn new(interval: Duration, callback: impl Fn(T) + Send + Sync + 'static) -> Self {
        Throttle {
            inner: Arc::new(Inner {
                interval,
                callback: Box::new(callback),
                handle: Handle::current(),
                state: Mutex::new(ThrottleState {
                    latest: None,
                    last_delivery: None,
                    trailing_armed: false,
                }),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Records `value` as the most recent update.
    ///
    /// If no delivery is pending and the interval has elapsed since the
    /// last one, `value` is delivered right away. Otherwise exactly one
    /// trailing delivery is armed for the remainder of the interval; it
    /// carries whichever value is most recent when it fires, so bursts
    /// collapse to a single delivery instead of queueing.
    pub fn call(&self, value: T) {
        let mut state = self.inner.state.lock().expect("throttle state lock poisoned");
        state.latest = Some(value);

        if state.trailing_armed {
            // the armed delivery will pick up the newer value
            return;
        }

        let now = Instant::now();
        let elapsed = state.last_delivery.map(|at| now.duration_since(at));
        let due = match elapsed {
            None => true,
            Some(elapsed) => elapsed >= self.inner.interval,
        };

        if due {
            let value = state.latest.take();
            state.last_delivery = Some(now);
            drop(state);
            if let Some(value) = value {
                let inner = self.inner.clone();
                self.inner.handle.spawn(async move {
                    (inner.callback)(value);
                });
            }
            return;
        }

        state.trailing_armed = true;
        let wait = self.inner.interval - elapsed.unwrap_or_default();
        drop(state);

        let inner = self.inner.clone();
        self.inner.handle.spawn(async move {
            sleep(wait).await;
            let value = {
                let mut state = inner.state.lock().expect("throttle state lock poisoned");
                state.trailing_armed = false;
                state.last_delivery = Some(Instant::now());
                state.latest.take()
            };
            if let Some(value) = value {
                (inner.callback)(value);
            }
        });
    }
}

impl Throttle<BatchProgress> {
    /// Adapts the throttle into the callback shape the batch processor
    /// expects.
    pub fn into_progress_callback(self) -> ProgressCallback {
        Arc::new(move |progress| self.call(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn recording() -> (Arc<Mutex<Vec<u64>>>, impl Fn(u64) + Send + Sync + 'static) {
        let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |value| sink.lock().unwrap().push(value))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_leading_and_trailing_delivery() {
        let (seen, callback) = recording();
        let throttle = Throttle::new(Duration::from_millis(250), callback);

        for value in 0..1_000u64 {
            throttle.call(value);
        }
        tokio::task::yield_now().await;
        assert_eq!(*seen.lock().unwrap(), vec![0], "leading delivery only");

        advance(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![0, 999],
            "trailing delivery carries the most recent value"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_picks_up_values_recorded_while_armed() {
        let (seen, callback) = recording();
        let throttle = Throttle::new(Duration::from_millis(100), callback);

        throttle.call(1);
        throttle.call(2);
        advance(Duration::from_millis(50)).await;
        // still armed; this value supersedes 2
        throttle.call(3);
        advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_immediately_after_a_quiet_period() {
        let (seen, callback) = recording();
        let throttle = Throttle::new(Duration::from_millis(100), callback);

        throttle.call(1);
        tokio::task::yield_now().await;
        advance(Duration::from_millis(500)).await;

        throttle.call(2);
        tokio::task::yield_now().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn last_value_before_quiescence_always_fires() {
        let (seen, callback) = recording();
        let throttle = Throttle::new(Duration::from_millis(200), callback);

        throttle.call(7);
        tokio::task::yield_now().await;
        throttle.call(8);
        // nothing else arrives; the armed delivery must still fire
        advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }
}
