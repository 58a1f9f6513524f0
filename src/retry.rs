use std::{marker::PhantomData, thread, time::Duration};

/// Retries a fallible operation immediately, up to `max_retries` times.
pub struct Retry<E> {
    max_retries: usize,
    target: &'static str,
    _error: PhantomData<fn(E)>,
}

/// A bounded wait: at most `attempts` checks, `delay` apart.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Grace {
    pub attempts: usize,
    pub delay: Duration,
}

/// Polls `ready` until it returns `true` or the grace period runs out.
///
/// Returns whether `ready` ever succeeded. There is no sleep after the final
/// check, so a grace of `n` attempts waits at most `(n - 1) * delay`.
pub fn wait_until(grace: Grace, mut ready: impl FnMut() -> bool) -> bool {
    for attempt in 1..=grace.attempts {
        if ready() {
            log::debug!(target: "retry", "ready after {attempt} attempt(s)");
            return true;
        }

        if attempt < grace.attempts {
            thread::sleep(grace.delay);
        }
    }

    log::debug!(
        target: "retry",
        "still not ready after {} attempts ({:?} apart)",
        grace.attempts,
        grace.delay
    );
    false
}

// === impl Grace ===

impl Grace {
    pub const fn new(attempts: usize, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// The longest this grace period can take.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.attempts.saturating_sub(1) as u32
    }
}

// === impl Retry ===

impl<E: std::fmt::Debug> Retry<E> {
    pub const fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            target: "retry",
            _error: PhantomData,
        }
    }

    pub const fn with_target(self, target: &'static str) -> Self {
        Self {
            max_retries: self.max_retries,
            target,
            _error: PhantomData,
        }
    }

    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T, E>) -> Result<T, E> {
        let mut retries = self.max_retries;
        loop {
            match op() {
                Ok(val) => return Ok(val),
                Err(error) if retries > 0 => {
                    retries -= 1;
                    log::warn!(target: self.target, "retrying: {error:?} ({retries} retries remaining)");
                }
                Err(error) => return Err(error),
            }
        }
    }
}
