use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

const POLL_START: Duration = Duration::from_millis(1);
const POLL_MAX: Duration = Duration::from_millis(20);

/// Locking for state shared between the trigger, the host and the tests.
///
/// A panicked holder never takes the daemon down with it: the guard is taken
/// over and the poisoning is logged under `context`.
pub trait MutexExt<T> {
    fn lock_or_recover(&self, context: &str) -> MutexGuard<'_, T>;

    /// `None` once `timeout` passes with the lock still held elsewhere.
    fn lock_within(&self, context: &str, timeout: Duration) -> Option<MutexGuard<'_, T>>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_or_recover(&self, context: &str) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| recover(poisoned, context))
    }

    fn lock_within(&self, context: &str, timeout: Duration) -> Option<MutexGuard<'_, T>> {
        let deadline = Instant::now() + timeout;
        let mut pause = POLL_START;
        loop {
            match self.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(recover(poisoned, context)),
                Err(TryLockError::WouldBlock) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        log::warn!("{}: lock still held after {:?}", context, timeout);
                        return None;
                    }
                    std::thread::sleep(pause.min(left));
                    pause = (pause * 2).min(POLL_MAX);
                }
            }
        }
    }
}

fn recover<G>(poisoned: PoisonError<G>, context: &str) -> G {
    log::error!("{}: lock poisoned by a panicked holder, recovering", context);
    poisoned.into_inner()
}
