// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::sync::{Mutex, MutexGuard};

/// Reference-counted init/finalize.
///
/// Independent users call [`Lifecycle::acquire`] and [`Lifecycle::release`]
/// in pairs; the real setup runs only when the count leaves zero and the real
/// teardown only when it returns to zero.
#[derive(Debug, Default)]
pub struct Lifecycle {
    count: Mutex<usize>,
}

impl Lifecycle {
    pub const fn new() -> Self {
        Lifecycle {
            count: Mutex::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Increments the count, running `setup` first on the 0→1 transition.
    ///
    /// A failing `setup` leaves the count at zero so the next call retries.
    pub fn acquire<E>(&self, setup: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        let mut count = self.lock();
        if *count == 0 {
            setup()?;
        }
        *count += 1;
        log::trace!("lifecycle acquired, count {}", *count);
        Ok(())
    }

    /// Decrements the count, running `teardown` on the 1→0 transition.
    ///
    /// Returns whether `teardown` ran. Releasing at zero does nothing.
    pub fn release(&self, teardown: impl FnOnce()) -> bool {
        let mut count = self.lock();
        match *count {
            0 => {
                log::warn!("finalize called without a matching init");
                false
            }
            1 => {
                teardown();
                *count = 0;
                log::trace!("lifecycle released, count 0");
                true
            }
            n => {
                *count = n - 1;
                log::trace!("lifecycle released, count {}", n - 1);
                false
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_nested_calls_run_once() {
        let lifecycle = Lifecycle::new();
        let setups = Cell::new(0);
        let teardowns = Cell::new(0);

        for _ in 0..3 {
            lifecycle
                .acquire(|| {
                    setups.set(setups.get() + 1);
                    Ok::<(), ()>(())
                })
                .unwrap();
        }
        assert_eq!(lifecycle.count(), 3);

        for _ in 0..3 {
            lifecycle.release(|| teardowns.set(teardowns.get() + 1));
        }

        assert_eq!(setups.get(), 1);
        assert_eq!(teardowns.get(), 1);
        assert_eq!(lifecycle.count(), 0);
    }

    #[test]
    fn test_failed_setup_keeps_zero() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.acquire(|| Err("no sensors")), Err("no sensors"));
        assert_eq!(lifecycle.count(), 0);

        lifecycle.acquire(|| Ok::<(), ()>(())).unwrap();
        assert_eq!(lifecycle.count(), 1);
    }

    #[test]
    fn test_release_at_zero() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.release(|| panic!("teardown must not run")));
        assert_eq!(lifecycle.count(), 0);
    }

    #[test]
    fn test_shared_across_threads() {
        static SHARED: Lifecycle = Lifecycle::new();
        let setups = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    SHARED
                        .acquire(|| {
                            setups.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            Ok::<(), ()>(())
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(setups.into_inner(), 1);
        assert_eq!(SHARED.count(), 8);
    }
}
