use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A small, blocking counting semaphore.
///
/// Bounds the number of chunks executing at once, independently of the pool size.
pub struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// Permit returned by [`Semaphore::acquire`]; released on drop, including on failure paths.
pub struct Permit<'a> {
    sem: &'a Semaphore,
    /// Time spent waiting for the permit (zero if none was needed).
    pub waited: Duration,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        assert!(permits > 0, "permits must be > 0");
        Self {
            permits: Mutex::new(permits),
            cv: Condvar::new(),
        }
    }

    /// Acquire one permit, blocking until available.
    pub fn acquire(&self) -> Permit<'_> {
        let start = Instant::now();
        let mut waited = false;
        let mut g = self.permits.lock().expect("semaphore mutex poisoned");
        while *g == 0 {
            waited = true;
            g = self.cv.wait(g).expect("semaphore mutex poisoned");
        }
        *g -= 1;
        Permit {
            sem: self,
            waited: if waited { start.elapsed() } else { Duration::ZERO },
        }
    }

    fn release(&self) {
        let mut g = self.permits.lock().expect("semaphore mutex poisoned");
        *g += 1;
        self.cv.notify_one();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}

#[cfg(test)]
mod tests {
    use super::Semaphore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn permits_bound_concurrency() {
        let sem = Semaphore::new(2);
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let _permit = sem.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert!(max_active.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn permit_is_released_on_drop() {
        let sem = Semaphore::new(1);
        {
            let p = sem.acquire();
            assert_eq!(p.waited, Duration::ZERO);
        }
        let p = sem.acquire();
        assert_eq!(p.waited, Duration::ZERO);
    }
}
