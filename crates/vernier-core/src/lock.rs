//! Reader/writer lock whose read side is safe in signal context.
//!
//! ## Protocol
//!
//! **Reader**:
//!   1. Spin while the writer flag is set.
//!   2. Increment the reader counter.
//!   3. Re-check the flag; if a writer arrived meanwhile, back out and retry.
//!
//! **Writer** (serialized via `parking_lot::Mutex`):
//!   1. Take the writer gate.
//!   2. Raise the writer flag.
//!   3. Spin until the reader counter drains to zero.
//!
//! The reader path performs no allocation and touches no OS lock, so it may
//! run inside an asynchronous signal handler. Forward progress is
//! guaranteed as long as the interrupted thread does not itself hold the
//! write side; interrupting a write-side holder would spin forever, which
//! is why the coordinator never takes a write lock on the signal path.
//!
//! Flag/counter ordering uses `SeqCst` at the two crossing points (writer
//! raises the flag then polls readers; a reader increments then re-checks
//! the flag) so the classic store/load reordering race cannot admit a
//! reader and a writer simultaneously.

use std::cell::UnsafeCell;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};

pub struct SigsafeRwLock<T> {
    readers: AtomicU32,
    writer: AtomicBool,
    writer_gate: Mutex<()>,
    data: UnsafeCell<T>,
}

// SAFETY: the guard protocol above gives readers shared access and the
// writer exclusive access; `T` crosses threads only under that protocol.
unsafe impl<T: Send> Send for SigsafeRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for SigsafeRwLock<T> {}

impl<T> SigsafeRwLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            readers: AtomicU32::new(0),
            writer: AtomicBool::new(false),
            writer_gate: Mutex::new(()),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire shared read access.
    ///
    /// Signal-safe: wait-free against other readers, no allocation, no OS
    /// lock. Spins only while a writer holds or is draining the lock.
    pub fn read(&self) -> ReadGuard<'_, T> {
        loop {
            while self.writer.load(Ordering::SeqCst) {
                hint::spin_loop();
            }
            self.readers.fetch_add(1, Ordering::SeqCst);
            if !self.writer.load(Ordering::SeqCst) {
                return ReadGuard { lock: self };
            }
            // A writer raised the flag between our check and increment;
            // back out so it can drain, then retry.
            self.readers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Acquire exclusive write access. May block on the writer gate and
    /// spins until concurrent readers drain. Never called in signal context.
    pub fn write(&self) -> WriteGuard<'_, T> {
        let gate = self.writer_gate.lock();
        self.writer.store(true, Ordering::SeqCst);
        while self.readers.load(Ordering::SeqCst) != 0 {
            hint::spin_loop();
        }
        WriteGuard { lock: self, _gate: gate }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SigsafeRwLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigsafeRwLock")
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .field("writer", &self.writer.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

pub struct ReadGuard<'a, T> {
    lock: &'a SigsafeRwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the reader counter is nonzero while this guard lives, so
        // no writer can be inside the critical section.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.readers.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct WriteGuard<'a, T> {
    lock: &'a SigsafeRwLock<T>,
    _gate: MutexGuard<'a, ()>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the writer flag is raised and readers have drained, so
        // this guard has exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; the gate also excludes other writers.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.writer.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::SigsafeRwLock;
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn read_then_write_round_trip() {
        let lock = SigsafeRwLock::new(41);
        assert_eq!(*lock.read(), 41);
        *lock.write() += 1;
        assert_eq!(*lock.read(), 42);
    }

    #[test]
    fn concurrent_readers_share() {
        let lock = SigsafeRwLock::new(7);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 14);
    }

    /// Writers keep two fields equal; readers must never observe a torn pair.
    #[test]
    fn readers_never_observe_torn_writes() {
        let lock = Arc::new(SigsafeRwLock::new((0u64, 0u64)));
        let stop = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(5));

        let writer = {
            let lock = Arc::clone(&lock);
            let stop = Arc::clone(&stop);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut v = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    v += 1;
                    let mut guard = lock.write();
                    guard.0 = v;
                    guard.1 = v;
                }
                v
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let stop = Arc::clone(&stop);
            let barrier = Arc::clone(&barrier);
            readers.push(thread::spawn(move || {
                barrier.wait();
                let mut reads = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let guard = lock.read();
                    assert_eq!(guard.0, guard.1, "torn read: {} vs {}", guard.0, guard.1);
                    reads += 1;
                }
                reads
            }));
        }

        thread::sleep(Duration::from_millis(300));
        stop.store(true, Ordering::Release);

        let writes = writer.join().unwrap();
        let mut total_reads = 0u64;
        for r in readers {
            total_reads += r.join().unwrap();
        }
        assert!(writes > 0);
        assert!(total_reads > 0);
        println!("[sigsafe_rwlock] writes={writes} reads={total_reads} no torn reads");
    }

    /// Multiple writers serialize through the gate.
    #[test]
    fn writers_serialize() {
        let lock = Arc::new(SigsafeRwLock::new(0u64));
        let barrier = Arc::new(Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..1000 {
                    *lock.write() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 4000);
    }
}
