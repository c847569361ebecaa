//! Bounded pool of reusable frame buffers.
//!
//! The effect pipeline needs several scratch buffers per frame; renting
//! them from a pool removes the per-frame allocation churn. Buffers are
//! handed out as RAII guards so every rental is returned even when an
//! effect fails mid-way.

use crate::frame::{FrameBuffer, PixelFormat};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Buffers created eagerly at pool construction.
const INITIAL_POOL_SIZE: usize = 10;
/// Hard cap on the free set; returns beyond it destroy the buffer.
const MAX_POOL_SIZE: usize = 50;
/// Background maintenance period.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);
/// Rentals older than this are flagged as leaks (non-fatal).
const MAX_RENT_DURATION: Duration = Duration::from_secs(60);

/// Snapshot of pool counters. Diagnostics only, not used for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub free: usize,
    pub rented: usize,
    pub total_rented: u64,
    pub total_returned: u64,
    pub total_created: u64,
    pub total_destroyed: u64,
}

struct PoolEntry {
    id: u64,
    buf: FrameBuffer,
}

struct PoolInner {
    free: Mutex<Vec<PoolEntry>>,
    /// Outstanding rentals, buffer id -> checkout time.
    rented: Mutex<HashMap<u64, Instant>>,
    next_id: AtomicU64,
    total_rented: AtomicU64,
    total_returned: AtomicU64,
    total_created: AtomicU64,
    total_destroyed: AtomicU64,
}

impl PoolInner {
    fn create_entry(&self) -> PoolEntry {
        self.total_created.fetch_add(1, Ordering::Relaxed);
        PoolEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            buf: FrameBuffer::empty(),
        }
    }

    fn rent_entry(&self) -> PoolEntry {
        let entry = match self.free.lock().pop() {
            Some(entry) => entry,
            None => self.create_entry(),
        };
        self.rented.lock().insert(entry.id, Instant::now());
        self.total_rented.fetch_add(1, Ordering::Relaxed);
        entry
    }

    fn return_entry(&self, entry: PoolEntry) {
        // A buffer that was already returned, or never came from this
        // pool, is not in the rented map: the return is a no-op.
        if self.rented.lock().remove(&entry.id).is_none() {
            return;
        }
        self.total_returned.fetch_add(1, Ordering::Relaxed);

        let mut free = self.free.lock();
        if free.len() < MAX_POOL_SIZE {
            free.push(entry);
        } else {
            self.total_destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn maintain(&self) {
        let now = Instant::now();
        for (id, checked_out) in self.rented.lock().iter() {
            if now.duration_since(*checked_out) > MAX_RENT_DURATION {
                warn!(
                    buffer_id = id,
                    seconds = now.duration_since(*checked_out).as_secs(),
                    "pooled buffer rented longer than the leak threshold"
                );
            }
        }

        let mut free = self.free.lock();
        while free.len() > MAX_POOL_SIZE {
            free.pop();
            self.total_destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Thread-safe pool of reusable frame buffers.
///
/// `rent`/return are callable from multiple threads without external
/// locking; the free set and the rented map are independently locked.
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new() -> Self {
        let inner = Arc::new(PoolInner {
            free: Mutex::new(Vec::with_capacity(MAX_POOL_SIZE)),
            rented: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            total_rented: AtomicU64::new(0),
            total_returned: AtomicU64::new(0),
            total_created: AtomicU64::new(0),
            total_destroyed: AtomicU64::new(0),
        });

        {
            let mut free = inner.free.lock();
            for _ in 0..INITIAL_POOL_SIZE {
                free.push(inner.create_entry());
            }
        }

        Self::spawn_maintenance(Arc::downgrade(&inner));
        Self { inner }
    }

    /// Maintenance runs until the pool itself is dropped; the thread only
    /// holds a weak reference, so it never keeps the pool alive.
    fn spawn_maintenance(weak: Weak<PoolInner>) {
        std::thread::Builder::new()
            .name("bufferpool-maintenance".into())
            .spawn(move || {
                let slice = Duration::from_millis(500);
                let mut elapsed = Duration::ZERO;
                loop {
                    std::thread::sleep(slice);
                    elapsed += slice;
                    let Some(inner) = weak.upgrade() else {
                        debug!("buffer pool dropped, maintenance thread exiting");
                        return;
                    };
                    if elapsed >= MAINTENANCE_INTERVAL {
                        elapsed = Duration::ZERO;
                        inner.maintain();
                    }
                }
            })
            .expect("failed to spawn pool maintenance thread");
    }

    /// Rent a buffer with whatever shape it last had.
    pub fn rent(&self) -> PooledBuffer {
        PooledBuffer {
            entry: Some(self.inner.rent_entry()),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Rent a buffer reshaped to the given dimensions and zero-filled.
    pub fn rent_shaped(&self, width: u32, height: u32, format: PixelFormat) -> PooledBuffer {
        let mut rented = self.rent();
        rented.reset(width, height, format);
        rented
    }

    /// Rent a buffer shaped like the template, zero-filled.
    pub fn rent_like(&self, template: &FrameBuffer) -> PooledBuffer {
        self.rent_shaped(template.width, template.height, template.format)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free: self.inner.free.lock().len(),
            rented: self.inner.rented.lock().len(),
            total_rented: self.inner.total_rented.load(Ordering::Relaxed),
            total_returned: self.inner.total_returned.load(Ordering::Relaxed),
            total_created: self.inner.total_created.load(Ordering::Relaxed),
            total_destroyed: self.inner.total_destroyed.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped rental: dereferences to the buffer and returns it to the pool
/// on drop, including on unwinding.
pub struct PooledBuffer {
    entry: Option<PoolEntry>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        &self.entry.as_ref().expect("buffer already returned").buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut FrameBuffer {
        &mut self.entry.as_mut().expect("buffer already returned").buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.return_entry(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_prewarms() {
        let pool = BufferPool::new();
        let stats = pool.stats();
        assert_eq!(stats.free, INITIAL_POOL_SIZE);
        assert_eq!(stats.total_created, INITIAL_POOL_SIZE as u64);
    }

    #[test]
    fn test_warm_pool_recycles_instead_of_allocating() {
        let pool = BufferPool::new();
        let created_warm = pool.stats().total_created;
        for _ in 0..100 {
            let buf = pool.rent_shaped(64, 48, PixelFormat::Rgb8);
            drop(buf);
        }
        assert_eq!(pool.stats().total_created, created_warm);
    }

    #[test]
    fn test_returns_beyond_cap_are_destroyed() {
        let pool = BufferPool::new();
        let rentals: Vec<_> = (0..MAX_POOL_SIZE + 5).map(|_| pool.rent()).collect();
        drop(rentals);

        let stats = pool.stats();
        assert_eq!(stats.free, MAX_POOL_SIZE);
        assert_eq!(stats.total_destroyed, 5);
    }

    #[test]
    fn test_shaped_rent_is_zero_filled() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.rent_shaped(8, 8, PixelFormat::Rgb8);
            buf.data.fill(0xAB);
        }
        let buf = pool.rent_shaped(8, 8, PixelFormat::Rgb8);
        assert!(buf.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rent_like_matches_template() {
        let pool = BufferPool::new();
        let template = FrameBuffer::new(320, 240, PixelFormat::Gray8);
        let buf = pool.rent_like(&template);
        assert_eq!((buf.width, buf.height, buf.format), (320, 240, PixelFormat::Gray8));
    }

    #[test]
    fn test_concurrent_rent_return() {
        let pool = Arc::new(BufferPool::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let _buf = pool.rent_shaped(32, 32, PixelFormat::Gray8);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.rented, 0);
        assert_eq!(stats.total_rented, stats.total_returned);
        assert!(stats.free <= MAX_POOL_SIZE);
    }
}
