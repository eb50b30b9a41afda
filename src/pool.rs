//! Reusable vector buffers for hot query paths.
//!
//! A [`VectorPool`] hands out cleared `Vec`s whose capacity is at least the
//! requested size. The [`PooledVec`] guard returns its buffer to the pool on
//! drop, so every exit path of the caller gives the memory back.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Buffers kept per pool; extra buffers returned beyond this are freed.
const DEFAULT_MAX_POOLED: usize = 64;

pub struct VectorPool<T> {
    free: Mutex<Vec<Vec<T>>>,
    max_pooled: usize,
}

impl<T> VectorPool<T> {
    /// Create a pool pre-populated with `initial` buffers of `capacity` elements.
    pub fn new(initial: usize, capacity: usize) -> Self {
        let free = (0..initial).map(|_| Vec::with_capacity(capacity)).collect();
        Self {
            free: Mutex::new(free),
            max_pooled: DEFAULT_MAX_POOLED.max(initial),
        }
    }

    /// Check out an empty buffer with capacity for at least `min_capacity`
    /// elements. The smallest sufficient pooled buffer is preferred.
    pub fn acquire(&self, min_capacity: usize) -> PooledVec<'_, T> {
        let mut buf = {
            let mut free = self.free.lock();
            let best = free
                .iter()
                .enumerate()
                .filter(|(_, v)| v.capacity() >= min_capacity)
                .min_by_key(|(_, v)| v.capacity())
                .map(|(i, _)| i)
                .or_else(|| {
                    free.iter()
                        .enumerate()
                        .max_by_key(|(_, v)| v.capacity())
                        .map(|(i, _)| i)
                });
            match best {
                Some(i) => free.swap_remove(i),
                None => Vec::new(),
            }
        };
        buf.clear();
        buf.reserve(min_capacity);
        PooledVec {
            pool: self,
            buf: Some(buf),
        }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut buf: Vec<T>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }
}

impl<T: Clone> VectorPool<T> {
    /// Check out a buffer of exactly `len` copies of `value`.
    pub fn acquire_filled(&self, len: usize, value: T) -> PooledVec<'_, T> {
        let mut guard = self.acquire(len);
        guard.resize(len, value);
        guard
    }
}

impl<T> Default for VectorPool<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// A buffer checked out of a [`VectorPool`].
pub struct PooledVec<'a, T> {
    pool: &'a VectorPool<T>,
    buf: Option<Vec<T>>,
}

impl<T> Deref for PooledVec<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        // Only `drop` takes the buffer out.
        self.buf.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> DerefMut for PooledVec<'_, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        self.buf.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for PooledVec<'_, T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
