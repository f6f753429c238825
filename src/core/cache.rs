//! # 已处理签名缓存
//!
//! The stream may redeliver a transaction; the listen loop drops any signature it
//! has already handled. Capacity is fixed and the oldest signature is evicted
//! first, so memory stays bounded for arbitrarily long sessions.

use parking_lot::Mutex;
use solana_sdk::signature::Signature;
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_SIGNATURE_CAPACITY: usize = 100_000;

#[derive(Debug, Default)]
struct Inner {
    set: HashSet<Signature>,
    order: VecDeque<Signature>,
}

#[derive(Debug)]
pub struct SignatureCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_CAPACITY)
    }
}

impl SignatureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                set: HashSet::with_capacity(capacity.min(4096)),
                order: VecDeque::with_capacity(capacity.min(4096)),
            }),
            capacity,
        }
    }

    /// `true` if the signature was not seen before (and is now recorded).
    pub fn insert(&self, signature: Signature) -> bool {
        let mut inner = self.inner.lock();
        if !inner.set.insert(signature) {
            return false;
        }
        inner.order.push_back(signature);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.set.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.inner.lock().set.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(n: u8) -> Signature {
        Signature::from([n; 64])
    }

    #[test]
    fn test_duplicate_rejected() {
        let cache = SignatureCache::new(8);
        let sig = sig(1);
        assert!(cache.insert(sig));
        assert!(!cache.insert(sig));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = SignatureCache::new(2);
        let (a, b, c) = (sig(1), sig(2), sig(3));
        cache.insert(a);
        cache.insert(b);
        cache.insert(c);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&a));
        assert!(cache.contains(&b) && cache.contains(&c));
        // evicted signatures are accepted again
        assert!(cache.insert(a));
    }

    #[test]
    fn test_zero_capacity_still_dedups_latest() {
        let cache = SignatureCache::new(0);
        let sig = sig(9);
        assert!(cache.insert(sig));
        assert!(!cache.insert(sig));
    }
}
