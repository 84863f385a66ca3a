// SPDX-License-Identifier: GPL-3.0-only

//! Consume-once output request tokens
//!
//! A one-shot request sets a pending token; the next frame that produces
//! output consumes it and the request is fulfilled at most once. Duplicate
//! requests arriving before fulfillment coalesce into one.

use std::sync::atomic::{AtomicBool, Ordering};

/// Pending one-shot output requests, shared between the command context and
/// the delivery thread
#[derive(Debug, Default)]
pub struct OutputRequests {
    fullsize: AtomicBool,
    thumbnail: AtomicBool,
}

impl OutputRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fullsize request; returns false when one was already
    /// pending (the requests coalesce)
    pub fn request_fullsize(&self) -> bool {
        !self.fullsize.swap(true, Ordering::AcqRel)
    }

    /// Register a thumbnail request; returns false when coalesced
    pub fn request_thumbnail(&self) -> bool {
        !self.thumbnail.swap(true, Ordering::AcqRel)
    }

    /// Consume a pending fullsize request, if any
    pub fn take_fullsize(&self) -> bool {
        self.fullsize.swap(false, Ordering::AcqRel)
    }

    /// Consume a pending thumbnail request, if any
    pub fn take_thumbnail(&self) -> bool {
        self.thumbnail.swap(false, Ordering::AcqRel)
    }

    /// Whether either request is pending
    pub fn any_pending(&self) -> bool {
        self.fullsize.load(Ordering::Acquire) || self.thumbnail.load(Ordering::Acquire)
    }

    /// Drop any pending requests (session teardown)
    pub fn clear(&self) {
        self.fullsize.store(false, Ordering::Release);
        self.thumbnail.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn fulfilled_exactly_once() {
        let requests = OutputRequests::new();
        assert!(requests.request_fullsize());

        assert!(requests.take_fullsize());
        // A second service cycle sees nothing
        assert!(!requests.take_fullsize());
    }

    #[test]
    fn duplicate_requests_coalesce() {
        let requests = OutputRequests::new();
        assert!(requests.request_thumbnail());
        assert!(!requests.request_thumbnail());
        assert!(!requests.request_thumbnail());

        assert!(requests.take_thumbnail());
        assert!(!requests.take_thumbnail());
    }

    #[test]
    fn tokens_are_independent() {
        let requests = OutputRequests::new();
        requests.request_fullsize();
        assert!(!requests.take_thumbnail());
        assert!(requests.take_fullsize());
    }

    #[test]
    fn clear_drops_pending() {
        let requests = OutputRequests::new();
        requests.request_fullsize();
        requests.request_thumbnail();
        requests.clear();
        assert!(!requests.take_fullsize());
        assert!(!requests.take_thumbnail());
    }

    #[test]
    fn concurrent_requesters_yield_single_fulfillment() {
        let requests = Arc::new(OutputRequests::new());
        let registered = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let requests = Arc::clone(&requests);
                let registered = Arc::clone(&registered);
                std::thread::spawn(move || {
                    if requests.request_fullsize() {
                        registered.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // However many callers raced, exactly one registration won and
        // exactly one take observes it
        assert_eq!(registered.load(Ordering::SeqCst), 1);
        assert!(requests.take_fullsize());
        assert!(!requests.take_fullsize());
    }
}
