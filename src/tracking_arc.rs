//! A thin wrapper around [`std::sync::Arc`] used for the handles the public API hands out
//! (`Client`, `ClientSession`, cursors). Under `--cfg mongodb_internal_tracking_arc` it records
//! every live allocation's backtrace so test suites can assert that a `Client` is fully dropped
//! (all its cursors, sessions, and monitor tasks released) once it goes out of scope.

use std::sync::Arc;

#[cfg(mongodb_internal_tracking_arc)]
mod registry {
    use std::sync::Mutex;

    static LIVE: Mutex<Vec<(usize, std::backtrace::Backtrace)>> = Mutex::new(Vec::new());

    pub(super) fn track(ptr: usize) {
        LIVE.lock()
            .unwrap()
            .push((ptr, std::backtrace::Backtrace::force_capture()));
    }

    pub(super) fn untrack(ptr: usize) {
        LIVE.lock().unwrap().retain(|(p, _)| *p != ptr);
    }

    #[allow(dead_code)]
    pub(crate) fn live_count() -> usize {
        LIVE.lock().unwrap().len()
    }
}

/// Reference-counted handle; behaves exactly like `Arc<T>` except for the optional leak
/// tracking enabled via the `mongodb_internal_tracking_arc` cfg.
#[derive(Debug)]
pub(crate) struct TrackingArc<T>(Arc<T>);

impl<T> TrackingArc<T> {
    pub(crate) fn new(value: T) -> Self {
        let arc = Arc::new(value);
        #[cfg(mongodb_internal_tracking_arc)]
        registry::track(Arc::as_ptr(&arc) as usize);
        Self(arc)
    }

    pub(crate) fn downgrade(this: &Self) -> Weak<T> {
        Weak(Arc::downgrade(&this.0))
    }

    pub(crate) fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    pub(crate) fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }
}

impl<T> Clone for TrackingArc<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> std::ops::Deref for TrackingArc<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(mongodb_internal_tracking_arc)]
impl<T> Drop for TrackingArc<T> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.0) == 1 {
            registry::untrack(Arc::as_ptr(&self.0) as usize);
        }
    }
}

/// A non-owning handle to a [`TrackingArc`]; mirrors `std::sync::Weak`.
#[derive(Debug)]
pub(crate) struct Weak<T>(std::sync::Weak<T>);

impl<T> Weak<T> {
    pub(crate) fn upgrade(&self) -> Option<TrackingArc<T>> {
        self.0.upgrade().map(TrackingArc)
    }
}

impl<T> Clone for Weak<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
