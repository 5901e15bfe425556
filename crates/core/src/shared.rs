//! Shared, lock-protected state handle.
//!
//! Store state is mutated by synchronous closures only, so a guard can never
//! be held across an `.await`. Code that resumes after a remote call must
//! re-read through the handle instead of reusing values captured before the
//! call.

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Run `f` with shared access to the state.
    ///
    /// A poisoned lock is recovered: every mutation runs to completion in a
    /// single closure, so the state behind a poisoned guard is still whole.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the state.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<T: Clone> Shared<T> {
    /// Clone the current state out of the handle.
    pub fn snapshot(&self) -> T {
        self.read(T::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = Shared::new(vec![1]);
        let b = a.clone();
        b.write(|v| v.push(2));
        assert_eq!(a.snapshot(), vec![1, 2]);
    }
}
