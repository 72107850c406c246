use std::sync::atomic::{AtomicBool, Ordering};

/// Holds the single transition slot until dropped.
///
/// Released on every exit path, including early returns and panics.
#[derive(Debug)]
pub(crate) struct TransitionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TransitionGuard<'a> {
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let flag = AtomicBool::new(false);
        let guard = TransitionGuard::try_acquire(&flag).unwrap();
        assert!(TransitionGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(TransitionGuard::try_acquire(&flag).is_some());
    }
}
