use std::sync::atomic::{AtomicBool, Ordering};

/// Marks a rebuild in progress: `IDLE -> REBUILDING -> IDLE`.
#[derive(Debug, Default)]
pub struct ReloadFlag {
    active: AtomicBool,
}

impl ReloadFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `REBUILDING`. `None` if a rebuild already holds the flag.
    pub fn try_acquire(&self) -> Option<ReloadGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReloadGuard { flag: self })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Holds the flag until dropped, on every exit path.
#[derive(Debug)]
pub struct ReloadGuard<'a> {
    flag: &'a ReloadFlag,
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.flag.active.store(false, Ordering::Release);
    }
}
