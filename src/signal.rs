use parking_lot::{Condvar, Mutex};

enum Slot<R> {
    Pending,
    Ready(R),
    Taken,
}

/// A one-shot completion slot shared between a blocked channel operation and
/// whoever eventually completes it (the matcher, `close`, or a select cancel).
///
/// The first `complete` call wins; every later call is a no-op. Exactly one
/// thread waits on a signal, and it may be a different thread from the one
/// that created it.
pub(crate) struct Signal<R> {
    slot: Mutex<Slot<R>>,
    cond: Condvar,
}

impl<R> Signal<R> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            cond: Condvar::new(),
        }
    }

    /// Stores the outcome and wakes the waiter. Returns false if the signal
    /// was already completed, in which case `value` is dropped.
    pub(crate) fn complete(&self, value: R) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Ready(value);
        self.cond.notify_one();
        true
    }

    pub(crate) fn is_complete(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Pending)
    }

    /// Blocks until the signal is completed and takes the outcome. Spurious
    /// wakeups re-wait; the public channel API never observes them.
    pub(crate) fn wait(&self) -> R {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.cond.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(value) => value,
            _ => unreachable!("completion slot waited on twice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_completion_wins() {
        let signal = Signal::new();
        assert!(signal.complete(1));
        assert!(!signal.complete(2));
        assert_eq!(signal.wait(), 1);
    }

    #[test]
    fn wait_from_another_thread() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };
        signal.complete("done");
        assert_eq!(waiter.join().unwrap(), "done");
    }

    #[test]
    fn complete_before_wait_returns_immediately() {
        let signal = Signal::new();
        signal.complete(7);
        assert!(signal.is_complete());
        assert_eq!(signal.wait(), 7);
    }
}
