use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::channel::{Channel, TryRecvError};
use crate::signal::Signal;

/// The winning handler, captured with its value and run on the thread that
/// called [`Select::run`].
type Thunk = Box<dyn FnOnce() + Send>;

/// Arbitration token shared by all pending receives of one select run.
///
/// The token is a single-assignment cell: the first receive the matchers try
/// to hand a value to claims it, every later attempt fails, and the failed
/// entries are discarded by their channels and cancelled here. This turns an
/// n-way race into n independent compare-and-swaps with a single winner.
pub(crate) struct SelectGroup {
    /// 0 while unclaimed, otherwise the 1-based id of the winning case.
    winner: AtomicUsize,
    members: Mutex<Vec<Member>>,
}

struct Member {
    id: usize,
    cancel: Box<dyn Fn() + Send>,
}

impl SelectGroup {
    fn new() -> Self {
        Self {
            winner: AtomicUsize::new(0),
            members: Mutex::new(Vec::new()),
        }
    }

    /// Attempts to assign the token to the case with this id. Called by a
    /// channel matcher, under that channel's mutex, at most once per entry.
    pub(crate) fn claim(&self, id: usize) -> bool {
        self.winner
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn add_member(&self, id: usize, cancel: Box<dyn Fn() + Send>) {
        self.members.lock().push(Member { id, cancel });
    }

    /// Revokes every pending receive that did not win. Runs on the
    /// orchestrator thread once the outcome is decided, before the winning
    /// handler is invoked.
    fn cancel_losers(&self) {
        let winner = self.winner.load(Ordering::Acquire);
        for member in self.members.lock().iter() {
            if member.id != winner {
                (member.cancel)();
            }
        }
    }
}

enum Sweep {
    Value,
    Empty,
    Closed,
}

/// One registered `{channel, handler}` pair, erased over the element type.
trait Case: Send + Sync {
    /// Non-blocking attempt: takes an immediately available value and runs
    /// the handler on the calling thread.
    fn sweep(&self) -> Sweep;

    /// Issues the pending receive for the blocking race. Runs on the
    /// orchestrator thread so that every case is registered with the group
    /// before any waiter starts.
    fn begin(&self, group: &Arc<SelectGroup>, id: usize) -> Box<dyn Pending>;
}

/// A receive in flight, handed to a waiter thread.
trait Pending: Send {
    fn wait(self: Box<Self>) -> Option<Thunk>;
}

struct RecvCase<T> {
    channel: Channel<T>,
    handler: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T: Send + 'static> Case for RecvCase<T> {
    fn sweep(&self) -> Sweep {
        match self.channel.try_recv() {
            Ok(value) => {
                (self.handler)(value);
                Sweep::Value
            }
            Err(TryRecvError::Empty) => Sweep::Empty,
            Err(TryRecvError::Closed) => Sweep::Closed,
        }
    }

    fn begin(&self, group: &Arc<SelectGroup>, id: usize) -> Box<dyn Pending> {
        Box::new(PendingRecv {
            request: self.channel.recv_select(group, id),
            handler: self.handler.clone(),
        })
    }
}

struct PendingRecv<T> {
    request: Arc<Signal<Option<T>>>,
    handler: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T: Send + 'static> Pending for PendingRecv<T> {
    fn wait(self: Box<Self>) -> Option<Thunk> {
        let value = self.request.wait()?;
        let handler = self.handler;
        Some(Box::new(move || handler(value)))
    }
}

/// A multi-way receive over several channels, in the style of Go's `select`.
///
/// A selector is built by accumulating cases; each building step returns a
/// new selector and leaves the receiver untouched, so partially built
/// configurations can be shared freely. A finished selector is immutable and
/// may be run any number of times.
///
/// Without a default, [`Select::run`] blocks until exactly one case receives
/// a value (its handler runs, `run` returns true) or every channel is closed
/// and drained (no handler runs, `run` returns false). Adding a default with
/// [`Select::with_default`] turns the run into a non-blocking sweep.
#[derive(Clone, Default)]
pub struct Select {
    cases: Vec<Arc<dyn Case>>,
}

impl Select {
    /// Creates a selector with no cases.
    pub fn new() -> Self {
        Self { cases: Vec::new() }
    }

    /// Returns a new selector with an added case that receives from
    /// `channel` and passes the value to `handler`.
    pub fn recv<T, F>(&self, channel: &Channel<T>, handler: F) -> Select
    where
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let mut cases = self.cases.clone();
        cases.push(Arc::new(RecvCase {
            channel: channel.clone(),
            handler: Arc::new(handler),
        }));
        Select { cases }
    }

    /// Returns a selector that runs `handler` instead of blocking when no
    /// case has a value immediately available.
    pub fn with_default<F>(&self, handler: F) -> SelectWithDefault
    where
        F: Fn() + Send + Sync + 'static,
    {
        SelectWithDefault {
            cases: self.cases.clone(),
            default: Arc::new(handler),
        }
    }

    /// Blocks until one case receives a value or every channel is closed and
    /// drained. Returns whether a value was received and handled.
    ///
    /// The winning handler runs on the calling thread, after every losing
    /// pending receive has been cancelled; its side effects are visible when
    /// `run` returns. Ties between simultaneously ready channels go to
    /// whichever receive reaches the arbitration token first.
    pub fn run(&self) -> bool {
        let group = Arc::new(SelectGroup::new());
        // Workers report here: the winner's handler as a thunk, or None for
        // a branch whose channel closed. Capacity covers every report, so no
        // worker ever blocks sending and all of them can be joined.
        let results: Channel<Option<Thunk>> = Channel::new(self.cases.len());
        let pending: Vec<Box<dyn Pending>> = self
            .cases
            .iter()
            .enumerate()
            .map(|(index, case)| case.begin(&group, index + 1))
            .collect();
        let mut elected = None;
        thread::scope(|scope| {
            for request in pending {
                let results = results.clone();
                scope.spawn(move || {
                    results.send(request.wait());
                });
            }
            for _ in 0..self.cases.len() {
                match results.recv() {
                    Some(Some(thunk)) => {
                        elected = Some(thunk);
                        break;
                    }
                    Some(None) => {}
                    None => break,
                }
            }
            // Decided: revoke the losers so their waiters finish and the
            // scope can join them. Late None reports land in the buffer and
            // are dropped with it.
            group.cancel_losers();
        });
        match elected {
            Some(thunk) => {
                thunk();
                true
            }
            None => false,
        }
    }

    /// Runs the selector repeatedly until every channel is closed and
    /// drained.
    pub fn run_until_closed(&self) {
        while self.run() {}
    }
}

/// A selector with a default branch, built by [`Select::with_default`].
#[derive(Clone)]
pub struct SelectWithDefault {
    cases: Vec<Arc<dyn Case>>,
    default: Arc<dyn Fn() + Send + Sync>,
}

impl SelectWithDefault {
    /// Sweeps the cases in declaration order without blocking. The first
    /// case with an available value wins and its handler runs. If every
    /// channel is closed and drained, returns false and no handler runs;
    /// otherwise the default handler runs. Returns whether any handler ran.
    pub fn run(&self) -> bool {
        let mut all_closed = true;
        for case in &self.cases {
            match case.sweep() {
                Sweep::Value => return true,
                Sweep::Closed => {}
                Sweep::Empty => all_closed = false,
            }
        }
        if all_closed {
            return false;
        }
        (self.default)();
        true
    }

    /// Runs the selector repeatedly until every channel is closed and
    /// drained. The default handler is expected to eventually close the
    /// remaining channels; otherwise this loop spins.
    pub fn run_until_closed(&self) {
        while self.run() {}
    }
}
