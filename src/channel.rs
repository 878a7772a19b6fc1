use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::select::SelectGroup;
use crate::signal::Signal;

/// Error returned by [`Channel::try_recv`] when no value can be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// The channel is open but holds no value; a blocking receive would wait.
    Empty,
    /// The channel is closed and every buffered value has been drained.
    Closed,
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryRecvError::Empty => write!(f, "receiving on an empty channel"),
            TryRecvError::Closed => write!(f, "receiving on a closed and drained channel"),
        }
    }
}

impl std::error::Error for TryRecvError {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    /// Armed by [`Channel::close_when_empty`]: closes as soon as the send
    /// queue drains.
    Closing,
    Closed,
}

/// A pending send. The first `capacity` entries of the send queue belong to
/// senders that have already completed; entries beyond that are still blocked.
struct SendEntry<T> {
    value: T,
    done: Arc<Signal<bool>>,
}

/// A pending receive, blocked until a value arrives or the channel closes.
struct RecvEntry<T> {
    done: Arc<Signal<Option<T>>>,
    group: Option<(Arc<SelectGroup>, usize)>,
}

impl<T> RecvEntry<T> {
    /// A receive that belongs to a select race may only be handed a value if
    /// it wins the group's token; once another branch has claimed it, this
    /// entry is dead weight and the matcher discards it.
    fn is_selectable(&self) -> bool {
        match &self.group {
            Some((group, id)) => group.claim(*id),
            None => true,
        }
    }
}

/// Completions collected under the channel mutex and fired after release, so
/// that no waiter is ever woken while the queue lock is held.
enum Wake<T> {
    Recv(Arc<Signal<Option<T>>>, Option<T>),
    Send(Arc<Signal<bool>>, bool),
}

fn fire<T>(wakes: Vec<Wake<T>>) {
    for wake in wakes {
        match wake {
            Wake::Recv(done, value) => {
                done.complete(value);
            }
            Wake::Send(done, delivered) => {
                done.complete(delivered);
            }
        }
    }
}

struct State<T> {
    status: Status,
    senders: VecDeque<SendEntry<T>>,
    receivers: VecDeque<RecvEntry<T>>,
}

impl<T> State<T> {
    /// Pairs pending receivers with pending senders, head to head. Runs under
    /// the channel mutex; at return, at most one of the two queues is
    /// non-empty and the send queue holds at most `capacity` completed
    /// entries plus any still-blocked tail.
    fn match_queues(&mut self, capacity: usize, wakes: &mut Vec<Wake<T>>) {
        while !self.receivers.is_empty() && !self.senders.is_empty() {
            let receiver = self.receivers.pop_front().expect("checked non-empty");
            if !receiver.is_selectable() {
                continue;
            }
            let value = self.pop_sender(capacity, wakes);
            wakes.push(Wake::Recv(receiver.done, Some(value)));
        }
        if self.status == Status::Closing && self.senders.is_empty() {
            self.close_now(capacity, wakes);
        }
    }

    /// Takes the head value off the send queue. The entry at the buffer
    /// boundary, if any, moves inside it and its sender unblocks.
    fn pop_sender(&mut self, capacity: usize, wakes: &mut Vec<Wake<T>>) -> T {
        if self.senders.len() > capacity {
            wakes.push(Wake::Send(self.senders[capacity].done.clone(), true));
        }
        let entry = self.senders.pop_front().expect("checked non-empty");
        entry.value
    }

    /// Transitions to `Closed`, failing every pending receiver and every
    /// sender past the buffer boundary. Buffered values stay in place and
    /// remain retrievable.
    fn close_now(&mut self, capacity: usize, wakes: &mut Vec<Wake<T>>) {
        self.status = Status::Closed;
        for receiver in self.receivers.drain(..) {
            wakes.push(Wake::Recv(receiver.done, None));
        }
        while self.senders.len() > capacity {
            let entry = self.senders.pop_back().expect("len > capacity");
            wakes.push(Wake::Send(entry.done, false));
        }
    }
}

struct Inner<T> {
    capacity: usize,
    state: Mutex<State<T>>,
}

/// A typed, bounded, FIFO channel.
///
/// A channel is a single object shared by cloning the handle; every clone
/// sends into, receives from and closes the same underlying queue. With
/// capacity 0 every send rendezvouses with a receive; with capacity `n` up to
/// `n` sends complete without a matching receive.
///
/// Closing is explicit and one-way. Values buffered before the close remain
/// receivable until drained, after which every receive reports the close.
pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Channel<T> {
    /// A rendezvous channel, equivalent to `Channel::new(0)`.
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> Channel<T> {
    /// Creates an open channel that buffers up to `capacity` sent values.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State {
                    status: Status::Open,
                    senders: VecDeque::new(),
                    receivers: VecDeque::new(),
                }),
            }),
        }
    }

    /// Sends a value, blocking while the buffer is full and no receiver is
    /// ready. Returns false if the channel was closed at call time, or became
    /// closed while the value was still unbuffered; the value is dropped in
    /// that case.
    pub fn send(&self, value: T) -> bool {
        let done = Arc::new(Signal::new());
        let mut wakes = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.status == Status::Closed {
                return false;
            }
            // Inside the buffer the send completes on the spot; the entry
            // stays queued until a receiver takes the value.
            if state.senders.len() < self.inner.capacity {
                wakes.push(Wake::Send(done.clone(), true));
            }
            state.senders.push_back(SendEntry {
                value,
                done: done.clone(),
            });
            state.match_queues(self.inner.capacity, &mut wakes);
        }
        fire(wakes);
        done.wait()
    }

    /// Receives a value, blocking while the channel is empty. Returns `None`
    /// once the channel is closed and drained.
    pub fn recv(&self) -> Option<T> {
        let done = Arc::new(Signal::new());
        self.enqueue_recv(RecvEntry {
            done: done.clone(),
            group: None,
        });
        done.wait()
    }

    /// Attempts to receive without blocking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let (value, wakes) = {
            let mut state = self.inner.state.lock();
            if state.senders.is_empty() {
                return match state.status {
                    Status::Closed => Err(TryRecvError::Closed),
                    _ => Err(TryRecvError::Empty),
                };
            }
            let mut wakes = Vec::new();
            let value = state.pop_sender(self.inner.capacity, &mut wakes);
            if state.status == Status::Closing && state.senders.is_empty() {
                state.close_now(self.inner.capacity, &mut wakes);
            }
            (value, wakes)
        };
        fire(wakes);
        Ok(value)
    }

    /// Closes the channel, failing every blocked receiver and every sender
    /// whose value was not yet buffered. Returns true if this call performed
    /// the transition, false if the channel was already closed.
    pub fn close(&self) -> bool {
        let wakes = {
            let mut state = self.inner.state.lock();
            if state.status == Status::Closed {
                return false;
            }
            let mut wakes = Vec::new();
            state.close_now(self.inner.capacity, &mut wakes);
            wakes
        };
        fire(wakes);
        true
    }

    /// Arms the channel to close itself once every queued value has been
    /// received. An empty channel closes immediately; a closed channel is
    /// left alone. Sends admitted while armed are still delivered and delay
    /// the transition.
    pub fn close_when_empty(&self) {
        let wakes = {
            let mut state = self.inner.state.lock();
            if state.status != Status::Open {
                return;
            }
            state.status = Status::Closing;
            let mut wakes = Vec::new();
            if state.senders.is_empty() {
                state.close_now(self.inner.capacity, &mut wakes);
            }
            wakes
        };
        fire(wakes);
    }

    /// Reports whether the channel is still open. Advisory: another thread
    /// may close the channel between this call and the next operation.
    pub fn is_open(&self) -> bool {
        self.inner.state.lock().status != Status::Closed
    }

    /// Returns an iterator that receives values until the channel is closed
    /// and drained. Dropping the iterator early does not close the channel.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { channel: self }
    }

    /// Issues a receive on behalf of a select race. The entry is registered
    /// with `group` for cancellation before it is enqueued, so a losing
    /// branch can always be revoked.
    pub(crate) fn recv_select(
        &self,
        group: &Arc<SelectGroup>,
        id: usize,
    ) -> Arc<Signal<Option<T>>>
    where
        T: Send + 'static,
    {
        let done = Arc::new(Signal::new());
        group.add_member(id, {
            let channel = self.clone();
            let done = done.clone();
            Box::new(move || channel.cancel(&done))
        });
        self.enqueue_recv(RecvEntry {
            done: done.clone(),
            group: Some((group.clone(), id)),
        });
        done
    }

    /// Revokes a pending receive issued through [`Channel::recv_select`].
    /// Completes it as absent unless a value already arrived; the caller
    /// cannot distinguish this from a close, and need not.
    pub(crate) fn cancel(&self, done: &Arc<Signal<Option<T>>>) {
        if done.is_complete() {
            return;
        }
        {
            let mut state = self.inner.state.lock();
            state
                .receivers
                .retain(|entry| !Arc::ptr_eq(&entry.done, done));
        }
        done.complete(None);
    }

    fn enqueue_recv(&self, entry: RecvEntry<T>) {
        let mut wakes = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.status == Status::Closed && state.senders.is_empty() {
                wakes.push(Wake::Recv(entry.done, None));
            } else {
                state.receivers.push_back(entry);
                state.match_queues(self.inner.capacity, &mut wakes);
            }
        }
        fire(wakes);
    }
}

/// Blocking iterator over a channel, created by [`Channel::iter`].
pub struct Iter<'a, T> {
    channel: &'a Channel<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.channel.recv()
    }
}

impl<'a, T> IntoIterator for &'a Channel<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
