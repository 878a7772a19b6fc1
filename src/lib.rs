//! Go-style channels for cooperating threads.
//!
//! This crate provides a typed, bounded, FIFO channel with an explicit
//! *closed* state, and a multi-way `select` over several such channels.
//!
//! # Key Features
//!
//! - **Bounded FIFO**: capacity 0 makes every send a rendezvous with a
//!   receive; capacity `n` lets up to `n` sends complete without one.
//! - **Multi-producer multi-consumer**: a [`Channel`] is a cloneable handle;
//!   any thread may send, receive or close.
//! - **Close and drain**: closing fails blocked senders and receivers, but
//!   values buffered before the close stay receivable until drained, so
//!   iteration terminates deterministically.
//! - **Select**: [`Select`] races receives on any number of channels,
//!   completes exactly one, and cancels the rest; an optional default branch
//!   makes it non-blocking.
//! - **No panicking paths**: closed, empty and cancelled outcomes are all
//!   ordinary return values.
//!
//! # Example
//!
//! ```rust
//! use sluice::{Channel, Select};
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let numbers: Channel<i32> = Channel::new(2);
//! let words: Channel<&str> = Channel::new(2);
//!
//! let sender = numbers.clone();
//! thread::spawn(move || {
//!     sender.send(10);
//! });
//!
//! let seen = Arc::new(AtomicI32::new(0));
//! let sum = seen.clone();
//! let handled = Select::new()
//!     .recv(&numbers, move |n| {
//!         sum.fetch_add(n, Ordering::Relaxed);
//!     })
//!     .recv(&words, |w| println!("word: {w}"))
//!     .run();
//!
//! assert!(handled);
//! assert_eq!(seen.load(Ordering::Relaxed), 10);
//! ```

#![warn(missing_docs)]

mod channel;
mod select;
mod signal;

pub use channel::{Channel, Iter, TryRecvError};
pub use select::{Select, SelectWithDefault};
