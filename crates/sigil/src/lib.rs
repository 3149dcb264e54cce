#![forbid(unsafe_code)]

//! Synchronous signal/observer primitive with reentrancy-safe dispatch.
//!
//! # Role
//! `sigil` is an in-process, single-call-stack notification bus: many
//! independently-lifetimed listeners subscribe to a [`Signal`] and get
//! invoked, in subscription order, each time the publisher emits. It is not
//! a message broker — there is no cross-thread delivery, no queueing, and no
//! payload serialization.
//!
//! # Pieces
//! - [`Receiver`]: one subscription — a callback plus a process-wide unique
//!   identity and its own nested block counter.
//! - [`Signal`]: the publisher-owned broadcast object — weak, identity-ordered
//!   observer tracking, string-keyed owned subscriptions, nested blocking,
//!   an optional observer limit, and a dispatch loop that stays correct when
//!   listeners connect, disconnect, clear, block, or re-emit from inside
//!   their own callback.
//! - [`SignalRegister`]: a borrow of a `Signal` exposing everything except
//!   `emit`, so a type can publish "subscribe here" access while keeping the
//!   ability to fire the event to itself.
//!
//! # Example
//! ```
//! use sigil::Signal;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let on_finish = Signal::new();
//! let hits = Rc::new(Cell::new(0u32));
//!
//! let hits_sub = Rc::clone(&hits);
//! let _sub = on_finish.connect(move |step: &u32| hits_sub.set(hits_sub.get() + *step));
//!
//! on_finish.emit(&2);
//! on_finish.emit(&3);
//! assert_eq!(hits.get(), 5);
//! ```
//!
//! # Threading
//! Everything here is `Rc`/`Cell` based and deliberately single-threaded;
//! reentrancy from the same call stack is fully supported, concurrent use
//! from multiple threads is not expressible (the types are `!Send`/`!Sync`).

pub mod receiver;
pub mod register;
pub mod signal;

pub use receiver::Receiver;
pub use register::SignalRegister;
pub use signal::Signal;
