#![forbid(unsafe_code)]

//! Signal: a synchronous, reentrancy-safe broadcast primitive.
//!
//! # Design
//!
//! A [`Signal<T, R>`] owns an identity-ordered table of `Weak` references to
//! [`Receiver`]s and dispatches events to every live, unblocked receiver in
//! ascending identity order, which equals subscription order. All state sits
//! behind a single `RefCell` and every operation takes `&self`, so a receiver
//! may legally connect, disconnect, block, or re-emit on the very signal that
//! is invoking it. Dispatch never holds the borrow across a callback; it
//! iterates a dispatch-entry snapshot of identities, re-checking liveness
//! against the table before each call, so mid-dispatch mutation cannot
//! invalidate the traversal.
//!
//! # Ownership
//!
//! Two subscription modes:
//!
//! - **Ad hoc** ([`connect`](Signal::connect)): the caller gets the only
//!   strong reference. Dropping it expires the subscription; the signal
//!   prunes the dead entry lazily on the next dispatch or cull.
//! - **Named** ([`connect_named`](Signal::connect_named)): the signal itself
//!   retains a strong reference under a string key, so the subscription
//!   survives until the key is disconnected, overwritten, or the signal is
//!   dropped.
//!
//! # Invariants
//!
//! 1. Receivers are invoked in strictly ascending identity order.
//! 2. A disconnect requested mid-dispatch never affects the in-progress
//!    iteration; the removal batch is applied exactly once when the
//!    outermost dispatch unwinds, on every exit path (including a panicking
//!    callback).
//! 3. A receiver connected mid-dispatch — whatever its identity, and whether
//!    freshly constructed or attached via [`connect_receiver`](Signal::connect_receiver)
//!    — is not invoked during that dispatch; it fires from the next one on.
//! 4. Blocking is checked at dispatch entry only; it cannot interrupt an
//!    iteration that has already begun.
//!
//! # Failure modes
//!
//! Nothing here panics by design: capacity overflow yields `None`, unknown
//! keys yield `None`/no-ops, and blocked or invalid receivers are silently
//! skipped. A panic raised by a receiver's own callback is the receiver's
//! business and propagates to the `emit` caller.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use crate::receiver::Receiver;
use crate::register::SignalRegister;

/// Callback invoked (with the event argument) each time an `emit` attempt is
/// suppressed by a signal-level block.
type BlockedCallback<T> = Rc<dyn Fn(&T)>;

struct SignalState<T, R> {
    /// Live observer table, keyed and iterated by receiver identity.
    /// Expired entries linger until the next dispatch or cull.
    observers: BTreeMap<u64, Weak<Receiver<T, R>>>,
    /// Strongly owned subscriptions, keyed by caller-chosen name.
    named: HashMap<String, Rc<Receiver<T, R>>>,
    /// Disconnects requested while a dispatch is running. Holding strong
    /// references here keeps the receivers checkable until the batch applies.
    pending: BTreeMap<u64, Rc<Receiver<T, R>>>,
    limit: Option<usize>,
    /// Dispatch nesting depth. Nonzero means removals must be deferred.
    depth: u32,
    blocked: u32,
    called_while_blocked: bool,
    blocked_callback: Option<BlockedCallback<T>>,
}

impl<T, R> SignalState<T, R> {
    fn cull(&mut self) -> usize {
        self.observers.retain(|_, weak| weak.strong_count() > 0);
        self.observers.len()
    }

    /// Lazy capacity check: only counts observers that are actually alive.
    fn has_capacity(&mut self) -> bool {
        match self.limit {
            Some(limit) => self.cull() < limit,
            None => true,
        }
    }

    fn in_dispatch(&self) -> bool {
        self.depth != 0
    }
}

/// A publisher-owned broadcast object. See the [module docs](self) for the
/// dispatch and ownership rules.
///
/// `T` is the event argument type (use a tuple for several values, `()` for
/// none); `R` is the receivers' return type, `()` for plain notification or
/// `bool` for predicate-style receivers.
pub struct Signal<T, R = ()> {
    state: RefCell<SignalState<T, R>>,
}

impl<T, R> Default for Signal<T, R> {
    fn default() -> Self {
        Self {
            state: RefCell::new(SignalState {
                observers: BTreeMap::new(),
                named: HashMap::new(),
                pending: BTreeMap::new(),
                limit: None,
                depth: 0,
                blocked: 0,
                called_while_blocked: false,
                blocked_callback: None,
            }),
        }
    }
}

impl<T: 'static, R: Default + 'static> Signal<T, R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A restricted view of this signal that forwards everything except
    /// [`emit`](Signal::emit). Expose this to subscribers while keeping the
    /// signal itself private.
    #[must_use]
    pub fn register(&self) -> SignalRegister<'_, T, R> {
        SignalRegister::new(self)
    }

    /// Subscribe `callback` ad hoc. Returns `None` when an observer limit is
    /// set and already met (counting live observers only).
    ///
    /// The signal holds only a weak reference: drop the returned `Rc` and
    /// the subscription expires, to be pruned on the next dispatch or cull.
    #[must_use = "dropping the returned receiver cancels the subscription"]
    pub fn connect(&self, callback: impl Fn(&T) -> R + 'static) -> Option<Rc<Receiver<T, R>>> {
        let mut state = self.state.borrow_mut();
        if !state.has_capacity() {
            tracing::debug!(limit = ?state.limit, "connect rejected, observer limit reached");
            return None;
        }
        let receiver = Receiver::new(callback);
        state.observers.insert(receiver.id(), Rc::downgrade(&receiver));
        tracing::trace!(id = receiver.id(), "observer connected");
        Some(receiver)
    }

    /// Attach an already-constructed receiver. Returns `false` when the
    /// receiver is already present (identity dedup) or the observer limit is
    /// met, `true` otherwise.
    pub fn connect_receiver(&self, receiver: &Rc<Receiver<T, R>>) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.has_capacity() {
            tracing::debug!(
                id = receiver.id(),
                limit = ?state.limit,
                "receiver attach rejected, observer limit reached"
            );
            return false;
        }
        if state.observers.contains_key(&receiver.id()) {
            return false;
        }
        state.observers.insert(receiver.id(), Rc::downgrade(receiver));
        tracing::trace!(id = receiver.id(), "existing receiver attached");
        true
    }

    /// Subscribe `callback` under `key`, with the signal itself keeping the
    /// receiver alive. Re-using a key replaces the previous subscription
    /// (last write wins).
    ///
    /// The displaced owner is dropped without pruning its observer entry;
    /// the expired entry falls out on the next dispatch or cull.
    ///
    /// Returns `None` under the same capacity rule as
    /// [`connect`](Signal::connect), in which case nothing is stored.
    pub fn connect_named(
        &self,
        key: impl Into<String>,
        callback: impl Fn(&T) -> R + 'static,
    ) -> Option<Rc<Receiver<T, R>>> {
        let receiver = self.connect(callback)?;
        let displaced = self
            .state
            .borrow_mut()
            .named
            .insert(key.into(), Rc::clone(&receiver));
        // The displaced receiver may run a closure destructor when it dies;
        // the state borrow is already released here.
        drop(displaced);
        Some(receiver)
    }

    /// Look up the named subscription at `key`.
    #[must_use]
    pub fn connection(&self, key: &str) -> Option<Rc<Receiver<T, R>>> {
        self.state.borrow().named.get(key).cloned()
    }

    /// Whether a named subscription exists at `key`.
    #[must_use]
    pub fn connected(&self, key: &str) -> bool {
        self.state.borrow().named.contains_key(key)
    }

    /// Remove `receiver` from the observer table. Mid-dispatch the removal
    /// is deferred: the in-progress iteration is unaffected and the entry is
    /// gone before the next dispatch begins.
    pub fn disconnect(&self, receiver: &Rc<Receiver<T, R>>) {
        let mut state = self.state.borrow_mut();
        if state.in_dispatch() {
            state.pending.insert(receiver.id(), Rc::clone(receiver));
        } else {
            state.observers.remove(&receiver.id());
        }
        tracing::trace!(
            id = receiver.id(),
            deferred = state.in_dispatch(),
            "observer disconnected"
        );
    }

    /// Disconnect the named subscription at `key` (same deferral rule as
    /// [`disconnect`](Signal::disconnect)) and erase the key. Unknown keys
    /// are a no-op.
    pub fn disconnect_named(&self, key: &str) {
        let _removed = {
            let mut state = self.state.borrow_mut();
            match state.named.remove(key) {
                Some(receiver) => {
                    if state.in_dispatch() {
                        state.pending.insert(receiver.id(), Rc::clone(&receiver));
                    } else {
                        state.observers.remove(&receiver.id());
                    }
                    tracing::trace!(key, id = receiver.id(), "named subscription disconnected");
                    Some(receiver)
                }
                None => None,
            }
        };
        // `_removed` drops here, after the state borrow is released.
    }

    /// Drop every subscription, named and ad hoc.
    ///
    /// Named owners are released before anything else, so receivers kept
    /// alive only by the name table expire immediately (and are skipped by
    /// any iteration still in flight). When idle the observer table is
    /// cleared outright; mid-dispatch every still-live entry is snapshotted
    /// into the pending batch instead, and the table empties once the
    /// outermost dispatch completes.
    pub fn clear(&self) {
        // Named owners and any already-queued disconnect owners are released
        // first, and never under the state borrow: a receiver's closure
        // destructor may call back into this signal. Receivers with no other
        // owner expire here and are skipped by an iteration still in flight.
        let released = {
            let mut state = self.state.borrow_mut();
            let named: Vec<_> = state.named.drain().map(|(_, receiver)| receiver).collect();
            (named, std::mem::take(&mut state.pending))
        };
        drop(released);

        let mut state = self.state.borrow_mut();
        if state.in_dispatch() {
            let live: Vec<_> = state
                .observers
                .values()
                .filter_map(Weak::upgrade)
                .collect();
            for receiver in live {
                state.pending.insert(receiver.id(), receiver);
            }
        } else {
            state.observers.clear();
        }
        tracing::trace!(deferred = state.in_dispatch(), "signal cleared");
    }

    /// Block the signal: `emit` attempts skip every receiver until a
    /// matching [`unblock`](Signal::unblock). Blocks nest. Entering the
    /// blocked state (depth 0 to 1) resets the fired-while-blocked flag.
    pub fn block(&self) {
        let mut state = self.state.borrow_mut();
        if state.blocked == 0 {
            state.called_while_blocked = false;
        }
        state.blocked += 1;
    }

    /// Undo one [`block`](Signal::block). Returns `true` iff this call left
    /// the blocked state *and* at least one `emit` attempt occurred while
    /// blocked; the flag resets on return. Still-nested or unbalanced calls
    /// return `false` (the counter clamps at zero).
    pub fn unblock(&self) -> bool {
        let mut state = self.state.borrow_mut();
        match state.blocked {
            0 => false,
            1 => {
                state.blocked = 0;
                std::mem::take(&mut state.called_while_blocked)
            }
            _ => {
                state.blocked -= 1;
                false
            }
        }
    }

    #[must_use]
    pub fn blocked(&self) -> bool {
        self.state.borrow().blocked != 0
    }

    /// Install a callback invoked with the event argument each time an
    /// `emit` attempt is suppressed by a block.
    pub fn set_blocked_callback(&self, callback: impl Fn(&T) + 'static) {
        self.state.borrow_mut().blocked_callback = Some(Rc::new(callback));
    }

    pub fn clear_blocked_callback(&self) {
        let _dropped = self.state.borrow_mut().blocked_callback.take();
    }

    /// Dispatch one event: invoke every live, unblocked receiver with `arg`,
    /// in ascending identity (= subscription) order.
    ///
    /// While blocked, the iteration is skipped entirely; the
    /// fired-while-blocked flag is set and the blocked callback (if any)
    /// runs with `arg`. The same applies after the iteration when a receiver
    /// blocked the signal mid-dispatch.
    ///
    /// Receivers connected during the dispatch are not invoked by it;
    /// disconnects requested during the dispatch take effect just after it.
    /// Expired entries encountered along the way are pruned in place.
    pub fn emit(&self, arg: &T) {
        if !self.blocked() {
            let _dispatch = DispatchGuard::enter(&self.state);

            // Snapshot the key set at entry: receivers connected from inside
            // a callback — whatever their identity — wait for the next
            // dispatch. Liveness is re-checked against the table just before
            // each call, so a receiver expiring mid-dispatch is skipped.
            let snapshot: Vec<u64> = self.state.borrow().observers.keys().copied().collect();
            tracing::trace!(observers = snapshot.len(), "dispatch started");
            for id in snapshot {
                // Resolve the next receiver without holding the borrow
                // across its callback. Expired entries are erased in place.
                let next = {
                    let mut state = self.state.borrow_mut();
                    match state.observers.get(&id).map(Weak::upgrade) {
                        Some(Some(receiver)) => Some(receiver),
                        Some(None) => {
                            state.observers.remove(&id);
                            None
                        }
                        None => None,
                    }
                };
                if let Some(receiver) = next {
                    receiver.notify(arg);
                }
            }
        }

        // A receiver may have blocked the signal mid-dispatch; that still
        // counts as a suppressed attempt.
        if self.blocked() {
            let callback = {
                let mut state = self.state.borrow_mut();
                state.called_while_blocked = true;
                state.blocked_callback.clone()
            };
            tracing::trace!("emit suppressed while blocked");
            if let Some(callback) = callback {
                callback(arg);
            }
        }
    }

    /// Purge expired observer entries and return the live count.
    pub fn cull_dead_observers(&self) -> usize {
        self.state.borrow_mut().cull()
    }

    /// Current observer table size, *including* expired entries not yet
    /// pruned. Compare with [`cull_dead_observers`](Signal::cull_dead_observers)
    /// for the live count.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Cap the number of concurrently live subscriptions. The cap is checked
    /// lazily on each connect attempt, after pruning expired entries.
    pub fn set_observer_limit(&self, limit: usize) {
        self.state.borrow_mut().limit = Some(limit);
    }

    pub fn clear_observer_limit(&self) {
        self.state.borrow_mut().limit = None;
    }

    #[must_use]
    pub fn observer_limit(&self) -> Option<usize> {
        self.state.borrow().limit
    }
}

impl<T, R> std::fmt::Debug for Signal<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Signal")
            .field("observers", &state.observers.len())
            .field("named", &state.named.len())
            .field("block_depth", &state.blocked)
            .field("dispatch_depth", &state.depth)
            .field("limit", &state.limit)
            .finish()
    }
}

/// Marks a dispatch in progress; on drop (any exit path, including a
/// panicking callback) the outermost guard applies the pending-disconnect
/// batch exactly once.
struct DispatchGuard<'a, T, R> {
    state: &'a RefCell<SignalState<T, R>>,
}

impl<'a, T, R> DispatchGuard<'a, T, R> {
    fn enter(state: &'a RefCell<SignalState<T, R>>) -> Self {
        state.borrow_mut().depth += 1;
        Self { state }
    }
}

impl<T, R> Drop for DispatchGuard<'_, T, R> {
    fn drop(&mut self) {
        let pending = {
            let mut state = self.state.borrow_mut();
            state.depth -= 1;
            if state.depth == 0 {
                let pending = std::mem::take(&mut state.pending);
                for id in pending.keys() {
                    state.observers.remove(id);
                }
                pending
            } else {
                BTreeMap::new()
            }
        };
        // Receiver drops can run arbitrary closure destructors; never hold
        // the state borrow while they do.
        drop(pending);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
