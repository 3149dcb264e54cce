#![forbid(unsafe_code)]

//! Receiver: the unit of subscription identity.
//!
//! A [`Receiver`] wraps one callback together with a process-wide unique,
//! monotonically increasing identity and an independent block counter.
//! Identities order and deduplicate receivers inside a
//! [`Signal`](crate::Signal)'s observer table; callbacks themselves are
//! opaque and cannot be compared.
//!
//! Receivers are only ever handed out as `Rc<Receiver>`. Whoever holds the
//! last strong reference controls the receiver's lifetime; a signal keeps
//! only a `Weak` for ad hoc subscriptions.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity source shared by every receiver in the process, regardless of
/// which signal (or how many) ends up holding it. Identities start at 1 and
/// are never reused.
static NEXT_RECEIVER_ID: AtomicU64 = AtomicU64::new(1);

fn next_receiver_id() -> u64 {
    NEXT_RECEIVER_ID.fetch_add(1, Ordering::Relaxed)
}

/// The stored callable. `R` is `()` for plain notification callbacks and
/// `bool` for predicate-style callbacks.
type Callback<T, R> = Box<dyn Fn(&T) -> R>;

/// A single subscription: one callback, one identity, one block counter.
///
/// Receivers compare and order by identity only. Subscription order across
/// the lifetime of a signal equals ascending identity order, since identities
/// are assigned at construction time from a single monotonic counter.
pub struct Receiver<T, R = ()> {
    id: u64,
    callback: Option<Callback<T, R>>,
    blocked: Cell<u32>,
}

impl<T: 'static, R: Default + 'static> Receiver<T, R> {
    /// Create a receiver wrapping `callback`. The next process-wide identity
    /// is assigned; there is no failure mode.
    #[must_use]
    pub fn new(callback: impl Fn(&T) -> R + 'static) -> Rc<Self> {
        Rc::new(Self {
            id: next_receiver_id(),
            callback: Some(Box::new(callback)),
            blocked: Cell::new(0),
        })
    }

    /// Create a permanently invalid receiver: it has an identity and can be
    /// connected, blocked, and ordered like any other, but [`notify`] on it
    /// is a silent no-op.
    ///
    /// [`notify`]: Receiver::notify
    #[must_use]
    pub fn invalid() -> Rc<Self> {
        Rc::new(Self {
            id: next_receiver_id(),
            callback: None,
            blocked: Cell::new(0),
        })
    }

    /// Invoke the callback with `arg`.
    ///
    /// Returns `R::default()` without calling anything when the receiver is
    /// blocked or invalid. For the predicate form (`R = bool`) that default
    /// is `false`.
    pub fn notify(&self, arg: &T) -> R {
        if self.blocked() {
            return R::default();
        }
        match &self.callback {
            Some(callback) => callback(arg),
            None => R::default(),
        }
    }
}

impl<T, R> Receiver<T, R> {
    /// The receiver's identity. Strictly increasing across all receivers
    /// ever created in this process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a callback is present. An invalid receiver stays invalid for
    /// its whole lifetime.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.callback.is_some()
    }

    /// Increment the block counter. While blocked, [`notify`] does nothing.
    /// Blocks nest; each `block` needs a matching [`unblock`].
    ///
    /// [`notify`]: Receiver::notify
    /// [`unblock`]: Receiver::unblock
    pub fn block(&self) {
        self.blocked.set(self.blocked.get() + 1);
    }

    /// Decrement the block counter, clamping at zero. Unbalanced calls are
    /// harmless.
    pub fn unblock(&self) {
        self.blocked.set(self.blocked.get().saturating_sub(1));
    }

    #[must_use]
    pub fn blocked(&self) -> bool {
        self.blocked.get() != 0
    }
}

impl<T, R> PartialEq for Receiver<T, R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T, R> Eq for Receiver<T, R> {}

impl<T, R> PartialOrd for Receiver<T, R> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, R> Ord for Receiver<T, R> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T, R> std::fmt::Debug for Receiver<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .field("block_depth", &self.blocked.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_are_strictly_increasing() {
        let a = Receiver::<i32>::new(|_| {});
        let b = Receiver::<i32>::new(|_| {});
        let c = Receiver::<(), bool>::new(|_| true);
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
    }

    #[test]
    fn notify_calls_the_callback() {
        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        let receiver = Receiver::new(move |value: &i32| seen_clone.set(*value));

        receiver.notify(&7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn predicate_returns_callback_result() {
        let receiver = Receiver::<i32, bool>::new(|value| *value > 10);
        assert!(receiver.notify(&11));
        assert!(!receiver.notify(&9));
    }

    #[test]
    fn blocked_receiver_is_silent() {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let receiver = Receiver::new(move |_: &()| count_clone.set(count_clone.get() + 1));

        receiver.block();
        receiver.notify(&());
        assert_eq!(count.get(), 0);

        receiver.unblock();
        receiver.notify(&());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn blocked_predicate_returns_false() {
        let receiver = Receiver::<(), bool>::new(|_| true);
        receiver.block();
        assert!(!receiver.notify(&()));
    }

    #[test]
    fn block_nests() {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let receiver = Receiver::new(move |_: &()| count_clone.set(count_clone.get() + 1));

        receiver.block();
        receiver.block();
        receiver.unblock();
        assert!(receiver.blocked());
        receiver.notify(&());
        assert_eq!(count.get(), 0);

        receiver.unblock();
        assert!(!receiver.blocked());
        receiver.notify(&());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unblock_clamps_at_zero() {
        let receiver = Receiver::<()>::new(|_| {});
        receiver.unblock();
        receiver.unblock();
        assert!(!receiver.blocked());

        // A single block still takes effect after the unbalanced unblocks.
        receiver.block();
        assert!(receiver.blocked());
        receiver.unblock();
        assert!(!receiver.blocked());
    }

    #[test]
    fn invalid_receiver_is_a_no_op() {
        let receiver = Receiver::<i32>::invalid();
        assert!(!receiver.is_valid());
        receiver.notify(&1); // Nothing to call; must not panic.
    }

    #[test]
    fn invalid_predicate_returns_false() {
        let receiver = Receiver::<i32, bool>::invalid();
        assert!(!receiver.notify(&1));
    }

    #[test]
    fn ordering_is_by_identity() {
        let a = Receiver::<()>::new(|_| {});
        let b = Receiver::<()>::new(|_| {});
        assert!(a < b);
        assert!(b > a);
        assert_eq!(a, a);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_format() {
        let receiver = Receiver::<()>::new(|_| {});
        let dbg = format!("{receiver:?}");
        assert!(dbg.contains("Receiver"));
        assert!(dbg.contains("valid: true"));
    }
}
