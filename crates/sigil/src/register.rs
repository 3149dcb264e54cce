#![forbid(unsafe_code)]

//! Restricted signal façade.
//!
//! A [`SignalRegister`] borrows a [`Signal`] and forwards every operation
//! except [`emit`](Signal::emit). A publisher keeps its `Signal` private and
//! hands out the register, so outside code can manage subscriptions but only
//! the publisher can fire the event. The borrow ties the register's validity
//! to the signal's lifetime.

use std::rc::Rc;

use crate::receiver::Receiver;
use crate::signal::Signal;

/// A subscription-management view of a [`Signal`] with no way to emit.
/// Obtained from [`Signal::register`]; cheap to copy.
pub struct SignalRegister<'a, T, R = ()> {
    signal: &'a Signal<T, R>,
}

impl<T, R> Clone for SignalRegister<'_, T, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, R> Copy for SignalRegister<'_, T, R> {}

impl<'a, T: 'static, R: Default + 'static> SignalRegister<'a, T, R> {
    #[must_use]
    pub fn new(signal: &'a Signal<T, R>) -> Self {
        Self { signal }
    }

    /// See [`Signal::connect`].
    #[must_use = "dropping the returned receiver cancels the subscription"]
    pub fn connect(&self, callback: impl Fn(&T) -> R + 'static) -> Option<Rc<Receiver<T, R>>> {
        self.signal.connect(callback)
    }

    /// See [`Signal::connect_receiver`].
    pub fn connect_receiver(&self, receiver: &Rc<Receiver<T, R>>) -> bool {
        self.signal.connect_receiver(receiver)
    }

    /// See [`Signal::connect_named`].
    pub fn connect_named(
        &self,
        key: impl Into<String>,
        callback: impl Fn(&T) -> R + 'static,
    ) -> Option<Rc<Receiver<T, R>>> {
        self.signal.connect_named(key, callback)
    }

    /// See [`Signal::connection`].
    #[must_use]
    pub fn connection(&self, key: &str) -> Option<Rc<Receiver<T, R>>> {
        self.signal.connection(key)
    }

    /// See [`Signal::connected`].
    #[must_use]
    pub fn connected(&self, key: &str) -> bool {
        self.signal.connected(key)
    }

    /// See [`Signal::disconnect`].
    pub fn disconnect(&self, receiver: &Rc<Receiver<T, R>>) {
        self.signal.disconnect(receiver);
    }

    /// See [`Signal::disconnect_named`].
    pub fn disconnect_named(&self, key: &str) {
        self.signal.disconnect_named(key);
    }

    /// See [`Signal::clear`].
    pub fn clear(&self) {
        self.signal.clear();
    }

    /// See [`Signal::block`].
    pub fn block(&self) {
        self.signal.block();
    }

    /// See [`Signal::unblock`].
    pub fn unblock(&self) -> bool {
        self.signal.unblock()
    }

    /// See [`Signal::blocked`].
    #[must_use]
    pub fn blocked(&self) -> bool {
        self.signal.blocked()
    }

    /// See [`Signal::set_blocked_callback`].
    pub fn set_blocked_callback(&self, callback: impl Fn(&T) + 'static) {
        self.signal.set_blocked_callback(callback);
    }

    /// See [`Signal::clear_blocked_callback`].
    pub fn clear_blocked_callback(&self) {
        self.signal.clear_blocked_callback();
    }

    /// See [`Signal::cull_dead_observers`].
    pub fn cull_dead_observers(&self) -> usize {
        self.signal.cull_dead_observers()
    }

    /// See [`Signal::observer_count`].
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.signal.observer_count()
    }

    /// See [`Signal::set_observer_limit`].
    pub fn set_observer_limit(&self, limit: usize) {
        self.signal.set_observer_limit(limit);
    }

    /// See [`Signal::clear_observer_limit`].
    pub fn clear_observer_limit(&self) {
        self.signal.clear_observer_limit();
    }

    /// See [`Signal::observer_limit`].
    #[must_use]
    pub fn observer_limit(&self) -> Option<usize> {
        self.signal.observer_limit()
    }
}

impl<T, R> std::fmt::Debug for SignalRegister<'_, T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRegister")
            .field("signal", self.signal)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// The intended usage shape: a publisher owning the signal privately and
    /// exposing a register.
    struct Counter {
        value: i32,
        on_change: Signal<i32>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                value: 0,
                on_change: Signal::new(),
            }
        }

        fn on_change(&self) -> SignalRegister<'_, i32> {
            self.on_change.register()
        }

        fn increment(&mut self) {
            self.value += 1;
            self.on_change.emit(&self.value);
        }
    }

    #[test]
    fn publisher_fires_subscribers_attach() {
        let mut counter = Counter::new();
        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        let _sub = counter
            .on_change()
            .connect(move |value| seen_clone.set(*value));

        counter.increment();
        counter.increment();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn register_forwards_named_operations() {
        let signal = Signal::<()>::new();
        let register = signal.register();

        let _ = register.connect_named("k", |_| {});
        assert!(register.connected("k"));
        assert!(register.connection("k").is_some());
        register.disconnect_named("k");
        assert!(!register.connected("k"));
    }

    #[test]
    fn register_forwards_blocking_and_limits() {
        let signal = Signal::<()>::new();
        let register = signal.register();

        register.set_observer_limit(1);
        assert_eq!(register.observer_limit(), Some(1));
        let a = register.connect(|_| {}).unwrap();
        assert!(register.connect(|_| {}).is_none());
        register.clear_observer_limit();
        let _b = register.connect(|_| {}).unwrap();

        register.block();
        assert!(register.blocked());
        signal.emit(&());
        assert!(register.unblock());

        register.disconnect(&a);
        assert_eq!(register.cull_dead_observers(), 1);

        register.clear();
        assert_eq!(register.observer_count(), 0);
    }

    #[test]
    fn register_is_copy() {
        let signal = Signal::<()>::new();
        let register = signal.register();
        let other = register;
        let _ = register.connect(|_| {}); // Both copies stay usable.
        assert_eq!(other.observer_count(), 1);
    }
}
