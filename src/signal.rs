use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A single observer callback linked into a [`Signal`].
///
/// Slots are reference counted; the signal itself only holds weak links,
/// so whoever owns the slot controls how long it stays connected.
pub struct Slot<T> {
    callback: RefCell<Box<dyn FnMut(&T)>>,
}

impl<T> Slot<T> {
    pub fn new(f: impl FnMut(&T) + 'static) -> Rc<Self> {
        Rc::new(Self {
            callback: RefCell::new(Box::new(f)),
        })
    }

    fn call(&self, value: &T) {
        (self.callback.borrow_mut())(value)
    }
}

/// Owns a connected slot; dropping the subscription disconnects the
/// observer.
#[must_use = "dropping a Subscription immediately disconnects the observer"]
pub struct Subscription<T> {
    _slot: Rc<Slot<T>>,
}

/// Per-node multicast sink, delivered during the notify phase of a commit.
///
/// Delivery is sequential and single-threaded. The slot list is
/// snapshotted at the start of each delivery, so a callback may connect or
/// disconnect observers (including itself) without disturbing the
/// in-flight iteration; changes take effect from the next delivery on.
pub struct Signal<T> {
    slots: RefCell<Vec<Weak<Slot<T>>>>,
}

impl<T> Signal<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }

    /// Connects `f` and returns the handle keeping it connected.
    pub fn connect(&self, f: impl FnMut(&T) + 'static) -> Subscription<T> {
        let slot = Slot::new(f);
        self.add(&slot);
        Subscription { _slot: slot }
    }

    /// Links an externally owned slot. The slot stays connected for as
    /// long as the caller keeps it alive.
    pub fn add(&self, slot: &Rc<Slot<T>>) {
        self.slots.borrow_mut().push(Rc::downgrade(slot));
    }

    /// Number of linked, non-expired observers.
    pub fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn emit(&self, value: &T) {
        let (snapshot, garbage) = {
            let slots = self.slots.borrow();
            let mut snapshot = Vec::with_capacity(slots.len());
            let mut garbage = false;
            for weak in slots.iter() {
                match weak.upgrade() {
                    Some(slot) => snapshot.push(slot),
                    None => garbage = true,
                }
            }
            (snapshot, garbage)
        };
        for slot in &snapshot {
            slot.call(value);
        }
        if garbage {
            self.slots.borrow_mut().retain(|w| w.strong_count() > 0);
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn connect_and_emit() {
        let signal = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let hits_ = hits.clone();
        let sub = signal.connect(move |v: &i32| {
            assert_eq!(*v, 42);
            hits_.set(hits_.get() + 1);
        });
        signal.emit(&42);
        signal.emit(&42);
        assert_eq!(hits.get(), 2);
        drop(sub);
        signal.emit(&42);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn dropping_subscription_unlinks_slot() {
        let signal = Signal::<i32>::new();
        let sub = signal.connect(|_| {});
        assert_eq!(signal.len(), 1);
        drop(sub);
        assert_eq!(signal.len(), 0);
        // the expired entry is erased on the next delivery
        signal.emit(&0);
        assert_eq!(signal.slots.borrow().len(), 0);
    }

    #[test]
    fn externally_owned_slot() {
        let signal = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let hits_ = hits.clone();
        let slot = Slot::new(move |_: &i32| hits_.set(hits_.get() + 1));
        signal.add(&slot);
        signal.emit(&1);
        assert_eq!(hits.get(), 1);
        drop(slot);
        signal.emit(&1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn callback_may_disconnect_another_mid_delivery() {
        let signal: Rc<Signal<i32>> = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));

        let victim_slot: Rc<RefCell<Option<Subscription<i32>>>> = Rc::new(RefCell::new(None));
        let victim_ = victim_slot.clone();
        let killer = signal.connect(move |_| {
            victim_.borrow_mut().take();
        });
        let hits_ = hits.clone();
        victim_slot.replace(Some(signal.connect(move |_| hits_.set(hits_.get() + 1))));

        // the snapshot keeps the victim alive for this delivery
        signal.emit(&0);
        assert_eq!(hits.get(), 1);
        signal.emit(&0);
        assert_eq!(hits.get(), 1);
        drop(killer);
    }
}
