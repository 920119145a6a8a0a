// Event - Single-threaded broadcast to subscribed handlers
// Subscriber list is copy-on-write so handlers may (un)subscribe while invoked

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`EventControl::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Rc<dyn Fn(&T)>;

/// Broadcasts an event to every handler, in subscription order.
///
/// `invoke` walks a snapshot of the list: a handler added during
/// invocation is first called on the next event, one removed during
/// invocation still receives the current one.
pub struct EventControl<T> {
    handlers: RefCell<Rc<Vec<(SubscriptionId, Handler<T>)>>>,
    next_id: Cell<u64>,
}

impl<T> EventControl<T> {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Rc::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> SubscriptionId {
        self.subscribe_rc(Rc::new(handler))
    }

    /// Subscribes an already shared handler
    pub fn subscribe_rc(&self, handler: Rc<dyn Fn(&T)>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let mut handlers = self.handlers.borrow_mut();
        Rc::make_mut(&mut handlers).push((id, handler));
        id
    }

    /// Returns false when the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(index) = handlers.iter().position(|(entry, _)| *entry == id) else {
            return false;
        };
        Rc::make_mut(&mut handlers).remove(index);
        true
    }

    pub fn clear(&self) {
        *self.handlers.borrow_mut() = Rc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invoke(&self, event: &T) {
        let snapshot = Rc::clone(&self.handlers.borrow());
        for (_, handler) in snapshot.iter() {
            handler(event);
        }
    }
}

impl<T> Default for EventControl<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventControl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventControl")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_in_subscription_order() {
        let event = EventControl::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = log.clone();
            event.subscribe(move |value: &u32| log.borrow_mut().push(format!("{tag}{value}")));
        }

        event.invoke(&1);
        event.invoke(&2);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let event = EventControl::<()>::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        let id = event.subscribe(move |_| counter.set(counter.get() + 1));
        event.invoke(&());

        assert!(event.unsubscribe(id));
        assert!(!event.unsubscribe(id));
        event.invoke(&());
        assert_eq!(count.get(), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn test_subscribe_during_invoke_applies_to_next_event() {
        let event = Rc::new(EventControl::<()>::new());
        let count = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&event);
        let counter = count.clone();
        event.subscribe(move |_| {
            if let Some(event) = weak.upgrade() {
                let counter = counter.clone();
                event.subscribe(move |_| counter.set(counter.get() + 1));
            }
        });

        event.invoke(&());
        assert_eq!(count.get(), 0);
        assert_eq!(event.len(), 2);

        event.invoke(&());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_unsubscribe_during_invoke_still_delivers_current_event() {
        let event = Rc::new(EventControl::<()>::new());
        let count = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&event);
        let target = second.clone();
        event.subscribe(move |_| {
            if let (Some(event), Some(id)) = (weak.upgrade(), target.get()) {
                event.unsubscribe(id);
            }
        });
        let counter = count.clone();
        second.set(Some(event.subscribe(move |_| counter.set(counter.get() + 1))));

        event.invoke(&());
        assert_eq!(count.get(), 1);
        event.invoke(&());
        assert_eq!(count.get(), 1);
    }
}
