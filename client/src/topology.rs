//! The client's current topology and the observers of its changes.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use ribbon_types::Topology;

type Observer = Box<dyn FnMut(&str)>;

#[derive(Default)]
struct Inner {
    current: RefCell<Rc<Topology>>,
    observers: RefCell<Vec<Observer>>,
}

/// Shared between the client and its push subscription.
#[derive(Clone, Default)]
pub(crate) struct TopologyState(Rc<Inner>);

impl TopologyState {
    pub(crate) fn snapshot(&self) -> Rc<Topology> {
        Rc::clone(&self.0.current.borrow())
    }

    pub(crate) fn replace(&self, topology: Topology) {
        *self.0.current.borrow_mut() = Rc::new(topology);
    }

    pub(crate) fn observe(&self, observer: Observer) {
        self.0.observers.borrow_mut().push(observer);
    }

    pub(crate) fn view(&self) -> TopologyView {
        TopologyView(self.clone())
    }

    /// Apply a `topologyChange` payload and notify observers with it.
    ///
    /// An unparseable payload leaves the topology as it was; observers still
    /// see the raw payload.
    pub(crate) fn apply_change(&self, payload: &str) {
        match Topology::parse(payload) {
            Ok(topology) => {
                tracing::info!(services = topology.len(), "Topology changed");
                self.replace(topology);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid topology payload");
            }
        }
        self.notify(payload);
    }

    fn notify(&self, payload: &str) {
        // Observers may register more observers while running.
        let mut running = mem::take(&mut *self.0.observers.borrow_mut());
        for observer in &mut running {
            observer(payload);
        }
        let mut observers = self.0.observers.borrow_mut();
        let added = mem::replace(&mut *observers, running);
        observers.extend(added);
    }
}

/// Read-only access to the latest topology, independent of the client's
/// lifetime.
#[derive(Clone)]
pub struct TopologyView(TopologyState);

impl TopologyView {
    #[must_use]
    pub fn current(&self) -> Rc<Topology> {
        self.0.snapshot()
    }
}

impl fmt::Debug for TopologyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TopologyView").field(&self.current()).finish()
    }
}
