use std::cell::RefCell;
use std::fmt;
use std::future::IntoFuture;
use std::mem;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use tokio::sync::oneshot;

use crate::error::ResolutionError;
use crate::resolution::{Resolution, Resolver};
use crate::schedule::defer;

/// Where an [`Eventual`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// The final outcome of an [`Eventual`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settlement<T, E> {
    #[must_use]
    pub const fn state(&self) -> State {
        match self {
            Self::Fulfilled(_) => State::Fulfilled,
            Self::Rejected(_) => State::Rejected,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(cause) => Err(cause),
        }
    }
}

/// What a handler hands back: `Ok` resolves the dependent, `Err` rejects it.
pub type Outcome<T, E> = Result<Resolution<T, E>, E>;

/// A boxed fulfilment or rejection handler taking `A`.
pub type Handler<A, T, E> = Box<dyn FnOnce(A) -> Outcome<T, E>>;

pub(crate) type Reaction<T, E> = Box<dyn FnOnce(Settlement<T, E>)>;

enum Slot<T, E> {
    Pending(Vec<Reaction<T, E>>),
    Settled(Settlement<T, E>),
}

/// A value that is fulfilled or rejected at most once, some time later.
///
/// Cloning an `Eventual` yields another handle to the same slot. Handles can
/// observe and chain on the value but cannot settle it; settlement goes
/// through a [`Resolver`] (see [`Eventual::new`] and [`crate::Deferred`]).
///
/// ```rust
/// use ribbon_core::{Deferred, Resolution};
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # runtime.block_on(tokio::task::LocalSet::new().run_until(async {
/// let deferred = Deferred::<u32, String>::new();
/// let doubled = deferred.eventual().and_then(|n| Ok(Resolution::Value(n * 2)));
/// deferred.resolve(21);
/// assert_eq!(doubled.await, Ok(42));
/// # }));
/// ```
pub struct Eventual<T, E> {
    slot: Rc<RefCell<Slot<T, E>>>,
}

impl<T, E> Clone for Eventual<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T, E> Eventual<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ResolutionError> + 'static,
{
    /// A pending value with no resolver. It never settles.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Pending(Vec::new()))),
        }
    }

    /// Create a pending value and hand its resolver to `initializer`, which
    /// runs synchronously before this returns.
    pub fn new(initializer: impl FnOnce(Resolver<T, E>)) -> Self {
        let eventual = Self::pending();
        initializer(Resolver::new(&eventual));
        eventual
    }

    #[must_use]
    pub fn fulfilled(value: T) -> Self {
        let eventual = Self::pending();
        eventual.fulfill(value);
        eventual
    }

    #[must_use]
    pub fn rejected(cause: E) -> Self {
        let eventual = Self::pending();
        eventual.reject(cause);
        eventual
    }

    #[must_use]
    pub fn state(&self) -> State {
        match &*self.slot.borrow() {
            Slot::Pending(_) => State::Pending,
            Slot::Settled(settlement) => settlement.state(),
        }
    }

    /// The outcome, once there is one.
    #[must_use]
    pub fn settlement(&self) -> Option<Settlement<T, E>> {
        match &*self.slot.borrow() {
            Slot::Pending(_) => None,
            Slot::Settled(settlement) => Some(settlement.clone()),
        }
    }

    /// Whether both handles refer to the same slot.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    /// Register handlers and return the dependent value they settle.
    ///
    /// A missing fulfilment handler passes the value through; a missing
    /// rejection handler passes the cause through. Neither handler runs
    /// before the current task yields back to the `LocalSet`.
    pub fn then(
        &self,
        on_fulfilled: Option<Handler<T, T, E>>,
        on_rejected: Option<Handler<E, T, E>>,
    ) -> Self {
        self.register(move |settlement| match settlement {
            Settlement::Fulfilled(value) => match on_fulfilled {
                Some(handler) => handler(value),
                None => Ok(Resolution::Value(value)),
            },
            Settlement::Rejected(cause) => match on_rejected {
                Some(handler) => handler(cause),
                None => Err(cause),
            },
        })
    }

    /// Chain a fulfilment handler; rejections pass through untouched.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Eventual<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Outcome<U, E> + 'static,
    {
        self.register(move |settlement| match settlement {
            Settlement::Fulfilled(value) => on_fulfilled(value),
            Settlement::Rejected(cause) => Err(cause),
        })
    }

    /// Chain a rejection handler; fulfilled values pass through untouched.
    pub fn or_else<F>(&self, on_rejected: F) -> Self
    where
        F: FnOnce(E) -> Outcome<T, E> + 'static,
    {
        self.register(move |settlement| match settlement {
            Settlement::Fulfilled(value) => Ok(Resolution::Value(value)),
            Settlement::Rejected(cause) => on_rejected(cause),
        })
    }

    pub fn map<U, F>(&self, f: F) -> Eventual<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.and_then(move |value| Ok(Resolution::Value(f(value))))
    }

    fn register<U, F>(&self, handler: F) -> Eventual<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(Settlement<T, E>) -> Outcome<U, E> + 'static,
    {
        let dependent = Eventual::<U, E>::pending();
        let target = dependent.clone();
        self.react(Box::new(move |settlement| match handler(settlement) {
            Ok(resolution) => target.resolve(resolution),
            Err(cause) => target.reject(cause),
        }));
        dependent
    }

    /// Queue `reaction` for delivery once this value settles.
    pub(crate) fn react(&self, reaction: Reaction<T, E>) {
        let settlement = match &mut *self.slot.borrow_mut() {
            Slot::Pending(reactions) => {
                reactions.push(reaction);
                return;
            }
            Slot::Settled(settlement) => settlement.clone(),
        };
        defer(move || reaction(settlement));
    }

    pub(crate) fn fulfill(&self, value: T) {
        self.settle(Settlement::Fulfilled(value));
    }

    pub(crate) fn reject(&self, cause: E) {
        self.settle(Settlement::Rejected(cause));
    }

    /// Leave `Pending` for good and queue every registered reaction.
    pub(crate) fn settle(&self, settlement: Settlement<T, E>) {
        let reactions = {
            let mut slot = self.slot.borrow_mut();
            let Slot::Pending(reactions) = &mut *slot else {
                tracing::trace!("ignoring settlement of an already settled eventual value");
                return;
            };
            let reactions = mem::take(reactions);
            *slot = Slot::Settled(settlement.clone());
            reactions
        };

        for reaction in reactions {
            let settlement = settlement.clone();
            defer(move || reaction(settlement));
        }
    }
}

impl<T, E> IntoFuture for Eventual<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ResolutionError> + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = LocalBoxFuture<'static, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        let (tx, rx) = oneshot::channel();
        self.react(Box::new(move |settlement| {
            let _ = tx.send(settlement);
        }));
        Box::pin(async move {
            match rx.await {
                Ok(settlement) => settlement.into_result(),
                Err(_) => Err(ResolutionError::Abandoned.into()),
            }
        })
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Eventual<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.slot.borrow() {
            Slot::Pending(reactions) => f
                .debug_struct("Eventual")
                .field("state", &State::Pending)
                .field("dependents", &reactions.len())
                .finish(),
            Slot::Settled(settlement) => f
                .debug_struct("Eventual")
                .field("settlement", settlement)
                .finish(),
        }
    }
}
