//! The resolution procedure: how an [`Eventual`] is settled from an arbitrary input.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::ResolutionError;
use crate::eventual::{Eventual, Settlement};

/// Input to the resolution procedure.
pub enum Resolution<T, E> {
    /// Fulfil with this value.
    Value(T),
    /// Adopt the outcome of another eventual value.
    Eventual(Eventual<T, E>),
    /// Assimilate a foreign object that exposes a `then`-shaped member.
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Self::Thenable(Rc::new(thenable))
    }
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T, E> From<Eventual<T, E>> for Resolution<T, E> {
    fn from(eventual: Eventual<T, E>) -> Self {
        Self::Eventual(eventual)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Eventual(eventual) => f.debug_tuple("Eventual").field(eventual).finish(),
            Self::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// The callable form of a `then` member. It receives a one-shot [`Resolver`]
/// and may return `Err` to signal that it failed.
pub type ThenFn<T, E> = Box<dyn FnOnce(Resolver<T, E>) -> Result<(), E>>;

/// The result of reading a thenable's `then` member.
pub enum ThenMember<T, E> {
    Callable(ThenFn<T, E>),
    /// The member is not callable; the object is an ordinary value.
    Plain(T),
}

/// Anything that exposes a `then`-shaped member, whether or not it is an
/// [`Eventual`].
///
/// ```rust
/// use ribbon_core::{Deferred, Resolution, ThenMember, Thenable};
///
/// struct Answer;
///
/// impl Thenable<u32, String> for Answer {
///     fn then_member(&self) -> Result<ThenMember<u32, String>, String> {
///         Ok(ThenMember::Callable(Box::new(|resolver| {
///             resolver.resolve(42);
///             Ok(())
///         })))
///     }
/// }
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # runtime.block_on(tokio::task::LocalSet::new().run_until(async {
/// let deferred = Deferred::new();
/// deferred.resolve(Resolution::thenable(Answer));
/// assert_eq!(deferred.eventual().await, Ok(42));
/// # }));
/// ```
pub trait Thenable<T, E> {
    /// Read the `then` member. This is called exactly once per resolution;
    /// `Err` rejects the value being resolved.
    fn then_member(&self) -> Result<ThenMember<T, E>, E>;
}

/// The resolve/reject capability pair for one [`Eventual`].
///
/// All clones share a single latch: whichever of `resolve` or `reject` is
/// called first takes effect and every later call is ignored, even when the
/// first call resolved with a value that is still pending.
pub struct Resolver<T, E> {
    target: Eventual<T, E>,
    done: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            done: Rc::clone(&self.done),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ResolutionError> + 'static,
{
    pub(crate) fn new(target: &Eventual<T, E>) -> Self {
        Self {
            target: target.clone(),
            done: Rc::new(Cell::new(false)),
        }
    }

    pub fn resolve(&self, resolution: impl Into<Resolution<T, E>>) {
        if self.latch() {
            self.target.resolve(resolution.into());
        }
    }

    pub fn reject(&self, cause: E) {
        if self.latch() {
            self.target.reject(cause);
        }
    }

    fn latch(&self) -> bool {
        if self.done.replace(true) {
            tracing::trace!("ignoring repeated use of a resolver");
            return false;
        }
        true
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("used", &self.done.get())
            .finish_non_exhaustive()
    }
}

impl<T, E> Eventual<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ResolutionError> + 'static,
{
    /// Settle this value from `resolution`, unwrapping eventual values and
    /// thenables until a plain value or a rejection is reached.
    pub(crate) fn resolve(&self, resolution: Resolution<T, E>) {
        match resolution {
            Resolution::Value(value) => self.fulfill(value),
            Resolution::Eventual(other) => self.adopt(&other),
            Resolution::Thenable(thenable) => self.assimilate(thenable.as_ref()),
        }
    }

    fn adopt(&self, other: &Self) {
        if other.is_same(self) {
            self.reject(ResolutionError::SelfResolution.into());
            return;
        }

        if let Some(settlement) = other.settlement() {
            self.settle(settlement);
            return;
        }

        let target = self.clone();
        other.react(Box::new(move |settlement| match settlement {
            Settlement::Fulfilled(value) => target.fulfill(value),
            Settlement::Rejected(cause) => target.reject(cause),
        }));
    }

    fn assimilate(&self, thenable: &dyn Thenable<T, E>) {
        match thenable.then_member() {
            Err(cause) => self.reject(cause),
            Ok(ThenMember::Plain(value)) => self.fulfill(value),
            Ok(ThenMember::Callable(then)) => {
                let resolver = Resolver::new(self);
                if let Err(cause) = then(resolver.clone()) {
                    resolver.reject(cause);
                }
            }
        }
    }
}
