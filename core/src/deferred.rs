use std::fmt;

use crate::error::ResolutionError;
use crate::eventual::Eventual;
use crate::resolution::{Resolution, Resolver};

/// An [`Eventual`] paired with the only capability that can settle it.
///
/// Callback-style code keeps the `Deferred` and settles it from inside its
/// callback; everyone else gets the read-only [`Deferred::eventual`] handle.
pub struct Deferred<T, E> {
    eventual: Eventual<T, E>,
    resolver: Resolver<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ResolutionError> + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        let eventual = Eventual::pending();
        let resolver = Resolver::new(&eventual);
        Self { eventual, resolver }
    }

    /// A shared handle to the value this deferred settles.
    #[must_use]
    pub fn eventual(&self) -> Eventual<T, E> {
        self.eventual.clone()
    }

    pub fn resolve(&self, resolution: impl Into<Resolution<T, E>>) {
        self.resolver.resolve(resolution);
    }

    pub fn reject(&self, cause: E) {
        self.resolver.reject(cause);
    }

    #[must_use]
    pub fn resolver(&self) -> Resolver<T, E> {
        self.resolver.clone()
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ResolutionError> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            eventual: self.eventual.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("eventual", &self.eventual)
            .finish_non_exhaustive()
    }
}
