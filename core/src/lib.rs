//! Eventual values for single-threaded, continuation-passing code.
//!
//! # Architecture
//!
//! - [`Eventual`] - A shared, single-assignment slot that is eventually
//!   fulfilled with a value or rejected with a cause. Consumers register
//!   handlers with [`Eventual::then`] (or [`Eventual::and_then`] /
//!   [`Eventual::or_else`]), each of which yields a new dependent `Eventual`.
//! - [`Resolution`] - What an `Eventual` can be resolved *with*: a plain value,
//!   another `Eventual` (whose outcome is adopted), or any [`Thenable`].
//! - [`Resolver`] - The resolve/reject capability pair. Only a resolver can
//!   settle an `Eventual`; the first call through any clone wins.
//! - [`Deferred`] - An `Eventual` bundled with its resolver, for bridging
//!   callback-style APIs.
//!
//! # Scheduling
//!
//! Handlers never run inside the call that registered them or the call that
//! settled the value. Each delivery is a separate task on the current tokio
//! [`LocalSet`](tokio::task::LocalSet), so deliveries run in the order they
//! became due and interleave with every other local task.
//!
//! | Situation | Delivery |
//! |-----------|----------|
//! | Handler registered while pending | Queued when the value settles, in registration order |
//! | Handler registered after settlement | Queued immediately, behind anything already queued |
//! | Handler returns `Err(cause)` | Dependent is rejected with `cause` |
//! | Handler returns `Ok(resolution)` | Dependent is resolved with `resolution` |
//!
//! All values are `Rc`-based and `!Send`; everything in this crate must run
//! inside a `LocalSet`.

mod deferred;
mod error;
mod eventual;
mod resolution;
mod schedule;

#[cfg(test)]
mod testing;

pub use deferred::Deferred;
pub use error::ResolutionError;
pub use eventual::{Eventual, Handler, Outcome, Settlement, State};
pub use resolution::{Resolution, Resolver, ThenFn, ThenMember, Thenable};
