//! Core domain types for ribbon.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

#![allow(clippy::missing_errors_doc)]

mod http;
mod token;
mod topology;

pub use http::{Headers, HttpMethod, MethodParseError};
pub use token::BearerToken;
pub use topology::{AddressError, ServerAddress, Topology, TopologyError};
