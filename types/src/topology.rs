//! Service routing topology as announced over the push channel.
//!
//! Wire format: a JSON object mapping service name to an ordered array of
//! `host[:port]` strings.
//!
//! ```json
//! {"orders": ["10.0.0.4:8080", "10.0.0.5:8080"], "billing": ["billing.internal"]}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A server as it appears in a topology entry: `host[:port]`, no scheme, no path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("server address must not be empty")]
    Empty,
    #[error("server address {0:?} must not carry a scheme")]
    HasScheme(String),
    #[error("server address {0:?} must be host[:port] without path or whitespace")]
    Malformed(String),
}

impl ServerAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AddressError::Empty);
        }
        if value.contains("://") {
            return Err(AddressError::HasScheme(value));
        }
        if value.contains(['/', '?', '#']) || value.chars().any(char::is_whitespace) {
            return Err(AddressError::Malformed(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ServerAddress {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerAddress> for String {
    fn from(value: ServerAddress) -> Self {
        value.0
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
#[error("invalid topology payload: {0}")]
pub struct TopologyError(#[from] serde_json::Error);

/// Which servers currently back each service.
///
/// A topology is only ever replaced as a whole; there is no per-server health
/// state and no merging of successive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology(BTreeMap<String, Vec<ServerAddress>>);

impl Topology {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a topology-change payload.
    pub fn parse(payload: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Servers for `service`, in announced order. Unknown services have none.
    #[must_use]
    pub fn servers(&self, service: &str) -> &[ServerAddress] {
        self.0.get(service).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn first_server(&self, service: &str) -> Option<&ServerAddress> {
        self.servers(service).first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<ServerAddress>)> for Topology {
    fn from_iter<I: IntoIterator<Item = (String, Vec<ServerAddress>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
