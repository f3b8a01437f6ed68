use ribbon_core::ResolutionError;
use thiserror::Error;

/// Why a request eventual rejected.
///
/// Cloneable so one rejection can reach every dependent of an eventual.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("no servers available for service {service:?}")]
    NoServers { service: String },
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("failed to update token: {0}")]
    TokenRefresh(String),
    #[error("credential provider reported no token after refresh")]
    MissingToken,
    #[error("Bad request: {status_text}")]
    Status { status: u16, status_text: String },
    #[error("request failed: {0}")]
    Connection(String),
    #[error("invalid JSON response: {0}")]
    Decode(String),
    #[error("failed to encode request body: {0}")]
    Encode(String),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The topology had no server for the service.
    Routing,
    /// The credential provider refused or failed.
    Auth,
    /// The exchange failed or returned a non-success status.
    Transport,
    /// A body could not be encoded or decoded.
    Codec,
    /// The eventual machinery itself rejected.
    Resolution,
}

impl ClientError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoServers { .. } => ErrorKind::Routing,
            Self::NotAuthenticated | Self::TokenRefresh(_) | Self::MissingToken => ErrorKind::Auth,
            Self::Status { .. } | Self::Connection(_) => ErrorKind::Transport,
            Self::Decode(_) | Self::Encode(_) => ErrorKind::Codec,
            Self::Resolution(_) => ErrorKind::Resolution,
        }
    }
}
