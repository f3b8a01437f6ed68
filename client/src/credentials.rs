//! Optional bearer-token source.

use std::rc::Rc;
use std::time::Duration;

use ribbon_core::{Deferred, Eventual};
use ribbon_types::BearerToken;

use crate::ClientError;

/// Completion callback for a token refresh. `Err` carries the provider's cause.
pub type RefreshCallback = Box<dyn FnOnce(Result<(), String>)>;

/// Something that can vouch for the caller with a bearer token.
///
/// The client reads [`is_authenticated`](Self::is_authenticated) and
/// [`token`](Self::token) at request time and never caches either.
pub trait CredentialProvider {
    fn is_authenticated(&self) -> bool;

    /// The current token, if any.
    fn token(&self) -> Option<BearerToken>;

    /// Make sure the token stays valid for at least `min_validity`, then call
    /// `on_complete` exactly once.
    fn refresh_token(&self, min_validity: Duration, on_complete: RefreshCallback);
}

/// Refresh, then read the token the provider holds afterwards.
pub fn refresh(
    provider: &Rc<dyn CredentialProvider>,
    min_validity: Duration,
) -> Eventual<BearerToken, ClientError> {
    let deferred = Deferred::new();
    let settle = deferred.clone();
    let source = Rc::clone(provider);
    provider.refresh_token(
        min_validity,
        Box::new(move |result| match result {
            Ok(()) => match source.token() {
                Some(token) => settle.resolve(token),
                None => {
                    tracing::warn!("Credential provider has no token after refresh");
                    settle.reject(ClientError::MissingToken);
                }
            },
            Err(cause) => {
                tracing::warn!(%cause, "Failed to update token");
                settle.reject(ClientError::TokenRefresh(cause));
            }
        }),
    );
    deferred.eventual()
}

/// A fixed token that never expires.
#[derive(Debug, Clone)]
pub struct StaticToken(BearerToken);

impl StaticToken {
    #[must_use]
    pub fn new(token: BearerToken) -> Self {
        Self(token)
    }
}

impl CredentialProvider for StaticToken {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn token(&self) -> Option<BearerToken> {
        Some(self.0.clone())
    }

    fn refresh_token(&self, _min_validity: Duration, on_complete: RefreshCallback) {
        on_complete(Ok(()));
    }
}
