use std::future::Future;

use tokio::task::LocalSet;

/// Drive `future` to completion inside a fresh `LocalSet`.
pub(crate) async fn on_local<F: Future>(future: F) -> F::Output {
    LocalSet::new().run_until(future).await
}
