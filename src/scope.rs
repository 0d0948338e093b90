//! Fetches owned by one screen. Dropping the scope aborts whatever is still
//! running, and the matching handles resolve to [`AppError::Cancelled`].

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::AppError;

#[derive(Default)]
pub struct ViewScope {
    tasks: JoinSet<()>,
}

/// Receives the result of one query spawned in a [`ViewScope`].
pub struct QueryHandle<T> {
    label: &'static str,
    rx: oneshot::Receiver<Result<T, AppError>>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_query<T, F>(&mut self, label: &'static str, query: F) -> QueryHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.tasks.spawn(async move {
            // The receiver may already be gone; nothing to report then.
            let _ = tx.send(query.await);
        });
        debug!(label, "query spawned");
        QueryHandle { label, rx }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            debug!(count = self.tasks.len(), "aborting queries of dropped scope");
        }
        self.tasks.abort_all();
    }
}

impl<T> QueryHandle<T> {
    pub async fn wait(self) -> Result<T, AppError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(AppError::Cancelled(self.label.to_string())),
        }
    }
}
