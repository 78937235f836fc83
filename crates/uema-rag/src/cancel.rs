//! Cancellation for in-flight remote calls.
//!
//! Every embedding, rerank and chat request runs under a [`CancelToken`].
//! A [`QueryScope`] hands out one token per query and cancels the previous
//! one, so a newer query supersedes an older one that is still waiting on
//! the network.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use uema_core::UemaError;

/// Cloneable cancellation flag shared between a caller and its requests.
///
/// # Examples
///
/// ```
/// use uema_rag::cancel::CancelToken;
///
/// let token = CancelToken::new();
/// let clone = token.clone();
/// clone.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Mark the token cancelled and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` to completion unless the token is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Cancelled`] if the token fires before `fut`
    /// resolves, otherwise whatever `fut` returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use uema_core::UemaError;
    /// use uema_rag::cancel::CancelToken;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let token = CancelToken::new();
    /// token.cancel();
    /// let result = token.run(async { Ok::<_, UemaError>(1) }).await;
    /// assert!(matches!(result, Err(UemaError::Cancelled)));
    /// # }
    /// ```
    pub async fn run<F, T>(&self, fut: F) -> Result<T, UemaError>
    where
        F: Future<Output = Result<T, UemaError>>,
    {
        if self.is_cancelled() {
            return Err(UemaError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(UemaError::Cancelled),
            result = fut => result,
        }
    }
}

/// Issues one token per query and cancels the token of the query before it.
///
/// # Examples
///
/// ```
/// use uema_rag::cancel::QueryScope;
///
/// let scope = QueryScope::new();
/// let first = scope.begin();
/// let second = scope.begin();
/// assert!(first.is_cancelled());
/// assert!(!second.is_cancelled());
/// ```
#[derive(Debug, Default)]
pub struct QueryScope {
    current: Mutex<Option<CancelToken>>,
}

impl QueryScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede the in-flight query, if any, and return a fresh token.
    pub fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        let previous = self.current.lock().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    /// Cancel the in-flight query without starting a new one.
    pub fn cancel_current(&self) {
        if let Some(current) = self.current.lock().take() {
            current.cancel();
        }
    }
}
