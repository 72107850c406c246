//! Per-element lookup cache with in-flight deduplication.
//!
//! Concurrent callers for the same id share one fetch. Successful results
//! are kept for the session; failures are handed to every waiter and then
//! forgotten so the next call retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use playback_core::model::ElementId;
use tracing::trace;

use crate::error::LookupError;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>, LookupError>>>;

enum Slot<T> {
    Ready(Arc<T>),
    Pending(SharedFetch<T>),
}

pub struct ResultCache<T> {
    slots: Mutex<HashMap<ElementId, Slot<T>>>,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ResultCache<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<ElementId, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_struct("ResultCache")
            .field("ready", &slots.values().filter(|s| matches!(s, Slot::Ready(_))).count())
            .field("pending", &slots.values().filter(|s| matches!(s, Slot::Pending(_))).count())
            .finish()
    }
}

impl<T> ResultCache<T>
where
    T: Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, without waiting for a pending fetch.
    #[must_use]
    pub fn peek(&self, id: &ElementId) -> Option<Arc<T>> {
        match self.lock().get(id) {
            Some(Slot::Ready(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_loading(&self, id: &ElementId) -> bool {
        matches!(self.lock().get(id), Some(Slot::Pending(_)))
    }

    /// Return the cached value or join the fetch for `id`, starting it with
    /// `fetch` when none is running.
    ///
    /// # Errors
    ///
    /// Returns the `LookupError` of the shared fetch. The failure is not
    /// cached.
    pub async fn get_or_fetch<F, Fut>(&self, id: &ElementId, fetch: F) -> Result<Arc<T>, LookupError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, LookupError>> + Send + 'static,
    {
        let shared = {
            let mut slots = self.lock();
            match slots.get(id) {
                Some(Slot::Ready(value)) => return Ok(Arc::clone(value)),
                Some(Slot::Pending(pending)) => {
                    trace!(element = %id, "joining pending lookup");
                    pending.clone()
                }
                None => {
                    let fut = fetch();
                    let shared = async move { fut.await.map(Arc::new) }.boxed().shared();
                    slots.insert(id.clone(), Slot::Pending(shared.clone()));
                    shared
                }
            }
        };

        let result = shared.clone().await;

        let mut slots = self.lock();
        let owns_slot = matches!(slots.get(id), Some(Slot::Pending(p)) if p.ptr_eq(&shared));
        if owns_slot {
            match &result {
                Ok(value) => {
                    slots.insert(id.clone(), Slot::Ready(Arc::clone(value)));
                }
                Err(_) => {
                    slots.remove(id);
                }
            }
        }
        result
    }
}
