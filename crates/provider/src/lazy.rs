use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{error, info};

use crate::error::ProviderError;

type Slot<T> = Arc<OnceLock<Result<Arc<T>, ProviderError>>>;
type Init<T> = dyn Fn() -> Result<T, ProviderError> + Send + Sync;

/// A process-wide provider client built on first use.
///
/// The initialiser runs at most once per generation: concurrent first callers
/// block on the same cell and all observe the same client. A failed
/// initialisation is remembered, so every later call fails with the same error
/// until [`LazyClient::reset`] starts a new generation (e.g. after credentials
/// were rotated).
pub struct LazyClient<T> {
    slot: RwLock<Slot<T>>,
    init: Box<Init<T>>,
}

impl<T> LazyClient<T> {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<T, ProviderError> + Send + Sync + 'static,
    {
        Self {
            slot: RwLock::new(Arc::new(OnceLock::new())),
            init: Box::new(init),
        }
    }

    /// Return the shared client, constructing it if this is the first call.
    pub fn get(&self) -> Result<Arc<T>, ProviderError> {
        let slot = self.current();
        slot.get_or_init(|| {
            let built = (self.init)().map(Arc::new);
            match &built {
                Ok(_) => info!("provider client initialized"),
                Err(e) => error!(error = %e, "provider client initialization failed"),
            }
            built
        })
        .clone()
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.current().get(), Some(Ok(_)))
    }

    /// Drop the current client (or remembered failure). The next `get` runs
    /// the initialiser again. Callers holding an `Arc<T>` keep using the old
    /// client until they drop it.
    pub fn reset(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(OnceLock::new());
        info!("provider client reset");
    }

    fn current(&self) -> Slot<T> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
