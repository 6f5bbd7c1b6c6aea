//! Non-owning references to whoever waits for a crop.

use std::fmt;
use std::sync::{Arc, Weak};

use super::CropOutcome;

/// Receives the outcome of a crop task.
pub trait CropObserver: Send + Sync {
    fn on_crop_complete(&self, outcome: CropOutcome);

    /// False once the observer has been torn down and no longer wants results,
    /// even if it has not been dropped yet.
    fn is_live(&self) -> bool {
        true
    }
}

/// A weak reference to a [`CropObserver`].
///
/// The task never keeps the observer alive: delivery upgrades the reference
/// only for the duration of the callback.
#[derive(Clone)]
pub struct ObserverHandle {
    inner: Weak<dyn CropObserver>,
}

impl ObserverHandle {
    pub fn new<O>(observer: &Arc<O>) -> Self
    where
        O: CropObserver + 'static,
    {
        let weak = Arc::downgrade(observer);
        let inner: Weak<dyn CropObserver> = weak;
        Self { inner }
    }

    pub fn from_dyn(observer: &Arc<dyn CropObserver>) -> Self {
        Self {
            inner: Arc::downgrade(observer),
        }
    }

    /// True while the observer exists and reports itself live.
    pub fn is_live(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|observer| observer.is_live())
    }

    /// Hand `outcome` to the observer, or give it back if there is no one to take it.
    pub fn deliver(&self, outcome: CropOutcome) -> Result<(), CropOutcome> {
        match self.inner.upgrade() {
            Some(observer) if observer.is_live() => {
                observer.on_crop_complete(outcome);
                Ok(())
            }
            _ => Err(outcome),
        }
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("live", &self.is_live())
            .finish()
    }
}
