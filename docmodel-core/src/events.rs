//! Lifecycle notifications and the process-wide error channel.
//!
//! Models publish [`LifecycleEvent`]s to the observers registered on their
//! [`EventBus`]. Failures of operations nobody awaits (see
//! [`Model::save_detached`](crate::model::Model::save_detached)) are routed to
//! an [`ErrorChannel`] instead of being dropped.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use parking_lot::{Mutex, RwLock};
use std::{fmt::Debug, sync::Arc};

use crate::error::ModelError;

/// A notification emitted by a model.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A document was saved; carries its identifier.
    Save { id: String },
    /// A document was removed; carries the identifier it had.
    Remove { id: String },
    /// Index provisioning finished, with the first error if any.
    Index { error: Option<ModelError> },
    /// A document's new/not-new status flipped.
    IsNew { id: Option<String>, is_new: bool },
}

/// Receives lifecycle notifications.
pub trait LifecycleObserver: Send + Sync {
    fn notify(&self, model: &str, event: &LifecycleEvent);
}

impl<F> LifecycleObserver for F
where
    F: Fn(&str, &LifecycleEvent) + Send + Sync,
{
    fn notify(&self, model: &str, event: &LifecycleEvent) {
        self(model, event)
    }
}

/// Fan-out of lifecycle notifications for a single model.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn LifecycleObserver>>>,
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.write().push(observer);
    }

    /// Delivers `event` to every observer in subscription order.
    pub fn emit(&self, model: &str, event: LifecycleEvent) {
        let observers = self.observers.read().clone();

        for observer in observers {
            observer.notify(model, &event);
        }
    }
}

/// Process-wide sink for errors that have no caller to receive them.
///
/// Cloning shares the same subscriber list.
#[derive(Debug, Clone, Default)]
pub struct ErrorChannel {
    subscribers: Arc<Mutex<Vec<UnboundedSender<ModelError>>>>,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver that gets every error published from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<ModelError> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Publishes `error` to every live subscriber, logging it when there are none.
    pub fn publish(&self, error: ModelError) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.unbounded_send(error.clone()).is_ok());

        if subscribers.is_empty() {
            tracing::error!(%error, "unhandled model error");
        }
    }
}
