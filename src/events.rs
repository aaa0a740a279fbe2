//! Change notification for the configuration store
//!
//! Observers either register a callback, which runs in-line on the thread
//! that saved, or take a channel with [`ChangeListeners::watch`] to be woken
//! up on another thread or task.

use async_std::channel::{self, Receiver, Sender};
use std::fmt;

/// Sent after every successful save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationUpdated;

/// Handle to remove a callback again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut() + Send>;

#[derive(Default)]
pub struct ChangeListeners {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
    watchers: Vec<Sender<ConfigurationUpdated>>,
}

impl ChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut() + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
        before != self.callbacks.len()
    }

    /// Get a channel that receives one message per save
    pub fn watch(&mut self) -> Receiver<ConfigurationUpdated> {
        let (tx, rx) = channel::unbounded();
        self.watchers.push(tx);
        rx
    }

    /// Run every callback and wake every watcher
    ///
    /// Watchers whose receiver was dropped are forgotten.
    pub fn notify(&mut self) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback();
        }
        self.watchers
            .retain(|tx| tx.try_send(ConfigurationUpdated).is_ok());
    }

    pub fn len(&self) -> usize {
        self.callbacks.len() + self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("callbacks", &self.callbacks.len())
            .field("watchers", &self.watchers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn callbacks_run_once_per_notify() {
        let mut listeners = ChangeListeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let first = listeners.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let h = Arc::clone(&hits);
        listeners.subscribe(move || {
            h.fetch_add(10, Ordering::SeqCst);
        });

        listeners.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        assert!(listeners.unsubscribe(first));
        assert!(!listeners.unsubscribe(first));
        listeners.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn watchers_get_a_message_and_closed_ones_are_dropped() {
        let mut listeners = ChangeListeners::new();
        let rx = listeners.watch();
        let gone = listeners.watch();
        drop(gone);
        assert_eq!(listeners.len(), 2);

        listeners.notify();
        assert_eq!(rx.try_recv(), Ok(ConfigurationUpdated));
        assert!(rx.try_recv().is_err());
        assert_eq!(listeners.len(), 1);
    }
}
