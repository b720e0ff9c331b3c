use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::state::puzzle::Update;

/// Handle returned on registration, used to unsubscribe.
pub type ObserverId = Uuid;

type Callback = Arc<dyn Fn(&Update) + Send + Sync>;

/// Fan-out of puzzle updates to every registered observer.
///
/// Delivery happens on the caller of [`UpdateHub::publish`]; a puzzle only
/// publishes from its actor task, so each observer sees updates in emission
/// order. Callbacks must not block.
#[derive(Default)]
pub struct UpdateHub {
    observers: DashMap<ObserverId, Callback>,
}

impl UpdateHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every update published from now on.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.observers.insert(id, Arc::new(callback));
        id
    }

    /// Register an observer backed by an unbounded channel.
    #[cfg(test)]
    pub(crate) fn subscribe_channel(
        &self,
    ) -> (ObserverId, tokio::sync::mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let id = self.subscribe(move |update| {
            let _ = tx.send(update.clone());
        });
        (id, rx)
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// Deliver `update` to every observer registered right now.
    pub fn publish(&self, update: &Update) {
        // Copy the callbacks out so no shard lock is held while they run.
        let callbacks: Vec<Callback> = self
            .observers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for callback in callbacks {
            callback(update);
        }
    }

    /// Drop every observer.
    pub fn clear(&self) {
        self.observers.clear();
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::state::{piece::Position, puzzle::Action};

    fn update(id: u64) -> Update {
        Update {
            id,
            action: Action::Join,
            user_id: "u".into(),
            piece1: Position::default(),
            piece2: Position::default(),
            delta: 0,
        }
    }

    #[test]
    fn every_observer_receives_updates_in_order() {
        let hub = UpdateHub::new();
        let (_, mut first) = hub.subscribe_channel();
        let (_, mut second) = hub.subscribe_channel();

        for id in 0..5 {
            hub.publish(&update(id));
        }

        for rx in [&mut first, &mut second] {
            let ids: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
                .map(|u| u.id)
                .collect();
            assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn late_subscribers_do_not_see_earlier_updates() {
        let hub = UpdateHub::new();
        hub.publish(&update(0));
        let (_, mut rx) = hub.subscribe_channel();
        hub.publish(&update(1));

        assert_eq!(rx.try_recv().map(|u| u.id), Ok(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribed_observers_stop_receiving() {
        let hub = UpdateHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = hub.subscribe(move |u| sink.lock().unwrap().push(u.id));

        hub.publish(&update(0));
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.publish(&update(1));

        assert_eq!(*seen.lock().unwrap(), vec![0]);
        assert!(hub.is_empty());
    }

    #[test]
    fn callbacks_may_unsubscribe_themselves() {
        let hub = Arc::new(UpdateHub::new());
        let slot: Arc<Mutex<Option<ObserverId>>> = Arc::new(Mutex::new(None));
        let (hub_ref, slot_ref) = (hub.clone(), slot.clone());
        let id = hub.subscribe(move |_| {
            if let Some(id) = slot_ref.lock().unwrap().take() {
                hub_ref.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        hub.publish(&update(0));
        assert_eq!(hub.len(), 0);
    }
}
