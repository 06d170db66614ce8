//! Change events and the observer registry.

use crate::{identity::Identity, notification::Notification};

/// What changed. Delivered to every subscriber after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
  Registered(Identity),
  SignedIn(Identity),
  SignedOut,
  Deleted {
    email:           String,
    /// `None` when the email was not in the directory.
    removed:         Option<Identity>,
    session_cleared: bool,
  },
  Broadcast(Notification),
}

/// Handle returned by [`crate::SessionStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Callback = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// Registered callbacks, notified in subscription order.
#[derive(Default)]
pub(crate) struct Observers {
  next_id: u64,
  entries: Vec<(SubscriptionId, Callback)>,
}

impl Observers {
  pub(crate) fn insert(&mut self, callback: Callback) -> SubscriptionId {
    self.next_id += 1;
    let id = SubscriptionId(self.next_id);
    self.entries.push((id, callback));
    id
  }

  pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
    let before = self.entries.len();
    self.entries.retain(|(entry_id, _)| *entry_id != id);
    self.entries.len() != before
  }

  pub(crate) fn notify(&self, event: &StoreEvent) {
    tracing::debug!(observers = self.entries.len(), ?event, "dispatching store event");
    for (_, callback) in &self.entries {
      callback(event);
    }
  }
}
