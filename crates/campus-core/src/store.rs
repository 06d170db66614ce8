//! [`SessionStore`] — the directory, the active session and the notification
//! log behind one lock.
//!
//! Every operation holds the lock for its whole duration, including the
//! simulated latency, so callers on other tasks queue behind it and never
//! observe a half-applied mutation. Mutations run on their own task: once
//! started, they complete even if the caller's future is dropped or timed out.

use std::{
  collections::{BTreeMap, VecDeque},
  future::Future,
  sync::Arc,
  time::Duration,
};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
  backend::{DirectoryBackend, MemoryDirectory},
  config::StoreConfig,
  event::{Observers, StoreEvent, SubscriptionId},
  identity::{Identity, IdentityId, NewIdentity, Role},
  notification::{Notification, NotificationId, Target},
  Error, Result,
};

// ─── State ───────────────────────────────────────────────────────────────────

struct Inner<B> {
  backend:           B,
  /// Mirror of the backend, keyed by email.
  directory:         BTreeMap<String, Identity>,
  session:           Option<Identity>,
  /// Newest first.
  notifications:     VecDeque<Notification>,
  next_identity:     u64,
  next_notification: u64,
  observers:         Observers,
}

impl<B> Inner<B> {
  /// The identifier the next identity will get. Only consumed by
  /// [`Inner::commit_identity`] once the backend write has succeeded.
  fn pending_identity_id(&self) -> IdentityId { IdentityId(self.next_identity) }

  fn commit_identity(&mut self, identity: &Identity) {
    self.next_identity = identity.id.0 + 1;
    self.directory.insert(identity.email.clone(), identity.clone());
  }

  fn allocate_notification_id(&mut self) -> NotificationId {
    let id = NotificationId(self.next_notification);
    self.next_notification += 1;
    id
  }
}

// ─── Shared state ────────────────────────────────────────────────────────────

/// Everything a spawned operation needs, reference-counted so the task can
/// outlive the call that started it.
struct Shared<B> {
  config: StoreConfig,
  inner:  Mutex<Inner<B>>,
}

impl<B: DirectoryBackend> Shared<B> {
  async fn register(&self, input: NewIdentity) -> Result<Identity> {
    let mut inner = self.inner.lock().await;
    pause(self.config.latency.auth()).await;

    if inner.directory.contains_key(&input.email) {
      tracing::warn!(email = %input.email, "registration rejected: duplicate email");
      return Err(Error::DuplicateEmail(input.email));
    }
    if input.password.chars().count() < self.config.min_password_len {
      tracing::warn!(email = %input.email, "registration rejected: weak password");
      return Err(Error::WeakPassword { min: self.config.min_password_len });
    }
    let role = Role::parse(&input.role).inspect_err(|_| {
      tracing::warn!(email = %input.email, role = %input.role, "registration rejected: invalid role");
    })?;

    let identity = Identity {
      id:           inner.pending_identity_id(),
      email:        input.email,
      display_name: input.display_name,
      role,
      phone:        input.phone,
    };
    inner
      .backend
      .upsert(identity.clone())
      .await
      .map_err(Error::backend)?;
    inner.commit_identity(&identity);
    inner.session = Some(identity.clone());

    tracing::info!(id = %identity.id, email = %identity.email, %role, "registered");
    inner.observers.notify(&StoreEvent::Registered(identity.clone()));
    Ok(identity)
  }

  async fn sign_in(&self, email: String) -> Result<Identity> {
    let mut inner = self.inner.lock().await;
    pause(self.config.latency.auth()).await;

    let Some(identity) = inner.directory.get(&email).cloned() else {
      tracing::warn!(%email, "sign-in rejected: unknown email");
      return Err(Error::UnknownEmail(email));
    };
    inner.session = Some(identity.clone());

    tracing::info!(id = %identity.id, %email, "signed in");
    inner.observers.notify(&StoreEvent::SignedIn(identity.clone()));
    Ok(identity)
  }

  async fn sign_in_federated(&self, default_role: Role) -> Result<Identity> {
    let mut inner = self.inner.lock().await;
    pause(self.config.latency.auth()).await;

    let email = &self.config.federated_email;
    let existing = inner.directory.get(email).cloned();
    let identity = match existing {
      Some(existing) => existing,
      None => {
        let identity = Identity {
          id:           inner.pending_identity_id(),
          email:        email.clone(),
          display_name: self.config.federated_display_name.clone(),
          role:         default_role,
          phone:        None,
        };
        inner
          .backend
          .upsert(identity.clone())
          .await
          .map_err(Error::backend)?;
        inner.commit_identity(&identity);
        tracing::info!(id = %identity.id, %email, role = %default_role, "created federated identity");
        identity
      }
    };
    inner.session = Some(identity.clone());

    tracing::info!(id = %identity.id, %email, "signed in (federated)");
    inner.observers.notify(&StoreEvent::SignedIn(identity.clone()));
    Ok(identity)
  }

  async fn sign_out(&self) {
    let mut inner = self.inner.lock().await;
    pause(self.config.latency.sign_out()).await;

    if let Some(previous) = inner.session.take() {
      tracing::info!(id = %previous.id, email = %previous.email, "signed out");
    }
    inner.observers.notify(&StoreEvent::SignedOut);
  }

  async fn delete_by_email(&self, email: String) -> Result<Option<Identity>> {
    let mut inner = self.inner.lock().await;
    pause(self.config.latency.admin()).await;

    let removed = if inner.directory.contains_key(&email) {
      inner.backend.delete(&email).await.map_err(Error::backend)?;
      inner.directory.remove(&email)
    } else {
      None
    };

    let session_cleared = removed.is_some()
      && inner.session.as_ref().is_some_and(|s| s.email == email);
    if session_cleared {
      inner.session = None;
    }

    match &removed {
      Some(identity) => {
        tracing::info!(id = %identity.id, %email, session_cleared, "deleted identity")
      }
      None => tracing::debug!(%email, "delete of absent identity ignored"),
    }
    inner.observers.notify(&StoreEvent::Deleted {
      email,
      removed: removed.clone(),
      session_cleared,
    });
    Ok(removed)
  }

  async fn broadcast(
    &self,
    sender_name: String,
    message: String,
    target: Target,
  ) -> Notification {
    let mut inner = self.inner.lock().await;
    pause(self.config.latency.broadcast()).await;

    let notification = Notification {
      id: inner.allocate_notification_id(),
      sender_name,
      message,
      created_at: Utc::now(),
      target,
    };
    inner.notifications.push_front(notification.clone());

    tracing::info!(
      id = %notification.id,
      sender = %notification.sender_name,
      %target,
      "broadcast notification"
    );
    inner
      .observers
      .notify(&StoreEvent::Broadcast(notification.clone()));
    notification
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// In-process account directory with a single active session and a
/// role-targeted notification log.
///
/// Passwords are length-checked at registration and otherwise ignored:
/// [`sign_in`](Self::sign_in) does not compare them. This is a demo store, not
/// an authentication scheme.
pub struct SessionStore<B = MemoryDirectory> {
  shared: Arc<Shared<B>>,
}

impl SessionStore<MemoryDirectory> {
  /// An empty store backed by [`MemoryDirectory`].
  pub fn in_memory(config: StoreConfig) -> Self {
    Self::from_parts(MemoryDirectory::new(), BTreeMap::new(), 1, config)
  }
}

impl<B: DirectoryBackend + 'static> SessionStore<B> {
  /// Load `backend` and build a store over it. Identifier allocation resumes
  /// after the largest identifier found.
  pub async fn open(backend: B, config: StoreConfig) -> Result<Self> {
    let existing = backend.load_all().await.map_err(Error::backend)?;
    let next_identity = existing.iter().map(|i| i.id.0).max().unwrap_or(0) + 1;
    let directory = existing
      .into_iter()
      .map(|identity| (identity.email.clone(), identity))
      .collect::<BTreeMap<_, _>>();
    tracing::info!(entries = directory.len(), "opened directory");
    Ok(Self::from_parts(backend, directory, next_identity, config))
  }

  fn from_parts(
    backend: B,
    directory: BTreeMap<String, Identity>,
    next_identity: u64,
    config: StoreConfig,
  ) -> Self {
    let inner = Mutex::new(Inner {
      backend,
      directory,
      session: None,
      notifications: VecDeque::new(),
      next_identity,
      next_notification: 1,
      observers: Observers::default(),
    });
    Self { shared: Arc::new(Shared { config, inner }) }
  }

  pub fn config(&self) -> &StoreConfig { &self.shared.config }

  /// Run `op` against the shared state on its own task and wait for it.
  async fn detached<T, F, Fut>(&self, op: F) -> T
  where
    T: Send + 'static,
    F: FnOnce(Arc<Shared<B>>) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
  {
    match tokio::spawn(op(self.shared.clone())).await {
      Ok(out) => out,
      // Store tasks are never aborted; a join error means the operation
      // panicked (or the runtime is shutting down). Re-raise on the caller.
      Err(err) => std::panic::resume_unwind(err.into_panic()),
    }
  }

  // ── Observers ─────────────────────────────────────────────────────────────

  /// Register `callback` to run after every successful mutation.
  pub async fn subscribe<F>(&self, callback: F) -> SubscriptionId
  where
    F: Fn(&StoreEvent) + Send + Sync + 'static,
  {
    self.shared.inner.lock().await.observers.insert(Box::new(callback))
  }

  /// Returns `false` if `id` was not subscribed.
  pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
    self.shared.inner.lock().await.observers.remove(id)
  }

  // ── Session ───────────────────────────────────────────────────────────────

  /// Create an account and sign in as it.
  ///
  /// Checks run in order: duplicate email, password length, role. The first
  /// failure is returned and nothing is changed.
  pub async fn register(&self, input: NewIdentity) -> Result<Identity> {
    self
      .detached(|shared| async move { shared.register(input).await })
      .await
  }

  /// Sign in as the identity registered under `email`.
  ///
  /// The password is accepted unchecked.
  pub async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity> {
    let email = email.to_owned();
    self
      .detached(|shared| async move { shared.sign_in(email).await })
      .await
  }

  /// Sign in through the federated-identity stub.
  ///
  /// The stub always resolves to the configured federated email. On first use
  /// the identity is created with `default_role`; later calls reuse it and
  /// keep whatever role it was created with.
  pub async fn sign_in_federated(&self, default_role: Role) -> Result<Identity> {
    self
      .detached(|shared| async move { shared.sign_in_federated(default_role).await })
      .await
  }

  /// Clear the session. Always succeeds, even when nobody is signed in.
  pub async fn sign_out(&self) {
    self
      .detached(|shared| async move { shared.sign_out().await })
      .await
  }

  pub async fn current_session(&self) -> Option<Identity> {
    self.shared.inner.lock().await.session.clone()
  }

  // ── Directory ─────────────────────────────────────────────────────────────

  /// Every registered identity, in email order.
  pub async fn list_all(&self) -> Vec<Identity> {
    let inner = self.shared.inner.lock().await;
    tracing::debug!(entries = inner.directory.len(), "listing directory");
    inner.directory.values().cloned().collect()
  }

  /// Remove the identity registered under `email`, if any.
  ///
  /// Deleting an absent email is not an error. Deleting the signed-in identity
  /// also clears the session. Returns the removed identity.
  pub async fn delete_by_email(&self, email: &str) -> Result<Option<Identity>> {
    let email = email.to_owned();
    self
      .detached(|shared| async move { shared.delete_by_email(email).await })
      .await
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  /// Append a notification for `target`. Sender and message are not
  /// validated; an empty message is stored as-is.
  pub async fn broadcast_notification(
    &self,
    sender_name: &str,
    message: &str,
    target: Target,
  ) -> Notification {
    let (sender_name, message) = (sender_name.to_owned(), message.to_owned());
    self
      .detached(|shared| async move { shared.broadcast(sender_name, message, target).await })
      .await
  }

  /// Notifications visible to `identity`: those targeted at everyone or at
  /// its role, newest first.
  pub async fn notifications_for(&self, identity: &Identity) -> Vec<Notification> {
    let inner = self.shared.inner.lock().await;
    let visible: Vec<_> = inner
      .notifications
      .iter()
      .filter(|n| n.target.includes(identity.role))
      .cloned()
      .collect();
    tracing::debug!(
      id = %identity.id,
      visible = visible.len(),
      total = inner.notifications.len(),
      "filtered notifications"
    );
    visible
  }
}

/// Simulated round trip. Runs with the store lock held.
async fn pause(delay: Duration) {
  if !delay.is_zero() {
    tokio::time::sleep(delay).await;
  }
}
