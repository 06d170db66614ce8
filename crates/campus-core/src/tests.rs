//! Behavioural tests for `SessionStore` over the in-memory backend.

use std::{
  io,
  sync::{
    Arc,
    Mutex as StdMutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use crate::{
  backend::{DirectoryBackend, MemoryDirectory},
  config::{Latency, StoreConfig},
  event::StoreEvent,
  identity::{Identity, IdentityId, NewIdentity, Role},
  notification::Target,
  Error, SessionStore,
};

fn store() -> SessionStore { SessionStore::in_memory(StoreConfig::immediate()) }

fn student(email: &str) -> NewIdentity {
  NewIdentity::new(email, "secret1", "Stu Dent", "student")
}

async fn registered(s: &SessionStore, email: &str, role: &str) -> Identity {
  s.register(NewIdentity::new(email, "password", email, role))
    .await
    .unwrap()
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_adds_exactly_one_entry() {
  let s = store();
  registered(&s, "first@x.com", "admin").await;
  let before = s.list_all().await.len();

  let identity = s
    .register(NewIdentity::new("t@x.com", "hunter22", "Tea Cher", "teacher"))
    .await
    .unwrap();

  let all = s.list_all().await;
  assert_eq!(all.len(), before + 1);
  let entry = all.iter().find(|i| i.email == "t@x.com").unwrap();
  assert_eq!(entry.role, Role::Teacher);
  assert_eq!(entry.display_name, "Tea Cher");
  assert_eq!(entry, &identity);
}

#[tokio::test]
async fn register_sets_session_and_keeps_phone() {
  let s = store();
  let identity = s
    .register(student("a@x.com").with_phone("+1 555 0100"))
    .await
    .unwrap();
  assert_eq!(identity.phone.as_deref(), Some("+1 555 0100"));
  assert_eq!(s.current_session().await, Some(identity));
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_change() {
  let s = store();
  s.register(student("a@x.com")).await.unwrap();
  let size = s.list_all().await.len();

  let err = s
    .register(NewIdentity::new("a@x.com", "another1", "Other", "teacher"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateEmail(ref e) if e == "a@x.com"));
  assert_eq!(s.list_all().await.len(), size);
}

#[tokio::test]
async fn duplicate_email_is_checked_before_password_and_role() {
  let s = store();
  s.register(student("a@x.com")).await.unwrap();
  let err = s
    .register(NewIdentity::new("a@x.com", "123", "X", "guest"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateEmail(_)));
}

#[tokio::test]
async fn password_length_boundary() {
  let s = store();
  let err = s
    .register(NewIdentity::new("short@x.com", "12345", "S", "student"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::WeakPassword { min: 6 }));
  assert!(s.list_all().await.is_empty());
  assert!(s.current_session().await.is_none());

  s.register(NewIdentity::new("ok@x.com", "123456", "S", "student"))
    .await
    .unwrap();
}

#[tokio::test]
async fn weak_password_is_checked_before_role() {
  let s = store();
  let err = s
    .register(NewIdentity::new("a@x.com", "123", "X", "guest"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::WeakPassword { .. }));
}

#[tokio::test]
async fn unknown_role_is_rejected() {
  let s = store();
  let err = s
    .register(NewIdentity::new("g@x.com", "secret1", "G", "guest"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidRole(ref r) if r == "guest"));
  assert!(s.list_all().await.is_empty());

  for (email, role) in [
    ("s@x.com", "student"),
    ("t@x.com", "teacher"),
    ("a@x.com", "admin"),
  ] {
    let identity = registered(&s, email, role).await;
    assert_eq!(identity.role.as_ref(), role);
  }
}

#[tokio::test]
async fn identifiers_are_sequential_and_never_reused() {
  let s = store();
  let a = registered(&s, "a@x.com", "student").await;
  let b = registered(&s, "b@x.com", "student").await;
  assert_eq!(a.id, IdentityId(1));
  assert_eq!(b.id, IdentityId(2));

  s.delete_by_email("b@x.com").await.unwrap();
  // A rejected registration must not consume an identifier either.
  let _ = s
    .register(NewIdentity::new("c@x.com", "x", "C", "student"))
    .await;
  let c = registered(&s, "c@x.com", "student").await;
  assert_eq!(c.id, IdentityId(3));
}

// ─── Sign-in ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_unknown_email_fails() {
  let s = store();
  let err = s.sign_in("nobody@x.com", "secret1").await.unwrap_err();
  assert!(matches!(err, Error::UnknownEmail(ref e) if e == "nobody@x.com"));
  assert!(s.current_session().await.is_none());
}

#[tokio::test]
async fn sign_in_accepts_any_password() {
  let s = store();
  let identity = s.register(student("a@x.com")).await.unwrap();
  s.sign_out().await;

  let signed_in = s.sign_in("a@x.com", "not the password").await.unwrap();
  assert_eq!(signed_in, identity);
  assert_eq!(s.current_session().await, Some(identity));
}

#[tokio::test]
async fn federated_sign_in_is_idempotent() {
  let s = store();
  let first = s.sign_in_federated(Role::Student).await.unwrap();
  assert_eq!(first.email, "federated.user@example.com");
  assert_eq!(first.display_name, "Federated User");
  assert_eq!(first.role, Role::Student);
  assert!(first.phone.is_none());
  assert_eq!(s.current_session().await, Some(first.clone()));

  s.sign_out().await;
  let second = s.sign_in_federated(Role::Admin).await.unwrap();
  assert_eq!(second.id, first.id);
  assert_eq!(second.email, first.email);
  // The role given on later calls does not rewrite the stored identity.
  assert_eq!(second.role, Role::Student);
  assert_eq!(s.current_session().await, Some(second));
  assert_eq!(s.list_all().await.len(), 1);
}

#[tokio::test]
async fn federated_email_is_configurable() {
  let config = StoreConfig {
    federated_email: "sso@campus.test".into(),
    ..StoreConfig::immediate()
  };
  let s = SessionStore::in_memory(config);
  let identity = s.sign_in_federated(Role::Teacher).await.unwrap();
  assert_eq!(identity.email, "sso@campus.test");
  assert!(s.sign_in("sso@campus.test", "").await.is_ok());
}

#[tokio::test]
async fn sign_out_is_unconditional() {
  let s = store();
  s.sign_out().await;
  assert!(s.current_session().await.is_none());

  s.register(student("a@x.com")).await.unwrap();
  s.sign_out().await;
  assert!(s.current_session().await.is_none());
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_signed_in_identity_clears_session() {
  let s = store();
  s.register(student("a@x.com")).await.unwrap();
  let removed = s.delete_by_email("a@x.com").await.unwrap();
  assert_eq!(removed.map(|i| i.email).as_deref(), Some("a@x.com"));
  assert!(s.current_session().await.is_none());
}

#[tokio::test]
async fn deleting_other_identity_keeps_session() {
  let s = store();
  registered(&s, "other@x.com", "teacher").await;
  let me = registered(&s, "me@x.com", "admin").await;

  s.delete_by_email("other@x.com").await.unwrap();
  assert_eq!(s.current_session().await, Some(me));
  assert_eq!(s.list_all().await.len(), 1);
}

#[tokio::test]
async fn deleting_absent_email_is_a_no_op() {
  let s = store();
  let me = registered(&s, "me@x.com", "admin").await;
  assert!(s.delete_by_email("ghost@x.com").await.unwrap().is_none());
  assert!(s.delete_by_email("ghost@x.com").await.unwrap().is_none());
  assert_eq!(s.current_session().await, Some(me));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn broadcast_to_all_reaches_every_role() {
  let s = store();
  let stu = registered(&s, "s@x.com", "student").await;
  let tea = registered(&s, "t@x.com", "teacher").await;
  let adm = registered(&s, "a@x.com", "admin").await;

  let n = s.broadcast_notification("Office", "Closed Friday", Target::All).await;
  for reader in [&stu, &tea, &adm] {
    assert_eq!(s.notifications_for(reader).await, vec![n.clone()]);
  }
}

#[tokio::test]
async fn broadcast_to_role_is_filtered() {
  let s = store();
  let stu = registered(&s, "s@x.com", "student").await;
  let tea = registered(&s, "t@x.com", "teacher").await;

  let n = s
    .broadcast_notification("Principal", "Staff meeting", Target::Teacher)
    .await;
  assert!(s.notifications_for(&stu).await.is_empty());
  assert_eq!(s.notifications_for(&tea).await, vec![n]);
}

#[tokio::test]
async fn notifications_are_newest_first() {
  let s = store();
  let stu = registered(&s, "s@x.com", "student").await;

  let a = s.broadcast_notification("T", "A", Target::Student).await;
  let b = s.broadcast_notification("T", "B", Target::All).await;
  s.broadcast_notification("T", "hidden", Target::Admin).await;
  let c = s.broadcast_notification("T", "C", Target::Student).await;

  assert!(a.id < b.id && b.id < c.id);
  let messages: Vec<_> = s
    .notifications_for(&stu)
    .await
    .into_iter()
    .map(|n| n.message)
    .collect();
  assert_eq!(messages, ["C", "B", "A"]);
}

#[tokio::test]
async fn empty_message_and_unknown_sender_are_accepted() {
  let s = store();
  let n = s.broadcast_notification("nobody registered", "", Target::All).await;
  assert_eq!(n.message, "");
  assert_eq!(n.sender_name, "nobody registered");
}

#[tokio::test]
async fn notifications_survive_sender_deletion() {
  let s = store();
  let tea = registered(&s, "t@x.com", "teacher").await;
  let stu = registered(&s, "s@x.com", "student").await;
  s.broadcast_notification(&tea.display_name, "Homework", Target::Student)
    .await;
  s.delete_by_email("t@x.com").await.unwrap();
  assert_eq!(s.notifications_for(&stu).await.len(), 1);
}

// ─── Scenario ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_sign_out_sign_in_delete() {
  let s = store();

  let identity = s
    .register(NewIdentity::new("a@x.com", "secret1", "A", "student"))
    .await
    .unwrap();
  assert_eq!(s.current_session().await, Some(identity.clone()));

  s.sign_out().await;
  assert!(s.current_session().await.is_none());

  let again = s.sign_in("a@x.com", "whatever").await.unwrap();
  assert_eq!(again, identity);
  assert_eq!(s.current_session().await, Some(identity));

  s.sign_out().await;
  s.delete_by_email("a@x.com").await.unwrap();
  assert!(s.list_all().await.iter().all(|i| i.email != "a@x.com"));
}

// ─── Observers ───────────────────────────────────────────────────────────────

fn recorder() -> (Arc<StdMutex<Vec<StoreEvent>>>, impl Fn(&StoreEvent) + Send + Sync) {
  let events = Arc::new(StdMutex::new(Vec::new()));
  let sink = events.clone();
  (events, move |e: &StoreEvent| sink.lock().unwrap().push(e.clone()))
}

#[tokio::test]
async fn observers_see_each_successful_mutation() {
  let s = store();
  let (events, callback) = recorder();
  s.subscribe(callback).await;

  let identity = s.register(student("a@x.com")).await.unwrap();
  let _ = s.register(student("a@x.com")).await;
  let _ = s.sign_in("ghost@x.com", "").await;
  s.sign_out().await;
  s.sign_in("a@x.com", "").await.unwrap();
  let n = s.broadcast_notification("T", "hi", Target::All).await;
  s.delete_by_email("a@x.com").await.unwrap();

  let events = events.lock().unwrap().clone();
  assert_eq!(events, vec![
    StoreEvent::Registered(identity.clone()),
    StoreEvent::SignedOut,
    StoreEvent::SignedIn(identity.clone()),
    StoreEvent::Broadcast(n),
    StoreEvent::Deleted {
      email:           "a@x.com".into(),
      removed:         Some(identity),
      session_cleared: true,
    },
  ]);
}

#[tokio::test]
async fn unsubscribed_observer_is_not_called() {
  let s = store();
  let (events, callback) = recorder();
  let id = s.subscribe(callback).await;
  s.sign_out().await;
  assert!(s.unsubscribe(id).await);
  assert!(!s.unsubscribe(id).await);
  s.sign_out().await;
  assert_eq!(events.lock().unwrap().len(), 1);
}

// ─── Backends ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_resumes_identifiers_after_existing_entries() {
  let mut backend = MemoryDirectory::new();
  for (id, email) in [(4, "d@x.com"), (9, "i@x.com")] {
    backend
      .upsert(Identity {
        id:           IdentityId(id),
        email:        email.into(),
        display_name: email.into(),
        role:         Role::Student,
        phone:        None,
      })
      .await
      .unwrap();
  }

  let s = SessionStore::open(backend, StoreConfig::immediate())
    .await
    .unwrap();
  assert_eq!(s.list_all().await.len(), 2);
  assert!(s.current_session().await.is_none());
  assert!(s.sign_in("i@x.com", "").await.is_ok());

  let fresh = s.register(student("new@x.com")).await.unwrap();
  assert_eq!(fresh.id, IdentityId(10));
}

/// Backend whose writes can be switched off to check that failures leave the
/// store untouched. The switch is shared so it can be flipped after the store
/// has taken ownership of the backend.
#[derive(Default)]
struct FlakyDirectory {
  inner:       MemoryDirectory,
  fail_writes: Arc<AtomicBool>,
}

impl FlakyDirectory {
  fn failing() -> Self {
    Self { fail_writes: Arc::new(AtomicBool::new(true)), ..Default::default() }
  }

  fn check(&self) -> Result<(), io::Error> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(io::Error::other("disk full"));
    }
    Ok(())
  }
}

impl DirectoryBackend for FlakyDirectory {
  type Error = io::Error;

  async fn load_all(&self) -> Result<Vec<Identity>, io::Error> {
    Ok(self.inner.load_all().await.unwrap_or_default())
  }

  async fn upsert(&mut self, identity: Identity) -> Result<(), io::Error> {
    self.check()?;
    let _ = self.inner.upsert(identity).await;
    Ok(())
  }

  async fn delete<'a>(
    &'a mut self,
    email: &'a str,
  ) -> Result<Option<Identity>, io::Error> {
    self.check()?;
    Ok(self.inner.delete(email).await.unwrap_or_default())
  }
}

#[tokio::test]
async fn backend_failure_leaves_state_unchanged() {
  let s = SessionStore::open(FlakyDirectory::failing(), StoreConfig::immediate())
    .await
    .unwrap();
  let (events, callback) = recorder();
  s.subscribe(callback).await;

  let err = s.register(student("a@x.com")).await.unwrap_err();
  assert!(matches!(err, Error::Backend(_)));
  assert!(err.to_string().contains("disk full"));
  assert!(s.list_all().await.is_empty());
  assert!(s.current_session().await.is_none());

  assert!(matches!(
    s.sign_in_federated(Role::Student).await,
    Err(Error::Backend(_))
  ));
  assert!(s.current_session().await.is_none());
  assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_backend_delete_keeps_entry_and_session() {
  let backend = FlakyDirectory::default();
  let fail_writes = backend.fail_writes.clone();
  let s = SessionStore::open(backend, StoreConfig::immediate())
    .await
    .unwrap();
  let me = s.register(student("a@x.com")).await.unwrap();

  let (events, callback) = recorder();
  s.subscribe(callback).await;
  fail_writes.store(true, Ordering::SeqCst);

  let err = s.delete_by_email("a@x.com").await.unwrap_err();
  assert!(matches!(err, Error::Backend(_)));
  assert_eq!(s.list_all().await, vec![me.clone()]);
  assert_eq!(s.current_session().await, Some(me));
  assert!(events.lock().unwrap().is_empty());

  // Once the backend recovers the same delete goes through.
  fail_writes.store(false, Ordering::SeqCst);
  assert!(s.delete_by_email("a@x.com").await.unwrap().is_some());
  assert!(s.current_session().await.is_none());
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_callers_are_serialised() {
  let config = StoreConfig {
    latency: Latency { auth_ms: 20, ..Latency::zero() },
    ..StoreConfig::immediate()
  };
  let s = Arc::new(SessionStore::in_memory(config));

  let started = tokio::time::Instant::now();
  let handles: Vec<_> = ["a@x.com", "b@x.com", "c@x.com"]
    .into_iter()
    .map(|email| {
      let s = s.clone();
      tokio::spawn(async move { s.register(student(email)).await })
    })
    .collect();

  let mut ids = Vec::new();
  for handle in handles {
    ids.push(handle.await.unwrap().unwrap().id.0);
  }
  ids.sort_unstable();

  assert_eq!(ids, [1, 2, 3]);
  assert!(started.elapsed() >= Duration::from_millis(60));
  assert_eq!(s.list_all().await.len(), 3);
}

#[tokio::test]
async fn same_email_raced_registers_once() {
  let s = Arc::new(store());
  let a = tokio::spawn({
    let s = s.clone();
    async move { s.register(student("dup@x.com")).await }
  });
  let b = tokio::spawn({
    let s = s.clone();
    async move { s.register(student("dup@x.com")).await }
  });

  let results = [a.await.unwrap(), b.await.unwrap()];
  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(
    results
      .iter()
      .any(|r| matches!(r, Err(Error::DuplicateEmail(_))))
  );
  assert_eq!(s.list_all().await.len(), 1);
}

// ─── Cancellation ────────────────────────────────────────────────────────────

fn slow() -> StoreConfig {
  StoreConfig {
    latency: Latency { auth_ms: 50, admin_ms: 50, broadcast_ms: 50, sign_out_ms: 50 },
    ..StoreConfig::immediate()
  }
}

#[tokio::test]
async fn timed_out_register_still_applies() {
  let s = SessionStore::in_memory(slow());

  let attempt =
    tokio::time::timeout(Duration::from_millis(10), s.register(student("a@x.com"))).await;
  assert!(attempt.is_err());

  // Reads queue behind the in-flight registration.
  let all = s.list_all().await;
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].email, "a@x.com");
  assert_eq!(s.current_session().await.map(|i| i.email).as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn timed_out_delete_and_broadcast_still_apply() {
  let s = SessionStore::in_memory(slow());
  let stu = s.register(student("a@x.com")).await.unwrap();

  let attempt = tokio::time::timeout(
    Duration::from_millis(10),
    s.broadcast_notification("T", "late", Target::All),
  )
  .await;
  assert!(attempt.is_err());
  assert_eq!(s.notifications_for(&stu).await.len(), 1);

  let attempt =
    tokio::time::timeout(Duration::from_millis(10), s.delete_by_email("a@x.com")).await;
  assert!(attempt.is_err());
  assert!(s.list_all().await.is_empty());
  assert!(s.current_session().await.is_none());
}

#[tokio::test]
async fn timed_out_sign_out_still_applies() {
  let s = SessionStore::in_memory(slow());
  s.register(student("a@x.com")).await.unwrap();

  let (events, callback) = recorder();
  s.subscribe(callback).await;
  let attempt = tokio::time::timeout(Duration::from_millis(10), s.sign_out()).await;
  assert!(attempt.is_err());

  assert!(s.current_session().await.is_none());
  assert_eq!(*events.lock().unwrap(), vec![StoreEvent::SignedOut]);
}
