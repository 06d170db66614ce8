//! The `DirectoryBackend` trait and its in-memory default.
//!
//! The store keeps its own email index and delegates durability to a
//! backend. [`MemoryDirectory`] persists nothing beyond the process, which is
//! the behaviour the demo ships with.

use std::{collections::BTreeMap, convert::Infallible, future::Future};

use crate::identity::Identity;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over where directory entries live.
///
/// The store only calls these methods while holding its own lock, so
/// implementations never see concurrent writes.
pub trait DirectoryBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Load every stored identity. Called once when the store opens.
  fn load_all(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  /// Insert `identity`, replacing any entry with the same email.
  fn upsert(
    &mut self,
    identity: Identity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove the entry for `email`, returning it if it existed.
  fn delete<'a>(
    &'a mut self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;
}

// ─── Memory backend ──────────────────────────────────────────────────────────

/// Email-keyed in-memory directory. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
  entries: BTreeMap<String, Identity>,
}

impl MemoryDirectory {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl DirectoryBackend for MemoryDirectory {
  type Error = Infallible;

  async fn load_all(&self) -> Result<Vec<Identity>, Infallible> {
    Ok(self.entries.values().cloned().collect())
  }

  async fn upsert(&mut self, identity: Identity) -> Result<(), Infallible> {
    self.entries.insert(identity.email.clone(), identity);
    Ok(())
  }

  async fn delete<'a>(
    &'a mut self,
    email: &'a str,
  ) -> Result<Option<Identity>, Infallible> {
    Ok(self.entries.remove(email))
  }
}
