//! Error types for `campus-core`.

use thiserror::Error;

/// Every failure the store can report. None of them are fatal; callers are
/// expected to surface them and carry on.
#[derive(Debug, Error)]
pub enum Error {
  #[error("an account with email {0:?} already exists")]
  DuplicateEmail(String),

  #[error("password must be at least {min} characters")]
  WeakPassword { min: usize },

  #[error("unrecognised role: {0:?}")]
  InvalidRole(String),

  #[error("no account with email {0:?}")]
  UnknownEmail(String),

  #[error("storage backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Backend(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
