//! Identities — the accounts held in the directory.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

// ─── Role ────────────────────────────────────────────────────────────────────

/// The closed set of roles an identity can hold.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
  Student,
  Teacher,
  Admin,
}

impl Role {
  /// Parse user-supplied role text. This is the only place free-form role
  /// strings are accepted; everything downstream holds a [`Role`].
  pub fn parse(input: &str) -> Result<Self> {
    Self::from_str(input.trim())
      .map_err(|_| Error::InvalidRole(input.to_owned()))
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Sequential identifier assigned at registration. Never reused.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IdentityId(pub u64);

impl fmt::Display for IdentityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A registered account. The email is the directory key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id:           IdentityId,
  pub email:        String,
  pub display_name: String,
  pub role:         Role,
  pub phone:        Option<String>,
}

// ─── NewIdentity ─────────────────────────────────────────────────────────────

/// Unvalidated input to [`crate::SessionStore::register`].
///
/// The role is kept as text so that validation happens inside the store, in
/// the documented order (duplicate email, then password, then role).
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub email:        String,
  pub password:     String,
  pub display_name: String,
  pub role:         String,
  pub phone:        Option<String>,
}

impl NewIdentity {
  /// Convenience constructor with no phone number.
  pub fn new(
    email: impl Into<String>,
    password: impl Into<String>,
    display_name: impl Into<String>,
    role: impl Into<String>,
  ) -> Self {
    Self {
      email:        email.into(),
      password:     password.into(),
      display_name: display_name.into(),
      role:         role.into(),
      phone:        None,
    }
  }

  pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
    self.phone = Some(phone.into());
    self
  }
}
