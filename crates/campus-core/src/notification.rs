//! Broadcast notifications and their role targets.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::identity::Role;

/// Who a notification is addressed to.
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
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Target {
  Student,
  Teacher,
  Admin,
  All,
}

impl Target {
  /// Whether a reader holding `role` should see notifications with this
  /// target.
  pub fn includes(self, role: Role) -> bool {
    match self {
      Self::All => true,
      other => other == Self::from(role),
    }
  }

  /// Parse target text, returning `None` for anything unrecognised.
  pub fn parse(input: &str) -> Option<Self> { Self::from_str(input.trim()).ok() }
}

impl From<Role> for Target {
  fn from(role: Role) -> Self {
    match role {
      Role::Student => Self::Student,
      Role::Teacher => Self::Teacher,
      Role::Admin => Self::Admin,
    }
  }
}

/// Sequential notification identifier; strictly increasing in creation order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A broadcast message. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id:          NotificationId,
  /// Free text; not checked against the directory.
  pub sender_name: String,
  pub message:     String,
  pub created_at:  DateTime<Utc>,
  pub target:      Target,
}
