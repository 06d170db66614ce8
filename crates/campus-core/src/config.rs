//! Store configuration.

use std::time::Duration;

use serde::Deserialize;

/// Tunables for [`crate::SessionStore`]. Every field has a default, so an
/// empty config section is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Registration rejects shorter passwords.
  pub min_password_len:       usize,
  /// Directory key used by the federated sign-in stub.
  pub federated_email:        String,
  pub federated_display_name: String,
  pub latency:                Latency,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      min_password_len:       6,
      federated_email:        "federated.user@example.com".to_string(),
      federated_display_name: "Federated User".to_string(),
      latency:                Latency::default(),
    }
  }
}

impl StoreConfig {
  /// Default settings with every artificial delay removed.
  pub fn immediate() -> Self {
    Self { latency: Latency::zero(), ..Self::default() }
  }
}

/// Simulated round-trip times, in milliseconds, applied before each
/// mutation takes effect.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Latency {
  /// Register, sign-in and federated sign-in.
  pub auth_ms:      u64,
  pub sign_out_ms:  u64,
  /// Directory deletion.
  pub admin_ms:     u64,
  pub broadcast_ms: u64,
}

impl Default for Latency {
  fn default() -> Self {
    Self { auth_ms: 1000, sign_out_ms: 500, admin_ms: 500, broadcast_ms: 500 }
  }
}

impl Latency {
  pub fn zero() -> Self {
    Self { auth_ms: 0, sign_out_ms: 0, admin_ms: 0, broadcast_ms: 0 }
  }

  pub fn auth(&self) -> Duration { Duration::from_millis(self.auth_ms) }

  pub fn sign_out(&self) -> Duration { Duration::from_millis(self.sign_out_ms) }

  pub fn admin(&self) -> Duration { Duration::from_millis(self.admin_ms) }

  pub fn broadcast(&self) -> Duration { Duration::from_millis(self.broadcast_ms) }
}
