//! Layered console configuration: optional TOML file, then `CAMPUS__*`
//! environment variables.

use std::path::Path;

use anyhow::{Context as _, Result};
use campus_core::{
  backend::{DirectoryBackend, MemoryDirectory},
  config::StoreConfig,
  identity::{Identity, IdentityId, Role},
};
use serde::Deserialize;

/// Shape of `campus.toml`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store: StoreConfig,
  /// Accounts present in the directory when the console starts.
  pub seed:  Vec<SeedAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
  pub email: String,
  pub name:  String,
  pub role:  Role,
  #[serde(default)]
  pub phone: Option<String>,
}

impl Default for Settings {
  fn default() -> Self {
    let seed = [
      ("admin@campus.test", "Campus Admin", Role::Admin),
      ("teacher@campus.test", "Demo Teacher", Role::Teacher),
      ("student@campus.test", "Demo Student", Role::Student),
    ]
    .into_iter()
    .map(|(email, name, role)| SeedAccount {
      email: email.to_string(),
      name: name.to_string(),
      role,
      phone: None,
    })
    .collect();
    Self { store: StoreConfig::default(), seed }
  }
}

impl Settings {
  pub fn load(path: &Path) -> Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CAMPUS").separator("__"))
      .build()
      .with_context(|| format!("reading configuration from {}", path.display()))?
      .try_deserialize()
      .context("invalid configuration")
  }

  /// Build the starting directory from the seed list. Later duplicates of an
  /// email replace earlier ones.
  pub async fn seeded_directory(&self) -> MemoryDirectory {
    let mut directory = MemoryDirectory::new();
    for (n, account) in self.seed.iter().enumerate() {
      let identity = Identity {
        id:           IdentityId(n as u64 + 1),
        email:        account.email.clone(),
        display_name: account.name.clone(),
        role:         account.role,
        phone:        account.phone.clone(),
      };
      let Ok(()) = directory.upsert(identity).await;
    }
    directory
  }
}
