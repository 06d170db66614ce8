//! Plain-text rendering of store data.

use campus_core::{
  identity::{Identity, Role},
  notification::Notification,
};

pub fn identity_line(identity: &Identity) -> String {
  let phone = identity
    .phone
    .as_deref()
    .map(|p| format!(", {p}"))
    .unwrap_or_default();
  format!(
    "#{} {} <{}> [{}{phone}]",
    identity.id, identity.display_name, identity.email, identity.role
  )
}

pub fn inbox(notifications: &[Notification]) -> Vec<String> {
  if notifications.is_empty() {
    return vec!["  (no notifications)".to_string()];
  }
  notifications
    .iter()
    .map(|n| {
      format!(
        "  {} [{}] {}: {}",
        n.created_at.format("%Y-%m-%d %H:%M"),
        n.target,
        n.sender_name,
        n.message
      )
    })
    .collect()
}

pub fn directory(identities: &[Identity]) -> Vec<String> {
  let mut lines = vec![format!("{} account(s):", identities.len())];
  lines.extend(identities.iter().map(|i| format!("  {}", identity_line(i))));
  lines
}

/// Heading shown above a role's dashboard.
pub fn dashboard_title(role: Role) -> &'static str {
  match role {
    Role::Student => "Student dashboard",
    Role::Teacher => "Teacher dashboard",
    Role::Admin => "Admin dashboard",
  }
}
