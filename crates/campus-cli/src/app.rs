//! Console state and command dispatch.
//!
//! The console caches the signed-in identity and refreshes it whenever the
//! store reports a change, the same way a view bound to session state would
//! re-render.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use campus_core::{
  SessionStore,
  identity::{Identity, NewIdentity, Role},
  notification::Target,
};

use crate::{
  command::{self, Command, USAGE},
  view,
};

/// Result of handling one input line.
#[derive(Debug, Default)]
pub struct Reply {
  pub lines: Vec<String>,
  pub quit:  bool,
}

impl Reply {
  fn line(text: impl Into<String>) -> Self {
    Self { lines: vec![text.into()], quit: false }
  }

  fn lines(lines: Vec<String>) -> Self { Self { lines, quit: false } }
}

/// Top-level console state.
pub struct App {
  store:          Arc<SessionStore>,
  /// Role given to the federated account the first time it signs in.
  federated_role: Role,
  /// Session as last observed; refreshed when `stale` is set.
  session:        Option<Identity>,
  stale:          Arc<AtomicBool>,
}

impl App {
  /// Create the console and subscribe it to store changes.
  pub async fn new(store: Arc<SessionStore>, federated_role: Role) -> Self {
    let stale = Arc::new(AtomicBool::new(true));
    let flag = stale.clone();
    store
      .subscribe(move |event| {
        tracing::debug!(?event, "view invalidated");
        flag.store(true, Ordering::Release);
      })
      .await;

    let mut app = Self { store, federated_role, session: None, stale };
    app.refresh().await;
    app
  }

  async fn refresh(&mut self) {
    if self.stale.swap(false, Ordering::AcqRel) {
      self.session = self.store.current_session().await;
    }
  }

  pub fn session(&self) -> Option<&Identity> { self.session.as_ref() }

  pub fn prompt(&self) -> String {
    match &self.session {
      Some(identity) => format!("{} ({})> ", identity.display_name, identity.role),
      None => "guest> ".to_string(),
    }
  }

  /// Parse and run one line of input.
  pub async fn handle_line(&mut self, line: &str) -> Reply {
    let reply = match command::parse(line) {
      Ok(Some(cmd)) => self.dispatch(cmd).await,
      Ok(None) => Reply::default(),
      Err(e) => Reply::line(format!("error: {e}")),
    };
    self.refresh().await;
    reply
  }

  async fn dispatch(&mut self, cmd: Command) -> Reply {
    match cmd {
      Command::Help => Reply::line(USAGE),
      Command::Quit => Reply { lines: vec!["bye".into()], quit: true },
      Command::WhoAmI => match self.session() {
        Some(identity) => Reply::line(view::identity_line(identity)),
        None => Reply::line("not signed in"),
      },

      Command::Register { email, password, role, phone, name } => {
        let input = NewIdentity { email, password, display_name: name, role, phone };
        match self.store.register(input).await {
          Ok(identity) => {
            Reply::line(format!("registered {}", view::identity_line(&identity)))
          }
          Err(e) => failure(e),
        }
      }
      Command::Login { email, password } => {
        match self.store.sign_in(&email, &password).await {
          Ok(identity) => Reply::line(format!("welcome back, {}", identity.display_name)),
          Err(e) => failure(e),
        }
      }
      Command::Federated => {
        match self.store.sign_in_federated(self.federated_role).await {
          Ok(identity) => Reply::line(format!("welcome, {}", identity.display_name)),
          Err(e) => failure(e),
        }
      }
      Command::Logout => {
        self.store.sign_out().await;
        Reply::line("signed out")
      }

      Command::Home => match self.session().cloned() {
        Some(identity) => self.dashboard(&identity).await,
        None => Reply::line("not signed in; use `login`, `register` or `federated`"),
      },
      Command::Inbox => match self.session().cloned() {
        Some(identity) => {
          Reply::lines(view::inbox(&self.store.notifications_for(&identity).await))
        }
        None => Reply::line("not signed in"),
      },
      Command::Send { target, message } => self.send(target, &message).await,
      Command::Users => match self.require(Role::Admin) {
        Ok(_) => Reply::lines(view::directory(&self.store.list_all().await)),
        Err(reply) => reply,
      },
      Command::Delete { email } => match self.require(Role::Admin) {
        Ok(_) => match self.store.delete_by_email(&email).await {
          Ok(Some(removed)) => {
            Reply::line(format!("deleted {}", view::identity_line(&removed)))
          }
          Ok(None) => Reply::line(format!("no account with email {email:?}")),
          Err(e) => failure(e),
        },
        Err(reply) => reply,
      },
    }
  }

  async fn dashboard(&self, identity: &Identity) -> Reply {
    let mut lines = vec![
      view::dashboard_title(identity.role).to_string(),
      format!("signed in as {}", view::identity_line(identity)),
      "notifications:".to_string(),
    ];
    lines.extend(view::inbox(&self.store.notifications_for(identity).await));
    match identity.role {
      Role::Student => {}
      Role::Teacher => lines.push("use `send <target> <message>` to notify".into()),
      Role::Admin => {
        lines.extend(view::directory(&self.store.list_all().await));
        lines.push("use `delete <email>` to remove an account".into());
      }
    }
    Reply::lines(lines)
  }

  async fn send(&self, target: Target, message: &str) -> Reply {
    let sender = match &self.session {
      Some(identity) if matches!(identity.role, Role::Teacher | Role::Admin) => identity,
      Some(_) => return Reply::line("only teachers and admins can send notifications"),
      None => return Reply::line("not signed in"),
    };
    if message.trim().is_empty() {
      return Reply::line("message must not be empty");
    }
    let n = self
      .store
      .broadcast_notification(&sender.display_name, message, target)
      .await;
    Reply::line(format!("sent notification #{} to {}", n.id, n.target))
  }

  /// The session identity, if it holds `role`.
  fn require(&self, role: Role) -> Result<&Identity, Reply> {
    match &self.session {
      Some(identity) if identity.role == role => Ok(identity),
      Some(_) => Err(Reply::line(format!("only {role} accounts can do that"))),
      None => Err(Reply::line("not signed in")),
    }
  }
}

fn failure(err: campus_core::Error) -> Reply {
  tracing::warn!(error = %err, "operation rejected");
  Reply::line(format!("error: {err}"))
}
