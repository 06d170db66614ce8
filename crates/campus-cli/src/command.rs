//! Parsing of console input lines into [`Command`]s.

use anyhow::{Result, anyhow, bail};
use campus_core::notification::Target;

/// One console command. Free-text arguments (names, messages) take the rest
/// of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Help,
  Quit,
  WhoAmI,
  Home,
  Inbox,
  Users,
  Logout,
  Federated,
  Register {
    email:    String,
    password: String,
    role:     String,
    phone:    Option<String>,
    name:     String,
  },
  Login {
    email:    String,
    password: String,
  },
  Send {
    target:  Target,
    message: String,
  },
  Delete {
    email: String,
  },
}

pub const USAGE: &str = "\
commands:
  register <email> <password> <role> <phone|-> <display name>
  login <email> <password>
  federated                 sign in with the federated account
  logout
  whoami
  home                      role dashboard
  inbox                     notifications for the signed-in account
  send <target> <message>   teacher/admin; target is student|teacher|admin|all
  users                     admin: list the directory
  delete <email>            admin: remove an account
  help
  quit";

/// Split off the first whitespace-delimited word; the remainder is trimmed.
fn split_word(input: &str) -> (&str, &str) {
  let input = input.trim_start();
  match input.find(char::is_whitespace) {
    Some(at) => (&input[..at], input[at..].trim()),
    None => (input, ""),
  }
}

fn required<'a>(input: &'a str, what: &str, usage: &str) -> Result<(&'a str, &'a str)> {
  let (word, rest) = split_word(input);
  if word.is_empty() {
    bail!("missing {what}; usage: {usage}");
  }
  Ok((word, rest))
}

/// Parse a line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>> {
  let (verb, rest) = split_word(line);
  if verb.is_empty() {
    return Ok(None);
  }

  let command = match verb.to_ascii_lowercase().as_str() {
    "help" | "?" => Command::Help,
    "quit" | "exit" => Command::Quit,
    "whoami" => Command::WhoAmI,
    "home" => Command::Home,
    "inbox" => Command::Inbox,
    "users" => Command::Users,
    "logout" => Command::Logout,
    "federated" => Command::Federated,
    "register" => {
      const U: &str = "register <email> <password> <role> <phone|-> <display name>";
      let (email, rest) = required(rest, "email", U)?;
      let (password, rest) = required(rest, "password", U)?;
      let (role, rest) = required(rest, "role", U)?;
      let (phone, name) = required(rest, "phone", U)?;
      if name.is_empty() {
        bail!("missing display name; usage: {U}");
      }
      Command::Register {
        email:    email.to_owned(),
        password: password.to_owned(),
        role:     role.to_owned(),
        phone:    (phone != "-").then(|| phone.to_owned()),
        name:     name.to_owned(),
      }
    }
    "login" => {
      const U: &str = "login <email> <password>";
      let (email, rest) = required(rest, "email", U)?;
      // An absent password is allowed; the store does not check it.
      let (password, _) = split_word(rest);
      Command::Login { email: email.to_owned(), password: password.to_owned() }
    }
    "send" => {
      const U: &str = "send <target> <message>";
      let (target, message) = required(rest, "target", U)?;
      let target = Target::parse(target)
        .ok_or_else(|| anyhow!("unknown target {target:?}; expected student, teacher, admin or all"))?;
      Command::Send { target, message: message.to_owned() }
    }
    "delete" => {
      let (email, _) = required(rest, "email", "delete <email>")?;
      Command::Delete { email: email.to_owned() }
    }
    other => bail!("unknown command {other:?}; type `help` for a list"),
  };
  Ok(Some(command))
}
