//! Console command parsing

use session::ActivityKind;

pub const HELP: &str = "\
commands:
  signin <email> <password> [remember]   sign in (remember persists the identity)
  logout                                 end the session
  extend                                 dismiss the expiry warning
  activity [kind]                        simulate input (mousedown, keypress, ...)
  status                                 show the current session
  reset <email>                          send a password reset link
  passwd <new>                           change the password
  help                                   show this text
  quit                                   exit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    SignIn {
        email: String,
        password: String,
        remember: bool,
    },
    Logout,
    Extend,
    Activity(ActivityKind),
    Status,
    Reset(String),
    Passwd(String),
    Help,
    Quit,
}

impl Command {
    /// `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("signin", [email, password]) => Command::SignIn {
                email: email.to_string(),
                password: password.to_string(),
                remember: false,
            },
            ("signin", [email, password, "remember"]) => Command::SignIn {
                email: email.to_string(),
                password: password.to_string(),
                remember: true,
            },
            ("signin", _) => return Err("usage: signin <email> <password> [remember]".into()),
            ("logout", []) => Command::Logout,
            ("extend", []) => Command::Extend,
            ("activity", []) => Command::Activity(ActivityKind::PointerMove),
            ("activity", [kind]) => Command::Activity(
                ActivityKind::from_event_name(kind)
                    .ok_or_else(|| format!("unknown activity {kind:?}"))?,
            ),
            ("status", []) => Command::Status,
            ("reset", [email]) => Command::Reset(email.to_string()),
            ("reset", _) => return Err("usage: reset <email>".into()),
            ("passwd", [secret]) => Command::Passwd(secret.to_string()),
            ("passwd", _) => return Err("usage: passwd <new>".into()),
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            _ => return Err(format!("unknown command {line:?}, try `help`")),
        };
        Ok(Some(command))
    }
}
