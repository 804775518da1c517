//! Terminal front-end commands.

/// Shown while a text query is in flight.
pub const THINKING: &str = "Analyzing specs...";

pub const HELP: &str = "\
Commands:
  /login <email> <password>     sign in
  /register <email> <password>  create an account and sign in
  /logout                       sign out
  /voice                        start or stop the voice agent
  /help                         show this help
  /quit                         exit
Anything else is sent to the specialist, e.g. \"Yamaha R15 V3 price\".";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, secret: String },
    Register { email: String, secret: String },
    Logout,
    Voice,
    Help,
    Quit,
    /// A slash command we do not know.
    Unknown(String),
    /// Free text for the specialist.
    Utterance(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        if !trimmed.starts_with('/') {
            return Command::Utterance(line.trim_end_matches(['\r', '\n']).to_string());
        }

        let mut parts = trimmed.split_whitespace();
        let name = parts.next().unwrap_or_default();
        // Missing credentials are passed through blank so the gate reports them.
        let mut credentials = || {
            let email = parts.next().unwrap_or_default().to_string();
            let secret = parts.next().unwrap_or_default().to_string();
            (email, secret)
        };

        match name {
            "/login" => {
                let (email, secret) = credentials();
                Command::Login { email, secret }
            }
            "/register" => {
                let (email, secret) = credentials();
                Command::Register { email, secret }
            }
            "/logout" => Command::Logout,
            "/voice" => Command::Voice,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}
