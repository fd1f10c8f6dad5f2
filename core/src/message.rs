//! IRC line tokenizing and formatting
//!
//! Inbound lines are tokenized with the IRC trailing-parameter convention;
//! outbound replies are built from a prefix, a command word and parameters.

use std::fmt;

/// IRC message prefix (server or user)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// Server name
    Server(String),
    /// User prefix (nick!user@host)
    User {
        nick: String,
        user: String,
        host: String,
    },
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => write!(f, "{}", name),
            Prefix::User { nick, user, host } => write!(f, "{}!{}@{}", nick, user, host),
        }
    }
}

/// An outbound IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    pub fn with_prefix(prefix: Prefix, command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: Some(prefix),
            command: command.into(),
            params,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            if last.is_empty() || last.starts_with(':') || last.contains(' ') {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}

/// Split a raw line into tokens.
///
/// Tokens are separated by single spaces. A token beginning with `:` that is
/// not the first token swallows the rest of the line as one trailing
/// parameter. The leading `:source` prefix, if any, is kept as the first
/// token; dispatch strips it separately.
pub fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut parts = line.split(' ');
    while let Some(part) = parts.next() {
        if part.is_empty() {
            continue;
        }
        if !tokens.is_empty() && part.starts_with(':') {
            let mut trailing = part[1..].to_string();
            for rest in parts.by_ref() {
                trailing.push(' ');
                trailing.push_str(rest);
            }
            tokens.push(trailing);
            break;
        }
        tokens.push(part.to_string());
    }
    tokens
}

/// Strip an optional leading `:source` token, returning the source (without
/// the colon) and the remaining tokens.
pub fn strip_source(mut tokens: Vec<String>) -> (Option<String>, Vec<String>) {
    if tokens.first().map(|t| t.starts_with(':')).unwrap_or(false) {
        let source = tokens.remove(0);
        (Some(source[1..].to_string()), tokens)
    } else {
        (None, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        assert_eq!(split_line("NICK alice"), vec!["NICK", "alice"]);
    }

    #[test]
    fn test_split_trailing() {
        assert_eq!(
            split_line("USER a 0 * :Alice Example"),
            vec!["USER", "a", "0", "*", "Alice Example"]
        );
    }

    #[test]
    fn test_split_keeps_source_token() {
        let tokens = split_line(":irc.example PRIVMSG #chan :hello there");
        assert_eq!(tokens, vec![":irc.example", "PRIVMSG", "#chan", "hello there"]);
        let (source, rest) = strip_source(tokens);
        assert_eq!(source.as_deref(), Some("irc.example"));
        assert_eq!(rest, vec!["PRIVMSG", "#chan", "hello there"]);
    }

    #[test]
    fn test_split_collapses_repeated_spaces() {
        assert_eq!(split_line("MODE  #chan   +k  secret"), vec!["MODE", "#chan", "+k", "secret"]);
    }

    #[test]
    fn test_split_empty_trailing() {
        assert_eq!(split_line("TOPIC #chan :"), vec!["TOPIC", "#chan", ""]);
    }

    #[test]
    fn test_display_trailing() {
        let msg = Message::with_prefix(
            Prefix::User {
                nick: "alice".into(),
                user: "a".into(),
                host: "host".into(),
            },
            "PRIVMSG",
            vec!["#chan".into(), "hello world".into()],
        );
        assert_eq!(msg.to_string(), ":alice!a@host PRIVMSG #chan :hello world");
    }

    #[test]
    fn test_display_single_word_param() {
        let msg = Message::new("PONG", vec!["irc.example".into()]);
        assert_eq!(msg.to_string(), "PONG irc.example");
    }

    #[test]
    fn test_display_numeric() {
        let msg = Message::with_prefix(
            Prefix::Server("irc.example".into()),
            "001",
            vec!["alice".into(), "Welcome to the network".into()],
        );
        assert_eq!(msg.to_string(), ":irc.example 001 alice :Welcome to the network");
    }
}
