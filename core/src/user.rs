//! User entity and registration state

use crate::connection::Connection;
use crate::modes::{Bitmask, ModeKind, ModeTable};
use crate::reactor::{TimerId, Token};
use crate::recvq::ReceiveQueue;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use std::net::SocketAddr;

/// Pending-registration flags. A user is introduced once all are clear.
pub mod pending {
    pub const NICK: u32 = 0x1;
    pub const USER: u32 = 0x2;
    pub const DNS: u32 = 0x4;
    pub const IDENT: u32 = 0x8;
}

/// User mode characters registered at startup, in fixed order.
pub fn standard_user_modes() -> ModeTable {
    let mut table = ModeTable::new();
    for c in ['d', 'i', 'o', 'w'] {
        table
            .register(c, ModeKind::Simple)
            .expect("user mode table fits its slots");
    }
    table
}

/// One connection's identity and registration state.
pub struct User {
    pub token: Token,
    /// Index of the owning listener.
    pub listener: usize,
    pub addr: SocketAddr,

    pub nick: Option<String>,
    /// Ident/username; `~`-prefixed when not verified by an ident server.
    pub ident: String,
    /// Visible hostname: DNS name when resolution succeeded, IP literal
    /// otherwise.
    pub hostname: String,
    pub realname: String,
    pub away: Option<String>,

    pub pending: Bitmask,
    pub modes: Bitmask,
    /// Folded names of joined channels.
    pub channels: FxHashSet<String>,

    pub connected_at: DateTime<Utc>,
    pub last_pong: DateTime<Utc>,
    pub last_action: DateTime<Utc>,

    pub recvq: ReceiveQueue,
    pub flood_score: u32,
    /// A soft-limit warning has been sent and not yet cleared.
    pub flood_warned: bool,

    /// Set once the initial PING has been sent; the matching PONG finishes
    /// registration.
    pub ping_sent: bool,
    pub expected_pong: Option<String>,
    /// Registration completed and the welcome burst was sent.
    pub registered: bool,

    pub auth_timer: Option<TimerId>,
    pub ping_timer: Option<TimerId>,

    /// Destruction has been requested; the entity is only kept for
    /// outstanding lookup callbacks.
    pub destroying: bool,

    /// The transport, present while the connection is live.
    pub conn: Option<Connection>,
}

impl User {
    pub fn new(token: Token, listener: usize, addr: SocketAddr, conn: Connection) -> Self {
        let now = Utc::now();
        let mut pending_flags = Bitmask::new();
        pending_flags.add(pending::NICK);
        pending_flags.add(pending::USER);
        Self {
            token,
            listener,
            addr,
            nick: None,
            ident: "~unknown".to_string(),
            hostname: addr.ip().to_string(),
            realname: String::new(),
            away: None,
            pending: pending_flags,
            modes: Bitmask::new(),
            channels: FxHashSet::default(),
            connected_at: now,
            last_pong: now,
            last_action: now,
            recvq: ReceiveQueue::new(),
            flood_score: 0,
            flood_warned: false,
            ping_sent: false,
            expected_pong: None,
            registered: false,
            auth_timer: None,
            ping_timer: None,
            destroying: false,
            conn: Some(conn),
        }
    }

    /// Introduced means the registration handshake is complete.
    pub fn is_introduced(&self) -> bool {
        self.registered
    }

    /// All four pending flags are clear; the initial PING may be sent.
    pub fn handshake_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether an asynchronous lookup has yet to report back. Destruction
    /// is deferred while this holds.
    pub fn has_pending_lookups(&self) -> bool {
        self.pending.isset(pending::DNS) || self.pending.isset(pending::IDENT)
    }

    /// Nickname for replies; `*` until one is set.
    pub fn display_nick(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    /// The `nick!ident@host` source mask.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.display_nick(), self.ident, self.hostname)
    }

    pub fn prefix(&self) -> crate::message::Prefix {
        crate::message::Prefix::User {
            nick: self.display_nick().to_string(),
            user: self.ident.clone(),
            host: self.hostname.clone(),
        }
    }

    /// Queue a raw line on the connection. Lines to a torn-down connection
    /// are silently dropped.
    pub fn send_raw(&self, line: impl Into<String>) -> bool {
        match &self.conn {
            Some(conn) => conn.send_line(line),
            None => false,
        }
    }

    pub fn send(&self, message: &crate::message::Message) -> bool {
        self.send_raw(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;

    fn test_user() -> User {
        let reactor = Reactor::new();
        let handle = reactor.handle();
        let token = handle.alloc_token();
        let (server_side, _client_side) = tokio::io::duplex(256);
        let conn = Connection::spawn(token, server_side, "127.0.0.1:1234".parse().unwrap(), handle);
        User::new(token, 0, "127.0.0.1:1234".parse().unwrap(), conn)
    }

    #[tokio::test]
    async fn test_new_user_is_not_introduced() {
        let user = test_user();
        assert!(!user.is_introduced());
        assert!(user.pending.isset(pending::NICK));
        assert!(user.pending.isset(pending::USER));
        assert!(!user.has_pending_lookups());
        assert_eq!(user.display_nick(), "*");
    }

    #[tokio::test]
    async fn test_introduction_requires_registration() {
        let mut user = test_user();
        user.pending.clear();
        assert!(user.handshake_complete());
        assert!(!user.is_introduced());
        user.registered = true;
        assert!(user.is_introduced());
    }

    #[tokio::test]
    async fn test_mask() {
        let mut user = test_user();
        user.nick = Some("alice".to_string());
        user.ident = "~a".to_string();
        user.hostname = "host.example.org".to_string();
        assert_eq!(user.mask(), "alice!~a@host.example.org");
    }

    #[test]
    fn test_standard_user_mode_layout() {
        let table = standard_user_modes();
        assert_eq!(table.lookup('d').unwrap().flag, 1);
        assert_eq!(table.lookup('i').unwrap().flag, 2);
        assert_eq!(table.lookup('o').unwrap().flag, 4);
        assert_eq!(table.lookup('w').unwrap().flag, 8);
        assert!(table.lookup('x').is_none());
    }
}
