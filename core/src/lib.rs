//! Ferricd Core
//!
//! This crate provides the core of the IRC daemon: the event reactor, the
//! connection and listener machinery, the per-connection command pipeline,
//! and the user/channel state engine.

pub mod channel;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod hash;
pub mod history;
pub mod listener;
pub mod lookup;
pub mod message;
pub mod modes;
pub mod motd;
pub mod numeric;
pub mod reactor;
pub mod recvq;
pub mod server;
pub mod user;
pub mod utils;


pub use channel::{format_mode_lines, BanEntry, Channel, Member, ModeChange, Topic};
pub use command::{CommandEntry, CommandHandler, CommandRegistry};
pub use config::{Config, FloodConfig, ListenerConfig, ListenerKind, OperatorConfig};
pub use connection::Connection;
pub use error::{Error, Result};
pub use history::{History, HistoryEntry};
pub use listener::Listener;
pub use lookup::LookupService;
pub use message::{split_line, Message, Prefix};
pub use modes::{Bitmask, ModeDescriptor, ModeKind, ModeTable};
pub use motd::Motd;
pub use numeric::{NumericReply, Reply};
pub use reactor::{EventSink, IoEvent, Reactor, ReactorHandle, TimerId, TimerKind, Token};
pub use recvq::{QueueLimit, ReceiveQueue};
pub use server::{Server, ServerObserver, ServerRecord, ServerStats};
pub use user::User;

/// Re-exports for convenience
pub use tracing::{debug, error, info, warn};
