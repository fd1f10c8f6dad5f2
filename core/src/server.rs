//! Main IRC server: registries and orchestration
//!
//! `Server` owns every registry (socket-token to user, nick to user, name to
//! channel, name to command, numeric to server record), the listeners and
//! the counters. It is driven exclusively by the reactor: connection tasks,
//! accept loops and lookups post events, the reactor dispatches them here
//! one at a time.

use crate::channel::{role, standard_channel_modes, Channel, Member};
use crate::command::{CommandEntry, CommandRegistry};
use crate::config::{Config, ListenerKind};
use crate::connection::Connection;
use crate::history::{History, HistoryEntry};
use crate::listener::{self, Listener};
use crate::lookup::LookupService;
use crate::message::{Message, Prefix};
use crate::modes::ModeTable;
use crate::motd::Motd;
use crate::numeric::Reply;
use crate::reactor::{EventSink, IoEvent, Reactor, ReactorHandle, TimerId, TimerKind, Token};
use crate::recvq::QueueLimit;
use crate::user::{pending, standard_user_modes, User};
use crate::utils::casefold;
use crate::Result;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

pub const VERSION: &str = concat!("ferricd-", env!("CARGO_PKG_VERSION"));

/// Numeric assigned to the local server in the server registry.
const LOCAL_NUMERIC: u16 = 1;

/// Entry in the numeric-to-server registry. Only the local server exists;
/// linking is out of scope but the registry keyed by numeric is not.
pub struct ServerRecord {
    pub numeric: u16,
    pub name: String,
    pub description: String,
}

/// Server-wide counters, maintained exactly once per transition.
#[derive(Debug, Default, Clone)]
pub struct ServerStats {
    pub unknown_connections: usize,
    pub current_clients: usize,
    pub max_clients_seen: usize,
    pub operators: usize,
}

/// Observers of entity lifecycle events. `on_user_destroy` fires before the
/// user is removed from the registries, so observers still see the full
/// entity (WHOWAS capture depends on this).
#[allow(unused_variables)]
pub trait ServerObserver: Send {
    fn on_new_connection(&mut self, token: Token, addr: SocketAddr) {}
    fn on_user_registered(&mut self, user: &User) {}
    fn on_user_destroy(&mut self, user: &User) {}
    fn on_channel_created(&mut self, name: &str) {}
    fn on_channel_destroyed(&mut self, name: &str) {}
}

struct HistoryObserver {
    history: Arc<History>,
}

impl ServerObserver for HistoryObserver {
    fn on_user_destroy(&mut self, user: &User) {
        let Some(nick) = &user.nick else {
            return;
        };
        self.history.record(HistoryEntry {
            nick: nick.clone(),
            ident: user.ident.clone(),
            host: user.hostname.clone(),
            realname: user.realname.clone(),
            departed_at: Utc::now(),
        });
    }
}

/// The server. Constructed once at startup and handed to the reactor.
pub struct Server {
    pub config: Config,
    pub handle: ReactorHandle,

    pub user_modes: ModeTable,
    pub chan_modes: ModeTable,
    pub commands: CommandRegistry,

    pub listeners: Vec<Listener>,
    pub clients: FxHashMap<Token, User>,
    /// Folded nickname to token.
    pub nicks: FxHashMap<String, Token>,
    /// Folded channel name to channel.
    pub channels: FxHashMap<String, Channel>,
    pub servers: FxHashMap<u16, ServerRecord>,

    /// Users whose teardown is complete but which still await lookup
    /// completions; the last completion frees them.
    pub doomed: FxHashMap<Token, User>,

    pub lookups: LookupService,
    pub motd: Motd,
    pub history: Arc<History>,
    pub stats: ServerStats,
    pub started_at: DateTime<Utc>,

    observers: Vec<Box<dyn ServerObserver>>,
}

impl Server {
    pub fn new(config: Config, reactor: &Reactor) -> Result<Self> {
        let handle = reactor.handle();
        let lookups = LookupService::new(config.lookup.clone(), handle.clone())?;
        let motd = match &config.server.motd_file {
            Some(path) => Motd::load(path),
            None => Motd::new(),
        };
        let history = History::shared(8);

        let mut servers = FxHashMap::default();
        servers.insert(
            LOCAL_NUMERIC,
            ServerRecord {
                numeric: LOCAL_NUMERIC,
                name: config.server.name.clone(),
                description: config.server.description.clone(),
            },
        );

        let mut server = Self {
            config,
            handle,
            user_modes: standard_user_modes(),
            chan_modes: standard_channel_modes(),
            commands: CommandRegistry::new(),
            listeners: Vec::new(),
            clients: FxHashMap::default(),
            nicks: FxHashMap::default(),
            channels: FxHashMap::default(),
            servers,
            doomed: FxHashMap::default(),
            lookups,
            motd,
            history: history.clone(),
            stats: ServerStats::default(),
            started_at: Utc::now(),
            observers: Vec::new(),
        };
        server.add_observer(Box::new(HistoryObserver { history }));
        Ok(server)
    }

    pub fn add_observer(&mut self, observer: Box<dyn ServerObserver>) {
        self.observers.push(observer);
    }

    pub fn register_command(&mut self, entry: CommandEntry) {
        self.commands.register(entry);
    }

    /// Bind every configured listener and start the recurring flood tick.
    /// Any bind failure aborts startup.
    pub async fn start(&mut self) -> Result<()> {
        self.config.validate()?;
        for (id, listener_config) in self.config.listeners.clone().into_iter().enumerate() {
            let token = self.handle.alloc_token();
            let mut listener = Listener::new(id, listener_config, token);
            listener.bind(self.handle.clone()).await?;
            self.listeners.push(listener);
        }
        if self.config.flood.enabled {
            let tick = Duration::from_secs(self.config.flood.tick_seconds);
            self.handle
                .schedule(TimerKind::FloodTick, tick, Some(tick));
        }
        info!(
            "{} up, {} listener(s), {} command(s)",
            self.config.server.name,
            self.listeners.len(),
            self.commands.len()
        );
        Ok(())
    }

    /// Disconnect everyone, stop the listeners and end the reactor loop.
    pub fn initiate_shutdown(&mut self, reason: &str) {
        info!("shutting down: {}", reason);
        let tokens: Vec<Token> = self.clients.keys().copied().collect();
        for token in tokens {
            self.quit_user(token, reason);
        }
        for listener in &self.listeners {
            listener.shutdown();
        }
        self.handle.stop();
    }

    pub fn server_name(&self) -> &str {
        &self.config.server.name
    }

    pub fn server_prefix(&self) -> Prefix {
        Prefix::Server(self.config.server.name.clone())
    }

    // ---- send helpers -------------------------------------------------

    pub fn send_to(&self, token: Token, message: &Message) {
        if let Some(user) = self.clients.get(&token) {
            user.send(message);
        }
    }

    pub fn send_raw_to(&self, token: Token, line: &str) {
        if let Some(user) = self.clients.get(&token) {
            user.send_raw(line);
        }
    }

    /// Send a numeric reply: `:<server> <code> <nick-or-*> <params...>`.
    pub fn send_numeric(&self, token: Token, reply: Reply) {
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        let mut params = vec![user.display_nick().to_string()];
        params.extend(reply.params);
        let message = Message::with_prefix(
            self.server_prefix(),
            format!("{:03}", reply.numeric.code()),
            params,
        );
        user.send(&message);
    }

    pub fn send_notice(&self, token: Token, text: &str) {
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        let message = Message::with_prefix(
            self.server_prefix(),
            "NOTICE",
            vec![user.display_nick().to_string(), text.to_string()],
        );
        user.send(&message);
    }

    /// Deliver a line to every member of a channel, optionally skipping one.
    pub fn broadcast_channel(&self, channel: &Channel, line: &str, except: Option<Token>) {
        for member in channel.members.keys() {
            if Some(*member) == except {
                continue;
            }
            self.send_raw_to(*member, line);
        }
    }

    // ---- registry helpers ---------------------------------------------

    pub fn find_nick(&self, nick: &str) -> Option<Token> {
        self.nicks.get(&casefold(nick)).copied()
    }

    pub fn find_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&casefold(name))
    }

    pub fn user_mode_flag(&self, c: char) -> u32 {
        self.user_modes.lookup(c).map(|d| d.flag).unwrap_or(0)
    }

    pub fn is_oper(&self, token: Token) -> bool {
        let flag = self.user_mode_flag('o');
        self.clients
            .get(&token)
            .map(|u| u.modes.isset(flag))
            .unwrap_or(false)
    }

    /// Invoke a command handler directly, bypassing the dispatch gates.
    /// Used for synthesized calls (welcome burst, JOIN's NAMES/TOPIC).
    pub fn invoke_handler(&mut self, token: Token, command: &str, args: Vec<String>) {
        let Some(entry) = self.commands.lookup(&command.to_ascii_uppercase()) else {
            debug!("no handler registered for synthesized {}", command);
            return;
        };
        let handler = entry.handler;
        if let Err(e) = handler(self, token, &args) {
            warn!("synthesized {} failed: {}", command, e);
        }
    }

    // ---- connection admission ------------------------------------------

    /// Admit one accepted stream on a listener. Generic over the stream so
    /// tests can attach in-memory pipes.
    pub fn add_connection<S>(&mut self, listener_id: usize, stream: S, addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let token = self.handle.alloc_token();
        let conn = Connection::spawn(token, stream, addr, self.handle.clone());
        let listener = &mut self.listeners[listener_id];

        if listener.connections.len() >= listener.config.max_connections {
            warn!("listener {} full, rejecting {}", listener_id, addr);
            conn.send_line("ERROR :Closing Link: too many connections on this listener");
            // Dropping flushes the queue and closes the socket.
            return;
        }
        if listener.config.kind != ListenerKind::Clients {
            conn.send_line("ERROR :Closing Link: server linking is not supported");
            return;
        }
        listener.connections.insert(token);
        let local_addr = listener.local_addr;
        let auth_window = Duration::from_secs(self.config.timeouts.authorization);

        self.handle.observe(token);
        let mut user = User::new(token, listener_id, addr, conn);
        user.recvq
            .set_limit(QueueLimit::Hard, self.config.flood.recvq_hard);
        user.recvq
            .set_limit(QueueLimit::Soft, self.config.flood.recvq_soft);

        if self.lookups.dns_enabled() {
            user.pending.add(pending::DNS);
            user.send_raw(format!(
                ":{} NOTICE * :*** Looking up your hostname...",
                self.server_name()
            ));
            self.lookups.start_dns(token, addr.ip());
        }
        if self.lookups.ident_enabled() {
            if let Some(local) = local_addr {
                user.pending.add(pending::IDENT);
                self.lookups.start_ident(token, addr, local);
            }
        }

        user.auth_timer =
            Some(self.handle
                .schedule(TimerKind::AuthTimeout(token), auth_window, None));

        self.stats.unknown_connections += 1;
        self.stats.current_clients += 1;
        if self.stats.current_clients > self.stats.max_clients_seen {
            self.stats.max_clients_seen = self.stats.current_clients;
        }

        self.notify(|o| o.on_new_connection(token, addr));
        self.clients.insert(token, user);
        debug!("connection {} admitted from {}", token, addr);
    }

    // ---- registration machine ------------------------------------------

    /// Called whenever a pending flag clears: once all four are gone, send
    /// the initial PING whose PONG completes registration.
    pub fn check_handshake(&mut self, token: Token) {
        let name = self.server_name().to_string();
        let Some(user) = self.clients.get_mut(&token) else {
            return;
        };
        if user.registered || user.ping_sent || !user.handshake_complete() {
            return;
        }
        user.ping_sent = true;
        user.expected_pong = Some(name.clone());
        user.send(&Message::new("PING", vec![name]));
    }

    /// The matching PONG arrived; introduce the user and send the welcome
    /// burst exactly once.
    pub fn complete_registration(&mut self, token: Token) {
        let network = self.config.server.network.clone();
        let name = self.server_name().to_string();
        let created = self.started_at.format("%a %b %d %Y").to_string();

        let Some(user) = self.clients.get_mut(&token) else {
            return;
        };
        if user.registered {
            return;
        }
        user.registered = true;
        user.expected_pong = None;
        user.last_pong = Utc::now();
        let mask = user.mask();
        let auth_timer = user.auth_timer.take();
        let listener_id = user.listener;

        let ping_freq = Duration::from_secs(self.listeners[listener_id].config.ping_frequency);
        if let Some(timer) = auth_timer {
            self.handle.cancel_timer(timer);
        }
        self.stats.unknown_connections = self.stats.unknown_connections.saturating_sub(1);

        let ping_timer = self
            .handle
            .schedule(TimerKind::PingCheck(token), ping_freq, Some(ping_freq));
        if let Some(user) = self.clients.get_mut(&token) {
            user.ping_timer = Some(ping_timer);
        }

        self.send_numeric(token, Reply::welcome(&network, &mask));
        self.send_numeric(token, Reply::your_host(&name, VERSION));
        self.send_numeric(token, Reply::created(&created));
        self.send_numeric(token, Reply::my_info(&name, VERSION, "diow", "bhiklmnopstv"));
        self.send_numeric(
            token,
            Reply::isupport(vec![
                format!("NETWORK={}", network),
                "CASEMAPPING=rfc1459".to_string(),
                "CHANTYPES=#&".to_string(),
                "PREFIX=(ohv)@%+".to_string(),
                "CHANMODES=b,k,l,imnpst".to_string(),
                format!("NICKLEN={}", self.config.server.max_nickname_length),
                "MODES=6".to_string(),
            ]),
        );
        self.invoke_handler(token, "LUSERS", vec!["LUSERS".to_string()]);
        self.invoke_handler(token, "MOTD", vec!["MOTD".to_string()]);

        info!("{} registered as {}", token, mask);
        self.notify_user(token, |o, u| o.on_user_registered(u));
    }

    // ---- timers ---------------------------------------------------------

    fn auth_timeout(&mut self, token: Token) {
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        if user.registered {
            return;
        }
        let reason = if user.pending.isset(pending::NICK) || user.pending.isset(pending::USER) {
            "Authorization timeout"
        } else {
            "Ping timeout"
        };
        self.quit_user(token, reason);
    }

    fn ping_check(&mut self, token: Token) {
        let staleness = self.config.timeouts.pong_staleness as i64;
        let name = self.server_name().to_string();
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        let silent_for = (Utc::now() - user.last_pong).num_seconds();
        if silent_for > staleness {
            self.quit_user(token, "Ping timeout");
        } else {
            user.send(&Message::new("PING", vec![name]));
        }
    }

    fn flood_tick(&mut self) {
        let decay = self.config.flood.decay_per_tick;
        let mut backlog = Vec::new();
        for (token, user) in self.clients.iter_mut() {
            user.flood_score = user.flood_score.saturating_sub(decay);
            if user.recvq.size() > 0 {
                backlog.push(*token);
            }
        }
        for token in backlog {
            listener::process_recv_queue(self, token, true);
        }
    }

    // ---- channel operations ---------------------------------------------

    /// Join a channel, creating it if needed. Runs the admission checks in
    /// the fixed order: membership, invite-only, key, limit, ban. A standing
    /// invite bypasses all four blocks; an operator bypasses all but the
    /// ban.
    pub fn join_channel(&mut self, token: Token, name: &str, key: Option<&str>) {
        if !crate::utils::is_valid_channel_name(name) {
            self.send_numeric(token, Reply::no_such_channel(name));
            return;
        }
        let folded = casefold(name);
        let is_oper = self.is_oper(token);
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        let mask = user.mask();
        let invite_flag = self.chan_modes.lookup('i').map(|d| d.flag).unwrap_or(0);
        let key_flag = self.chan_modes.lookup('k').map(|d| d.flag).unwrap_or(0);
        let limit_flag = self.chan_modes.lookup('l').map(|d| d.flag).unwrap_or(0);

        let mut created = false;
        let denial: Option<Reply> = match self.channels.get_mut(&folded) {
            Some(chan) => {
                if chan.is_member(token) {
                    return;
                }
                let invited = chan.invites.contains(&token);
                let over_limit = chan
                    .limit
                    .map(|l| chan.members.len() >= l)
                    .unwrap_or(false);
                if chan.modes.isset(invite_flag) && !(is_oper || invited) {
                    Some(Reply::invite_only_chan(&chan.name))
                } else if chan.modes.isset(key_flag)
                    && chan.key.as_deref() != key
                    && !(is_oper || invited)
                {
                    Some(Reply::bad_channel_key(&chan.name))
                } else if chan.modes.isset(limit_flag) && over_limit && !(is_oper || invited) {
                    Some(Reply::channel_is_full(&chan.name))
                } else if chan.is_banned(&mask) && !invited {
                    // An operator does not get past a ban; only an invite
                    // does.
                    Some(Reply::banned_from_chan(&chan.name))
                } else {
                    chan.members.insert(token, Member::new());
                    chan.invites.remove(&token);
                    None
                }
            }
            None => {
                let mut chan = Channel::new(name);
                let mut member = Member::new();
                member.roles.add(role::CHANOP);
                chan.members.insert(token, member);
                self.channels.insert(folded.clone(), chan);
                created = true;
                None
            }
        };
        if let Some(reply) = denial {
            self.send_numeric(token, reply);
            return;
        }
        if created {
            self.notify(|o| o.on_channel_created(name));
        }

        if let Some(user) = self.clients.get_mut(&token) {
            user.channels.insert(folded.clone());
        }

        let Some(chan) = self.channels.get(&folded) else {
            return;
        };
        let display_name = chan.name.clone();
        let created_at = chan.created_at.timestamp();
        let join_line = format!(":{} JOIN :{}", mask, display_name);
        self.broadcast_channel(chan, &join_line, None);

        if created_at != 0 {
            self.send_numeric(token, Reply::creation_time(&display_name, created_at));
        }
        self.invoke_handler(
            token,
            "NAMES",
            vec!["NAMES".to_string(), display_name.clone()],
        );
        self.invoke_handler(token, "TOPIC", vec!["TOPIC".to_string(), display_name]);
        if created {
            debug!("channel {} created by {}", name, mask);
        }
    }

    /// Remove one member record. Destroys the channel when it empties;
    /// callers broadcast their PART/KICK/QUIT line first.
    pub fn remove_member(&mut self, token: Token, folded: &str) {
        let mut destroy = false;
        if let Some(chan) = self.channels.get_mut(folded) {
            chan.members.remove(&token);
            chan.invites.remove(&token);
            if chan.is_empty() {
                destroy = true;
            }
        }
        if let Some(user) = self.clients.get_mut(&token) {
            user.channels.remove(folded);
        }
        if destroy {
            if let Some(chan) = self.channels.remove(folded) {
                let name = chan.name.clone();
                self.notify(|o| o.on_channel_destroyed(&name));
                debug!("channel {} destroyed", name);
            }
        }
    }

    /// PART one channel with the standard broadcast.
    pub fn part_channel(&mut self, token: Token, name: &str, reason: Option<&str>) {
        let folded = casefold(name);
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        let mask = user.mask();
        let Some(chan) = self.channels.get(&folded) else {
            self.send_numeric(token, Reply::no_such_channel(name));
            return;
        };
        if !chan.is_member(token) {
            let reply = Reply::not_on_channel(&chan.name);
            self.send_numeric(token, reply);
            return;
        }
        let line = match reason {
            Some(reason) => format!(":{} PART {} :{}", mask, chan.name, reason),
            None => format!(":{} PART {}", mask, chan.name),
        };
        self.broadcast_channel(chan, &line, None);
        self.remove_member(token, &folded);
    }

    // ---- teardown --------------------------------------------------------

    /// Disconnect a user: propagate the QUIT, tear down membership and
    /// registry state exactly once, then either free the entity or park it
    /// until outstanding lookups complete.
    pub fn quit_user(&mut self, token: Token, reason: &str) {
        let Some(user) = self.clients.get(&token) else {
            return;
        };
        let mask = user.mask();
        let channels: Vec<String> = user.channels.iter().cloned().collect();

        // The leaver must no longer be addressed as a member when the line
        // is framed, so every recipient is collected and written manually.
        let quit_line = format!(":{} QUIT :{}", mask, reason);
        let mut recipients: Vec<Token> = Vec::new();
        for folded in &channels {
            if let Some(chan) = self.channels.get(folded) {
                for member in chan.members.keys() {
                    if *member != token && !recipients.contains(member) {
                        recipients.push(*member);
                    }
                }
            }
        }
        for recipient in recipients {
            self.send_raw_to(recipient, &quit_line);
        }
        for folded in &channels {
            self.remove_member(token, folded);
        }

        // Observers run before any registry removal.
        self.notify_user(token, |o, u| o.on_user_destroy(u));

        let Some(mut user) = self.clients.remove(&token) else {
            return;
        };
        if let Some(nick) = &user.nick {
            self.nicks.remove(&casefold(nick));
        }
        if let Some(timer) = user.auth_timer.take() {
            self.handle.cancel_timer(timer);
        }
        if let Some(timer) = user.ping_timer.take() {
            self.handle.cancel_timer(timer);
        }
        self.stats.current_clients = self.stats.current_clients.saturating_sub(1);
        if !user.registered {
            self.stats.unknown_connections = self.stats.unknown_connections.saturating_sub(1);
        }
        let oper_flag = self.user_mode_flag('o');
        if user.modes.isset(oper_flag) {
            self.stats.operators = self.stats.operators.saturating_sub(1);
        }
        if let Some(listener) = self.listeners.get_mut(user.listener) {
            listener.connections.remove(&token);
        }
        self.handle.deobserve(token);
        self.lookups.cancel(token);

        if let Some(conn) = user.conn.take() {
            conn.send_line(format!(
                "ERROR :Closing Link: {} ({})",
                user.hostname, reason
            ));
            // Dropping the connection flushes the queue, then closes.
        }
        user.destroying = true;

        info!("{} disconnected: {}", mask, reason);
        if user.has_pending_lookups() {
            // Aborted lookups still report back; the last completion frees
            // the entity.
            self.doomed.insert(token, user);
        } else {
            self.lookups.forget(token);
        }
    }

    // ---- lookup completions ----------------------------------------------

    fn dns_done(&mut self, token: Token, hostname: Option<String>) {
        if let Some(user) = self.clients.get_mut(&token) {
            if let Some(hostname) = hostname {
                user.send_raw(format!(
                    ":{} NOTICE * :*** Found your hostname",
                    self.config.server.name
                ));
                user.hostname = hostname;
            }
            user.pending.revoke(pending::DNS);
            if !user.has_pending_lookups() {
                self.lookups.forget(token);
            }
            self.check_handshake(token);
            return;
        }
        self.reap_doomed(token, pending::DNS);
    }

    fn ident_done(&mut self, token: Token, username: Option<String>) {
        if let Some(user) = self.clients.get_mut(&token) {
            if let Some(username) = username {
                user.ident = username;
            }
            user.pending.revoke(pending::IDENT);
            if !user.has_pending_lookups() {
                self.lookups.forget(token);
            }
            self.check_handshake(token);
            return;
        }
        self.reap_doomed(token, pending::IDENT);
    }

    /// Second phase of deferred destruction: clear the completed lookup's
    /// flag and free the entity once nothing is outstanding.
    fn reap_doomed(&mut self, token: Token, flag: u32) {
        let Some(user) = self.doomed.get_mut(&token) else {
            return;
        };
        user.pending.revoke(flag);
        if !user.has_pending_lookups() {
            self.doomed.remove(&token);
            self.lookups.forget(token);
            debug!("deferred destruction of {} completed", token);
        }
    }

    // ---- observers -------------------------------------------------------

    fn notify(&mut self, mut f: impl FnMut(&mut Box<dyn ServerObserver>)) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            f(observer);
        }
        self.observers = observers;
    }

    fn notify_user(&mut self, token: Token, mut f: impl FnMut(&mut Box<dyn ServerObserver>, &User)) {
        let mut observers = std::mem::take(&mut self.observers);
        if let Some(user) = self.clients.get(&token) {
            for observer in observers.iter_mut() {
                f(observer, user);
            }
        }
        self.observers = observers;
    }
}

impl EventSink for Server {
    fn on_io(&mut self, token: Token, event: IoEvent) {
        match event {
            IoEvent::Accepted { stream, addr } => {
                match self.listeners.iter().position(|l| l.token == token) {
                    Some(id) => self.add_connection(id, stream, addr),
                    None => warn!("accept event for unknown listener token {}", token),
                }
            }
            IoEvent::Data { line } => listener::handle_data(self, token, line),
            IoEvent::Disconnected => self.quit_user(token, "Client closed connection"),
            IoEvent::Error { reason } => {
                let reason = format!("Read error: {}", reason);
                self.quit_user(token, &reason);
            }
            IoEvent::DnsDone { hostname } => self.dns_done(token, hostname),
            IoEvent::IdentDone { username } => self.ident_done(token, username),
        }
    }

    fn on_timer(&mut self, _id: TimerId, kind: &TimerKind) {
        match kind {
            TimerKind::AuthTimeout(token) => self.auth_timeout(*token),
            TimerKind::PingCheck(token) => self.ping_check(*token),
            TimerKind::FloodTick => self.flood_tick(),
        }
    }
}
