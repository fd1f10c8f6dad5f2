//! Listening sockets and the inbound command pipeline
//!
//! A `Listener` owns one bound socket and an accept loop that posts
//! `Accepted` events. The rest of this module is the per-line pipeline:
//! the flood-control gate and the receive-queue processor that tokenizes
//! lines, checks dispatch gates and invokes command handlers.

use crate::config::ListenerConfig;
use crate::message::{split_line, strip_source};
use crate::numeric::Reply;
use crate::reactor::{IoEvent, ReactorHandle, Token};
use crate::recvq::QueueLimit;
use crate::server::Server;
use crate::{Error, Result};
use rustc_hash::FxHashSet;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One configured listening socket.
pub struct Listener {
    pub id: usize,
    pub config: ListenerConfig,
    /// Token the accept loop posts events under.
    pub token: Token,
    /// Address actually bound, known once `bind` has run.
    pub local_addr: Option<SocketAddr>,
    /// Tokens of connections owned by this listener.
    pub connections: FxHashSet<Token>,
    cancel: CancellationToken,
}

impl Listener {
    pub fn new(id: usize, config: ListenerConfig, token: Token) -> Self {
        Self {
            id,
            config,
            token,
            local_addr: None,
            connections: FxHashSet::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Resolve the configured address, bind, listen and start the accept
    /// loop. Failure here is fatal at startup.
    pub async fn bind(&mut self, handle: ReactorHandle) -> Result<()> {
        let addr = format!("{}:{}", self.config.address, self.config.port);
        let socket = TcpListener::bind(&addr).await.map_err(|e| {
            Error::Server(format!("cannot bind listener on {}: {}", addr, e))
        })?;
        let local = socket.local_addr()?;
        self.local_addr = Some(local);
        handle.observe(self.token);
        info!("listening on {}", local);

        let token = self.token;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = socket.accept() => match accepted {
                        Ok((stream, addr)) => {
                            debug!("accepted connection from {}", addr);
                            if !handle.io(token, IoEvent::Accepted { stream, addr }) {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("accept failed: {}", e);
                        }
                    },
                }
            }
            debug!("accept loop for listener {} finished", token);
        });
        Ok(())
    }

    /// Stop accepting. Owned connections are torn down by the server.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Flood-control gate for one received line. Scores the line, queues it,
/// and applies the receive-queue limits before letting the processor run.
pub fn handle_data(server: &mut Server, token: Token, line: String) {
    let flood = server.config.flood.clone();
    let Some(user) = server.clients.get_mut(&token) else {
        return;
    };

    if !flood.enabled {
        user.recvq.add(&line);
        process_recv_queue(server, token, true);
        return;
    }

    user.flood_score += flood.score_per_line;
    user.recvq.add(&line);

    if user.recvq.length() > user.recvq.limit(QueueLimit::Hard) {
        server.quit_user(token, "Excess flood");
    } else if user.recvq.length() > user.recvq.limit(QueueLimit::Soft) {
        if !user.flood_warned {
            user.flood_warned = true;
            server.send_notice(token, "Flood warning: slow down");
        }
    } else {
        process_recv_queue(server, token, true);
    }
}

/// Pop queued lines, tokenize, check the dispatch gates and invoke the
/// handler. Stops after one line unless `process_multi` is set, when the
/// user's flood score crosses the penalty threshold, or when a handler
/// destroys the user.
pub fn process_recv_queue(server: &mut Server, token: Token, process_multi: bool) {
    loop {
        let flood = &server.config.flood;
        let threshold = flood.penalty_threshold;
        let flood_enabled = flood.enabled;
        let Some(user) = server.clients.get_mut(&token) else {
            return;
        };
        if flood_enabled && user.flood_score >= threshold {
            return;
        }
        let line = user.recvq.getline();
        if line.is_empty() {
            if user.recvq.length() <= user.recvq.limit(QueueLimit::Soft) {
                user.flood_warned = false;
            }
            return;
        }
        user.last_action = chrono::Utc::now();

        dispatch_line(server, token, &line);

        // The handler may have torn the user down (QUIT, kill, flood).
        if !server.clients.contains_key(&token) {
            return;
        }
        if !process_multi {
            return;
        }
    }
}

fn dispatch_line(server: &mut Server, token: Token, line: &str) {
    let tokens = split_line(line);
    // A claimed source prefix from a client is ignored.
    let (_source, tokens) = strip_source(tokens);
    let Some(first) = tokens.first() else {
        return;
    };
    let command = first.to_ascii_uppercase();

    let Some(entry) = server.commands.lookup(&command) else {
        server.send_numeric(token, Reply::unknown_command(&command));
        return;
    };
    let handler = entry.handler;
    let oper_only = entry.oper_only;
    let requires_registration = entry.requires_registration;
    let suspended = entry.suspended;

    let introduced = server
        .clients
        .get(&token)
        .map(|u| u.is_introduced())
        .unwrap_or(false);

    if requires_registration && !introduced {
        server.send_numeric(token, Reply::not_registered());
        return;
    }
    if suspended {
        server.send_notice(token, &format!("{} is not currently available", command));
        return;
    }
    if oper_only && !server.is_oper(token) {
        server.send_numeric(token, Reply::no_privileges());
        return;
    }

    if let Err(e) = handler(server, token, &tokens) {
        warn!("{} handler failed for {}: {}", command, token, e);
    }
}
