//! DNS and ident lookups
//!
//! Both lookups run concurrently with the NICK/USER exchange. Each
//! connection has at most one outstanding lookup pair, tracked so the
//! listener can cancel them when the socket closes early. A cancelled
//! lookup still posts its completion event (with an empty result) — the
//! deferred-destruction machinery relies on every started lookup
//! eventually reporting back.

use crate::config::LookupConfig;
use crate::reactor::{IoEvent, ReactorHandle, Token};
use crate::{Error, Result};
use hickory_resolver::TokioAsyncResolver;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const IDENT_PORT: u16 = 113;

#[derive(Default)]
struct PendingPair {
    dns: Option<CancellationToken>,
    ident: Option<CancellationToken>,
}

/// Asynchronous hostname and ident resolution for new connections.
pub struct LookupService {
    config: LookupConfig,
    resolver: Option<Arc<TokioAsyncResolver>>,
    pending: Arc<Mutex<FxHashMap<Token, PendingPair>>>,
    handle: ReactorHandle,
}

impl LookupService {
    pub fn new(config: LookupConfig, handle: ReactorHandle) -> Result<Self> {
        let resolver = if config.dns {
            let resolver = TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| Error::Lookup(format!("failed to create resolver: {}", e)))?;
            Some(Arc::new(resolver))
        } else {
            None
        };
        Ok(Self {
            config,
            resolver,
            pending: Arc::new(Mutex::new(FxHashMap::default())),
            handle,
        })
    }

    pub fn dns_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    pub fn ident_enabled(&self) -> bool {
        self.config.ident
    }

    /// Start the reverse DNS lookup for a connection. Completion arrives as
    /// an `IoEvent::DnsDone` on the reactor queue.
    pub fn start_dns(&self, token: Token, ip: IpAddr) {
        let Some(resolver) = self.resolver.clone() else {
            self.handle.io(token, IoEvent::DnsDone { hostname: None });
            return;
        };
        let cancel = CancellationToken::new();
        self.pending.lock().entry(token).or_default().dns = Some(cancel.clone());

        let handle = self.handle.clone();
        let pending = self.pending.clone();
        let wait = Duration::from_secs(self.config.dns_timeout);
        tokio::spawn(async move {
            let hostname = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("dns lookup for {} aborted", token);
                    None
                }
                result = timeout(wait, resolver.reverse_lookup(ip)) => match result {
                    Ok(Ok(names)) => names
                        .iter()
                        .next()
                        .map(|name| name.to_string().trim_end_matches('.').to_string()),
                    Ok(Err(e)) => {
                        debug!("dns lookup for {} failed: {}", token, e);
                        None
                    }
                    Err(_) => {
                        debug!("dns lookup for {} timed out", token);
                        None
                    }
                },
            };
            if let Some(pair) = pending.lock().get_mut(&token) {
                pair.dns = None;
            }
            handle.io(token, IoEvent::DnsDone { hostname });
        });
    }

    /// Start the ident lookup for a connection. Completion arrives as an
    /// `IoEvent::IdentDone` on the reactor queue.
    pub fn start_ident(&self, token: Token, remote: SocketAddr, local: SocketAddr) {
        if !self.config.ident {
            self.handle.io(token, IoEvent::IdentDone { username: None });
            return;
        }
        let cancel = CancellationToken::new();
        self.pending.lock().entry(token).or_default().ident = Some(cancel.clone());

        let handle = self.handle.clone();
        let pending = self.pending.clone();
        let wait = Duration::from_secs(self.config.ident_timeout);
        tokio::spawn(async move {
            let username = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("ident lookup for {} aborted", token);
                    None
                }
                result = timeout(wait, query_ident(remote, local)) => match result {
                    Ok(Ok(name)) => name,
                    Ok(Err(e)) => {
                        debug!("ident lookup for {} failed: {}", token, e);
                        None
                    }
                    Err(_) => {
                        debug!("ident lookup for {} timed out", token);
                        None
                    }
                },
            };
            if let Some(pair) = pending.lock().get_mut(&token) {
                pair.ident = None;
            }
            handle.io(token, IoEvent::IdentDone { username });
        });
    }

    /// Abort any outstanding lookups for a token. The aborted tasks still
    /// post their completion events.
    pub fn cancel(&self, token: Token) {
        let mut pending = self.pending.lock();
        if let Some(pair) = pending.remove(&token) {
            if let Some(cancel) = pair.dns {
                cancel.cancel();
            }
            if let Some(cancel) = pair.ident {
                cancel.cancel();
            }
        }
    }

    /// Drop bookkeeping for a token once both completions have been seen.
    pub fn forget(&self, token: Token) {
        self.pending.lock().remove(&token);
    }
}

async fn query_ident(remote: SocketAddr, local: SocketAddr) -> Result<Option<String>> {
    let mut stream = TcpStream::connect(SocketAddr::new(remote.ip(), IDENT_PORT)).await?;
    let request = format!("{}, {}\r\n", remote.port(), local.port());
    stream.write_all(request.as_bytes()).await?;

    let mut buf = vec![0u8; 512];
    let n = stream.read(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf[..n]);
    Ok(parse_ident_response(&response))
}

/// Parse an RFC 1413 response: `port, port : USERID : opsys : username`.
fn parse_ident_response(response: &str) -> Option<String> {
    let line = response.lines().next()?;
    let mut fields = line.splitn(4, ':');
    let _ports = fields.next()?;
    let verdict = fields.next()?.trim();
    if !verdict.eq_ignore_ascii_case("USERID") {
        return None;
    }
    let _opsys = fields.next()?;
    let username: String = fields
        .next()?
        .trim()
        .chars()
        .filter(|c| c.is_ascii_graphic() && *c != '@' && *c != ':')
        .take(10)
        .collect();
    if username.is_empty() {
        None
    } else {
        Some(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::{EventSink, Reactor, TimerId, TimerKind};

    #[test]
    fn test_parse_ident_response() {
        assert_eq!(
            parse_ident_response("6193, 23 : USERID : UNIX : joe\r\n"),
            Some("joe".to_string())
        );
        assert_eq!(
            parse_ident_response("6193, 23 : ERROR : NO-USER\r\n"),
            None
        );
        assert_eq!(parse_ident_response(""), None);
        // Usernames are clamped and stripped of separator characters.
        assert_eq!(
            parse_ident_response("1, 2 : USERID : UNIX : averyverylongname\r\n"),
            Some("averyveryl".to_string())
        );
    }

    struct DoneSink {
        handle: crate::reactor::ReactorHandle,
        dns: Vec<Option<String>>,
        ident: Vec<Option<String>>,
    }

    impl EventSink for DoneSink {
        fn on_io(&mut self, _token: Token, event: IoEvent) {
            match event {
                IoEvent::DnsDone { hostname } => {
                    self.dns.push(hostname);
                    self.handle.stop();
                }
                IoEvent::IdentDone { username } => {
                    self.ident.push(username);
                    self.handle.stop();
                }
                _ => {}
            }
        }
        fn on_timer(&mut self, _id: TimerId, _kind: &TimerKind) {}
    }

    #[tokio::test]
    async fn test_disabled_dns_completes_immediately() {
        let mut reactor = Reactor::new();
        let handle = reactor.handle();
        let service = LookupService::new(
            LookupConfig {
                dns: false,
                ident: false,
                ..Default::default()
            },
            handle.clone(),
        )
        .unwrap();

        let token = handle.alloc_token();
        service.start_dns(token, "127.0.0.1".parse().unwrap());

        let mut sink = DoneSink {
            handle: handle.clone(),
            dns: Vec::new(),
            ident: Vec::new(),
        };
        reactor.run(&mut sink).await;
        assert_eq!(sink.dns, vec![None]);
    }

    #[tokio::test]
    async fn test_cancelled_ident_still_completes() {
        let mut reactor = Reactor::new();
        let handle = reactor.handle();
        let service = LookupService::new(
            LookupConfig {
                dns: false,
                ident: true,
                ..Default::default()
            },
            handle.clone(),
        )
        .unwrap();

        let token = handle.alloc_token();
        let remote: SocketAddr = "192.0.2.1:50000".parse().unwrap();
        let local: SocketAddr = "127.0.0.1:6667".parse().unwrap();
        service.start_ident(token, remote, local);
        service.cancel(token);

        let mut sink = DoneSink {
            handle: handle.clone(),
            dns: Vec::new(),
            ident: Vec::new(),
        };
        reactor.run(&mut sink).await;
        assert_eq!(sink.ident, vec![None]);
    }
}
