//! Event reactor
//!
//! One reactor task owns all mutable server state. Listener accept loops,
//! connection reader/writer tasks and lookup tasks post events through a
//! `ReactorHandle`; the reactor dispatches them, together with due timers, to
//! a single `EventSink` in arrival order. Handler code runs to completion
//! before the next event is dispatched, so state mutation inside a handler
//! is atomic with respect to other commands.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Identifies one observed event source (a listener or a connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// What happened on an event source.
#[derive(Debug)]
pub enum IoEvent {
    /// A listener accepted a new inbound connection.
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
    },
    /// One decoded line arrived on a connection.
    Data { line: String },
    /// The peer closed the connection.
    Disconnected,
    /// Read or write failure on a connection.
    Error { reason: String },
    /// Reverse DNS finished; `None` on failure or abort.
    DnsDone { hostname: Option<String> },
    /// Ident lookup finished; `None` on failure or abort.
    IdentDone { username: Option<String> },
}

/// What a timer is for. Carried back to the sink when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Registration window for an unregistered connection.
    AuthTimeout(Token),
    /// Recurring liveness check for a registered client.
    PingCheck(Token),
    /// Recurring flood-score decay tick.
    FloodTick,
}

/// Receiver of dispatched events and timers.
pub trait EventSink {
    fn on_io(&mut self, token: Token, event: IoEvent);
    fn on_timer(&mut self, id: TimerId, kind: &TimerKind);
}

enum Control {
    Io { token: Token, event: IoEvent },
    Observe(Token),
    Deobserve(Token),
    AddTimer {
        id: TimerId,
        kind: TimerKind,
        deadline: Instant,
        interval: Option<Duration>,
    },
    StopTimer(TimerId),
    Stop,
}

/// Clonable handle for posting events and managing timers from any task.
#[derive(Clone)]
pub struct ReactorHandle {
    tx: UnboundedSender<Control>,
    next_token: Arc<AtomicU64>,
    next_timer: Arc<AtomicU64>,
}

impl ReactorHandle {
    /// Allocate a fresh token for a new event source.
    pub fn alloc_token(&self) -> Token {
        Token(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Post an I/O event. Returns false once the reactor is gone.
    pub fn io(&self, token: Token, event: IoEvent) -> bool {
        self.tx.send(Control::Io { token, event }).is_ok()
    }

    /// Register interest in a token. Events for unobserved tokens are
    /// dropped, which is what makes same-iteration deregistration safe.
    pub fn observe(&self, token: Token) -> bool {
        self.tx.send(Control::Observe(token)).is_ok()
    }

    /// Deregister a token. Any events already queued for it will be
    /// discarded instead of dispatched.
    pub fn deobserve(&self, token: Token) -> bool {
        self.tx.send(Control::Deobserve(token)).is_ok()
    }

    /// Schedule a timer. One-shot unless an interval is given, in which
    /// case it re-arms itself after each firing until stopped.
    pub fn schedule(
        &self,
        kind: TimerKind,
        delay: Duration,
        interval: Option<Duration>,
    ) -> TimerId {
        let id = TimerId(self.next_timer.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(Control::AddTimer {
            id,
            kind,
            deadline: Instant::now() + delay,
            interval,
        });
        id
    }

    /// Cancel a timer by id. Cancelling an already-fired one-shot is a
    /// no-op.
    pub fn cancel_timer(&self, id: TimerId) {
        let _ = self.tx.send(Control::StopTimer(id));
    }

    /// Ask the reactor to return from `run` after in-flight dispatch.
    pub fn stop(&self) {
        let _ = self.tx.send(Control::Stop);
    }
}

struct TimerEntry {
    kind: TimerKind,
    interval: Option<Duration>,
}

/// The event loop. Owns the queue, the observed-token set and the timer set.
pub struct Reactor {
    rx: UnboundedReceiver<Control>,
    handle: ReactorHandle,
    observed: FxHashSet<Token>,
    timers: FxHashMap<TimerId, TimerEntry>,
    deadlines: BinaryHeap<Reverse<(Instant, TimerId)>>,
    running: bool,
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: ReactorHandle {
                tx,
                next_token: Arc::new(AtomicU64::new(1)),
                next_timer: Arc::new(AtomicU64::new(1)),
            },
            observed: FxHashSet::default(),
            timers: FxHashMap::default(),
            deadlines: BinaryHeap::new(),
            running: false,
        }
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Loop until stopped: block until at least one event or timer is
    /// ready, dispatch everything that is due, repeat.
    pub async fn run<S: EventSink>(&mut self, sink: &mut S) {
        self.running = true;
        while self.running {
            self.fire_due(sink);
            let control = match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        c = self.rx.recv() => match c {
                            Some(c) => c,
                            None => break,
                        },
                        _ = sleep_until(deadline) => continue,
                    }
                }
                None => match self.rx.recv().await {
                    Some(c) => c,
                    None => break,
                },
            };
            self.dispatch(control, sink);
        }
        self.running = false;
    }

    fn dispatch<S: EventSink>(&mut self, control: Control, sink: &mut S) {
        match control {
            Control::Io { token, event } => {
                // Lookup completions bypass the observed filter: they must
                // still reach the sink after a connection is torn down so
                // deferred user destruction can complete.
                let deliver = matches!(
                    event,
                    IoEvent::DnsDone { .. } | IoEvent::IdentDone { .. }
                ) || self.observed.contains(&token);
                if deliver {
                    sink.on_io(token, event);
                } else {
                    trace!("dropping event for unobserved token {}", token);
                }
            }
            Control::Observe(token) => {
                self.observed.insert(token);
            }
            Control::Deobserve(token) => {
                self.observed.remove(&token);
            }
            Control::AddTimer {
                id,
                kind,
                deadline,
                interval,
            } => {
                self.timers.insert(id, TimerEntry { kind, interval });
                self.deadlines.push(Reverse((deadline, id)));
            }
            Control::StopTimer(id) => {
                self.timers.remove(&id);
            }
            Control::Stop => {
                self.running = false;
            }
        }
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        // Skip deadlines whose timers were cancelled.
        while let Some(Reverse((deadline, id))) = self.deadlines.peek().copied() {
            if self.timers.contains_key(&id) {
                return Some(deadline);
            }
            self.deadlines.pop();
        }
        None
    }

    fn fire_due<S: EventSink>(&mut self, sink: &mut S) {
        let now = Instant::now();
        while let Some(Reverse((deadline, id))) = self.deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            self.deadlines.pop();
            let Some(entry) = self.timers.get(&id) else {
                continue; // cancelled
            };
            let kind = entry.kind.clone();
            match entry.interval {
                Some(interval) => {
                    self.deadlines.push(Reverse((now + interval, id)));
                }
                None => {
                    self.timers.remove(&id);
                }
            }
            sink.on_timer(id, &kind);
        }
    }
}
