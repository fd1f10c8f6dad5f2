//! Connection handling
//!
//! A `Connection` wraps one accepted stream in a line-oriented async
//! read/write pair. The reader task decodes lines and posts `Data` events;
//! EOF and failures surface as `Disconnected`/`Error` events. Outbound lines
//! are queued on an unbounded channel drained by the writer task, which
//! appends CRLF and keeps flushing after the connection object is dropped
//! until the queue is empty, so a final ERROR line still reaches the peer.

use crate::reactor::{IoEvent, ReactorHandle, Token};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest raw line the codec will accept before flagging the connection.
const MAX_LINE_LENGTH: usize = 2048;

/// Byte and line counters, updated by the I/O tasks.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    pub bytes_in: AtomicU64,
    pub bytes_out: AtomicU64,
    pub lines_in: AtomicU64,
    pub lines_out: AtomicU64,
}

/// One live client connection.
pub struct Connection {
    token: Token,
    addr: SocketAddr,
    tx: UnboundedSender<String>,
    cancel: CancellationToken,
    counters: Arc<TrafficCounters>,
}

impl Connection {
    /// Wrap a stream and spawn its reader and writer tasks. Generic over
    /// the stream type so tests can drive a connection over an in-memory
    /// duplex pipe.
    pub fn spawn<S>(token: Token, stream: S, addr: SocketAddr, handle: ReactorHandle) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let cancel = CancellationToken::new();
        let counters = Arc::new(TrafficCounters::default());

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let (mut sink, mut source) = framed.split();

        let reader_cancel = cancel.clone();
        let reader_handle = handle.clone();
        let reader_counters = counters.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    item = source.next() => match item {
                        Some(Ok(line)) => {
                            reader_counters
                                .bytes_in
                                .fetch_add(line.len() as u64 + 2, Ordering::Relaxed);
                            reader_counters.lines_in.fetch_add(1, Ordering::Relaxed);
                            reader_handle.io(token, IoEvent::Data { line });
                        }
                        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                            reader_handle.io(
                                token,
                                IoEvent::Error {
                                    reason: "Max line length exceeded".to_string(),
                                },
                            );
                            break;
                        }
                        Some(Err(LinesCodecError::Io(e))) => {
                            reader_handle.io(
                                token,
                                IoEvent::Error {
                                    reason: e.to_string(),
                                },
                            );
                            break;
                        }
                        None => {
                            reader_handle.io(token, IoEvent::Disconnected);
                            break;
                        }
                    },
                }
            }
            debug!("reader for {} finished", token);
        });

        let writer_handle = handle;
        let writer_counters = counters.clone();
        tokio::spawn(async move {
            // Ends when every sender is gone and the queue is drained, so
            // queued lines are flushed even after teardown begins.
            while let Some(line) = rx.recv().await {
                writer_counters
                    .bytes_out
                    .fetch_add(line.len() as u64 + 2, Ordering::Relaxed);
                writer_counters.lines_out.fetch_add(1, Ordering::Relaxed);
                // LinesCodec terminates with LF; the embedded CR makes it CRLF.
                if let Err(e) = sink.send(format!("{}\r", line)).await {
                    writer_handle.io(
                        token,
                        IoEvent::Error {
                            reason: e.to_string(),
                        },
                    );
                    break;
                }
            }
            let _ = sink.flush().await;
            debug!("writer for {} finished", token);
        });

        Self {
            token,
            addr,
            tx,
            cancel,
            counters,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn counters(&self) -> &Arc<TrafficCounters> {
        &self.counters
    }

    /// Queue one line for delivery. Returns false if the writer is gone.
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.tx.send(line.into()).is_ok()
    }

    /// Stop reading. The writer drains whatever is already queued once the
    /// connection object itself is dropped.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::{EventSink, Reactor, TimerId, TimerKind};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct CollectSink {
        handle: ReactorHandle,
        lines: Vec<String>,
        errors: Vec<String>,
        disconnected: bool,
        stop_after: usize,
    }

    impl EventSink for CollectSink {
        fn on_io(&mut self, _token: Token, event: IoEvent) {
            match event {
                IoEvent::Data { line } => self.lines.push(line),
                IoEvent::Error { reason } => {
                    self.errors.push(reason);
                    self.handle.stop();
                }
                IoEvent::Disconnected => {
                    self.disconnected = true;
                    self.handle.stop();
                }
                _ => {}
            }
            if self.lines.len() >= self.stop_after {
                self.handle.stop();
            }
        }
        fn on_timer(&mut self, _id: TimerId, _kind: &TimerKind) {}
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_inbound_lines_become_events() {
        let mut reactor = Reactor::new();
        let handle = reactor.handle();
        let token = handle.alloc_token();
        handle.observe(token);

        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let _conn = Connection::spawn(token, server_side, test_addr(), handle.clone());

        client_side.write_all(b"NICK alice\r\nUSER a 0 * :A\r\n").await.unwrap();

        let mut sink = CollectSink {
            handle: handle.clone(),
            lines: Vec::new(),
            errors: Vec::new(),
            disconnected: false,
            stop_after: 2,
        };
        reactor.run(&mut sink).await;
        assert_eq!(sink.lines, vec!["NICK alice", "USER a 0 * :A"]);
    }

    #[tokio::test]
    async fn test_outbound_lines_are_crlf_terminated() {
        let reactor = Reactor::new();
        let handle = reactor.handle();
        let token = handle.alloc_token();

        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let conn = Connection::spawn(token, server_side, test_addr(), handle);

        assert!(conn.send_line("PING :irc.example.org"));
        let mut buf = vec![0u8; 64];
        let n = client_side.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PING :irc.example.org\r\n");
    }

    #[tokio::test]
    async fn test_peer_close_posts_disconnected() {
        let mut reactor = Reactor::new();
        let handle = reactor.handle();
        let token = handle.alloc_token();
        handle.observe(token);

        let (server_side, client_side) = tokio::io::duplex(4096);
        let _conn = Connection::spawn(token, server_side, test_addr(), handle.clone());
        drop(client_side);

        let mut sink = CollectSink {
            handle: handle.clone(),
            lines: Vec::new(),
            errors: Vec::new(),
            disconnected: false,
            stop_after: usize::MAX,
        };
        reactor.run(&mut sink).await;
        assert!(sink.disconnected);
    }

    #[tokio::test]
    async fn test_oversized_line_posts_error() {
        let mut reactor = Reactor::new();
        let handle = reactor.handle();
        let token = handle.alloc_token();
        handle.observe(token);

        let (server_side, mut client_side) = tokio::io::duplex(16384);
        let _conn = Connection::spawn(token, server_side, test_addr(), handle.clone());

        let long = vec![b'a'; MAX_LINE_LENGTH + 16];
        client_side.write_all(&long).await.unwrap();
        client_side.write_all(b"\r\n").await.unwrap();

        let mut sink = CollectSink {
            handle: handle.clone(),
            lines: Vec::new(),
            errors: Vec::new(),
            disconnected: false,
            stop_after: usize::MAX,
        };
        reactor.run(&mut sink).await;
        assert_eq!(sink.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_queued_lines_flush_after_drop() {
        let reactor = Reactor::new();
        let handle = reactor.handle();
        let token = handle.alloc_token();

        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let conn = Connection::spawn(token, server_side, test_addr(), handle);
        conn.send_line("ERROR :Closing link");
        drop(conn);

        let mut buf = Vec::new();
        client_side.read_to_end(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ERROR :Closing link\r\n");
    }
}
