//! End-to-end tests over real TCP connections

use ferricd_core::{Config, ListenerConfig, Reactor, Server};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn start_server() -> SocketAddr {
    let mut config = Config::default();
    config.server.name = "irc.test.org".to_string();
    config.server.network = "TestNet".to_string();
    config.listeners = vec![ListenerConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }];
    config.lookup.dns = false;
    config.lookup.ident = false;
    config.flood.penalty_threshold = 100;

    let mut reactor = Reactor::new();
    let mut server = Server::new(config, &reactor).expect("server construction");
    ferricd_modules::register_all(&mut server);
    server.start().await.expect("listener bind");
    let addr = server.listeners[0].local_addr.expect("bound address");

    tokio::spawn(async move {
        reactor.run(&mut server).await;
    });
    addr
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .expect("write");
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("read timed out")
            .expect("read failed");
        assert!(n > 0, "connection closed unexpectedly");
        line.trim_end().to_string()
    }

    /// Read lines until one contains the pattern; panics after a timeout.
    async fn wait_for(&mut self, pattern: &str) -> String {
        for _ in 0..100 {
            let line = self.read_line().await;
            if line.contains(pattern) {
                return line;
            }
        }
        panic!("never saw {:?}", pattern);
    }

    /// Complete the NICK/USER/PING-PONG handshake.
    async fn register(&mut self, nick: &str) {
        self.send(&format!("NICK {}", nick)).await;
        self.send(&format!("USER {} 0 * :{} Example", nick, nick))
            .await;
        let ping = self.wait_for("PING").await;
        let origin = ping
            .split_whitespace()
            .nth(1)
            .expect("ping origin")
            .trim_start_matches(':');
        self.send(&format!("PONG {}", origin)).await;
        self.wait_for(" 001 ").await;
    }
}

#[tokio::test]
async fn test_registration_handshake_and_welcome_burst() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;

    client.send("NICK alice").await;
    client.send("USER a 0 * :Alice").await;

    let ping = client.wait_for("PING").await;
    assert!(ping.contains("irc.test.org"));
    client.send("PONG irc.test.org").await;

    let welcome = client.wait_for(" 001 ").await;
    assert!(welcome.contains("Welcome to the TestNet IRC Network"));
    assert!(welcome.contains("alice"));
    client.wait_for(" 004 ").await;
    client.wait_for(" 005 ").await;
    // No MOTD file is configured, so the burst ends with ERR_NOMOTD.
    client.wait_for(" 422 ").await;
}

#[tokio::test]
async fn test_unregistered_commands_rejected() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;
    client.send("JOIN #test").await;
    let reply = client.wait_for(" 451 ").await;
    assert!(reply.contains("You have not registered"));
}

#[tokio::test]
async fn test_join_fresh_channel() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;

    client.send("JOIN #test").await;
    let join = client.wait_for("JOIN").await;
    assert!(join.starts_with(":alice!"));
    assert!(join.ends_with(":#test") || join.ends_with("#test"));

    let names = client.wait_for(" 353 ").await;
    assert!(names.contains("@alice"));
    client.wait_for(" 366 ").await;
    let topic = client.wait_for(" 331 ").await;
    assert!(topic.contains("No topic is set"));
}

#[tokio::test]
async fn test_channel_key_enforcement() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #test").await;
    alice.wait_for(" 366 ").await;
    alice.send("MODE #test +k secret").await;
    let mode = alice.wait_for("MODE #test").await;
    assert!(mode.contains("+k secret"));

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #test wrongkey").await;
    let denied = bob.wait_for(" 475 ").await;
    assert!(denied.contains("#test"));

    bob.send("JOIN #test secret").await;
    let join = bob.wait_for("JOIN").await;
    assert!(join.starts_with(":bob!"));

    // Alice sees bob arrive.
    let seen = alice.wait_for("JOIN").await;
    assert!(seen.starts_with(":bob!"));
}

#[tokio::test]
async fn test_privmsg_between_clients() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;

    alice.send("JOIN #chat").await;
    alice.wait_for(" 366 ").await;
    bob.send("JOIN #chat").await;
    bob.wait_for(" 366 ").await;

    alice.send("PRIVMSG #chat :hello everyone").await;
    let msg = bob.wait_for("PRIVMSG #chat").await;
    assert!(msg.starts_with(":alice!"));
    assert!(msg.ends_with(":hello everyone"));

    bob.send("PRIVMSG alice :hi alice").await;
    let direct = alice.wait_for("PRIVMSG alice").await;
    assert!(direct.starts_with(":bob!"));
}

#[tokio::test]
async fn test_quit_broadcast_and_channel_cleanup() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;

    alice.send("JOIN #room").await;
    alice.wait_for(" 366 ").await;
    bob.send("JOIN #room").await;
    bob.wait_for(" 366 ").await;
    alice.wait_for("JOIN").await;

    bob.send("QUIT :done for today").await;
    let quit = alice.wait_for("QUIT").await;
    assert!(quit.starts_with(":bob!"));
    assert!(quit.contains("done for today"));
}

#[tokio::test]
async fn test_mode_batching_on_the_wire() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #modes").await;
    alice.wait_for(" 366 ").await;

    // Eight additions in one command arrive as one line of six letters and
    // one of two.
    alice.send("MODE #modes +impsntkl key 5").await;
    let first = alice.wait_for("MODE #modes").await;
    assert!(first.contains("+impsnt"));
    let second = alice.wait_for("MODE #modes").await;
    assert!(second.contains("+kl key 5"));
}
