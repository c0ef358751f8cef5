use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use chatrelay::{server, state::ServerState};

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server::run(listener, 16, ServerState::default()).await;
    });
    addr
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let socket = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = socket.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Connects and walks the handle/room negotiation to completion.
    async fn login(addr: SocketAddr, handle: &str, room: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.expect("enter your nickname").await;
        client.send(handle).await;
        client.expect(&format!("Welcome, {handle}!")).await;
        client.expect("room you want to join").await;
        client.send(room).await;
        client.expect(&format!("You are now in room: {room}")).await;
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Reads lines until one contains `needle`, skipping unrelated
    /// notices that may interleave.
    async fn expect(&mut self, needle: &str) -> String {
        let needle = needle.to_string();
        timeout(Duration::from_secs(5), async {
            loop {
                let line = self
                    .lines
                    .next_line()
                    .await
                    .unwrap()
                    .expect("connection closed early");
                if line.contains(&needle) {
                    return line;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}"))
    }

    async fn expect_silence(&mut self, quiet: Duration) {
        if let Ok(line) = timeout(quiet, self.lines.next_line()).await {
            panic!("expected silence, got {line:?}");
        }
    }

    async fn expect_closed(&mut self) {
        timeout(Duration::from_secs(5), async {
            while let Some(_line) = self.lines.next_line().await.unwrap() {}
        })
        .await
        .expect("connection was not closed");
    }
}

#[tokio::test]
async fn duplicate_handle_is_reprompted() {
    let addr = start_server().await;
    let _alice = Client::login(addr, "alice", "lobby").await;

    let mut b = Client::connect(addr).await;
    b.expect("enter your nickname").await;
    b.send("alice").await;
    b.expect("already in use").await;
    b.send("bob").await;
    b.expect("Welcome, bob!").await;
}

#[tokio::test]
async fn empty_inputs_are_reprompted() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client.expect("enter your nickname").await;
    client.send("").await;
    client.expect("Nickname cannot be empty").await;
    client.send("dana").await;
    client.expect("room you want to join").await;
    client.send("").await;
    client.expect("Room name cannot be empty").await;
    client.send("lobby").await;
    client.expect("You are now in room: lobby").await;
}

#[tokio::test]
async fn chat_is_scoped_to_the_room() {
    let addr = start_server().await;
    let mut alice = Client::login(addr, "alice", "lobby").await;
    let mut bob = Client::login(addr, "bob", "lobby").await;
    let mut carol = Client::login(addr, "carol", "other").await;
    carol.expect("carol has joined the room").await;

    alice.send("hi").await;
    alice.expect("alice: hi").await;
    bob.expect("alice: hi").await;
    carol.expect_silence(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn joining_another_room_reroutes_chat() {
    let addr = start_server().await;
    let mut alice = Client::login(addr, "alice", "lobby").await;
    let mut bob = Client::login(addr, "bob", "lobby").await;
    let mut carol = Client::login(addr, "carol", "other").await;

    alice.send("/join other").await;
    alice.send("over here").await;

    alice.expect("alice: over here").await;
    carol.expect("alice: over here").await;
    // bob still sees earlier notices but never the rerouted chat line
    bob.expect("carol has joined the chat").await;
    bob.expect_silence(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn quit_cleans_up_and_frees_the_handle() {
    let addr = start_server().await;
    let mut alice = Client::login(addr, "alice", "lobby").await;
    let mut bob = Client::login(addr, "bob", "other").await;

    alice.send("/quit").await;
    bob.expect("alice has left the chat").await;
    alice.expect_closed().await;

    // the handle is reusable once its owner is gone
    let mut second = Client::connect(addr).await;
    second.expect("enter your nickname").await;
    second.send("alice").await;
    second.expect("Welcome, alice!").await;
}

#[tokio::test]
async fn abrupt_disconnect_produces_the_same_notice() {
    let addr = start_server().await;
    let alice = Client::login(addr, "alice", "lobby").await;
    let mut bob = Client::login(addr, "bob", "lobby").await;

    drop(alice);
    bob.expect("alice has left the chat").await;
}
