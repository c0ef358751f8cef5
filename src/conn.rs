use anyhow::Result;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{Request, classify};
use crate::registry::Sink;
use crate::state::ServerState;

/// Per-session state, owned by this connection's task alone.
struct Session {
    handle: Option<String>,
    room: Option<String>,
}

type Reader = Lines<BufReader<OwnedReadHalf>>;

/// Runs one client from accept to disconnect: handle negotiation, room
/// selection, the chat loop, then cleanup. Cleanup runs no matter how
/// the loop ended (quit, EOF, or read error).
pub async fn handle(state: ServerState, socket: TcpStream, peer: SocketAddr) -> Result<()> {
    let (reader, writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    // Everything headed for this client (prompts, notices, relayed chat)
    // goes through one channel so the writer task preserves ordering.
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_outbound(writer, rx, peer));

    let mut session = Session { handle: None, room: None };
    let outcome = run(&state, &mut lines, &tx, &mut session).await;

    // A session that never won a handle was never visible to anyone.
    if let Some(handle) = session.handle.take() {
        state.registry.unregister(&handle);
        state.rooms.leave(&handle);
        state
            .registry
            .broadcast_all(&format!("{handle} has left the chat"));
    }

    debug!(%peer, "disconnected");
    outcome
}

async fn run(
    state: &ServerState,
    lines: &mut Reader,
    tx: &Sink,
    session: &mut Session,
) -> Result<()> {
    let _ = tx.send("Welcome to the Chat Server. Please enter your nickname:".into());

    let Some(handle) = negotiate_handle(state, lines, tx).await? else {
        return Ok(());
    };
    session.handle = Some(handle.clone());
    let _ = tx.send(format!("Welcome, {handle}!"));
    state
        .registry
        .broadcast_all(&format!("{handle} has joined the chat"));

    let _ = tx.send("Please enter the name of the room you want to join or create:".into());
    let Some(room) = negotiate_room(lines, tx).await? else {
        return Ok(());
    };
    state.rooms.join(&handle, &room);
    session.room = Some(room.clone());
    let _ = tx.send(format!("You are now in room: {room}"));
    state.send_to_room(&room, &format!("{handle} has joined the room"));

    chat_loop(state, lines, tx, &handle, session).await
}

/// Reads proposed handles until one is non-empty and unclaimed. Returns
/// `None` if the client goes away first. The retry loop is unbounded.
async fn negotiate_handle(
    state: &ServerState,
    lines: &mut Reader,
    tx: &Sink,
) -> Result<Option<String>> {
    loop {
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let proposed = line.trim();
        if proposed.is_empty() {
            let _ = tx.send("Nickname cannot be empty. Please choose another:".into());
            continue;
        }
        match state.registry.register(proposed, tx.clone()) {
            Ok(()) => return Ok(Some(proposed.to_string())),
            Err(_) => {
                let _ = tx.send("Nickname already in use. Please choose another:".into());
            }
        }
    }
}

/// Reads room names until one is non-empty. Returns `None` on EOF.
async fn negotiate_room(lines: &mut Reader, tx: &Sink) -> Result<Option<String>> {
    loop {
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let room = line.trim();
        if room.is_empty() {
            let _ = tx.send("Room name cannot be empty. Please try again:".into());
            continue;
        }
        return Ok(Some(room.to_string()));
    }
}

async fn chat_loop(
    state: &ServerState,
    lines: &mut Reader,
    tx: &Sink,
    handle: &str,
    session: &mut Session,
) -> Result<()> {
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match classify(line) {
            Request::Quit => break,
            Request::Join(room) if room.is_empty() => {
                let _ = tx.send("Room name cannot be empty.".into());
            }
            Request::Join(room) => {
                state.rooms.join(handle, &room);
                session.room = Some(room);
            }
            Request::Chat(text) => {
                if let Some(room) = &session.room {
                    state.send_to_room(room, &format!("{handle}: {text}"));
                }
            }
        }
    }
    Ok(())
}

/// Drains the session's outbound channel onto the socket, one line per
/// message. Ends when the channel closes (session cleanup dropped the
/// last sender) or the peer stops accepting writes.
async fn write_outbound(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    peer: SocketAddr,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(err) = writer.write_all(msg.as_bytes()).await {
            warn!(%peer, "write failed: {err}");
            break;
        }
        if let Err(err) = writer.write_all(b"\n").await {
            warn!(%peer, "write failed: {err}");
            break;
        }
    }
}
