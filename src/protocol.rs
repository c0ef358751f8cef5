/// What a client line means once the session is in a room.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    /// Exact `/quit`: graceful disconnect.
    Quit,
    /// `/join <name>`: switch to another room. The name may come out
    /// empty (`/join ` with nothing after the space); the session layer
    /// rejects that instead of joining a room named "".
    Join(String),
    /// Anything else is chat text to relay.
    Chat(String),
}

/// Classifies a trimmed, non-empty line. A bare `/join` without the
/// trailing space is not a command and falls through to chat.
pub fn classify(line: &str) -> Request {
    if line == "/quit" {
        Request::Quit
    } else if let Some(rest) = line.strip_prefix("/join ") {
        Request::Join(rest.trim().to_string())
    } else {
        Request::Chat(line.to_string())
    }
}
