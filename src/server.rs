use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::state::ServerState;

/// Accepts connections forever on a pre-bound listener, spawning one
/// session task per client. At most `max_clients` sessions run at once;
/// the permit is taken before `accept`, so excess connection attempts
/// wait in the kernel backlog instead of being turned away. A failed
/// accept loses that one connection and the loop keeps going.
pub async fn run(listener: TcpListener, max_clients: usize, state: ServerState) -> Result<()> {
    let capacity = Arc::new(Semaphore::new(max_clients));

    loop {
        let permit = capacity.clone().acquire_owned().await?;

        match listener.accept().await {
            Ok((socket, peer)) => {
                info!(%peer, "client connected");
                let state = state.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(err) = crate::conn::handle(state, socket, peer).await {
                        warn!(%peer, "connection error: {err:#}");
                    }
                });
            }
            Err(err) => {
                warn!("accept failed: {err}");
            }
        }
    }
}
