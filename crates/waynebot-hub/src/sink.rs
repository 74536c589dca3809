// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket pumps for one hub sink.
//!
//! The write pump drains the sink's outbound queue, batching every message
//! already queued into one newline-separated frame, and pings the peer. The
//! read pump discards client frames and enforces the pong deadline. When
//! either side ends the sink is unregistered and the socket dropped.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, warn};

use crate::hub::Hub;

/// Time allowed to write one frame to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed between frames (including pongs) from the peer.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping interval. Must be shorter than [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Largest frame accepted from the peer.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Upgrade an HTTP request and serve the socket as a hub sink.
pub fn upgrade(ws: WebSocketUpgrade, hub: Hub) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| serve_socket(socket, hub))
}

/// Register a sink for `socket` and pump until either side ends.
pub async fn serve_socket(socket: WebSocket, hub: Hub) {
    let sub = match hub.register().await {
        Ok(sub) => sub,
        Err(e) => {
            warn!(error = %e, "could not register sink");
            return;
        }
    };
    let id = sub.id;
    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_pump(ws_tx, sub.outbound));
    let mut reader = tokio::spawn(read_pump(ws_rx));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.unregister(id).await;
    debug!(sink = id, "sink disconnected");
}

/// Join `first` with every message already waiting in `outbound`.
pub(crate) fn batch(first: Arc<str>, outbound: &mut mpsc::Receiver<Arc<str>>) -> String {
    let mut frame = String::from(&*first);
    while let Ok(next) = outbound.try_recv() {
        frame.push('\n');
        frame.push_str(&next);
    }
    frame
}

pub(crate) async fn write_pump<S>(mut ws: S, mut outbound: mpsc::Receiver<Arc<str>>)
where
    S: Sink<Message> + Unpin,
{
    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(first) = next else {
                    // hub closed the queue
                    let _ = timeout(WRITE_WAIT, ws.send(Message::Close(None))).await;
                    return;
                };
                let frame = batch(first, &mut outbound);
                match timeout(WRITE_WAIT, ws.send(Message::Text(frame.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        debug!("sink write failed");
                        return;
                    }
                    Err(_) => {
                        debug!("sink write deadline exceeded");
                        return;
                    }
                }
            }
            _ = ping.tick() => {
                if !matches!(
                    timeout(WRITE_WAIT, ws.send(Message::Ping(Default::default()))).await,
                    Ok(Ok(()))
                ) {
                    return;
                }
            }
        }
    }
}

pub(crate) async fn read_pump<S, E>(mut ws: S)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        match timeout(PONG_WAIT, ws.next()).await {
            Err(_) => {
                debug!("sink read deadline exceeded");
                return;
            }
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return,
            // Clients post through the HTTP API; anything else only refreshes the deadline.
            Ok(Some(Ok(_))) => {}
        }
    }
}
