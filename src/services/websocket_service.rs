use std::time::Duration;

use axum::{
    Error as AxumError,
    extract::ws::{Message, WebSocket},
};
use futures::{SinkExt, Stream, StreamExt};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ErrorMessage, RequestMessage, UpdateMessage},
    state::{
        SharedState,
        live_puzzle::LivePuzzle,
        puzzle::{PuzzleError, Request},
    },
};

/// Handle the full lifecycle of one participant's connection to a puzzle.
pub async fn handle_socket(
    state: SharedState,
    puzzle: LivePuzzle,
    user_id: String,
    socket: WebSocket,
) {
    let (mut sender, receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps updates flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    run_session(
        &puzzle,
        &user_id,
        state.config().ws_idle_timeout(),
        receiver,
        outbound_tx.clone(),
    )
    .await;

    finalize(writer_task, outbound_tx).await;
}

/// Drive a session over any inbound frame stream, writing frames to `outbound`.
///
/// The observer is registered before the JOIN is submitted, so the client
/// sees its own arrival. On exit the observer is removed and a LEAVE is
/// submitted to release whatever the user was holding.
pub async fn run_session<S>(
    puzzle: &LivePuzzle,
    user_id: &str,
    idle_timeout: Duration,
    mut inbound: S,
    outbound: mpsc::UnboundedSender<Message>,
) where
    S: Stream<Item = Result<Message, AxumError>> + Unpin,
{
    let observer = {
        let tx = outbound.clone();
        puzzle.subscribe(move |update| {
            let _ = send_message_to_websocket(&tx, &UpdateMessage::from(update));
        })
    };

    match puzzle.request(Request::join(user_id)).await {
        Ok(()) => {}
        Err(err @ PuzzleError::AlreadyInPuzzle(_)) => {
            // Another connection of the same user; keep observing.
            send_error(&outbound, &err);
        }
        Err(err) => {
            info!(puzzle_id = %puzzle.id(), user_id, error = %err, "join refused");
            send_error(&outbound, &err);
            puzzle.unsubscribe(observer);
            let _ = outbound.send(Message::Close(None));
            return;
        }
    }
    info!(
        puzzle_id = %puzzle.id(),
        user_id,
        observers = puzzle.observer_count(),
        "participant connected"
    );

    let mut heartbeat = interval(idle_timeout / 2);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;
    let deadline = sleep(idle_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            frame = inbound.next() => {
                deadline.as_mut().reset(Instant::now() + idle_timeout);
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(puzzle, user_id, text.as_str(), &outbound).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = outbound.send(Message::Pong(payload));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let _ = outbound.send(Message::Close(frame));
                        break;
                    }
                    Some(Ok(Message::Binary(_) | Message::Pong(_))) => {}
                    Some(Err(err)) => {
                        warn!(puzzle_id = %puzzle.id(), user_id, error = %err, "websocket error");
                        break;
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if outbound.send(Message::Ping(Default::default())).is_err() {
                    break;
                }
            }
            () = &mut deadline => {
                info!(puzzle_id = %puzzle.id(), user_id, "websocket idle timeout");
                let _ = outbound.send(Message::Close(None));
                break;
            }
        }
    }

    puzzle.unsubscribe(observer);
    if let Err(err) = puzzle.submit(Request::leave(user_id)) {
        debug!(puzzle_id = %puzzle.id(), user_id, error = %err, "leave not applied");
    }
    info!(
        puzzle_id = %puzzle.id(),
        user_id,
        observers = puzzle.observer_count(),
        "participant disconnected"
    );
}

async fn handle_text(
    puzzle: &LivePuzzle,
    user_id: &str,
    text: &str,
    outbound: &mpsc::UnboundedSender<Message>,
) {
    let message = match serde_json::from_str::<RequestMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(puzzle_id = %puzzle.id(), user_id, error = %err, "malformed request");
            let _ = send_message_to_websocket(
                outbound,
                &ErrorMessage {
                    error: format!("malformed request: {err}"),
                },
            );
            return;
        }
    };

    let request = match message.into_request(user_id) {
        Ok(request) => request,
        Err(err) => {
            send_error(outbound, &err);
            return;
        }
    };

    if let Err(err) = puzzle.request(request).await {
        send_error(outbound, &err);
    }
}

fn send_error(outbound: &mpsc::UnboundedSender<Message>, err: &dyn std::error::Error) {
    let _ = send_message_to_websocket(
        outbound,
        &ErrorMessage {
            error: err.to_string(),
        },
    );
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Returns `false` once the writer is gone; serialization failures are
/// logged and reported as delivered.
fn send_message_to_websocket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> bool
where
    T: ?Sized + serde::Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize websocket message");
            return true;
        }
    };
    tx.send(Message::Text(payload.into())).is_ok()
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
