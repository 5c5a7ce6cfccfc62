use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::adapters::http::state::HttpState;
use crate::domain::stream::{StreamEvent, WsMessage};

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

async fn handle_socket(mut socket: WebSocket, st: HttpState) {
    let mut rx = st.session.subscribe();
    debug!("Stream subscriber connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            event = rx.recv() => match event {
                Ok(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Stream subscriber lagging, events skipped"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("Stream subscriber disconnected");
}

fn encode_event(event: &StreamEvent) -> serde_json::Result<String> {
    let message = match event {
        StreamEvent::Frame { meta, .. } => WsMessage::Frame { meta },
        StreamEvent::Cycle(report) => WsMessage::Cycle { report },
        StreamEvent::Notice(notice) => WsMessage::Notice { notice },
    };
    serde_json::to_string(&message)
}

/// A frame is a JSON `frame` message followed by its JPEG as a binary message.
/// An event that fails to encode is skipped, JPEG included.
async fn send_event(socket: &mut WebSocket, event: &StreamEvent) -> Result<(), axum::Error> {
    let json = match encode_event(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Dropping stream event that failed to encode: {e}");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await?;

    if let StreamEvent::Frame { jpeg, .. } = event {
        socket.send(Message::Binary(jpeg.clone().into())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stream::Notice;

    #[test]
    fn notices_are_tagged_json() {
        let json = encode_event(&StreamEvent::Notice(Notice::error("Detection failed: boom"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "notice");
        assert_eq!(value["notice"]["message"], "Detection failed: boom");
    }
}
