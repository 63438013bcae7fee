use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::notices::{FIELD_DELIMITER, JOIN_ACCEPTED};
use crate::engine::relay::ChatRelay;
use crate::engine::session::Session;

use super::connection::{Connection, Received};

/// The single message a client sends after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub username: String,
    pub channel: String,
    pub password: String,
}

impl JoinRequest {
    /// Parse `username<<>>channel<<>>password`. The password field may be
    /// empty or left off entirely. Fields are trimmed.
    pub fn parse(payload: &str) -> Option<Self> {
        let fields: Vec<&str> = payload.split(FIELD_DELIMITER).collect();
        let (username, channel, password) = match fields.as_slice() {
            [username, channel] => (username, channel, &""),
            [username, channel, password] => (username, channel, password),
            _ => return None,
        };
        Some(Self {
            username: username.trim().to_string(),
            channel: channel.trim().to_string(),
            password: password.trim().to_string(),
        })
    }

    pub fn to_payload(&self) -> String {
        [
            self.username.as_str(),
            self.channel.as_str(),
            self.password.as_str(),
        ]
        .join(FIELD_DELIMITER)
    }
}

/// Drive one freshly accepted connection through the handshake. On success the
/// connection ends up owned by its channel; on any failure it is closed here.
pub async fn handle_connection(relay: Arc<ChatRelay>, conn: Connection) {
    let peer = conn.peer().to_string();
    conn.set_timeout(relay.settings().handshake_timeout);

    let payload = match conn.receive().await {
        Received::Message(text) if !text.is_empty() => text,
        Received::Empty => {
            debug!(%peer, "handshake timed out");
            conn.close().await;
            return;
        }
        _ => {
            debug!(%peer, "no handshake received");
            conn.close().await;
            return;
        }
    };

    let Some(request) = JoinRequest::parse(&payload) else {
        debug!(%peer, "malformed handshake");
        conn.close().await;
        return;
    };

    conn.set_timeout(relay.settings().poll_timeout);
    let session = Arc::new(Session::new(
        request.username.clone(),
        request.channel.clone(),
        conn,
    ));

    // Hold the write half across admission so the acceptance reply is the first
    // frame the client sees, ahead of any relay traffic.
    let mut writer = session.connection().lock_writer().await;
    match relay.join(session.clone(), &request.password) {
        Ok(()) => {
            if !writer.send(JOIN_ACCEPTED).await {
                // The relay loop will find the connection dead and clean up.
                debug!(%peer, "failed to send join acceptance");
            }
            info!(
                %peer,
                username = %request.username,
                channel = %request.channel,
                "user joined"
            );
        }
        Err(e) => {
            warn!(
                %peer,
                username = %request.username,
                channel = %request.channel,
                reason = %e,
                "handshake rejected"
            );
            writer.send(&e.to_string()).await;
            drop(writer);
            session.close().await;
        }
    }
}
