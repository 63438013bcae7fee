use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::net::connection::{Connection, Received};

use super::notices;

/// Unique identifier for an admitted session (one per connection).
pub type SessionId = Uuid;

/// An authenticated member of exactly one channel. Owned by that channel's
/// membership list from join until removal; removal always closes the transport.
pub struct Session {
    pub id: SessionId,
    pub username: String,
    pub channel: String,
    pub joined_at: DateTime<Utc>,
    conn: Connection,
}

impl Session {
    pub fn new(username: String, channel: String, conn: Connection) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            channel,
            joined_at: Utc::now(),
            conn,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub async fn send(&self, text: &str) -> bool {
        self.conn.send(text).await
    }

    pub async fn receive(&self) -> Received {
        self.conn.receive().await
    }

    pub async fn close(&self) {
        self.conn.close().await;
    }

    /// Human-readable time since the session was admitted, e.g. `3.5 mins`.
    pub fn connected_for(&self) -> String {
        let secs = (Utc::now() - self.joined_at).num_seconds().max(0) as u64;
        notices::format_duration(secs)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("channel", &self.channel)
            .field("joined_at", &self.joined_at)
            .field("peer", &self.conn.peer())
            .finish()
    }
}
