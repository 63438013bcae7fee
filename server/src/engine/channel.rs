use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::LimitsSection;
use crate::error::HandshakeError;

use super::block_list::BlockList;
use super::lifecycle::Lifecycle;
use super::notices;
use super::session::{Session, SessionId};
use super::validation;

/// A named channel. Password, membership, broadcast queue and relay-loop state
/// sit behind one lock so joins, evictions and loop start/stop never interleave.
#[derive(Debug)]
pub struct Channel {
    name: String,
    state: Mutex<ChannelState>,
}

#[derive(Debug, Default)]
struct ChannelState {
    /// Empty means the channel is open.
    password: String,
    /// Members in join order.
    members: Vec<Arc<Session>>,
    /// Pending notifications, oldest first.
    broadcasts: VecDeque<String>,
    relay_running: bool,
    /// Set once the channel is deleted; a loop holding this handle must stop.
    dissolved: bool,
}

/// Result of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// No relay loop was running; the caller must start one.
    pub start_relay: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ChannelState {
                password: password.into(),
                ..ChannelState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> String {
        self.lock().password.clone()
    }

    pub fn set_password(&self, password: &str) {
        self.lock().password = password.to_string();
    }

    pub fn has_password(&self) -> bool {
        !self.lock().password.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.lock().members.len()
    }

    /// Snapshot of current members in join order.
    pub fn members(&self) -> Vec<Arc<Session>> {
        self.lock().members.clone()
    }

    pub fn is_member(&self, id: SessionId) -> bool {
        self.lock().members.iter().any(|m| m.id == id)
    }

    pub fn is_relay_running(&self) -> bool {
        self.lock().relay_running
    }

    pub fn is_dissolved(&self) -> bool {
        self.lock().dissolved
    }

    /// Validate a join request against live state and, if it passes, append the
    /// session and queue its join notification. Checks run in a fixed order so
    /// the client sees the first rule it broke. The run state is read under the
    /// channel lock, so a join racing a shutdown is either disbanded by it or
    /// refused here.
    pub fn admit(
        &self,
        session: Arc<Session>,
        password: &str,
        limits: &LimitsSection,
        block_list: &BlockList,
        lifecycle: &Lifecycle,
    ) -> Result<Admission, HandshakeError> {
        let mut state = self.lock();

        if !lifecycle.is_active() {
            return Err(HandshakeError::ServerStopped);
        }
        if state.dissolved {
            return Err(HandshakeError::InvalidChannel);
        }
        if state.members.len() >= limits.max_channel_users {
            return Err(HandshakeError::ChannelFull);
        }
        let username = session.username.as_str();
        if !validation::is_valid_username(username, limits)
            || state.members.iter().any(|m| m.username == username)
            || block_list.contains(username)
        {
            return Err(HandshakeError::UsernameRejected);
        }
        if !state.password.is_empty() && state.password != password {
            return Err(HandshakeError::AuthenticationFailed);
        }

        state.broadcasts.push_back(notices::joined(username));
        state.members.push(session);

        let start_relay = !state.relay_running;
        state.relay_running = true;
        Ok(Admission { start_relay })
    }

    /// Remove a member. Returns it if it was still present.
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut state = self.lock();
        let pos = state.members.iter().position(|m| m.id == id)?;
        Some(state.members.remove(pos))
    }

    pub fn push_notice(&self, notice: String) {
        self.lock().broadcasts.push_back(notice);
    }

    pub fn pop_notice(&self) -> Option<String> {
        self.lock().broadcasts.pop_front()
    }

    /// Start of a relay-loop scan. Returns the members to visit, or `None` when
    /// the loop must end (no members, channel deleted, or server stopping), in
    /// which case the channel is marked as having no loop.
    pub fn begin_scan(&self, server_active: bool) -> Option<Vec<Arc<Session>>> {
        let mut state = self.lock();
        if !server_active || state.dissolved || state.members.is_empty() {
            state.relay_running = false;
            return None;
        }
        Some(state.members.clone())
    }

    /// Mark the channel deleted and hand back its members for closing.
    pub fn dissolve(&self) -> Vec<Arc<Session>> {
        let mut state = self.lock();
        state.dissolved = true;
        state.broadcasts.clear();
        std::mem::take(&mut state.members)
    }

    /// Drop every member but keep the channel. Used on shutdown.
    pub fn disband(&self) -> Vec<Arc<Session>> {
        let mut state = self.lock();
        state.broadcasts.clear();
        std::mem::take(&mut state.members)
    }
}
