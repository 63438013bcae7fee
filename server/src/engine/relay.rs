use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RelaySettings;
use crate::error::{AdminError, HandshakeError};
use crate::snapshot::{ChannelEntry, StateSnapshot};

use super::block_list::BlockList;
use super::channel::Channel;
use super::lifecycle::Lifecycle;
use super::relay_loop;
use super::session::Session;
use super::validation;

/// A channel as the admin sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub name: String,
    pub member_count: usize,
    pub has_password: bool,
}

/// A member as the admin sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub username: String,
    pub connected_for: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub channels: usize,
    pub users: usize,
    pub blocked: usize,
    pub running_loops: usize,
}

/// The shared hub: channel registry, block list and run state. Handshake tasks,
/// relay loops and the admin surface all operate on one `Arc<ChatRelay>`.
pub struct ChatRelay {
    /// Channels keyed by name.
    channels: DashMap<String, Arc<Channel>>,
    block_list: BlockList,
    lifecycle: Lifecycle,
    settings: RelaySettings,
}

impl ChatRelay {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            channels: DashMap::new(),
            block_list: BlockList::new(),
            lifecycle: Lifecycle::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn block_list(&self) -> &BlockList {
        &self.block_list
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub(crate) fn begin(&self) -> CancellationToken {
        self.lifecycle.begin()
    }

    /// Ask the server to stop. The accept loop exits at once and relay loops
    /// exit within one member step.
    pub fn stop(&self) {
        if self.lifecycle.stop() {
            info!("server stop requested");
        }
    }

    /// Stop and force-close every session in every channel. Channels persist.
    pub async fn shutdown(&self) {
        self.lifecycle.stop();

        let channels: Vec<Arc<Channel>> = self.channels.iter().map(|c| c.value().clone()).collect();
        let mut closed = 0;
        for channel in channels {
            for session in channel.disband() {
                session.close().await;
                closed += 1;
            }
        }
        info!(sessions = closed, "server stopped");
    }

    // ── Joining ─────────────────────────────────────────────────────

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|c| c.value().clone())
    }

    /// Admit an authenticated session into its channel, starting the channel's
    /// relay loop if none is running.
    pub fn join(self: &Arc<Self>, session: Arc<Session>, password: &str) -> Result<(), HandshakeError> {
        let channel = self
            .channel(&session.channel)
            .ok_or(HandshakeError::InvalidChannel)?;

        let admission = channel.admit(
            session,
            password,
            &self.settings.limits,
            &self.block_list,
            &self.lifecycle,
        )?;
        if admission.start_relay {
            tokio::spawn(relay_loop::run(self.clone(), channel));
        }
        Ok(())
    }

    // ── Channel administration ──────────────────────────────────────

    pub fn create_channel(&self, name: &str) -> Result<(), AdminError> {
        let name = name.trim();
        validation::validate_channel_name(name, &self.settings.limits)?;

        match self.channels.entry(name.to_string()) {
            Entry::Occupied(_) => Err(AdminError::ChannelExists),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Channel::new(name, "")));
                info!(channel = %name, "channel created");
                Ok(())
            }
        }
    }

    /// Delete a channel and close all its sessions. Returns how many were closed.
    pub async fn delete_channel(&self, name: &str) -> Result<usize, AdminError> {
        let name = name.trim();
        let (_, channel) = self
            .channels
            .remove(name)
            .ok_or_else(|| AdminError::NoSuchChannel(name.to_string()))?;

        let members = channel.dissolve();
        let count = members.len();
        for session in members {
            session.close().await;
        }

        info!(channel = %name, sessions = count, "channel deleted");
        Ok(count)
    }

    pub fn set_password(&self, name: &str, password: &str) -> Result<(), AdminError> {
        let name = name.trim();
        let channel = self
            .channel(name)
            .ok_or_else(|| AdminError::NoSuchChannel(name.to_string()))?;
        channel.set_password(password);
        info!(channel = %name, open = password.is_empty(), "channel password changed");
        Ok(())
    }

    pub fn list_channels(&self) -> Vec<ChannelSummary> {
        let mut list: Vec<ChannelSummary> = self
            .channels
            .iter()
            .map(|entry| ChannelSummary {
                name: entry.key().clone(),
                member_count: entry.member_count(),
                has_password: entry.has_password(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn channel_members(&self, name: &str) -> Result<Vec<MemberSummary>, AdminError> {
        let name = name.trim();
        let channel = self
            .channel(name)
            .ok_or_else(|| AdminError::NoSuchChannel(name.to_string()))?;
        Ok(channel
            .members()
            .iter()
            .map(|s| MemberSummary {
                username: s.username.clone(),
                connected_for: s.connected_for(),
            })
            .collect())
    }

    /// Names of channels with a live relay loop, sorted.
    pub fn running_loops(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|entry| entry.is_relay_running())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> RelayStats {
        let mut stats = RelayStats {
            channels: 0,
            users: 0,
            blocked: self.block_list.count(),
            running_loops: 0,
        };
        for entry in self.channels.iter() {
            stats.channels += 1;
            stats.users += entry.member_count();
            if entry.is_relay_running() {
                stats.running_loops += 1;
            }
        }
        stats
    }

    // ── Block list ──────────────────────────────────────────────────

    /// Block a username everywhere. Joined sessions with that name are evicted
    /// by their channel's relay loop on its next visit.
    pub fn block_user(&self, username: &str) -> Result<(), AdminError> {
        self.block_list.add(username)?;
        info!(username = %username.trim(), "user blocked");
        Ok(())
    }

    pub fn unblock_user(&self, username: &str) -> Result<(), AdminError> {
        self.block_list.remove(username)?;
        info!(username = %username.trim(), "user unblocked");
        Ok(())
    }

    pub fn blocked_users(&self) -> Vec<String> {
        self.block_list.list()
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Capture the endpoint, channels, passwords and the block list.
    pub fn snapshot(&self) -> StateSnapshot {
        let mut channels: Vec<ChannelEntry> = self
            .channels
            .iter()
            .map(|entry| ChannelEntry {
                name: entry.key().clone(),
                password: entry.password(),
            })
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));

        StateSnapshot {
            host: Some(self.settings.host.clone()),
            port: Some(self.settings.port),
            channels,
            blocked: self.block_list.list(),
        }
    }

    /// Replace the channel set with the snapshot's and merge its block list.
    /// Only allowed while the server is stopped.
    pub fn load_snapshot(&self, snapshot: &StateSnapshot) -> Result<(), AdminError> {
        if self.is_active() {
            return Err(AdminError::ServerRunning);
        }

        self.channels.clear();
        for entry in &snapshot.channels {
            if let Err(e) = validation::validate_channel_name(&entry.name, &self.settings.limits) {
                warn!(channel = %entry.name, error = %e, "skipping channel from snapshot");
                continue;
            }
            self.channels.insert(
                entry.name.clone(),
                Arc::new(Channel::new(entry.name.clone(), entry.password.clone())),
            );
        }
        for username in &snapshot.blocked {
            // Duplicates in the file are harmless.
            let _ = self.block_list.add(username);
        }

        info!(
            channels = self.channels.len(),
            blocked = self.block_list.count(),
            "state loaded"
        );
        Ok(())
    }
}
