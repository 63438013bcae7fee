//! Per-channel relay loop.
//!
//! One task per non-empty channel. Each scan snapshots the membership, then for
//! every member in join order: enforce the block list, poll for one message with
//! the member's short timeout, act on it, and drain the broadcast queue to
//! everyone before moving on. Members removed after the snapshot was taken are
//! skipped; members added meanwhile are visited on the next scan.

use std::sync::Arc;

use tracing::{debug, info};

use crate::net::connection::Received;

use super::channel::Channel;
use super::notices::{self, ClientCommand};
use super::relay::ChatRelay;
use super::session::Session;

/// Run until the channel empties, is deleted, or the server stops.
pub async fn run(relay: Arc<ChatRelay>, channel: Arc<Channel>) {
    info!(channel = %channel.name(), "relay loop started");

    'scan: while let Some(members) = channel.begin_scan(relay.is_active()) {
        for member in members {
            if !relay.is_active() || channel.is_dissolved() {
                continue 'scan;
            }
            if !channel.is_member(member.id) {
                continue;
            }
            service_member(&relay, &channel, &member).await;
            drain_broadcasts(&channel).await;
        }
    }

    info!(channel = %channel.name(), "relay loop stopped");
}

/// Handle at most one message from one member.
async fn service_member(relay: &ChatRelay, channel: &Channel, member: &Arc<Session>) {
    if relay.block_list().contains(&member.username) {
        evict(channel, member, notices::blocked(&member.username)).await;
        info!(channel = %channel.name(), username = %member.username, "blocked member evicted");
        return;
    }

    let text = match member.receive().await {
        Received::Empty => return,
        Received::Disconnected => {
            evict(channel, member, notices::left(&member.username)).await;
            info!(channel = %channel.name(), username = %member.username, "member disconnected");
            return;
        }
        Received::Message(text) => text,
    };

    match ClientCommand::parse(&text) {
        ClientCommand::Quit => {
            evict(channel, member, notices::left(&member.username)).await;
            info!(channel = %channel.name(), username = %member.username, "member quit");
        }
        ClientCommand::Users => {
            let members = channel.members();
            let roster = notices::roster(
                members
                    .iter()
                    .map(|m| (m.username.as_str(), m.connected_for())),
            );
            if !member.send(&roster).await {
                evict(channel, member, notices::left(&member.username)).await;
            }
        }
        ClientCommand::Chat(line) => {
            let line = notices::chat(&member.username, line);
            deliver(channel, &line).await;
        }
        ClientCommand::Blank => {}
    }
}

/// Send queued notifications, oldest first, to everyone present at drain time.
/// Evictions caused by failed sends queue more notifications, which this drains too.
async fn drain_broadcasts(channel: &Channel) {
    while let Some(notice) = channel.pop_notice() {
        deliver(channel, &notice).await;
    }
}

/// Send one message to every current member. A member whose send fails is
/// treated as disconnected.
async fn deliver(channel: &Channel, text: &str) {
    for member in channel.members() {
        if !member.send(text).await {
            debug!(channel = %channel.name(), username = %member.username, "send failed");
            evict(channel, &member, notices::left(&member.username)).await;
        }
    }
}

/// Remove a member, close its transport and queue a departure notice. Does
/// nothing if someone else already removed it.
async fn evict(channel: &Channel, member: &Session, notice: String) {
    if channel.remove(member.id).is_none() {
        return;
    }
    member.close().await;
    channel.push_notice(notice);
}
