//! # Room Broadcast Registry
//!
//! Generic fan-out for the chat, voice-call and video-call signaling rooms:
//! a set of peer channels keyed by room identifier, with broadcast that
//! excludes the sender. The three media kinds behave identically, so one
//! registry serves them all; the room key carries the kind
//! (e.g. `chat/room-42`).
//!
//! Payloads are relayed verbatim; the server never interprets room traffic.

use actix::prelude::*;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// A payload relayed to one room member's connection actor.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct RoomEvent(pub String);

/// Registry of active rooms and their members.
///
/// Shared by all room connections; membership changes take the write lock,
/// broadcasts only read.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, HashMap<Uuid, Recipient<RoomEvent>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member to a room, creating the room on first join.
    pub fn join(&self, room: &str, member: Uuid, recipient: Recipient<RoomEvent>) {
        let mut rooms = self.rooms.write().unwrap();
        let members = rooms.entry(room.to_string()).or_default();
        members.insert(member, recipient);
        tracing::info!(room, %member, members = members.len(), "member joined room");
    }

    /// Remove a member; the room itself is dropped once it empties.
    pub fn leave(&self, room: &str, member: Uuid) {
        let mut rooms = self.rooms.write().unwrap();
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&member);
            let remaining = members.len();
            if members.is_empty() {
                rooms.remove(room);
            }
            tracing::info!(room, %member, remaining, "member left room");
        }
    }

    /// Relay a payload to every member of the room except the sender.
    ///
    /// Returns the number of members the payload was handed to. Delivery is
    /// best-effort: a member whose mailbox is gone simply misses the message
    /// and is cleaned up when its actor stops.
    pub fn broadcast(&self, room: &str, sender: Uuid, payload: &str) -> usize {
        let rooms = self.rooms.read().unwrap();
        let Some(members) = rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for (member, recipient) in members.iter() {
            if *member == sender {
                continue;
            }
            recipient.do_send(RoomEvent(payload.to_string()));
            delivered += 1;
        }
        delivered
    }

    /// Members currently in a room.
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms
            .read()
            .unwrap()
            .get(room)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }
}
