//! Room — authoritative per-room state.
//!
//! DESIGN
//! ======
//! A room owns the document history, the member set, and the presence
//! relay. Every operation runs under the room's exclusive lock, which
//! yields one linearizable sequence of state updates per room: all members
//! observe the same broadcasts in the same order. Sessions never touch
//! room state directly; they submit intent through the dispatcher and the
//! room computes and publishes the result.
//!
//! Publishing is non-blocking: each member gets a `try_send` into its
//! bounded outbound queue. A full (or closed) queue evicts that member
//! only; the room is never stalled by a slow client.
//!
//! PERSISTENCE
//! ===========
//! Cold-load runs once per room lifetime via a `OnceCell`, so concurrent
//! first joiners wait for a single load. Saves snapshot the current frame
//! under the lock and run entirely outside it; `begin_save`/`finish_save`
//! keep at most one save in flight per room and re-dirty the room when a
//! mutation raced the write.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, OnceCell, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::document::{self, Document};
use crate::protocol::{NewElement, ServerMessage};
use crate::services::history::History;
use crate::services::store::DocumentStore;

// =============================================================================
// TYPES
// =============================================================================

/// Result of a join attempt.
pub enum JoinOutcome {
    /// Joined; carries the state-update snapshot for the new member.
    Joined(ServerMessage),
    /// The room was torn down between lookup and join; retry with a fresh
    /// registry lookup.
    Evicted,
}

/// Dirty snapshot handed to the saver. `seq` identifies the mutation the
/// snapshot reflects so a racing edit keeps the room dirty.
pub struct SaveSnapshot {
    pub document: Document,
    pub seq: u64,
}

pub struct Room {
    id: String,
    history_cap: usize,
    cold_load: OnceCell<()>,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    history: History,
    /// Connected members: session id -> outbound queue sender.
    members: HashMap<Uuid, mpsc::Sender<ServerMessage>>,
    /// Room-monotonic counter stamped on elements as `created_at`.
    next_seq: u64,
    /// Counts history-changing operations, to detect edits racing a save.
    mutation_seq: u64,
    /// Time of the first unpersisted change, if any.
    dirty_since: Option<Instant>,
    save_in_flight: bool,
    /// Cold-load failed: refuse saves so an empty first write cannot
    /// overwrite data that may still exist in the store.
    save_blocked: bool,
    /// Set under the registry lock when the room is removed from the map.
    evicted: bool,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl Room {
    #[must_use]
    pub fn new(id: &str, history_cap: usize) -> Self {
        Self {
            id: id.to_string(),
            history_cap,
            cold_load: OnceCell::new(),
            inner: Mutex::new(RoomInner {
                history: History::new(Document::default(), history_cap),
                members: HashMap::new(),
                next_seq: 0,
                mutation_seq: 0,
                dirty_since: None,
                save_in_flight: false,
                save_blocked: false,
                evicted: false,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Seed the room from the document store, exactly once. Concurrent
    /// callers wait for the single load to complete.
    pub async fn ensure_loaded(&self, store: &dyn DocumentStore) {
        self.cold_load
            .get_or_init(|| async {
                match store.load(&self.id).await {
                    Ok(Some(doc)) => {
                        let mut inner = self.inner.lock().await;
                        inner.next_seq = document::last_created_at(&doc).map_or(0, |seq| seq + 1);
                        inner.history = History::new(doc, self.history_cap);
                        info!(room_id = %self.id, "room seeded from document store");
                    }
                    Ok(None) => {
                        info!(room_id = %self.id, "no stored document; room starts empty");
                    }
                    Err(e) => {
                        let mut inner = self.inner.lock().await;
                        inner.save_blocked = true;
                        error!(
                            room_id = %self.id,
                            error = %e,
                            "cold-load failed; starting empty with saves blocked"
                        );
                    }
                }
            })
            .await;
    }

    /// Add a member and publish the updated member list to everyone.
    pub async fn join(&self, session_id: Uuid, tx: mpsc::Sender<ServerMessage>) -> JoinOutcome {
        let mut inner = self.inner.lock().await;
        if inner.evicted {
            return JoinOutcome::Evicted;
        }
        inner.members.insert(session_id, tx);
        info!(room_id = %self.id, %session_id, members = inner.members.len(), "session joined room");

        let snapshot = state_update(&inner);
        let members = members_message(&inner);
        broadcast(&mut inner, &self.id, &members, None);
        JoinOutcome::Joined(snapshot)
    }

    /// Remove a member and publish the updated member list to the rest.
    /// Returns true when the room is now empty.
    pub async fn leave(&self, session_id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.members.remove(&session_id).is_some() {
            info!(room_id = %self.id, %session_id, remaining = inner.members.len(), "session left room");
            let members = members_message(&inner);
            broadcast(&mut inner, &self.id, &members, None);
        }
        inner.members.is_empty()
    }

    /// Mark the room evicted if it has no members. Called under the
    /// registry lock so a concurrent join either lands before (room kept)
    /// or observes the flag and retries against a fresh room.
    pub async fn try_evict(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.members.is_empty() {
            inner.evicted = true;
            true
        } else {
            false
        }
    }

    /// External delete notification: tell members, drop them, and block
    /// any further saves for this document.
    pub async fn mark_deleted(&self) {
        let mut inner = self.inner.lock().await;
        inner.evicted = true;
        inner.save_blocked = true;
        inner.dirty_since = None;
        let message = ServerMessage::RoomDeleted(self.id.clone());
        broadcast(&mut inner, &self.id, &message, None);
        // Dropping the senders closes each member's outbound queue, which
        // its websocket task turns into a disconnect.
        inner.members.clear();
        info!(room_id = %self.id, "room deleted; members disconnected");
    }

    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

impl Room {
    /// Assign identity to a submitted element, append the new frame, and
    /// broadcast. Non-member submissions are dropped.
    pub async fn create_element(&self, author: Uuid, element: NewElement) {
        let mut inner = self.inner.lock().await;
        if !is_member(&inner, author, &self.id, "create-element") {
            return;
        }

        let id = Uuid::new_v4();
        let created_at = inner.next_seq;
        inner.next_seq += 1;
        let element = element.into_element(id, author, created_at);

        let next = match document::add_element(inner.history.current(), element) {
            Ok(doc) => doc,
            Err(e) => {
                // Unreachable with v4 ids minted under this lock.
                warn!(room_id = %self.id, error = %e, "element rejected");
                return;
            }
        };
        inner.history.record(next);
        mark_dirty(&mut inner);

        let update = state_update(&inner);
        broadcast(&mut inner, &self.id, &update, None);
    }

    /// Remove an element by id and broadcast. Unknown ids change nothing:
    /// no frame is appended and nothing is sent.
    pub async fn delete_element(&self, sender: Uuid, element_id: Uuid) {
        let mut inner = self.inner.lock().await;
        if !is_member(&inner, sender, &self.id, "delete-element") {
            return;
        }
        if !document::contains(inner.history.current(), element_id) {
            debug!(room_id = %self.id, %element_id, "delete of unknown element id");
            return;
        }

        let next = document::remove_element(inner.history.current(), element_id);
        inner.history.record(next);
        mark_dirty(&mut inner);

        let update = state_update(&inner);
        broadcast(&mut inner, &self.id, &update, None);
    }

    /// Step the history cursor back and broadcast. A no-op at the boundary.
    pub async fn undo(&self, sender: Uuid) {
        let mut inner = self.inner.lock().await;
        if !is_member(&inner, sender, &self.id, "undo") {
            return;
        }
        if !inner.history.undo() {
            return;
        }
        mark_dirty(&mut inner);
        let update = state_update(&inner);
        broadcast(&mut inner, &self.id, &update, None);
    }

    /// Step the history cursor forward and broadcast. A no-op at the boundary.
    pub async fn redo(&self, sender: Uuid) {
        let mut inner = self.inner.lock().await;
        if !is_member(&inner, sender, &self.id, "redo") {
            return;
        }
        if !inner.history.redo() {
            return;
        }
        mark_dirty(&mut inner);
        let update = state_update(&inner);
        broadcast(&mut inner, &self.id, &update, None);
    }

    /// Relay a cursor position to every other member. Ephemeral: never
    /// touches history or persistence.
    pub async fn cursor_move(&self, sender: Uuid, x: f64, y: f64, label: String) {
        let mut inner = self.inner.lock().await;
        if !inner.members.contains_key(&sender) {
            return;
        }
        let message = ServerMessage::RemoteCursor { session_id: sender, x, y, label };
        broadcast(&mut inner, &self.id, &message, Some(sender));
    }

    /// Relay a cursor departure to every other member.
    pub async fn cursor_leave(&self, sender: Uuid) {
        let mut inner = self.inner.lock().await;
        if !inner.members.contains_key(&sender) {
            return;
        }
        let message = ServerMessage::RemoteCursorLeave { session_id: sender };
        broadcast(&mut inner, &self.id, &message, Some(sender));
    }
}

// =============================================================================
// SAVE HANDSHAKE
// =============================================================================

impl Room {
    /// Snapshot the current frame for saving, if the room is dirty, not
    /// save-blocked, and no save is already in flight.
    pub async fn begin_save(&self) -> Option<SaveSnapshot> {
        let mut inner = self.inner.lock().await;
        if inner.save_blocked || inner.save_in_flight || inner.dirty_since.is_none() {
            return None;
        }
        inner.save_in_flight = true;
        Some(SaveSnapshot { document: inner.history.current().clone(), seq: inner.mutation_seq })
    }

    /// Settle a save attempt. The dirty flag is cleared only when no
    /// mutation raced the write; otherwise the room stays dirty and the
    /// next sweep picks up the newer snapshot.
    pub async fn finish_save(&self, seq: u64) {
        let mut inner = self.inner.lock().await;
        inner.save_in_flight = false;
        if inner.mutation_seq == seq {
            inner.dirty_since = None;
        }
    }

    /// Whether the saver has nothing left to do for this room.
    pub async fn save_idle(&self) -> bool {
        let inner = self.inner.lock().await;
        !inner.save_in_flight && (inner.dirty_since.is_none() || inner.save_blocked)
    }

    #[cfg(test)]
    pub(crate) async fn is_dirty(&self) -> bool {
        self.inner.lock().await.dirty_since.is_some()
    }

    #[cfg(test)]
    pub(crate) async fn is_save_blocked(&self) -> bool {
        self.inner.lock().await.save_blocked
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn is_member(inner: &RoomInner, session_id: Uuid, room_id: &str, op: &str) -> bool {
    if inner.members.contains_key(&session_id) {
        return true;
    }
    debug!(%session_id, room_id, op, "dropping operation from non-member");
    false
}

fn mark_dirty(inner: &mut RoomInner) {
    inner.mutation_seq += 1;
    if inner.dirty_since.is_none() {
        inner.dirty_since = Some(Instant::now());
    }
}

fn state_update(inner: &RoomInner) -> ServerMessage {
    ServerMessage::StateUpdate {
        document: inner.history.current().clone(),
        can_undo: inner.history.can_undo(),
        can_redo: inner.history.can_redo(),
    }
}

fn members_message(inner: &RoomInner) -> ServerMessage {
    let mut members: Vec<Uuid> = inner.members.keys().copied().collect();
    members.sort();
    ServerMessage::Members { members }
}

/// Enqueue a message to every member, optionally excluding one. A member
/// whose queue is full or closed is evicted; the websocket task observes
/// the dropped sender and disconnects that client.
fn broadcast(inner: &mut RoomInner, room_id: &str, message: &ServerMessage, exclude: Option<Uuid>) {
    let mut evicted: Vec<(Uuid, &'static str)> = Vec::new();
    for (session_id, tx) in &inner.members {
        if exclude == Some(*session_id) {
            continue;
        }
        match tx.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => evicted.push((*session_id, "outbound queue full")),
            Err(TrySendError::Closed(_)) => evicted.push((*session_id, "outbound queue closed")),
        }
    }
    for (session_id, reason) in evicted {
        inner.members.remove(&session_id);
        warn!(room_id, %session_id, reason, "evicting slow session from room");
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
