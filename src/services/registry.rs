//! Room registry — lifecycle of live rooms.
//!
//! DESIGN
//! ======
//! Rooms are created on demand when the first session joins and destroyed
//! when the last member leaves (after a final save if dirty). The map lock
//! is held only for lookup, insert, and remove; cold-load and every room
//! operation run outside it.
//!
//! ERROR HANDLING
//! ==============
//! Teardown races a concurrent join: eviction is decided under the map
//! lock together with the room's own `try_evict`, so a session that grabbed
//! the Arc just before removal observes the evicted flag and retries with a
//! fresh lookup.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::services::room::Room;
use crate::services::saver;
use crate::state::AppState;

/// Look up a live room without creating one.
pub async fn get(state: &AppState, room_id: &str) -> Option<Arc<Room>> {
    state.rooms.read().await.get(room_id).cloned()
}

/// Number of live rooms, for the health endpoint.
pub async fn room_count(state: &AppState) -> usize {
    state.rooms.read().await.len()
}

/// Fetch the room, creating and cold-loading it on first use. Concurrent
/// callers for the same new id get the same instance and wait for one load.
pub async fn get_or_create(state: &AppState, room_id: &str) -> Arc<Room> {
    let room = {
        let mut rooms = state.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room_id, "room created");
                Arc::new(Room::new(room_id, state.config.history_cap))
            })
            .clone()
    };
    room.ensure_loaded(state.store.as_ref()).await;
    room
}

/// Remove a session from a room. When the member set becomes empty the
/// room is evicted from the map and, if dirty, handed to a final save.
pub async fn release(state: &AppState, room_id: &str, session_id: Uuid) {
    let Some(room) = get(state, room_id).await else {
        return;
    };

    if !room.leave(session_id).await {
        return;
    }

    // Decide eviction under the map lock so a racing join either lands
    // first (room kept) or sees the evicted flag and retries.
    let evicted = {
        let mut rooms = state.rooms.write().await;
        let still_registered = rooms.get(room_id).is_some_and(|current| Arc::ptr_eq(current, &room));
        if still_registered && room.try_evict().await {
            rooms.remove(room_id);
            true
        } else {
            false
        }
    };

    if evicted {
        info!(room_id, "room evicted");
        if !room.save_idle().await {
            let store = state.store.clone();
            tokio::spawn(async move {
                saver::run_final_save(store, room).await;
            });
        }
    }
}

/// External delete notification from the document store: drop the room and
/// tell its members. Returns false when the room is not live.
pub async fn delete(state: &AppState, room_id: &str) -> bool {
    let room = {
        let mut rooms = state.rooms.write().await;
        rooms.remove(room_id)
    };
    let Some(room) = room else {
        return false;
    };
    room.mark_deleted().await;
    true
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
