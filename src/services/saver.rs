//! Saver — debounced warm-save of dirty rooms.
//!
//! DESIGN
//! ======
//! A background task sweeps all live rooms on a fixed interval. Each dirty
//! room yields one snapshot, taken under its lock and written entirely
//! outside it, with at most one save in flight per room. A room that
//! mutates while its save is in flight stays dirty and gets the newer
//! snapshot on a later sweep.
//!
//! ERROR HANDLING
//! ==============
//! Transient failures retry with exponential backoff (1 s → 2 s → 4 s →
//! 8 s, four retries). Exhaustion is logged and saving stops for that room
//! until its next mutation marks it dirty again; room state is never rolled
//! back.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::document::Document;
use crate::services::room::Room;
use crate::services::store::{DocumentStore, StoreError};
use crate::state::AppState;

const SAVE_RETRY_BACKOFF_SECS: [u64; 4] = [1, 2, 4, 8];

/// How often a draining final save re-checks a room whose periodic save is
/// still in flight.
const FINAL_SAVE_POLL: Duration = Duration::from_millis(50);

/// Spawn the background save task. Returns a handle for shutdown.
pub fn spawn_save_task(state: AppState) -> JoinHandle<()> {
    info!(interval = ?state.config.save_interval, "warm-save sweep configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.save_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            sweep_dirty_rooms(&state).await;
        }
    })
}

/// One sweep: snapshot every dirty room and hand each snapshot to its own
/// save task, so one slow store call never delays other rooms.
pub(crate) async fn sweep_dirty_rooms(state: &AppState) {
    let rooms: Vec<Arc<Room>> = state.rooms.read().await.values().cloned().collect();
    for room in rooms {
        let Some(snapshot) = room.begin_save().await else {
            continue;
        };
        let store = state.store.clone();
        tokio::spawn(async move {
            save_room(store, room, snapshot.document, snapshot.seq).await;
        });
    }
}

/// Write one snapshot with retries, then settle the room's save handshake.
pub(crate) async fn save_room(store: Arc<dyn DocumentStore>, room: Arc<Room>, document: Document, seq: u64) -> bool {
    let result = save_with_retry(store.as_ref(), room.id(), &document).await;
    let saved = match result {
        Ok(()) => {
            info!(room_id = room.id(), "document saved");
            true
        }
        Err(e) => {
            error!(room_id = room.id(), error = %e, "document save failed permanently");
            false
        }
    };
    room.finish_save(seq).await;
    saved
}

/// Final save when the last member leaves: drain any in-flight periodic
/// save, then write the last snapshot. Stops on permanent failure.
pub(crate) async fn run_final_save(store: Arc<dyn DocumentStore>, room: Arc<Room>) {
    loop {
        if let Some(snapshot) = room.begin_save().await {
            if !save_room(store.clone(), room.clone(), snapshot.document, snapshot.seq).await {
                return;
            }
        } else if room.save_idle().await {
            return;
        } else {
            tokio::time::sleep(FINAL_SAVE_POLL).await;
        }
    }
}

/// One save attempt plus up to four retries with exponential backoff.
async fn save_with_retry(store: &dyn DocumentStore, room_id: &str, document: &Document) -> Result<(), StoreError> {
    let mut last_err = match store.save(room_id, document).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    for (retry, backoff_secs) in SAVE_RETRY_BACKOFF_SECS.iter().enumerate() {
        warn!(
            room_id,
            error = %last_err,
            retry = retry + 1,
            backoff_secs,
            "document save failed; retrying"
        );
        tokio::time::sleep(Duration::from_secs(*backoff_secs)).await;
        match store.save(room_id, document).await {
            Ok(()) => return Ok(()),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

#[cfg(test)]
#[path = "saver_test.rs"]
mod tests;
