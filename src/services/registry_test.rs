
use super::*;
use crate::document::{Point, StrokeMode};
use crate::protocol::{NewElement, NewStroke, ServerMessage};
use crate::services::room::JoinOutcome;
use crate::services::store::{DocumentStore, MemoryStore, StoreError};
use crate::state::test_helpers;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

fn ink_stroke() -> NewElement {
    NewElement::Line(NewStroke {
        points: vec![Point(0.0, 0.0)],
        color: "#000".into(),
        stroke_width: 1.0,
        mode: StrokeMode::Ink,
    })
}

async fn join(room: &Room, session_id: Uuid) -> mpsc::Receiver<ServerMessage> {
    let (tx, rx) = mpsc::channel(32);
    let JoinOutcome::Joined(_) = room.join(session_id, tx).await else {
        panic!("join should succeed");
    };
    rx
}

#[tokio::test]
async fn get_or_create_returns_the_same_instance() {
    let state = test_helpers::test_app_state();
    let a = get_or_create(&state, "r1").await;
    let b = get_or_create(&state, "r1").await;
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(room_count(&state).await, 1);
}

#[tokio::test]
async fn concurrent_get_or_create_loads_once() {
    struct CountingStore {
        loads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DocumentStore for CountingStore {
        async fn load(&self, _room_id: &str) -> Result<Option<crate::document::Document>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn save(
            &self,
            _room_id: &str,
            _document: &crate::document::Document,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    let store = Arc::new(CountingStore { loads: AtomicUsize::new(0) });
    let state = test_helpers::test_app_state_with_store(store.clone());

    let (a, b) = tokio::join!(get_or_create(&state, "r1"), get_or_create(&state, "r1"));
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(store.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_does_not_create() {
    let state = test_helpers::test_app_state();
    assert!(get(&state, "nope").await.is_none());
    assert_eq!(room_count(&state).await, 0);
}

#[tokio::test]
async fn release_keeps_an_occupied_room() {
    let state = test_helpers::test_app_state();
    let room = get_or_create(&state, "r1").await;
    let s1 = Uuid::new_v4();
    let s2 = Uuid::new_v4();
    let _rx1 = join(&room, s1).await;
    let _rx2 = join(&room, s2).await;

    release(&state, "r1", s1).await;
    assert_eq!(room_count(&state).await, 1);
    assert_eq!(room.member_count().await, 1);
}

#[tokio::test]
async fn release_of_the_last_member_evicts_the_room() {
    let state = test_helpers::test_app_state();
    let room = get_or_create(&state, "r1").await;
    let s1 = Uuid::new_v4();
    let _rx1 = join(&room, s1).await;

    release(&state, "r1", s1).await;
    assert_eq!(room_count(&state).await, 0);
}

#[tokio::test]
async fn release_of_an_unknown_room_is_a_no_op() {
    let state = test_helpers::test_app_state();
    release(&state, "ghost", Uuid::new_v4()).await;
    assert_eq!(room_count(&state).await, 0);
}

#[tokio::test]
async fn eviction_runs_a_final_save_for_dirty_rooms() {
    let store = Arc::new(MemoryStore::default());
    let state = test_helpers::test_app_state_with_store(store.clone());
    let room = get_or_create(&state, "r1").await;
    let s1 = Uuid::new_v4();
    let _rx1 = join(&room, s1).await;
    room.create_element(s1, ink_stroke()).await;

    release(&state, "r1", s1).await;
    assert_eq!(room_count(&state).await, 0);

    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while store.is_empty().await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("final save should reach the store");
    let saved = store.load("r1").await.unwrap().unwrap();
    assert_eq!(saved.strokes.len(), 1);
}

#[tokio::test]
async fn evicted_room_is_recreated_on_the_next_join() {
    let state = test_helpers::test_app_state();
    let old = get_or_create(&state, "r1").await;
    let s1 = Uuid::new_v4();
    let _rx1 = join(&old, s1).await;
    release(&state, "r1", s1).await;

    let fresh = get_or_create(&state, "r1").await;
    assert!(!Arc::ptr_eq(&old, &fresh));

    // The stale Arc refuses joins; the fresh one accepts them.
    let (tx, _rx) = mpsc::channel(8);
    assert!(matches!(old.join(Uuid::new_v4(), tx).await, JoinOutcome::Evicted));
    let _rx2 = join(&fresh, Uuid::new_v4()).await;
}

#[tokio::test]
async fn delete_notifies_members_and_drops_the_room() {
    let state = test_helpers::test_app_state();
    let room = get_or_create(&state, "r1").await;
    let s1 = Uuid::new_v4();
    let mut rx1 = join(&room, s1).await;
    // Drain the join members broadcast.
    let _ = rx1.try_recv();

    assert!(delete(&state, "r1").await);
    assert_eq!(room_count(&state).await, 0);

    let message = rx1.try_recv().expect("room-deleted should be queued");
    assert_eq!(message, ServerMessage::RoomDeleted("r1".into()));
}

#[tokio::test]
async fn delete_of_an_unknown_room_returns_false() {
    let state = test_helpers::test_app_state();
    assert!(!delete(&state, "ghost").await);
}
