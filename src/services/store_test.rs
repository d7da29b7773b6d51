
use super::*;
use crate::document::{Element, Point, Stroke, StrokeMode, add_element};
use std::sync::Arc;
use uuid::Uuid;

fn one_stroke_document() -> Document {
    let stroke = Stroke {
        id: Uuid::new_v4(),
        author: Uuid::new_v4(),
        created_at: 0,
        points: vec![Point(0.0, 0.0)],
        color: "#000".into(),
        stroke_width: 1.0,
        mode: StrokeMode::Ink,
    };
    add_element(&Document::default(), Element::Stroke(stroke)).unwrap()
}

#[tokio::test]
async fn memory_store_load_misses_return_none() {
    let store = MemoryStore::default();
    assert!(store.load("nowhere").await.unwrap().is_none());
}

#[tokio::test]
async fn memory_store_round_trips_documents() {
    let store = MemoryStore::default();
    let doc = one_stroke_document();

    store.save("r1", &doc).await.unwrap();
    let loaded = store.load("r1").await.unwrap().unwrap();
    assert_eq!(loaded, doc);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn memory_store_save_overwrites() {
    let store = MemoryStore::default();
    store.save("r1", &one_stroke_document()).await.unwrap();
    store.save("r1", &Document::default()).await.unwrap();

    let loaded = store.load("r1").await.unwrap().unwrap();
    assert!(loaded.strokes.is_empty());
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn stores_are_usable_as_trait_objects() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
    store.save("r1", &Document::default()).await.unwrap();
    assert!(store.load("r1").await.unwrap().is_some());
}

#[test]
fn http_store_shapes_document_urls() {
    let store = HttpStore::new("http://store.internal:9000/api/").unwrap();
    assert_eq!(
        store.document_url("weekly-sync"),
        "http://store.internal:9000/api/documents/weekly-sync"
    );
}
