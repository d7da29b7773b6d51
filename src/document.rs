//! Whiteboard document model.
//!
//! DESIGN
//! ======
//! Elements are tagged variants (stroke, shape, text) rather than a generic
//! kind + props bag, so malformed content fails at deserialization instead
//! of deep inside a handler. All functions here are pure: they take a
//! document and return a new one, never mutating their input. Rooms own the
//! only mutable copies.
//!
//! Rendering order across the three collections is the total order
//! `(created_at, id)`, where `created_at` is the owning room's monotonic
//! counter. That keeps replays deterministic regardless of which collection
//! an element lives in.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// GEOMETRY
// =============================================================================

/// A 2D point, serialized as a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

// =============================================================================
// ELEMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeMode {
    Ink,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Arrow,
    Segment,
}

/// Freehand ink (or erase) path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: Uuid,
    pub author: Uuid,
    pub created_at: u64,
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
    pub mode: StrokeMode,
}

/// Two-anchor geometric shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: Uuid,
    pub author: Uuid,
    pub created_at: u64,
    pub kind: ShapeKind,
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

/// Anchored text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub id: Uuid,
    pub author: Uuid,
    pub created_at: u64,
    pub at: Point,
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
}

/// Any whiteboard element.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Stroke(Stroke),
    Shape(Shape),
    Text(Text),
}

impl Element {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Element::Stroke(s) => s.id,
            Element::Shape(s) => s.id,
            Element::Text(t) => t.id,
        }
    }

    #[must_use]
    pub fn created_at(&self) -> u64 {
        match self {
            Element::Stroke(s) => s.created_at,
            Element::Shape(s) => s.created_at,
            Element::Text(t) => t.created_at,
        }
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Full whiteboard contents. This is the unit of history frames, broadcast
/// payloads, and persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub texts: Vec<Text>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("duplicate element id: {0}")]
    DuplicateId(Uuid),
}

/// Whether any element in the document carries the given id.
#[must_use]
pub fn contains(doc: &Document, id: Uuid) -> bool {
    doc.strokes.iter().any(|s| s.id == id)
        || doc.shapes.iter().any(|s| s.id == id)
        || doc.texts.iter().any(|t| t.id == id)
}

/// Append an element, returning the new document.
///
/// # Errors
///
/// Returns `DuplicateId` if the document already holds the element's id.
pub fn add_element(doc: &Document, element: Element) -> Result<Document, DocumentError> {
    if contains(doc, element.id()) {
        return Err(DocumentError::DuplicateId(element.id()));
    }
    let mut next = doc.clone();
    match element {
        Element::Stroke(stroke) => next.strokes.push(stroke),
        Element::Shape(shape) => next.shapes.push(shape),
        Element::Text(text) => next.texts.push(text),
    }
    Ok(next)
}

/// Remove the element with the given id, returning the new document.
/// Unknown ids return an unchanged copy (idempotent).
#[must_use]
pub fn remove_element(doc: &Document, id: Uuid) -> Document {
    let mut next = doc.clone();
    next.strokes.retain(|s| s.id != id);
    next.shapes.retain(|s| s.id != id);
    next.texts.retain(|t| t.id != id);
    next
}

/// All elements in rendering order: ascending `created_at`, ties broken by id.
#[must_use]
pub fn render_order(doc: &Document) -> Vec<Element> {
    let mut elements: Vec<Element> = doc
        .strokes
        .iter()
        .cloned()
        .map(Element::Stroke)
        .chain(doc.shapes.iter().cloned().map(Element::Shape))
        .chain(doc.texts.iter().cloned().map(Element::Text))
        .collect();
    elements.sort_by_key(|e| (e.created_at(), e.id()));
    elements
}

/// The highest `created_at` present, for seeding a room's counter after a
/// cold load. `None` for an empty document.
#[must_use]
pub fn last_created_at(doc: &Document) -> Option<u64> {
    doc.strokes
        .iter()
        .map(|s| s.created_at)
        .chain(doc.shapes.iter().map(|s| s.created_at))
        .chain(doc.texts.iter().map(|t| t.created_at))
        .max()
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
