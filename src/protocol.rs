//! Wire protocol — the `{ kind, data }` message envelope.
//!
//! DESIGN
//! ======
//! Both directions are closed, adjacently tagged enums: `kind` names the
//! message, `data` carries the payload. Validation is entirely structural —
//! anything that deserializes is well-formed, anything else is a malformed
//! message and never reaches a room.
//!
//! Element creation payloads are tagged a second time (`type` / `payload`)
//! so a new element arrives fully typed with no field probing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{Document, Element, Point, Shape, ShapeKind, Stroke, StrokeMode, Text};

// =============================================================================
// NEW-ELEMENT PAYLOADS
// =============================================================================

/// Client-submitted stroke, before the server assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStroke {
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
    pub mode: StrokeMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShape {
    pub kind: ShapeKind,
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default)]
    pub fill: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewText {
    pub at: Point,
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
}

/// A submitted element: `{ "type": "line" | "shape" | "text", "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum NewElement {
    Line(NewStroke),
    Shape(NewShape),
    Text(NewText),
}

impl NewElement {
    /// Attach server-assigned identity, producing a document element.
    #[must_use]
    pub fn into_element(self, id: Uuid, author: Uuid, created_at: u64) -> Element {
        match self {
            NewElement::Line(s) => Element::Stroke(Stroke {
                id,
                author,
                created_at,
                points: s.points,
                color: s.color,
                stroke_width: s.stroke_width,
                mode: s.mode,
            }),
            NewElement::Shape(s) => Element::Shape(Shape {
                id,
                author,
                created_at,
                kind: s.kind,
                from: s.from,
                to: s.to,
                color: s.color,
                stroke_width: s.stroke_width,
                fill: s.fill,
            }),
            NewElement::Text(t) => Element::Text(Text {
                id,
                author,
                created_at,
                at: t.at,
                text: t.text,
                font_size: t.font_size,
                font_family: t.font_family,
                color: t.color,
            }),
        }
    }
}

/// Body of `create-element`: the claimed room plus the tagged element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateElementData {
    pub room_id: String,
    #[serde(flatten)]
    pub element: NewElement,
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom(String),
    LeaveRoom,
    CreateElement(CreateElementData),
    DeleteElement { room_id: String, element_id: Uuid },
    Undo(String),
    Redo(String),
    CursorMove { room_id: String, x: f64, y: f64, label: String },
    CursorLeave(String),
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    StateUpdate { document: Document, can_undo: bool, can_redo: bool },
    Members { members: Vec<Uuid> },
    RemoteCursor { session_id: Uuid, x: f64, y: f64, label: String },
    RemoteCursorLeave { session_id: Uuid },
    RoomDeleted(String),
}

impl ServerMessage {
    /// Wire name of the message, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::StateUpdate { .. } => "state-update",
            ServerMessage::Members { .. } => "members",
            ServerMessage::RemoteCursor { .. } => "remote-cursor",
            ServerMessage::RemoteCursorLeave { .. } => "remote-cursor-leave",
            ServerMessage::RoomDeleted(_) => "room-deleted",
        }
    }

    /// Presence traffic is high-frequency and skipped by per-message logging.
    #[must_use]
    pub fn is_cursor(&self) -> bool {
        matches!(
            self,
            ServerMessage::RemoteCursor { .. } | ServerMessage::RemoteCursorLeave { .. }
        )
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
