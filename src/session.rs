//! Session — one connected client.
//!
//! DESIGN
//! ======
//! A session is a server-assigned id, the opaque identity handle the auth
//! collaborator minted (absent means anonymous), the single room the client
//! is currently in, and the sending half of a bounded outbound queue. Rooms
//! hold clones of the sender and `try_send` into it; the websocket task
//! drains the receiving half. A full queue means the client reads too
//! slowly, and the room drops the sender, which the websocket task observes
//! as a closed channel and turns into a disconnect.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerMessage;

pub struct Session {
    /// Server-assigned session id; element `author` fields carry this value.
    pub id: Uuid,
    /// Opaque user handle from the auth collaborator. `None` is anonymous.
    pub identity: Option<String>,
    /// The room this session has joined, if any. At most one.
    pub current_room: Option<String>,
    outbound: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a session with a bounded outbound queue, returning the session
    /// and the receiver the transport writer drains.
    #[must_use]
    pub fn new(identity: Option<String>, queue_capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (outbound, rx) = mpsc::channel(queue_capacity.max(1));
        let session = Self { id: Uuid::new_v4(), identity, current_room: None, outbound };
        (session, rx)
    }

    /// Sender handed to rooms on join.
    #[must_use]
    pub fn outbound(&self) -> mpsc::Sender<ServerMessage> {
        self.outbound.clone()
    }
}
