// # Session Module
//
// One user session: the file set, the map view, and the event loop that
// coordinates them.
//
// Public API:
// - `SessionService`: create and start the session task
// - `SessionHandle`: send commands and subscribe to events
// - `SessionEvent` / `Alert`: list changes, viewport updates, user-facing warnings

mod events;
mod service;

pub use events::{Alert, SessionEvent, SessionEventHandle};
pub use service::{
    SessionCollaborators, SessionError, SessionHandle, SessionService, SessionSnapshot,
};
