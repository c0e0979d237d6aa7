//! The seam between the frame driver and whatever draws the session.

use crate::actor::{IntentSender, Snapshot};

/// Something the engine renders into once per frame.
///
/// `render` is the only place a front-end may raise intents; they are
/// applied at the start of the next frame.
pub trait Frontend {
    /// Draw the snapshot and push any intents.
    fn render(&mut self, snapshot: &Snapshot, intents: &IntentSender);

    /// Whether the user closed the front-end.
    fn close_requested(&self) -> bool {
        false
    }
}
