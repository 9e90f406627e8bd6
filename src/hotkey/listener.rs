//! Hotkey event loop
//!
//! Pulls messages from a blocking source and hands hotkey ids to a callback
//! on the loop's own thread. The callback runs synchronously, so it must be
//! quick: a second hotkey is only seen after the first callback returns.

use tracing::{debug, error, info};

/// What the message source produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMessage {
    /// A registered hotkey fired
    Hotkey(i32),
    /// Any other message; dropped by the loop
    Other,
    /// The quit sentinel
    Quit,
}

/// Errors from the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("message retrieval failed: {0}")]
    Retrieve(String),

    #[error("failed to spawn hotkey thread: {0}")]
    ThreadSpawn(String),
}

/// Blocking "next message" primitive
pub trait MessageSource {
    fn next_message(&mut self) -> Result<LoopMessage, ListenerError>;
}

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    Failed(String),
}

/// Run until the source yields `Quit` or fails
pub fn run_message_loop<S, F>(source: &mut S, mut on_fire: F) -> LoopExit
where
    S: MessageSource + ?Sized,
    F: FnMut(i32),
{
    info!("hotkey message loop started");

    loop {
        match source.next_message() {
            Ok(LoopMessage::Hotkey(id)) => {
                debug!(id, "hotkey pressed");
                on_fire(id);
            }
            Ok(LoopMessage::Other) => {}
            Ok(LoopMessage::Quit) => {
                info!("hotkey message loop received quit");
                return LoopExit::Quit;
            }
            Err(e) => {
                error!("hotkey message loop stopped: {}", e);
                return LoopExit::Failed(e.to_string());
            }
        }
    }
}
