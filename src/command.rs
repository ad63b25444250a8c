//! Cross-thread command protocol
//!
//! Every browser-engine operation is invoked through this channel; it is the
//! only path onto the instance's execution thread, which keeps all engine
//! calls on one consistent thread. Posting is non-blocking and the queue is
//! unbounded. When the execution thread is gone, the failed post hands the
//! command back to the caller so the payload is never silently leaked.

use std::sync::mpsc::Sender;

use crate::error::PostError;
use crate::input::{KeyEvent, PointerEvent};

/// One operation for the execution thread
#[derive(Debug)]
pub enum Command {
    /// Navigate to a URL
    Navigate(String),
    /// Load an HTML string as the document
    LoadHtml(String),
    /// Evaluate script in the page
    EvaluateScript(String),
    /// Navigate back in history
    GoBack,
    /// Navigate forward in history
    GoForward,
    /// Reload the current document
    Reload,
    /// Resize the view
    SetBounds {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
    /// Show or hide the view
    SetVisible(bool),
    /// Request a frame; also records the active pixel density
    CaptureFrame {
        /// Trigger a new snapshot on the snapshot path
        force_refresh: bool,
        /// Host pixel-density factor for input scaling
        pixel_density: f32,
    },
    /// Forward a pointer event
    Pointer(PointerEvent),
    /// Forward a keyboard event
    Key(KeyEvent),
    /// The view's pixel dimensions changed without a bounds change
    ResizeNotify {
        /// New pixel width
        width: u32,
        /// New pixel height
        height: u32,
    },
    /// Clear the HTTP cache
    ClearCache {
        /// Also clear the disk cache
        include_disk: bool,
    },
    /// Suspend the view
    Pause,
    /// Resume the view
    Resume,
    /// Query cookies for a URL
    GetCookies {
        /// Cookie scope URL
        url: String,
    },
    /// Delete one cookie
    DeleteCookie {
        /// Cookie scope URL
        url: String,
        /// Cookie name
        name: String,
    },
    /// Delete all cookies in the profile
    DeleteAllCookies,
    /// Supply basic-auth credentials
    SetBasicAuth {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Stop the message pump and tear the instance down
    Destroy,
}

/// Messages carried by an instance's merged queue
#[derive(Debug)]
pub(crate) enum ThreadMessage {
    /// A host command
    Command(Command),
    /// An engine completion or event
    Engine(crate::instance::EngineEvent),
    /// Secondary shutdown signal; pumps the loop without side effects
    Wake,
}

/// Posting half of an instance's command queue
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<ThreadMessage>,
}

impl CommandSender {
    pub(crate) fn new(tx: Sender<ThreadMessage>) -> Self {
        Self { tx }
    }

    /// Post a command to the execution thread.
    ///
    /// Never blocks. On failure the command comes back inside the error.
    pub fn post(&self, command: Command) -> Result<(), PostError> {
        self.tx
            .send(ThreadMessage::Command(command))
            .map_err(|err| match err.0 {
                ThreadMessage::Command(command) => PostError { command },
                // Only commands are posted through this sender.
                _ => unreachable!("non-command message posted through CommandSender"),
            })
    }

    /// Post the secondary wake signal used during shutdown
    pub(crate) fn wake(&self) -> bool {
        self.tx.send(ThreadMessage::Wake).is_ok()
    }
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CommandSender")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_post_delivers_in_order() {
        let (tx, rx) = mpsc::channel();
        let sender = CommandSender::new(tx);

        sender.post(Command::GoBack).unwrap();
        sender.post(Command::Reload).unwrap();

        assert!(matches!(
            rx.recv().unwrap(),
            ThreadMessage::Command(Command::GoBack)
        ));
        assert!(matches!(
            rx.recv().unwrap(),
            ThreadMessage::Command(Command::Reload)
        ));
    }

    #[test]
    fn test_failed_post_returns_payload() {
        let (tx, rx) = mpsc::channel();
        let sender = CommandSender::new(tx);
        drop(rx);

        let err = sender
            .post(Command::Navigate("https://example.com".to_string()))
            .unwrap_err();
        match err.command {
            Command::Navigate(url) => assert_eq!(url, "https://example.com"),
            other => panic!("wrong payload returned: {:?}", other),
        }
    }

    #[test]
    fn test_wake_reports_liveness() {
        let (tx, rx) = mpsc::channel();
        let sender = CommandSender::new(tx);
        assert!(sender.wake());
        drop(rx);
        assert!(!sender.wake());
    }
}
