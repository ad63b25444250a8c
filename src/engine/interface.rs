//! Engine trait boundary and shared payload types
//!
//! Object graph mirrors the engine's own: an environment owns controllers,
//! a controller hands out the browser control object, and the composition
//! controller variant adds visual attachment, native pointer input, and
//! continuous capture. All engine calls must originate on the instance's
//! execution thread; asynchronous completions are delivered back to that
//! thread through [`Completion`] continuations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Opaque native window identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(
    /// Raw native identifier
    pub u64,
);

/// Opaque compositor visual identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualHandle(
    /// Raw native identifier
    pub u64,
);

/// Options for creating the instance's host window
#[derive(Debug, Clone)]
pub struct WindowOptions {
    /// Client width in pixels
    pub width: u32,
    /// Client height in pixels
    pub height: u32,
    /// Top-level visible window instead of a hidden embedded one
    pub separated: bool,
    /// Transparent background
    pub transparent: bool,
}

/// Options for creating a browser environment
#[derive(Debug, Clone, Default)]
pub struct EnvironmentOptions {
    /// Profile/data directory (None = engine default)
    pub profile_dir: Option<PathBuf>,
}

/// Settings applied to the browser control once it exists
#[derive(Debug, Clone)]
pub struct ControlSettings {
    /// Allow page script execution
    pub script_enabled: bool,
    /// Allow the in-page bridge to post messages
    pub web_message_enabled: bool,
    /// Allow user zoom
    pub zoom_enabled: bool,
    /// Transparent background
    pub transparent: bool,
    /// User agent override
    pub user_agent: Option<String>,
    /// Show the engine's default context menus
    pub context_menus_enabled: bool,
}

/// One cookie as reported by the engine's cookie jar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Cookie domain
    pub domain: String,
    /// Cookie path
    pub path: String,
    /// Expiry as seconds since the epoch (None = session cookie)
    pub expires: Option<f64>,
    /// Secure attribute
    pub secure: bool,
    /// HttpOnly attribute
    pub http_only: bool,
}

/// Decision returned from a navigation-starting notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the navigation proceed
    Allow,
    /// Cancel the navigation
    Cancel,
}

/// Pointer input kinds for the compositor-routed delivery path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerInputKind {
    /// Pointer moved (hover or drag)
    Move,
    /// Primary button pressed
    Down,
    /// Primary button released
    Up,
    /// Wheel rotation
    Wheel,
}

/// Pointer input delivered through the composition controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    /// Input kind
    pub kind: PointerInputKind,
    /// Device x coordinate
    pub x: i32,
    /// Device y coordinate
    pub y: i32,
    /// Button-state flags (bit 0 = primary button held)
    pub buttons: u32,
    /// Wheel rotation in native wheel units
    pub wheel_delta: i32,
}

/// Native-style input message posted to a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowMessage {
    /// Pointer moved
    MouseMove {
        /// Device x coordinate
        x: i32,
        /// Device y coordinate
        y: i32,
    },
    /// Primary button pressed
    MouseDown {
        /// Device x coordinate
        x: i32,
        /// Device y coordinate
        y: i32,
    },
    /// Primary button released
    MouseUp {
        /// Device x coordinate
        x: i32,
        /// Device y coordinate
        y: i32,
    },
    /// Key pressed, by virtual-key code
    KeyDown {
        /// Native virtual-key code
        virtual_key: u16,
    },
    /// Key released, by virtual-key code
    KeyUp {
        /// Native virtual-key code
        virtual_key: u16,
    },
    /// Printable character input
    Char {
        /// The character
        ch: char,
    },
}

/// One GPU frame as presented to a [`FrameSink`]
///
/// Pixel rows are BGRA, `stride` bytes apart; `stride >= width * 4`.
#[derive(Debug)]
pub struct FramePayload<'a> {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row in `data`
    pub stride: usize,
    /// BGRA pixel rows
    pub data: &'a [u8],
}

/// What the sink did with a delivered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Frame was consumed (or deliberately dropped)
    Consumed,
    /// Recreate the capture session at the given size; the frame was not read
    Recreate {
        /// New session width
        width: u32,
        /// New session height
        height: u32,
    },
}

/// Receiver for continuous-capture frames.
///
/// Called from a capture-session-owned thread, never from the execution
/// thread; implementations synchronize through their own locks.
pub trait FrameSink: Send + Sync {
    /// Handle one delivered frame
    fn on_frame(&self, frame: &FramePayload<'_>) -> FrameDisposition;
}

/// Event subscriptions bound to a browser control.
///
/// Invoked by the engine on the execution thread.
pub trait ControlEventHandler: Send {
    /// A navigation is about to start; return whether it may proceed
    fn navigation_starting(&self, url: &str) -> NavigationDecision;
    /// A navigation finished; `error_status` is engine-defined on failure
    fn navigation_completed(&self, url: &str, success: bool, error_status: i32);
    /// The in-page bridge posted a message
    fn web_message_received(&self, message: &str);
    /// A document-level HTTP response arrived with the given status
    fn http_response_received(&self, url: &str, status: u16);
    /// Back/forward availability changed
    fn history_changed(&self, can_go_back: bool, can_go_forward: bool);
}

/// Single-shot continuation for an asynchronous engine request.
///
/// Completing posts the result back to the originating instance's execution
/// thread; the move-only `complete` enforces at-most-once delivery.
pub struct Completion<T> {
    deliver: Box<dyn FnOnce(EngineResult<T>) + Send>,
}

impl<T> Completion<T> {
    /// Wrap a delivery closure
    pub fn new(deliver: impl FnOnce(EngineResult<T>) + Send + 'static) -> Self {
        Self {
            deliver: Box::new(deliver),
        }
    }

    /// Deliver the result, consuming the continuation
    pub fn complete(self, result: EngineResult<T>) {
        (self.deliver)(result)
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Completion")
    }
}

/// Top-level engine collaborator: windowing, environment creation, and
/// runtime capability probes.
pub trait WebEngine: Send {
    /// Create the instance's host window on the calling (execution) thread
    fn create_window(&mut self, options: &WindowOptions) -> EngineResult<Box<dyn HostWindow>>;

    /// Request a browser environment. `Err` means the request itself could
    /// not be issued (engine runtime absent); asynchronous failures arrive
    /// through the completion.
    fn create_environment(
        &mut self,
        options: &EnvironmentOptions,
        done: Completion<Box<dyn Environment>>,
    ) -> EngineResult<()>;

    /// Create a compositor target hosting visuals inside the given window
    fn create_compositor(&mut self, window: WindowId) -> EngineResult<Box<dyn Compositor>>;

    /// Whether the runtime supports continuous GPU capture
    fn supports_continuous_capture(&self) -> bool;
}

/// A configured browser runtime instance (profile/data directory)
pub trait Environment: Send {
    /// Request the window-routed controller variant
    fn create_controller(&mut self, window: WindowId, done: Completion<Box<dyn Controller>>);

    /// Request the compositor-routed controller variant. `Err` means the
    /// variant cannot even be requested at this runtime version.
    fn create_composition_controller(
        &mut self,
        window: WindowId,
        done: Completion<Box<dyn CompositionController>>,
    ) -> EngineResult<()>;
}

/// Mediates window bounds, visibility, and control acquisition for one view
pub trait Controller: Send {
    /// Set the view bounds in pixels
    fn set_bounds(&mut self, width: u32, height: u32) -> EngineResult<()>;
    /// Show or hide the view
    fn set_visible(&mut self, visible: bool) -> EngineResult<()>;
    /// Obtain the browser control object for this view
    fn browser_control(&mut self) -> EngineResult<Box<dyn BrowserControl>>;
    /// Release engine resources; the controller is unusable afterwards
    fn close(&mut self);
}

/// Compositor-routed controller variant: adds visual attachment, native
/// pointer input, and continuous capture.
pub trait CompositionController: Controller {
    /// The root visual to attach to a compositor target
    fn root_visual(&mut self) -> EngineResult<VisualHandle>;
    /// Deliver pointer input through the compositor's input entry point
    fn send_pointer_input(&mut self, input: PointerInput) -> EngineResult<()>;
    /// Start a continuous capture session delivering frames to `sink`
    fn start_capture(
        &mut self,
        width: u32,
        height: u32,
        sink: Arc<dyn FrameSink>,
    ) -> EngineResult<Box<dyn CaptureSession>>;
}

/// OS visual-composition target for one window
pub trait Compositor: Send {
    /// Attach a controller's root visual to this target
    fn attach_visual(&mut self, visual: VisualHandle) -> EngineResult<()>;
}

/// Ongoing GPU frame delivery session
pub trait CaptureSession: Send {
    /// Stop frame delivery; the session is unusable afterwards
    fn stop(&mut self);
}

/// Navigation, scripting, and event subscription for one view
pub trait BrowserControl: Send {
    /// Navigate to a URL, sending the given custom request headers
    fn navigate(&mut self, url: &str, headers: &HashMap<String, String>) -> EngineResult<()>;
    /// Load an HTML string as the document
    fn load_html(&mut self, html: &str) -> EngineResult<()>;
    /// Evaluate script in the page
    fn evaluate_script(&mut self, script: &str) -> EngineResult<()>;
    /// Register a script to run at every document creation
    fn add_startup_script(&mut self, script: &str) -> EngineResult<()>;
    /// Navigate back in history
    fn go_back(&mut self) -> EngineResult<()>;
    /// Navigate forward in history
    fn go_forward(&mut self) -> EngineResult<()>;
    /// Reload the current document
    fn reload(&mut self) -> EngineResult<()>;
    /// Apply control settings
    fn apply_settings(&mut self, settings: &ControlSettings) -> EngineResult<()>;
    /// Bind event subscriptions
    fn set_event_handler(&mut self, handler: Box<dyn ControlEventHandler>);
    /// Request a compressed-image snapshot of current content
    fn capture_snapshot(&mut self, done: Completion<Vec<u8>>);
    /// Query cookies for a URL
    fn get_cookies(&mut self, url: &str, done: Completion<Vec<Cookie>>);
    /// Delete one cookie by URL and name
    fn delete_cookie(&mut self, url: &str, name: &str) -> EngineResult<()>;
    /// Delete all cookies in the profile
    fn delete_all_cookies(&mut self) -> EngineResult<()>;
    /// Clear the HTTP cache (optionally including the disk cache)
    fn clear_cache(&mut self, include_disk: bool) -> EngineResult<()>;
    /// Supply credentials for basic-auth challenges
    fn set_basic_auth(&mut self, username: &str, password: &str) -> EngineResult<()>;
    /// Suspend or resume the view
    fn set_suspended(&mut self, suspended: bool) -> EngineResult<()>;
}

/// One native window created for an instance
pub trait HostWindow: Send {
    /// This window's identifier
    fn id(&self) -> WindowId;
    /// Resize the client area
    fn set_size(&mut self, width: u32, height: u32) -> EngineResult<()>;
    /// Show or hide the window
    fn set_visible(&mut self, visible: bool) -> EngineResult<()>;
    /// The innermost child window of the control's window hierarchy
    fn innermost_child(&self) -> Option<WindowId>;
    /// Post a synthesized input message to a window in this hierarchy
    fn post_input(&self, target: WindowId, message: WindowMessage) -> EngineResult<()>;
}
