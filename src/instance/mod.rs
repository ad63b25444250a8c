//! Web view instance
//!
//! The aggregate root: one [`WebView`] per browser view, each owning a
//! dedicated execution thread. All engine operations are posted as
//! [`Command`]s onto that thread; results and page events come back through
//! the polled outbox. Construction blocks only on thread readiness (bounded),
//! destruction only on thread exit (bounded, with a secondary wake and a
//! detach fallback).

pub(crate) mod events;
pub(crate) mod init;
pub(crate) mod runtime;

pub(crate) use runtime::EngineEvent;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::capture::ResizeSignal;
use crate::command::{Command, CommandSender};
use crate::config::InstanceConfig;
use crate::engine::WebEngine;
use crate::error::{Error, PolicyError, PostError, Result};
use crate::frame::FrameStore;
use crate::input::{KeyEvent, PointerEvent};
use crate::outbox::Outbox;
use crate::policy::NavigationPolicy;
use crate::registry;

/// Bounded wait for the execution thread to signal readiness
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded wait for the execution thread to exit after a destroy post
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded wait after the secondary wake signal before detaching
const DETACH_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared between the host-facing API, the execution thread, and the
/// capture-session thread. Each member has its own lock or is atomic;
/// critical sections copy and release.
pub(crate) struct SharedState {
    pub outbox: Outbox,
    pub policy: Mutex<NavigationPolicy>,
    pub headers: Mutex<HashMap<String, String>>,
    pub frames: Arc<FrameStore>,
    pub capture_in_flight: Arc<AtomicBool>,
    pub resize: Arc<ResizeSignal>,
    pub initialized: AtomicBool,
    pub can_go_back: AtomicBool,
    pub can_go_forward: AtomicBool,
    pub interaction_enabled: AtomicBool,
    pub pixel_density: Mutex<f32>,
    pub bounds: Mutex<(u32, u32)>,
}

impl SharedState {
    fn new(config: &InstanceConfig) -> Self {
        Self {
            outbox: Outbox::new(),
            policy: Mutex::new(NavigationPolicy::new()),
            headers: Mutex::new(HashMap::new()),
            frames: Arc::new(FrameStore::new()),
            capture_in_flight: Arc::new(AtomicBool::new(false)),
            resize: Arc::new(ResizeSignal::new()),
            initialized: AtomicBool::new(false),
            can_go_back: AtomicBool::new(false),
            can_go_forward: AtomicBool::new(false),
            interaction_enabled: AtomicBool::new(config.interaction_enabled),
            pixel_density: Mutex::new(1.0),
            bounds: Mutex::new((config.width, config.height)),
        }
    }
}

/// One embedded browser view with its own execution thread
pub struct WebView {
    id: Uuid,
    config: InstanceConfig,
    sender: CommandSender,
    shared: Arc<SharedState>,
    thread: Mutex<Option<JoinHandle<()>>>,
    exit_rx: Mutex<Option<Receiver<()>>>,
}

impl WebView {
    /// Create an instance and spawn its execution thread.
    ///
    /// Blocks the caller until the thread signals readiness or the bounded
    /// wait elapses; a timeout is not fatal, but the instance may never
    /// reach the initialized state.
    #[instrument(skip(config, engine), fields(host_object = %config.host_object))]
    pub fn create(config: InstanceConfig, engine: Box<dyn WebEngine>) -> Result<Arc<Self>> {
        let id = Uuid::new_v4();
        let shared = Arc::new(SharedState::new(&config));

        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();

        let sender = CommandSender::new(tx.clone());
        let thread_shared = shared.clone();
        let thread_config = config.clone();
        let handle = std::thread::Builder::new()
            .name(format!("hostview-{}", id.as_simple()))
            .spawn(move || {
                runtime::run(id, thread_config, engine, tx, rx, thread_shared, ready_tx);
                // Dropping exit_tx (here or on unwind) is the exit signal.
                drop(exit_tx);
            })
            .map_err(Error::Io)?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(()) => debug!("execution thread ready"),
            Err(RecvTimeoutError::Timeout) => {
                warn!("execution thread not ready within {:?}", READY_TIMEOUT)
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("execution thread exited during startup")
            }
        }

        let view = Arc::new(Self {
            id,
            config,
            sender,
            shared,
            thread: Mutex::new(Some(handle)),
            exit_rx: Mutex::new(Some(exit_rx)),
        });
        registry::register(view.clone());
        info!("instance created");
        Ok(view)
    }

    /// This instance's opaque identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The configuration the instance was created with
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Whether the initialization handshake has completed
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    /// Pop the oldest outbox event, or None when empty
    pub fn poll_message(&self) -> Option<String> {
        self.shared.outbox.poll()
    }

    /// Replace the navigation patterns. Empty strings clear their matcher.
    ///
    /// On a compile failure no policy state changes.
    #[instrument(skip(self))]
    pub fn set_url_patterns(
        &self,
        allow: &str,
        deny: &str,
        hook: &str,
    ) -> std::result::Result<(), PolicyError> {
        self.shared.policy.lock().set_patterns(allow, deny, hook)
    }

    /// Navigate to a URL
    pub fn navigate<S: Into<String>>(&self, url: S) -> std::result::Result<(), PostError> {
        self.sender.post(Command::Navigate(url.into()))
    }

    /// Load an HTML string as the document
    pub fn load_html<S: Into<String>>(&self, html: S) -> std::result::Result<(), PostError> {
        self.sender.post(Command::LoadHtml(html.into()))
    }

    /// Evaluate script in the page
    pub fn evaluate_script<S: Into<String>>(&self, js: S) -> std::result::Result<(), PostError> {
        self.sender.post(Command::EvaluateScript(js.into()))
    }

    /// Navigate back in history
    pub fn go_back(&self) -> std::result::Result<(), PostError> {
        self.sender.post(Command::GoBack)
    }

    /// Navigate forward in history
    pub fn go_forward(&self) -> std::result::Result<(), PostError> {
        self.sender.post(Command::GoForward)
    }

    /// Reload the current document
    pub fn reload(&self) -> std::result::Result<(), PostError> {
        self.sender.post(Command::Reload)
    }

    /// Cached back-navigation availability
    pub fn can_go_back(&self) -> bool {
        self.shared.can_go_back.load(Ordering::Acquire)
    }

    /// Cached forward-navigation availability
    pub fn can_go_forward(&self) -> bool {
        self.shared.can_go_forward.load(Ordering::Acquire)
    }

    /// Resize the view
    pub fn set_bounds(&self, width: u32, height: u32) -> std::result::Result<(), PostError> {
        self.sender.post(Command::SetBounds { width, height })
    }

    /// Show or hide the view
    pub fn set_visible(&self, visible: bool) -> std::result::Result<(), PostError> {
        self.sender.post(Command::SetVisible(visible))
    }

    /// Request a frame and record the active pixel density
    pub fn request_frame(
        &self,
        force_refresh: bool,
        pixel_density: f32,
    ) -> std::result::Result<(), PostError> {
        self.sender.post(Command::CaptureFrame {
            force_refresh,
            pixel_density,
        })
    }

    /// Notify the capture pipeline that the view's pixel size changed
    pub fn notify_resize(&self, width: u32, height: u32) -> std::result::Result<(), PostError> {
        self.sender.post(Command::ResizeNotify { width, height })
    }

    /// Copy the current frame into `dst` if a new one is available.
    ///
    /// Returns the frame dimensions and marks the frame consumed.
    pub fn copy_frame(&self, dst: &mut [u8]) -> Option<(u32, u32)> {
        self.shared.frames.copy_if_dirty(dst)
    }

    /// Dimensions of the current frame
    pub fn frame_size(&self) -> (u32, u32) {
        self.shared.frames.dimensions()
    }

    /// Forward a pointer event
    pub fn send_pointer(&self, event: PointerEvent) -> std::result::Result<(), PostError> {
        self.sender.post(Command::Pointer(event))
    }

    /// Forward a keyboard event
    pub fn send_key(&self, event: KeyEvent) -> std::result::Result<(), PostError> {
        self.sender.post(Command::Key(event))
    }

    /// Add or replace a custom request header
    pub fn add_custom_header<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.shared.headers.lock().insert(key.into(), value.into());
    }

    /// Remove a custom request header
    pub fn remove_custom_header(&self, key: &str) {
        self.shared.headers.lock().remove(key);
    }

    /// Look up a custom request header value
    pub fn custom_header_value(&self, key: &str) -> Option<String> {
        self.shared.headers.lock().get(key).cloned()
    }

    /// Remove all custom request headers
    pub fn clear_custom_headers(&self) {
        self.shared.headers.lock().clear();
    }

    /// Query cookies for a URL; the result arrives as a `CallOnCookies:`
    /// event carrying a JSON array
    pub fn get_cookies<S: Into<String>>(&self, url: S) -> std::result::Result<(), PostError> {
        self.sender.post(Command::GetCookies { url: url.into() })
    }

    /// Delete one cookie by URL and name
    pub fn delete_cookie<S: Into<String>, N: Into<String>>(
        &self,
        url: S,
        name: N,
    ) -> std::result::Result<(), PostError> {
        self.sender.post(Command::DeleteCookie {
            url: url.into(),
            name: name.into(),
        })
    }

    /// Delete all cookies in the profile
    pub fn delete_all_cookies(&self) -> std::result::Result<(), PostError> {
        self.sender.post(Command::DeleteAllCookies)
    }

    /// Supply basic-auth credentials
    pub fn set_basic_auth<U: Into<String>, P: Into<String>>(
        &self,
        username: U,
        password: P,
    ) -> std::result::Result<(), PostError> {
        self.sender.post(Command::SetBasicAuth {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Clear the HTTP cache
    pub fn clear_cache(&self, include_disk: bool) -> std::result::Result<(), PostError> {
        self.sender.post(Command::ClearCache { include_disk })
    }

    /// Enable or disable input forwarding
    pub fn set_interaction_enabled(&self, enabled: bool) {
        self.shared
            .interaction_enabled
            .store(enabled, Ordering::Release);
    }

    /// Suspend the view
    pub fn pause(&self) -> std::result::Result<(), PostError> {
        self.sender.post(Command::Pause)
    }

    /// Resume the view
    pub fn resume(&self) -> std::result::Result<(), PostError> {
        self.sender.post(Command::Resume)
    }

    /// Tear the instance down.
    ///
    /// Posts the destroy command and waits for the execution thread with a
    /// bounded window; if the thread does not exit, a secondary wake is
    /// posted, and failing that the thread is detached rather than blocking
    /// the caller indefinitely.
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn destroy(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        registry::remove(self.id);

        let _ = self.sender.post(Command::Destroy);

        let exit_rx = self.exit_rx.lock().take();
        let exited = match exit_rx {
            Some(rx) => match rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("execution thread slow to exit; posting wake signal");
                    self.sender.wake();
                    matches!(
                        rx.recv_timeout(DETACH_TIMEOUT),
                        Ok(()) | Err(RecvTimeoutError::Disconnected)
                    )
                }
            },
            None => true,
        };

        if exited {
            let _ = handle.join();
            info!("instance destroyed");
        } else {
            // Liveness over safety: never block the caller on a wedged
            // engine call.
            warn!("execution thread unresponsive; detaching");
            drop(handle);
        }
    }
}

impl Drop for WebView {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for WebView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebView")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
