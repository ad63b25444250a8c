//! Execution-thread runtime
//!
//! One dedicated thread per instance services a single merged queue of host
//! commands and engine completions. Every engine call happens here; the
//! engine's threading contract requires its calls to originate from one
//! consistent thread.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{self, CaptureMode};
use crate::command::{Command, ThreadMessage};
use crate::config::InstanceConfig;
use crate::engine::{
    BrowserControl, CaptureSession, Completion, CompositionController, Compositor, Controller,
    Cookie, Environment, HostWindow, WebEngine, WindowId, WindowOptions,
};
use crate::error::EngineResult;
use crate::input::{self, KeyEvent, PointerEvent};
use crate::instance::init::{self, InitState};
use crate::instance::SharedState;
use crate::outbox::EventTag;

/// Engine completions and events delivered to the merged queue
pub(crate) enum EngineEvent {
    /// Environment request finished
    EnvironmentReady(EngineResult<Box<dyn Environment>>),
    /// Composition controller request finished
    CompositionControllerReady(EngineResult<Box<dyn CompositionController>>),
    /// Regular controller request finished
    ControllerReady(EngineResult<Box<dyn Controller>>),
    /// Snapshot capture finished
    SnapshotReady(EngineResult<Vec<u8>>),
    /// Cookie query finished
    CookiesReady(EngineResult<Vec<Cookie>>),
}

impl std::fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineEvent::EnvironmentReady(_) => "EnvironmentReady",
            EngineEvent::CompositionControllerReady(_) => "CompositionControllerReady",
            EngineEvent::ControllerReady(_) => "ControllerReady",
            EngineEvent::SnapshotReady(_) => "SnapshotReady",
            EngineEvent::CookiesReady(_) => "CookiesReady",
        };
        f.write_str(name)
    }
}

/// Build a completion that posts its result back to the merged queue
pub(crate) fn completion<T, F>(tx: &Sender<ThreadMessage>, map: F) -> Completion<T>
where
    T: Send + 'static,
    F: FnOnce(EngineResult<T>) -> EngineEvent + Send + 'static,
{
    let tx = tx.clone();
    Completion::new(move |result| {
        let _ = tx.send(ThreadMessage::Engine(map(result)));
    })
}

/// The controller variant that won initialization
pub(crate) enum ActiveController {
    /// Compositor-routed variant
    Composition(Box<dyn CompositionController>),
    /// Window-routed variant
    Regular(Box<dyn Controller>),
}

impl ActiveController {
    pub(crate) fn set_bounds(&mut self, width: u32, height: u32) -> EngineResult<()> {
        match self {
            ActiveController::Composition(c) => c.set_bounds(width, height),
            ActiveController::Regular(c) => c.set_bounds(width, height),
        }
    }

    pub(crate) fn set_visible(&mut self, visible: bool) -> EngineResult<()> {
        match self {
            ActiveController::Composition(c) => c.set_visible(visible),
            ActiveController::Regular(c) => c.set_visible(visible),
        }
    }

    pub(crate) fn browser_control(&mut self) -> EngineResult<Box<dyn BrowserControl>> {
        match self {
            ActiveController::Composition(c) => c.browser_control(),
            ActiveController::Regular(c) => c.browser_control(),
        }
    }

    pub(crate) fn close(&mut self) {
        match self {
            ActiveController::Composition(c) => c.close(),
            ActiveController::Regular(c) => c.close(),
        }
    }

    pub(crate) fn is_composition(&self) -> bool {
        matches!(self, ActiveController::Composition(_))
    }
}

/// A navigation requested before initialization completed
pub(crate) enum PendingLoad {
    /// Pending URL navigation
    Url(String),
    /// Pending HTML document load
    Html(String),
}

pub(crate) struct Runtime {
    pub id: Uuid,
    pub config: InstanceConfig,
    pub engine: Box<dyn WebEngine>,
    pub tx: Sender<ThreadMessage>,
    pub shared: Arc<SharedState>,
    pub window: Option<Box<dyn HostWindow>>,
    pub environment: Option<Box<dyn Environment>>,
    pub compositor: Option<Box<dyn Compositor>>,
    pub controller: Option<ActiveController>,
    pub control: Option<Box<dyn BrowserControl>>,
    pub session: Option<Box<dyn CaptureSession>>,
    pub init: InitState,
    pub pending_load: Option<PendingLoad>,
    pub capture_mode: CaptureMode,
    child_window: Option<WindowId>,
}

/// Execution thread entry point
pub(crate) fn run(
    id: Uuid,
    config: InstanceConfig,
    engine: Box<dyn WebEngine>,
    tx: Sender<ThreadMessage>,
    rx: Receiver<ThreadMessage>,
    shared: Arc<SharedState>,
    ready_tx: Sender<()>,
) {
    let mut rt = Runtime {
        id,
        config,
        engine,
        tx,
        shared,
        window: None,
        environment: None,
        compositor: None,
        controller: None,
        control: None,
        session: None,
        init: InitState::Created,
        pending_load: None,
        capture_mode: CaptureMode::Disabled,
        child_window: None,
    };

    let options = WindowOptions {
        width: rt.config.width,
        height: rt.config.height,
        separated: rt.config.separated,
        transparent: rt.config.transparent,
    };
    match rt.engine.create_window(&options) {
        Ok(mut window) => {
            if rt.config.separated {
                if let Err(err) = window.set_visible(true) {
                    warn!(%err, "failed to show separated window");
                }
            }
            rt.window = Some(window);
            rt.init = InitState::WindowCreated;
        }
        Err(err) => {
            warn!(%err, "window creation failed; instance will not function");
            let _ = ready_tx.send(());
            return;
        }
    }

    // Readiness is signaled before the engine handshake so construction
    // never blocks on slow engine startup.
    let _ = ready_tx.send(());

    init::begin(&mut rt);

    while let Ok(message) = rx.recv() {
        match message {
            ThreadMessage::Command(Command::Destroy) => {
                debug!("destroy received");
                break;
            }
            ThreadMessage::Command(command) => rt.handle_command(command),
            ThreadMessage::Engine(event) => rt.handle_engine_event(event),
            ThreadMessage::Wake => {}
        }
    }

    rt.teardown();
}

impl Runtime {
    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Navigate(url) => self.navigate(url),
            Command::LoadHtml(html) => self.load_html(html),
            Command::EvaluateScript(js) => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.evaluate_script(&js) {
                        warn!(%err, "script evaluation failed");
                    }
                } else {
                    debug!("dropping script before initialization");
                }
            }
            Command::GoBack => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.go_back() {
                        warn!(%err, "go_back failed");
                    }
                }
            }
            Command::GoForward => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.go_forward() {
                        warn!(%err, "go_forward failed");
                    }
                }
            }
            Command::Reload => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.reload() {
                        warn!(%err, "reload failed");
                    }
                }
            }
            Command::SetBounds { width, height } => self.set_bounds(width, height),
            Command::SetVisible(visible) => self.set_visible(visible),
            Command::CaptureFrame {
                force_refresh,
                pixel_density,
            } => self.request_capture(force_refresh, pixel_density),
            Command::Pointer(event) => self.forward_pointer(event),
            Command::Key(event) => self.forward_key(event),
            Command::ResizeNotify { width, height } => {
                if self.capture_mode == CaptureMode::Continuous {
                    self.shared.resize.set(width, height);
                }
            }
            Command::ClearCache { include_disk } => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.clear_cache(include_disk) {
                        warn!(%err, "cache clear failed");
                    }
                }
            }
            Command::Pause => self.set_suspended(true),
            Command::Resume => self.set_suspended(false),
            Command::GetCookies { url } => self.request_cookies(url),
            Command::DeleteCookie { url, name } => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.delete_cookie(&url, &name) {
                        warn!(%err, "cookie delete failed");
                    }
                }
            }
            Command::DeleteAllCookies => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.delete_all_cookies() {
                        warn!(%err, "cookie clear failed");
                    }
                }
            }
            Command::SetBasicAuth { username, password } => {
                if let Some(control) = &mut self.control {
                    if let Err(err) = control.set_basic_auth(&username, &password) {
                        warn!(%err, "basic auth update failed");
                    }
                }
            }
            // Handled by the pump before dispatch.
            Command::Destroy => {}
        }
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::EnvironmentReady(result) => init::on_environment_ready(self, result),
            EngineEvent::CompositionControllerReady(result) => {
                init::on_composition_controller_ready(self, result)
            }
            EngineEvent::ControllerReady(result) => init::on_controller_ready(self, result),
            EngineEvent::SnapshotReady(result) => self.finish_snapshot(result),
            EngineEvent::CookiesReady(result) => self.finish_cookies(result),
        }
    }

    pub(crate) fn navigate(&mut self, url: String) {
        if self.control.is_none() {
            debug!(%url, "buffering navigation until initialized");
            self.pending_load = Some(PendingLoad::Url(url));
            return;
        }
        let headers = self.shared.headers.lock().clone();
        if let Some(control) = &mut self.control {
            if let Err(err) = control.navigate(&url, &headers) {
                warn!(%err, %url, "navigation failed");
            }
        }
    }

    pub(crate) fn load_html(&mut self, html: String) {
        if self.control.is_none() {
            debug!("buffering HTML load until initialized");
            self.pending_load = Some(PendingLoad::Html(html));
            return;
        }
        if let Some(control) = &mut self.control {
            if let Err(err) = control.load_html(&html) {
                warn!(%err, "HTML load failed");
            }
        }
    }

    fn set_bounds(&mut self, width: u32, height: u32) {
        *self.shared.bounds.lock() = (width, height);
        if let Some(window) = &mut self.window {
            if let Err(err) = window.set_size(width, height) {
                warn!(%err, "window resize failed");
            }
        }
        if let Some(controller) = &mut self.controller {
            if let Err(err) = controller.set_bounds(width, height) {
                warn!(%err, "controller resize failed");
            }
        }
        if self.capture_mode == CaptureMode::Continuous {
            self.shared.resize.set(width, height);
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if let Some(controller) = &mut self.controller {
            if let Err(err) = controller.set_visible(visible) {
                warn!(%err, "visibility change failed");
            }
        }
        if self.config.separated {
            if let Some(window) = &mut self.window {
                let _ = window.set_visible(visible);
            }
        }
    }

    fn set_suspended(&mut self, suspended: bool) {
        if let Some(control) = &mut self.control {
            if let Err(err) = control.set_suspended(suspended) {
                warn!(%err, suspended, "suspend state change failed");
            }
        }
    }

    fn request_capture(&mut self, force_refresh: bool, pixel_density: f32) {
        *self.shared.pixel_density.lock() = pixel_density;
        if self.capture_mode != CaptureMode::Snapshot || !force_refresh {
            return;
        }
        if self.control.is_none() {
            return;
        }
        // Coalesce: only one snapshot in flight at a time.
        if self
            .shared
            .capture_in_flight
            .swap(true, std::sync::atomic::Ordering::AcqRel)
        {
            return;
        }
        let done = completion(&self.tx, EngineEvent::SnapshotReady);
        if let Some(control) = &mut self.control {
            control.capture_snapshot(done);
        }
    }

    fn finish_snapshot(&mut self, result: EngineResult<Vec<u8>>) {
        match result {
            Ok(bytes) => {
                if let Err(err) = capture::publish_snapshot(&self.shared.frames, &bytes) {
                    // Transient: drop the frame, no event.
                    warn!(%err, "snapshot dropped");
                }
            }
            Err(err) => warn!(%err, "snapshot request failed"),
        }
        self.shared
            .capture_in_flight
            .store(false, std::sync::atomic::Ordering::Release);
    }

    fn request_cookies(&mut self, url: String) {
        if self.control.is_none() {
            debug!(%url, "dropping cookie query before initialization");
            return;
        }
        let done = completion(&self.tx, EngineEvent::CookiesReady);
        if let Some(control) = &mut self.control {
            control.get_cookies(&url, done);
        }
    }

    fn finish_cookies(&mut self, result: EngineResult<Vec<Cookie>>) {
        let cookies = match result {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(%err, "cookie query failed");
                Vec::new()
            }
        };
        match serde_json::to_string(&cookies) {
            Ok(json) => self.shared.outbox.push(EventTag::Cookies, &json),
            Err(err) => warn!(%err, "cookie serialization failed"),
        }
    }

    fn resolve_child_window(&mut self) -> Option<WindowId> {
        if self.child_window.is_none() {
            let window = self.window.as_ref()?;
            self.child_window = Some(window.innermost_child().unwrap_or_else(|| window.id()));
        }
        self.child_window
    }

    fn forward_pointer(&mut self, event: PointerEvent) {
        if !self
            .shared
            .interaction_enabled
            .load(std::sync::atomic::Ordering::Acquire)
        {
            return;
        }

        if let Some(ActiveController::Composition(comp)) = &mut self.controller {
            let density = *self.shared.pixel_density.lock();
            let input = input::compositor_pointer(&event, density);
            if let Err(err) = comp.send_pointer_input(input) {
                warn!(%err, "pointer delivery failed");
            }
            return;
        }

        // Window-routed delivery. Wheel rotation is unreliable as a native
        // message here, so it becomes an in-page scroll instead.
        if event.wheel_delta != 0.0 {
            let script = input::wheel_scroll_script(event.wheel_delta);
            if let Some(control) = &mut self.control {
                if let Err(err) = control.evaluate_script(&script) {
                    warn!(%err, "scroll script failed");
                }
            }
            return;
        }

        let (_, height) = *self.shared.bounds.lock();
        let messages = input::window_pointer_messages(&event, height);
        let Some(target) = self.resolve_child_window() else {
            return;
        };
        if let Some(window) = &self.window {
            for message in messages {
                if let Err(err) = window.post_input(target, message) {
                    warn!(%err, "pointer message post failed");
                    break;
                }
            }
        }
    }

    fn forward_key(&mut self, event: KeyEvent) {
        if !self
            .shared
            .interaction_enabled
            .load(std::sync::atomic::Ordering::Acquire)
        {
            return;
        }
        let messages = input::key_messages(&event);
        if messages.is_empty() {
            return;
        }
        let Some(target) = self.resolve_child_window() else {
            return;
        };
        if let Some(window) = &self.window {
            for message in messages {
                if let Err(err) = window.post_input(target, message) {
                    warn!(%err, "key message post failed");
                    break;
                }
            }
        }
    }

    /// Release engine objects in the order the engine requires:
    /// capture session, compositor, controller, browser control,
    /// environment, then the window.
    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.compositor = None;
        if let Some(mut controller) = self.controller.take() {
            controller.close();
        }
        self.control = None;
        self.environment = None;
        self.window = None;
        info!(id = %self.id, "execution thread exiting");
    }
}
