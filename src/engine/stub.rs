//! Scripted in-process engine backend
//!
//! A deterministic stand-in for the real browser runtime: navigations
//! resolve immediately through the bound event handler, snapshots produce
//! synthetic PNG streams, and the continuous-capture path is driven by
//! pushing frames from the caller's thread. Failure knobs let the test
//! suite script every branch of the initialization fallback chain.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

use super::interface::{
    BrowserControl, CaptureSession, Completion, CompositionController, Compositor,
    ControlEventHandler, ControlSettings, Controller, Cookie, Environment, EnvironmentOptions,
    FrameDisposition, FramePayload, FrameSink, HostWindow, NavigationDecision, PointerInput,
    VisualHandle, WebEngine, WindowId, WindowMessage, WindowOptions,
};

#[derive(Default)]
struct Knobs {
    refuse_environment: AtomicBool,
    fail_environment: AtomicBool,
    refuse_composition: AtomicBool,
    fail_composition_async: AtomicBool,
    fail_compositor: AtomicBool,
    fail_regular_controller: AtomicBool,
    fail_browser_control: AtomicBool,
    continuous_supported: AtomicBool,
    defer_snapshots: AtomicBool,
    defer_environment: AtomicBool,
}

struct ActiveCapture {
    sink: Arc<dyn FrameSink>,
    width: u32,
    height: u32,
}

struct Shared {
    knobs: Knobs,
    next_window: AtomicU64,
    log: Mutex<Vec<String>>,
    handler: Mutex<Option<Box<dyn ControlEventHandler>>>,
    history: Mutex<(Vec<String>, usize)>,
    navigations: Mutex<Vec<(String, HashMap<String, String>)>>,
    html_loads: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    startup_scripts: Mutex<Vec<String>>,
    settings: Mutex<Option<ControlSettings>>,
    fail_next_navigation: Mutex<Option<i32>>,
    snapshot_size: Mutex<(u32, u32)>,
    pending_snapshots: Mutex<Vec<Completion<Vec<u8>>>>,
    pending_environment: Mutex<Option<Completion<Box<dyn Environment>>>>,
    cookies: Mutex<Vec<Cookie>>,
    capture: Mutex<Option<ActiveCapture>>,
    posted_inputs: Mutex<Vec<(WindowId, WindowMessage)>>,
    pointer_inputs: Mutex<Vec<PointerInput>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            knobs: Knobs::default(),
            next_window: AtomicU64::new(1),
            log: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            history: Mutex::new((Vec::new(), 0)),
            navigations: Mutex::new(Vec::new()),
            html_loads: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            startup_scripts: Mutex::new(Vec::new()),
            settings: Mutex::new(None),
            fail_next_navigation: Mutex::new(None),
            snapshot_size: Mutex::new((4, 4)),
            pending_snapshots: Mutex::new(Vec::new()),
            pending_environment: Mutex::new(None),
            cookies: Mutex::new(Vec::new()),
            capture: Mutex::new(None),
            posted_inputs: Mutex::new(Vec::new()),
            pointer_inputs: Mutex::new(Vec::new()),
        }
    }

    fn log(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }

    fn with_handler(&self, f: impl FnOnce(&dyn ControlEventHandler)) {
        let handler = self.handler.lock();
        if let Some(handler) = handler.as_ref() {
            f(handler.as_ref());
        }
    }

    fn navigation_decision(&self, url: &str) -> NavigationDecision {
        let handler = self.handler.lock();
        match handler.as_ref() {
            Some(handler) => handler.navigation_starting(url),
            None => NavigationDecision::Allow,
        }
    }

    fn complete_navigation(&self, url: &str) {
        let failure = self.fail_next_navigation.lock().take();
        match failure {
            Some(status) => {
                self.with_handler(|h| h.navigation_completed(url, false, status));
            }
            None => {
                let (can_go_back, can_go_forward) = {
                    let mut history = self.history.lock();
                    // Navigating truncates any forward entries.
                    let pos = history.1;
                    history.0.truncate(pos + 1);
                    history.0.push(url.to_string());
                    history.1 = history.0.len() - 1;
                    (history.1 > 0, false)
                };
                self.with_handler(|h| {
                    h.http_response_received(url, 200);
                    h.navigation_completed(url, true, 0);
                    h.history_changed(can_go_back, can_go_forward);
                });
            }
        }
    }

    fn synthetic_png(&self) -> Vec<u8> {
        let (width, height) = *self.snapshot_size.lock();
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]));
        let mut bytes = Cursor::new(Vec::new());
        // Encoding a known-good RGBA image into PNG cannot fail.
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap_or_else(|_| debug!("synthetic snapshot encode failed"));
        bytes.into_inner()
    }
}

/// Test/control handle observing and scripting a [`StubEngine`]
#[derive(Clone)]
pub struct StubHandle {
    shared: Arc<Shared>,
}

impl StubHandle {
    /// Refuse the environment request synchronously (runtime not found)
    pub fn refuse_environment(&self) {
        self.shared.knobs.refuse_environment.store(true, Ordering::Release);
    }

    /// Fail the environment request asynchronously
    pub fn fail_environment(&self) {
        self.shared.knobs.fail_environment.store(true, Ordering::Release);
    }

    /// Refuse composition controller requests synchronously
    pub fn refuse_composition(&self) {
        self.shared.knobs.refuse_composition.store(true, Ordering::Release);
    }

    /// Fail composition controller requests asynchronously
    pub fn fail_composition_async(&self) {
        self.shared
            .knobs
            .fail_composition_async
            .store(true, Ordering::Release);
    }

    /// Fail compositor target creation
    pub fn fail_compositor(&self) {
        self.shared.knobs.fail_compositor.store(true, Ordering::Release);
    }

    /// Fail regular controller requests asynchronously
    pub fn fail_regular_controller(&self) {
        self.shared
            .knobs
            .fail_regular_controller
            .store(true, Ordering::Release);
    }

    /// Fail browser control acquisition
    pub fn fail_browser_control(&self) {
        self.shared
            .knobs
            .fail_browser_control
            .store(true, Ordering::Release);
    }

    /// Advertise (or revoke) continuous-capture support
    pub fn set_continuous_supported(&self, supported: bool) {
        self.shared
            .knobs
            .continuous_supported
            .store(supported, Ordering::Release);
    }

    /// Hold the environment completion until
    /// [`release_environment`](Self::release_environment)
    pub fn defer_environment(&self) {
        self.shared.knobs.defer_environment.store(true, Ordering::Release);
    }

    /// Complete a held environment request
    pub fn release_environment(&self) {
        if let Some(done) = self.shared.pending_environment.lock().take() {
            done.complete(Ok(Box::new(StubEnvironment {
                shared: self.shared.clone(),
            })));
        }
    }

    /// Hold snapshot completions until [`release_snapshots`](Self::release_snapshots)
    pub fn defer_snapshots(&self, defer: bool) {
        self.shared.knobs.defer_snapshots.store(defer, Ordering::Release);
    }

    /// Number of snapshot requests currently held
    pub fn pending_snapshot_count(&self) -> usize {
        self.shared.pending_snapshots.lock().len()
    }

    /// Complete all held snapshot requests
    pub fn release_snapshots(&self) {
        let pending: Vec<_> = self.shared.pending_snapshots.lock().drain(..).collect();
        for done in pending {
            done.complete(Ok(self.shared.synthetic_png()));
        }
    }

    /// Set the synthetic snapshot dimensions
    pub fn set_snapshot_size(&self, width: u32, height: u32) {
        *self.shared.snapshot_size.lock() = (width, height);
    }

    /// Fail the next allowed navigation with the given error status
    pub fn fail_next_navigation(&self, status: i32) {
        *self.shared.fail_next_navigation.lock() = Some(status);
    }

    /// Seed the cookie jar
    pub fn set_cookies(&self, cookies: Vec<Cookie>) {
        *self.shared.cookies.lock() = cookies;
    }

    /// URLs of navigations that reached the engine
    pub fn navigations(&self) -> Vec<String> {
        self.shared
            .navigations
            .lock()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Headers sent with the most recent navigation
    pub fn last_navigation_headers(&self) -> Option<HashMap<String, String>> {
        self.shared
            .navigations
            .lock()
            .last()
            .map(|(_, headers)| headers.clone())
    }

    /// HTML documents loaded
    pub fn html_loads(&self) -> Vec<String> {
        self.shared.html_loads.lock().clone()
    }

    /// Scripts evaluated in the page
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.shared.scripts.lock().clone()
    }

    /// Scripts registered to run at document creation
    pub fn startup_scripts(&self) -> Vec<String> {
        self.shared.startup_scripts.lock().clone()
    }

    /// Settings last applied to the control
    pub fn applied_settings(&self) -> Option<ControlSettings> {
        self.shared.settings.lock().clone()
    }

    /// Coarse event log
    pub fn log(&self) -> Vec<String> {
        self.shared.log.lock().clone()
    }

    /// Whether the event log contains an entry
    pub fn log_contains(&self, entry: &str) -> bool {
        self.shared.log.lock().iter().any(|e| e == entry)
    }

    /// Whether a capture session is active
    pub fn capture_active(&self) -> bool {
        self.shared.capture.lock().is_some()
    }

    /// Size of the active capture session
    pub fn capture_size(&self) -> Option<(u32, u32)> {
        self.shared.capture.lock().as_ref().map(|c| (c.width, c.height))
    }

    /// Deliver one solid-color BGRA frame at the session size.
    ///
    /// Plays the capture-session thread: call from any thread. A
    /// [`FrameDisposition::Recreate`] response resizes the session in place
    /// without delivering pixel data, as the real session would.
    pub fn push_frame(&self, b: u8, g: u8, r: u8, a: u8) -> Option<FrameDisposition> {
        let (sink, width, height) = {
            let capture = self.shared.capture.lock();
            let active = capture.as_ref()?;
            (active.sink.clone(), active.width, active.height)
        };
        let stride = width as usize * 4;
        let mut data = vec![0u8; stride * height as usize];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&[b, g, r, a]);
        }
        let disposition = sink.on_frame(&FramePayload {
            width,
            height,
            stride,
            data: &data,
        });
        if let FrameDisposition::Recreate { width, height } = disposition {
            let mut capture = self.shared.capture.lock();
            if let Some(active) = capture.as_mut() {
                active.width = width;
                active.height = height;
            }
            self.shared.log(format!("capture_recreated {}x{}", width, height));
        }
        Some(disposition)
    }

    /// Inputs posted to windows, in order
    pub fn posted_inputs(&self) -> Vec<(WindowId, WindowMessage)> {
        self.shared.posted_inputs.lock().clone()
    }

    /// Pointer inputs delivered through the composition controller
    pub fn pointer_inputs(&self) -> Vec<PointerInput> {
        self.shared.pointer_inputs.lock().clone()
    }

    /// Fire a web message through the bound event handler
    pub fn emit_web_message(&self, message: &str) {
        self.shared.with_handler(|h| h.web_message_received(message));
    }

    /// Fire a document HTTP response through the bound event handler
    pub fn emit_http_response(&self, url: &str, status: u16) {
        self.shared.with_handler(|h| h.http_response_received(url, status));
    }
}

/// Deterministic in-process engine backend
pub struct StubEngine {
    shared: Arc<Shared>,
}

impl StubEngine {
    /// Create an engine and its control handle
    pub fn new() -> (Box<dyn WebEngine>, StubHandle) {
        let shared = Arc::new(Shared::new());
        let handle = StubHandle {
            shared: shared.clone(),
        };
        (Box::new(Self { shared }), handle)
    }
}

impl WebEngine for StubEngine {
    fn create_window(&mut self, options: &WindowOptions) -> EngineResult<Box<dyn HostWindow>> {
        let id = self.shared.next_window.fetch_add(1, Ordering::AcqRel);
        self.shared.log(format!(
            "window_created {}x{}{}",
            options.width,
            options.height,
            if options.separated { " separated" } else { "" }
        ));
        Ok(Box::new(StubWindow {
            id: WindowId(id),
            shared: self.shared.clone(),
        }))
    }

    fn create_environment(
        &mut self,
        _options: &EnvironmentOptions,
        done: Completion<Box<dyn Environment>>,
    ) -> EngineResult<()> {
        if self.shared.knobs.refuse_environment.load(Ordering::Acquire) {
            return Err(EngineError::EnvironmentFailed("runtime not installed".to_string()));
        }
        self.shared.log("environment_requested");
        if self.shared.knobs.fail_environment.load(Ordering::Acquire) {
            done.complete(Err(EngineError::EnvironmentFailed(
                "environment creation failed".to_string(),
            )));
        } else if self.shared.knobs.defer_environment.load(Ordering::Acquire) {
            *self.shared.pending_environment.lock() = Some(done);
        } else {
            done.complete(Ok(Box::new(StubEnvironment {
                shared: self.shared.clone(),
            })));
        }
        Ok(())
    }

    fn create_compositor(&mut self, _window: WindowId) -> EngineResult<Box<dyn Compositor>> {
        if self.shared.knobs.fail_compositor.load(Ordering::Acquire) {
            return Err(EngineError::CompositorFailed("no compositor".to_string()));
        }
        self.shared.log("compositor_created");
        Ok(Box::new(StubCompositor {
            shared: self.shared.clone(),
        }))
    }

    fn supports_continuous_capture(&self) -> bool {
        self.shared.knobs.continuous_supported.load(Ordering::Acquire)
    }
}

struct StubEnvironment {
    shared: Arc<Shared>,
}

impl Environment for StubEnvironment {
    fn create_controller(&mut self, _window: WindowId, done: Completion<Box<dyn Controller>>) {
        self.shared.log("regular_controller_requested");
        if self
            .shared
            .knobs
            .fail_regular_controller
            .load(Ordering::Acquire)
        {
            done.complete(Err(EngineError::ControllerFailed(
                "controller creation failed".to_string(),
            )));
        } else {
            done.complete(Ok(Box::new(StubController::new(
                self.shared.clone(),
                "regular",
            ))));
        }
    }

    fn create_composition_controller(
        &mut self,
        _window: WindowId,
        done: Completion<Box<dyn CompositionController>>,
    ) -> EngineResult<()> {
        if self.shared.knobs.refuse_composition.load(Ordering::Acquire) {
            return Err(EngineError::Unsupported(
                "composition controller unavailable".to_string(),
            ));
        }
        self.shared.log("composition_controller_requested");
        if self
            .shared
            .knobs
            .fail_composition_async
            .load(Ordering::Acquire)
        {
            done.complete(Err(EngineError::ControllerFailed(
                "composition controller creation failed".to_string(),
            )));
        } else {
            done.complete(Ok(Box::new(StubCompositionController {
                inner: StubController::new(self.shared.clone(), "composition"),
            })));
        }
        Ok(())
    }
}

struct StubController {
    shared: Arc<Shared>,
    label: &'static str,
}

impl StubController {
    fn new(shared: Arc<Shared>, label: &'static str) -> Self {
        Self { shared, label }
    }
}

impl Controller for StubController {
    fn set_bounds(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.shared
            .log(format!("{}_controller_bounds {}x{}", self.label, width, height));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> EngineResult<()> {
        self.shared
            .log(format!("{}_controller_visible {}", self.label, visible));
        Ok(())
    }

    fn browser_control(&mut self) -> EngineResult<Box<dyn BrowserControl>> {
        if self
            .shared
            .knobs
            .fail_browser_control
            .load(Ordering::Acquire)
        {
            return Err(EngineError::ControlUnavailable(
                "control acquisition failed".to_string(),
            ));
        }
        self.shared.log("browser_control_acquired");
        Ok(Box::new(StubControl {
            shared: self.shared.clone(),
        }))
    }

    fn close(&mut self) {
        self.shared.log(format!("{}_controller_closed", self.label));
    }
}

struct StubCompositionController {
    inner: StubController,
}

impl Controller for StubCompositionController {
    fn set_bounds(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.inner.set_bounds(width, height)
    }

    fn set_visible(&mut self, visible: bool) -> EngineResult<()> {
        self.inner.set_visible(visible)
    }

    fn browser_control(&mut self) -> EngineResult<Box<dyn BrowserControl>> {
        self.inner.browser_control()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

impl CompositionController for StubCompositionController {
    fn root_visual(&mut self) -> EngineResult<VisualHandle> {
        Ok(VisualHandle(7))
    }

    fn send_pointer_input(&mut self, input: PointerInput) -> EngineResult<()> {
        self.inner.shared.pointer_inputs.lock().push(input);
        Ok(())
    }

    fn start_capture(
        &mut self,
        width: u32,
        height: u32,
        sink: Arc<dyn FrameSink>,
    ) -> EngineResult<Box<dyn CaptureSession>> {
        let shared = &self.inner.shared;
        shared.log(format!("capture_started {}x{}", width, height));
        *shared.capture.lock() = Some(ActiveCapture {
            sink,
            width,
            height,
        });
        Ok(Box::new(StubSession {
            shared: shared.clone(),
        }))
    }
}

struct StubSession {
    shared: Arc<Shared>,
}

impl CaptureSession for StubSession {
    fn stop(&mut self) {
        self.shared.log("capture_stopped");
        *self.shared.capture.lock() = None;
    }
}

struct StubCompositor {
    shared: Arc<Shared>,
}

impl Compositor for StubCompositor {
    fn attach_visual(&mut self, _visual: VisualHandle) -> EngineResult<()> {
        self.shared.log("visual_attached");
        Ok(())
    }
}

struct StubWindow {
    id: WindowId,
    shared: Arc<Shared>,
}

impl HostWindow for StubWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn set_size(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.shared.log(format!("window_resized {}x{}", width, height));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> EngineResult<()> {
        self.shared.log(format!("window_visible {}", visible));
        Ok(())
    }

    fn innermost_child(&self) -> Option<WindowId> {
        Some(WindowId(self.id.0 + 1000))
    }

    fn post_input(&self, target: WindowId, message: WindowMessage) -> EngineResult<()> {
        self.shared.posted_inputs.lock().push((target, message));
        Ok(())
    }
}

struct StubControl {
    shared: Arc<Shared>,
}

impl BrowserControl for StubControl {
    fn navigate(&mut self, url: &str, headers: &HashMap<String, String>) -> EngineResult<()> {
        if self.shared.navigation_decision(url) == NavigationDecision::Cancel {
            return Ok(());
        }
        self.shared
            .navigations
            .lock()
            .push((url.to_string(), headers.clone()));
        self.shared.complete_navigation(url);
        Ok(())
    }

    fn load_html(&mut self, html: &str) -> EngineResult<()> {
        if self.shared.navigation_decision("about:blank") == NavigationDecision::Cancel {
            return Ok(());
        }
        self.shared.html_loads.lock().push(html.to_string());
        self.shared.complete_navigation("about:blank");
        Ok(())
    }

    fn evaluate_script(&mut self, script: &str) -> EngineResult<()> {
        self.shared.scripts.lock().push(script.to_string());
        Ok(())
    }

    fn add_startup_script(&mut self, script: &str) -> EngineResult<()> {
        self.shared.startup_scripts.lock().push(script.to_string());
        Ok(())
    }

    fn go_back(&mut self) -> EngineResult<()> {
        let target = {
            let mut history = self.shared.history.lock();
            if history.1 == 0 {
                return Ok(());
            }
            history.1 -= 1;
            history.0[history.1].clone()
        };
        let (can_go_back, can_go_forward) = {
            let history = self.shared.history.lock();
            (history.1 > 0, history.1 + 1 < history.0.len())
        };
        self.shared.with_handler(|h| {
            h.navigation_completed(&target, true, 0);
            h.history_changed(can_go_back, can_go_forward);
        });
        Ok(())
    }

    fn go_forward(&mut self) -> EngineResult<()> {
        let target = {
            let mut history = self.shared.history.lock();
            if history.1 + 1 >= history.0.len() {
                return Ok(());
            }
            history.1 += 1;
            history.0[history.1].clone()
        };
        let (can_go_back, can_go_forward) = {
            let history = self.shared.history.lock();
            (history.1 > 0, history.1 + 1 < history.0.len())
        };
        self.shared.with_handler(|h| {
            h.navigation_completed(&target, true, 0);
            h.history_changed(can_go_back, can_go_forward);
        });
        Ok(())
    }

    fn reload(&mut self) -> EngineResult<()> {
        let current = {
            let history = self.shared.history.lock();
            history.0.get(history.1).cloned()
        };
        if let Some(url) = current {
            self.shared.with_handler(|h| h.navigation_completed(&url, true, 0));
        }
        Ok(())
    }

    fn apply_settings(&mut self, settings: &ControlSettings) -> EngineResult<()> {
        *self.shared.settings.lock() = Some(settings.clone());
        Ok(())
    }

    fn set_event_handler(&mut self, handler: Box<dyn ControlEventHandler>) {
        *self.shared.handler.lock() = Some(handler);
    }

    fn capture_snapshot(&mut self, done: Completion<Vec<u8>>) {
        if self.shared.knobs.defer_snapshots.load(Ordering::Acquire) {
            self.shared.pending_snapshots.lock().push(done);
        } else {
            done.complete(Ok(self.shared.synthetic_png()));
        }
    }

    fn get_cookies(&mut self, _url: &str, done: Completion<Vec<Cookie>>) {
        done.complete(Ok(self.shared.cookies.lock().clone()));
    }

    fn delete_cookie(&mut self, url: &str, name: &str) -> EngineResult<()> {
        self.shared
            .cookies
            .lock()
            .retain(|cookie| cookie.name != name);
        self.shared.log(format!("cookie_deleted {} {}", url, name));
        Ok(())
    }

    fn delete_all_cookies(&mut self) -> EngineResult<()> {
        self.shared.cookies.lock().clear();
        self.shared.log("cookies_cleared");
        Ok(())
    }

    fn clear_cache(&mut self, include_disk: bool) -> EngineResult<()> {
        self.shared.log(format!("cache_cleared disk={}", include_disk));
        Ok(())
    }

    fn set_basic_auth(&mut self, username: &str, _password: &str) -> EngineResult<()> {
        self.shared.log(format!("basic_auth_set {}", username));
        Ok(())
    }

    fn set_suspended(&mut self, suspended: bool) -> EngineResult<()> {
        self.shared.log(format!("suspended {}", suspended));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_snapshot_decodes() {
        let shared = Shared::new();
        *shared.snapshot_size.lock() = (3, 2);
        let png = shared.synthetic_png();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
    }

    #[test]
    fn test_windows_get_distinct_ids() {
        let (mut engine, _handle) = StubEngine::new();
        let options = WindowOptions {
            width: 100,
            height: 100,
            separated: false,
            transparent: false,
        };
        let a = engine.create_window(&options).unwrap();
        let b = engine.create_window(&options).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_navigation_without_handler_is_recorded() {
        let shared = Arc::new(Shared::new());
        let mut control = StubControl {
            shared: shared.clone(),
        };
        control
            .navigate("https://example.com", &HashMap::new())
            .unwrap();
        assert_eq!(shared.navigations.lock().len(), 1);
    }
}
