//! Handle-based host facade
//!
//! Thin wrappers over the instance registry mirroring the flat operation
//! surface a host application's marshaling layer binds to: an opaque handle
//! per view and start-only operations against it. Hosts that can hold a
//! `WebView` directly should prefer [`crate::WebView`]'s own methods.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::config::InstanceConfig;
use crate::engine::WebEngine;
use crate::input::{KeyEvent, KeyPhase, PointerEvent, PointerPhase};
use crate::instance::WebView;
use crate::registry;

/// Factory producing one engine backend per instance
pub type EngineFactory = Box<dyn Fn() -> Box<dyn WebEngine> + Send + Sync>;

static ENGINE_FACTORY: OnceLock<Mutex<Option<EngineFactory>>> = OnceLock::new();
static IN_EDITOR: AtomicBool = AtomicBool::new(false);

fn factory_slot() -> &'static Mutex<Option<EngineFactory>> {
    ENGINE_FACTORY.get_or_init(|| Mutex::new(None))
}

/// Opaque handle to one live instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(Uuid);

impl InstanceHandle {
    /// The underlying instance id
    pub fn id(&self) -> Uuid {
        self.0
    }
}

fn resolve(handle: InstanceHandle) -> Option<Arc<WebView>> {
    registry::get(handle.0)
}

/// Record process-wide host mode metadata
pub fn init_static(in_editor: bool) {
    IN_EDITOR.store(in_editor, Ordering::Release);
}

/// Whether the host runs inside its editor environment
pub fn in_editor() -> bool {
    IN_EDITOR.load(Ordering::Acquire)
}

/// Install the engine factory used by [`initialize`]
pub fn set_engine_factory(factory: EngineFactory) {
    *factory_slot().lock() = Some(factory);
}

/// Create an instance and return its handle.
///
/// Returns None when no engine factory is installed or creation fails.
#[allow(clippy::too_many_arguments)]
pub fn initialize(
    host_object: &str,
    transparent: bool,
    zoom_enabled: bool,
    width: u32,
    height: u32,
    user_agent: &str,
    separated: bool,
) -> Option<InstanceHandle> {
    let engine = {
        let slot = factory_slot().lock();
        match slot.as_ref() {
            Some(factory) => factory(),
            None => {
                warn!("no engine factory installed");
                return None;
            }
        }
    };

    let mut builder = InstanceConfig::builder()
        .host_object(host_object)
        .transparent(transparent)
        .zoom_enabled(zoom_enabled)
        .size(width, height)
        .separated(separated);
    if !user_agent.is_empty() {
        builder = builder.user_agent(user_agent);
    }

    match WebView::create(builder.build(), engine) {
        Ok(view) => Some(InstanceHandle(view.id())),
        Err(err) => {
            warn!(%err, "instance creation failed");
            None
        }
    }
}

/// Whether the instance completed its initialization handshake
pub fn is_initialized(handle: InstanceHandle) -> bool {
    resolve(handle).map(|v| v.is_initialized()).unwrap_or(false)
}

/// Replace navigation patterns; false on compile failure (no partial effect)
pub fn set_url_patterns(handle: InstanceHandle, allow: &str, deny: &str, hook: &str) -> bool {
    match resolve(handle) {
        Some(view) => view.set_url_patterns(allow, deny, hook).is_ok(),
        None => false,
    }
}

/// Navigate to a URL
pub fn navigate(handle: InstanceHandle, url: &str) {
    if let Some(view) = resolve(handle) {
        let _ = view.navigate(url);
    }
}

/// Load an HTML string as the document
pub fn load_html(handle: InstanceHandle, html: &str) {
    if let Some(view) = resolve(handle) {
        let _ = view.load_html(html);
    }
}

/// Evaluate script in the page
pub fn evaluate_script(handle: InstanceHandle, js: &str) {
    if let Some(view) = resolve(handle) {
        let _ = view.evaluate_script(js);
    }
}

/// Navigate back in history
pub fn go_back(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        let _ = view.go_back();
    }
}

/// Navigate forward in history
pub fn go_forward(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        let _ = view.go_forward();
    }
}

/// Reload the current document
pub fn reload(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        let _ = view.reload();
    }
}

/// Cached back-navigation availability
pub fn can_go_back(handle: InstanceHandle) -> bool {
    resolve(handle).map(|v| v.can_go_back()).unwrap_or(false)
}

/// Cached forward-navigation availability
pub fn can_go_forward(handle: InstanceHandle) -> bool {
    resolve(handle).map(|v| v.can_go_forward()).unwrap_or(false)
}

/// Resize the view
pub fn set_bounds(handle: InstanceHandle, width: u32, height: u32) {
    if let Some(view) = resolve(handle) {
        let _ = view.set_bounds(width, height);
    }
}

/// Show or hide the view
pub fn set_visible(handle: InstanceHandle, visible: bool) {
    if let Some(view) = resolve(handle) {
        let _ = view.set_visible(visible);
    }
}

/// Forward a pointer event encoded with the host's state code
pub fn send_pointer_event(
    handle: InstanceHandle,
    x: f32,
    y: f32,
    wheel_delta: f32,
    state_code: i32,
) {
    if let Some(view) = resolve(handle) {
        let _ = view.send_pointer(PointerEvent {
            x,
            y,
            wheel_delta,
            phase: PointerPhase::from_code(state_code),
        });
    }
}

/// Forward a keyboard event encoded with the host's state code
pub fn send_key_event(
    handle: InstanceHandle,
    x: i32,
    y: i32,
    chars: &str,
    key_code: u16,
    state_code: i32,
) {
    if let Some(view) = resolve(handle) {
        let _ = view.send_key(KeyEvent {
            x,
            y,
            chars: chars.to_string(),
            key_code,
            phase: KeyPhase::from_code(state_code),
        });
    }
}

/// Request a frame and record the active pixel density
pub fn request_frame(handle: InstanceHandle, force_refresh: bool, pixel_density: f32) {
    if let Some(view) = resolve(handle) {
        let _ = view.request_frame(force_refresh, pixel_density);
    }
}

/// Copy the current frame; returns its dimensions when a new frame was copied
pub fn copy_frame(handle: InstanceHandle, dst: &mut [u8]) -> Option<(u32, u32)> {
    resolve(handle).and_then(|v| v.copy_frame(dst))
}

/// Width of the current frame
pub fn frame_width(handle: InstanceHandle) -> u32 {
    resolve(handle).map(|v| v.frame_size().0).unwrap_or(0)
}

/// Height of the current frame
pub fn frame_height(handle: InstanceHandle) -> u32 {
    resolve(handle).map(|v| v.frame_size().1).unwrap_or(0)
}

/// Add or replace a custom request header
pub fn add_custom_header(handle: InstanceHandle, key: &str, value: &str) {
    if let Some(view) = resolve(handle) {
        view.add_custom_header(key, value);
    }
}

/// Remove a custom request header
pub fn remove_custom_header(handle: InstanceHandle, key: &str) {
    if let Some(view) = resolve(handle) {
        view.remove_custom_header(key);
    }
}

/// Look up a custom request header value
pub fn custom_header_value(handle: InstanceHandle, key: &str) -> Option<String> {
    resolve(handle).and_then(|v| v.custom_header_value(key))
}

/// Remove all custom request headers
pub fn clear_custom_headers(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        view.clear_custom_headers();
    }
}

/// Query cookies; the result arrives as a `CallOnCookies:` outbox event
pub fn get_cookies(handle: InstanceHandle, url: &str) {
    if let Some(view) = resolve(handle) {
        let _ = view.get_cookies(url);
    }
}

/// Delete one cookie through the first live instance
pub fn clear_cookie(url: &str, name: &str) {
    if let Some(view) = registry::first() {
        let _ = view.delete_cookie(url, name);
    }
}

/// Delete all cookies through the first live instance
pub fn clear_all_cookies() {
    if let Some(view) = registry::first() {
        let _ = view.delete_all_cookies();
    }
}

/// Supply basic-auth credentials
pub fn set_basic_auth(handle: InstanceHandle, username: &str, password: &str) {
    if let Some(view) = resolve(handle) {
        let _ = view.set_basic_auth(username, password);
    }
}

/// Clear the HTTP cache
pub fn clear_cache(handle: InstanceHandle, include_disk: bool) {
    if let Some(view) = resolve(handle) {
        let _ = view.clear_cache(include_disk);
    }
}

/// Enable or disable input forwarding
pub fn set_interaction_enabled(handle: InstanceHandle, enabled: bool) {
    if let Some(view) = resolve(handle) {
        view.set_interaction_enabled(enabled);
    }
}

/// Suspend the view
pub fn pause(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        let _ = view.pause();
    }
}

/// Resume the view
pub fn resume(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        let _ = view.resume();
    }
}

/// Pop the oldest outbox event, or None when empty
pub fn poll_message(handle: InstanceHandle) -> Option<String> {
    resolve(handle).and_then(|v| v.poll_message())
}

/// Number of live instances
pub fn instance_count() -> usize {
    registry::count()
}

/// Tear the instance down and remove it from the registry
pub fn destroy(handle: InstanceHandle) {
    if let Some(view) = resolve(handle) {
        view.destroy();
    }
}
