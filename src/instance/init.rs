//! Initialization state machine
//!
//! Drives the asynchronous handshake that stands up a browser environment,
//! a controller, and the browser control object. Embedded views first try
//! the composition controller (low-latency input and GPU capture); any
//! failure along that path falls back to the regular window-routed
//! controller. Environment and browser-control failures are fatal: an error
//! event is emitted and the machine halts, leaving the instance alive for
//! cleanup only.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capture::{CaptureMode, ContinuousSink};
use crate::engine::{
    Compositor, CompositionController, ControlSettings, Controller, Environment,
    EnvironmentOptions,
};
use crate::error::{EngineError, EngineResult};
use crate::instance::events::InstanceEvents;
use crate::instance::runtime::{completion, ActiveController, EngineEvent, PendingLoad, Runtime};
use crate::outbox::EventTag;
use crate::policy::CALL_SCHEME;

/// Initialization progress for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitState {
    /// Thread spawned, nothing created yet
    Created,
    /// Host window exists; readiness has been signaled
    WindowCreated,
    /// Environment request outstanding
    EnvironmentRequested,
    /// Composition controller request outstanding
    CompositionControllerRequested,
    /// Regular controller request outstanding
    ControllerRequested,
    /// Controller exists; control acquisition in progress
    ControllerReady,
    /// Browser control exists; configuration in progress
    BrowserControlReady,
    /// Terminal success state
    Initialized,
    /// Terminal failure state; no further transitions
    Failed,
}

/// Emit the fatal error event and halt the machine
fn fail(rt: &mut Runtime, message: &str) {
    warn!(%message, "initialization failed");
    rt.shared.outbox.push(EventTag::Error, message);
    rt.init = InitState::Failed;
}

/// Step 1: request the browser environment
pub(crate) fn begin(rt: &mut Runtime) {
    rt.init = InitState::EnvironmentRequested;
    let options = EnvironmentOptions {
        profile_dir: Some(std::env::temp_dir().join("hostview")),
    };
    let done = completion(&rt.tx, EngineEvent::EnvironmentReady);
    if let Err(err) = rt.engine.create_environment(&options, done) {
        debug!(%err, "environment request refused");
        fail(rt, "Browser engine runtime not found");
    }
}

pub(crate) fn on_environment_ready(
    rt: &mut Runtime,
    result: EngineResult<Box<dyn Environment>>,
) {
    if rt.init != InitState::EnvironmentRequested {
        debug!(state = ?rt.init, "ignoring stale environment completion");
        return;
    }
    let environment = match result {
        Ok(environment) => environment,
        Err(err) => {
            debug!(%err, "environment creation failed");
            fail(rt, "Failed to create browser environment");
            return;
        }
    };
    rt.environment = Some(environment);

    let Some(window_id) = rt.window.as_ref().map(|w| w.id()) else {
        fail(rt, "Failed to create browser environment");
        return;
    };

    // Step 2: embedded views try the composition controller first.
    if !rt.config.separated {
        rt.init = InitState::CompositionControllerRequested;
        let done = completion(&rt.tx, EngineEvent::CompositionControllerReady);
        if let Some(environment) = rt.environment.as_mut() {
            match environment.create_composition_controller(window_id, done) {
                Ok(()) => return,
                Err(err) => {
                    debug!(%err, "composition controller unavailable; falling back");
                }
            }
        }
    }

    request_regular_controller(rt);
}

/// Step 3: request the window-routed controller
fn request_regular_controller(rt: &mut Runtime) {
    let Some(window_id) = rt.window.as_ref().map(|w| w.id()) else {
        fail(rt, "Failed to create browser controller");
        return;
    };
    rt.init = InitState::ControllerRequested;
    let done = completion(&rt.tx, EngineEvent::ControllerReady);
    if let Some(environment) = rt.environment.as_mut() {
        environment.create_controller(window_id, done);
    }
}

pub(crate) fn on_composition_controller_ready(
    rt: &mut Runtime,
    result: EngineResult<Box<dyn CompositionController>>,
) {
    if rt.init != InitState::CompositionControllerRequested {
        debug!(state = ?rt.init, "ignoring stale composition controller completion");
        return;
    }
    let mut controller = match result {
        Ok(controller) => controller,
        Err(err) => {
            debug!(%err, "composition controller failed; falling back");
            request_regular_controller(rt);
            return;
        }
    };

    // Step 4: compositor target plus root visual. A half-configured
    // composition path is never used; any failure discards this controller
    // and requests a fresh regular one.
    match attach_compositor(rt, controller.as_mut()) {
        Ok(compositor) => {
            rt.compositor = Some(compositor);
            finish_controller(rt, ActiveController::Composition(controller));
        }
        Err(err) => {
            warn!(%err, "compositor attachment failed; discarding composition controller");
            controller.close();
            drop(controller);
            request_regular_controller(rt);
        }
    }
}

fn attach_compositor(
    rt: &mut Runtime,
    controller: &mut dyn CompositionController,
) -> Result<Box<dyn Compositor>, EngineError> {
    let window_id = rt
        .window
        .as_ref()
        .map(|w| w.id())
        .ok_or_else(|| EngineError::CompositorFailed("no host window".to_string()))?;
    let mut compositor = rt.engine.create_compositor(window_id)?;
    let visual = controller.root_visual()?;
    compositor.attach_visual(visual)?;
    Ok(compositor)
}

pub(crate) fn on_controller_ready(rt: &mut Runtime, result: EngineResult<Box<dyn Controller>>) {
    if rt.init != InitState::ControllerRequested {
        debug!(state = ?rt.init, "ignoring stale controller completion");
        return;
    }
    match result {
        Ok(controller) => finish_controller(rt, ActiveController::Regular(controller)),
        Err(err) => {
            debug!(%err, "controller creation failed");
            fail(rt, "Failed to create browser controller");
        }
    }
}

/// Step 5: obtain the browser control, bind events, apply configuration,
/// choose the capture mode, and replay any buffered navigation.
fn finish_controller(rt: &mut Runtime, mut active: ActiveController) {
    rt.init = InitState::ControllerReady;

    let (width, height) = *rt.shared.bounds.lock();
    if let Err(err) = active.set_bounds(width, height) {
        warn!(%err, "initial bounds failed");
    }

    let mut control = match active.browser_control() {
        Ok(control) => control,
        Err(err) => {
            debug!(%err, "browser control acquisition failed");
            // Keep the controller so teardown still closes it.
            rt.controller = Some(active);
            fail(rt, "Failed to obtain browser control");
            return;
        }
    };
    rt.init = InitState::BrowserControlReady;

    control.set_event_handler(Box::new(InstanceEvents::new(rt.shared.clone())));

    let settings = ControlSettings {
        script_enabled: true,
        web_message_enabled: true,
        zoom_enabled: rt.config.zoom_enabled,
        transparent: rt.config.transparent,
        user_agent: rt.config.user_agent.clone(),
        // Embedded views suppress the engine's default context menus.
        context_menus_enabled: rt.config.separated,
    };
    if let Err(err) = control.apply_settings(&settings) {
        warn!(%err, "settings application failed");
    }

    let bridge = format!(
        "window.HostView = {{ call: function(message) {{ window.location.href = '{}' + message; }} }};",
        CALL_SCHEME
    );
    if let Err(err) = control.add_startup_script(&bridge) {
        warn!(%err, "bridge script registration failed");
    }

    let composition_active = active.is_composition();
    rt.controller = Some(active);
    rt.control = Some(control);

    rt.capture_mode = CaptureMode::select(
        rt.config.separated,
        composition_active,
        rt.engine.supports_continuous_capture(),
    );
    if rt.capture_mode == CaptureMode::Continuous {
        start_capture_session(rt);
    }

    rt.init = InitState::Initialized;
    rt.shared
        .initialized
        .store(true, std::sync::atomic::Ordering::Release);
    info!(id = %rt.id, mode = ?rt.capture_mode, "instance initialized");

    // Replay the buffered navigation exactly once.
    if let Some(pending) = rt.pending_load.take() {
        match pending {
            PendingLoad::Url(url) => rt.navigate(url),
            PendingLoad::Html(html) => rt.load_html(html),
        }
    }
}

fn start_capture_session(rt: &mut Runtime) {
    let (width, height) = *rt.shared.bounds.lock();
    let sink = Arc::new(ContinuousSink::new(
        rt.shared.frames.clone(),
        rt.shared.capture_in_flight.clone(),
        rt.shared.resize.clone(),
    ));
    if let Some(ActiveController::Composition(comp)) = &mut rt.controller {
        match comp.start_capture(width, height, sink) {
            Ok(session) => rt.session = Some(session),
            Err(err) => {
                warn!(%err, "continuous capture unavailable; using snapshots");
                rt.capture_mode = CaptureMode::Snapshot;
            }
        }
    }
}
