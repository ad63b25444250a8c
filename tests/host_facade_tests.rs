//! Handle-based host facade tests
//!
//! Exercises the flat operation surface end to end: engine factory,
//! handle resolution, per-handle operations, and the broadcast cookie
//! operations routed through the registry. Kept as one sequential test
//! because the facade shares process-wide state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use hostview::engine::{StubEngine, StubHandle};
use hostview::host;

const TIMEOUT: Duration = Duration::from_secs(5);

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return cond();
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn facade_drives_instances_through_handles() {
    host::init_static(false);
    assert!(!host::in_editor());

    // Without a factory, initialization reports failure instead of panicking.
    assert!(host::initialize("NoFactory", false, true, 0, 0, "", false).is_none());

    let handles: Arc<Mutex<Vec<StubHandle>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = handles.clone();
    host::set_engine_factory(Box::new(move || {
        let (engine, handle) = StubEngine::new();
        sink.lock().push(handle);
        engine
    }));

    let handle = host::initialize("BrowserPanel", false, true, 640, 480, "Facade/1.0", false)
        .expect("instance handle");
    assert!(wait_until(|| host::is_initialized(handle), TIMEOUT));
    assert_eq!(host::instance_count(), 1);

    let stub = handles.lock().last().cloned().expect("stub handle");
    let settings = stub.applied_settings().expect("settings applied");
    assert_eq!(settings.user_agent.as_deref(), Some("Facade/1.0"));

    // Patterns: invalid input reports false, valid input true.
    assert!(!host::set_url_patterns(handle, "(", "", ""));
    assert!(host::set_url_patterns(handle, "", "ads", ""));

    host::navigate(handle, "https://example.com");
    assert!(wait_until(
        || stub.navigations() == vec!["https://example.com".to_string()],
        TIMEOUT
    ));
    assert_eq!(
        host::poll_message(handle).as_deref(),
        Some("CallOnStarted:https://example.com")
    );
    assert_eq!(
        host::poll_message(handle).as_deref(),
        Some("CallOnLoaded:https://example.com")
    );
    assert_eq!(host::poll_message(handle), None);

    // Headers round-trip through the handle surface.
    host::add_custom_header(handle, "X-Token", "t");
    assert_eq!(
        host::custom_header_value(handle, "X-Token").as_deref(),
        Some("t")
    );
    host::remove_custom_header(handle, "X-Token");
    assert_eq!(host::custom_header_value(handle, "X-Token"), None);

    // Frame plumbing.
    host::request_frame(handle, true, 1.0);
    assert!(wait_until(|| host::frame_width(handle) == 4, TIMEOUT));
    assert_eq!(host::frame_height(handle), 4);
    let mut pixels = vec![0u8; 4 * 4 * 4];
    assert_eq!(host::copy_frame(handle, &mut pixels), Some((4, 4)));

    // Broadcast cookie operations reach the first live instance.
    host::clear_all_cookies();
    assert!(wait_until(|| stub.log_contains("cookies_cleared"), TIMEOUT));
    host::clear_cookie("https://example.com", "sid");
    assert!(wait_until(
        || stub.log_contains("cookie_deleted https://example.com sid"),
        TIMEOUT
    ));

    // Input and lifecycle wrappers post without error.
    host::send_pointer_event(handle, 10.0, 10.0, 0.0, 1);
    host::send_key_event(handle, 0, 0, "a", 0, 2);
    host::set_interaction_enabled(handle, false);
    host::pause(handle);
    host::resume(handle);
    host::clear_cache(handle, false);
    assert!(wait_until(
        || stub.log_contains("cache_cleared disk=false"),
        TIMEOUT
    ));

    host::destroy(handle);
    assert_eq!(host::instance_count(), 0);

    // Operations against a dead handle are no-ops.
    assert!(!host::is_initialized(handle));
    host::navigate(handle, "https://gone.example");
    assert_eq!(host::poll_message(handle), None);
}
