//! Browser control event subscriptions
//!
//! Bound to the control during initialization; invoked by the engine on the
//! execution thread. Navigation-starting notifications run through the
//! policy engine; everything host-visible is expressed as outbox events.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::engine::{ControlEventHandler, NavigationDecision};
use crate::instance::SharedState;
use crate::outbox::EventTag;
use crate::policy::Decision;

/// Event handler for one instance's browser control
pub(crate) struct InstanceEvents {
    shared: Arc<SharedState>,
}

impl InstanceEvents {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }
}

impl ControlEventHandler for InstanceEvents {
    fn navigation_starting(&self, url: &str) -> NavigationDecision {
        let decision = self.shared.policy.lock().evaluate(url);
        match decision {
            Decision::Intercepted(payload) => {
                self.shared.outbox.push(EventTag::FromJs, &payload);
                NavigationDecision::Cancel
            }
            Decision::Hooked => {
                self.shared.outbox.push(EventTag::Hooked, url);
                NavigationDecision::Cancel
            }
            Decision::Denied => {
                // Cancelled silently; no event.
                debug!(%url, "navigation denied");
                NavigationDecision::Cancel
            }
            Decision::Allowed => {
                self.shared.outbox.push(EventTag::Started, url);
                NavigationDecision::Allow
            }
        }
    }

    fn navigation_completed(&self, url: &str, success: bool, error_status: i32) {
        if success {
            self.shared.outbox.push(EventTag::Loaded, url);
        } else {
            self.shared
                .outbox
                .push(EventTag::Error, &format!("{} (error: {})", url, error_status));
        }
    }

    fn web_message_received(&self, message: &str) {
        self.shared.outbox.push(EventTag::FromJs, message);
    }

    fn http_response_received(&self, url: &str, status: u16) {
        if status >= 400 {
            self.shared
                .outbox
                .push(EventTag::HttpError, &format!("{} (status: {})", url, status));
        }
    }

    fn history_changed(&self, can_go_back: bool, can_go_forward: bool) {
        self.shared.can_go_back.store(can_go_back, Ordering::Release);
        self.shared
            .can_go_forward
            .store(can_go_forward, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;

    fn events() -> (InstanceEvents, Arc<SharedState>) {
        let shared = Arc::new(SharedState::new(&InstanceConfig::default()));
        (InstanceEvents::new(shared.clone()), shared)
    }

    #[test]
    fn test_allowed_navigation_emits_started() {
        let (handler, shared) = events();
        let decision = handler.navigation_starting("https://example.com");
        assert_eq!(decision, NavigationDecision::Allow);
        assert_eq!(
            shared.outbox.poll().as_deref(),
            Some("CallOnStarted:https://example.com")
        );
    }

    #[test]
    fn test_denied_navigation_is_silent() {
        let (handler, shared) = events();
        shared.policy.lock().set_patterns("", "ads", "").unwrap();
        let decision = handler.navigation_starting("http://x/ads/a");
        assert_eq!(decision, NavigationDecision::Cancel);
        assert_eq!(shared.outbox.poll(), None);
    }

    #[test]
    fn test_hooked_navigation_emits_and_cancels() {
        let (handler, shared) = events();
        shared.policy.lock().set_patterns("", "", "block").unwrap();
        let decision = handler.navigation_starting("http://x/block");
        assert_eq!(decision, NavigationDecision::Cancel);
        assert_eq!(
            shared.outbox.poll().as_deref(),
            Some("CallOnHooked:http://x/block")
        );
        assert_eq!(shared.outbox.poll(), None);
    }

    #[test]
    fn test_private_scheme_strips_prefix() {
        let (handler, shared) = events();
        let decision = handler.navigation_starting("hostview:doThing");
        assert_eq!(decision, NavigationDecision::Cancel);
        assert_eq!(shared.outbox.poll().as_deref(), Some("CallFromJS:doThing"));
    }

    #[test]
    fn test_completion_events() {
        let (handler, shared) = events();
        handler.navigation_completed("https://a", true, 0);
        handler.navigation_completed("https://b", false, 3);
        assert_eq!(shared.outbox.poll().as_deref(), Some("CallOnLoaded:https://a"));
        assert_eq!(
            shared.outbox.poll().as_deref(),
            Some("CallOnError:https://b (error: 3)")
        );
    }

    #[test]
    fn test_http_error_threshold() {
        let (handler, shared) = events();
        handler.http_response_received("https://a", 200);
        assert_eq!(shared.outbox.poll(), None);
        handler.http_response_received("https://a", 404);
        assert_eq!(
            shared.outbox.poll().as_deref(),
            Some("CallOnHttpError:https://a (status: 404)")
        );
    }

    #[test]
    fn test_history_flags_cached() {
        let (handler, shared) = events();
        handler.history_changed(true, false);
        assert!(shared.can_go_back.load(Ordering::Acquire));
        assert!(!shared.can_go_forward.load(Ordering::Acquire));
    }
}
