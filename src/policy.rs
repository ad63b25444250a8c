//! Navigation policy engine
//!
//! Evaluates the private call scheme and the allow/deny/hook pattern
//! matchers against every navigation-starting notification. Evaluation is
//! pure and synchronous; the instance guards the policy with its own lock.
//!
//! Pattern semantics: standard regular expressions matched with
//! search-anywhere semantics (not full-match). Assignment is
//! compile-then-swap: either all three matchers are replaced or, on any
//! compile failure, none are.

use regex::Regex;

use crate::error::{PatternKind, PolicyError};

/// Literal scheme prefix for in-page calls.
///
/// Any URL starting with this prefix is intercepted before any pattern
/// evaluation; the remainder of the URL is the call payload.
pub const CALL_SCHEME: &str = "hostview:";

/// Outcome of evaluating one navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Private call scheme; payload is the URL with the scheme stripped
    Intercepted(String),
    /// Hook pattern matched; navigation is cancelled and reported
    Hooked,
    /// Deny pattern matched without an allow override; cancelled silently
    Denied,
    /// Navigation may proceed
    Allowed,
}

/// The three optional pattern matchers
#[derive(Debug, Default)]
pub struct NavigationPolicy {
    allow: Option<Regex>,
    deny: Option<Regex>,
    hook: Option<Regex>,
}

fn compile(pattern: &str, kind: PatternKind) -> Result<Option<Regex>, PolicyError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| PolicyError::InvalidPattern { kind, source })
}

impl NavigationPolicy {
    /// Create a policy with no patterns set
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all three matchers. Empty strings clear their matcher.
    ///
    /// All patterns are compiled before any assignment, so a failure leaves
    /// the previously installed matchers untouched.
    pub fn set_patterns(
        &mut self,
        allow: &str,
        deny: &str,
        hook: &str,
    ) -> Result<(), PolicyError> {
        let allow = compile(allow, PatternKind::Allow)?;
        let deny = compile(deny, PatternKind::Deny)?;
        let hook = compile(hook, PatternKind::Hook)?;
        self.allow = allow;
        self.deny = deny;
        self.hook = hook;
        Ok(())
    }

    /// Whether any matcher is currently installed
    pub fn has_patterns(&self) -> bool {
        self.allow.is_some() || self.deny.is_some() || self.hook.is_some()
    }

    /// Evaluate one navigation request in strict order: private scheme,
    /// hook, then deny-unless-allow-overrides.
    pub fn evaluate(&self, url: &str) -> Decision {
        if let Some(payload) = url.strip_prefix(CALL_SCHEME) {
            return Decision::Intercepted(payload.to_string());
        }

        if let Some(hook) = &self.hook {
            if hook.is_match(url) {
                return Decision::Hooked;
            }
        }

        let mut pass = true;
        if let Some(deny) = &self.deny {
            if deny.is_match(url) {
                // Allow overrides deny when both match the same URL.
                pass = self.allow.as_ref().is_some_and(|allow| allow.is_match(url));
            }
        }

        if pass {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy(allow: &str, deny: &str, hook: &str) -> NavigationPolicy {
        let mut p = NavigationPolicy::new();
        p.set_patterns(allow, deny, hook).unwrap();
        p
    }

    #[test]
    fn test_no_patterns_allows_everything() {
        let p = NavigationPolicy::new();
        assert!(!p.has_patterns());
        assert_eq!(p.evaluate("https://example.com"), Decision::Allowed);
    }

    #[test]
    fn test_private_scheme_intercepts_before_patterns() {
        let p = policy("", "hostview", "hostview");
        assert_eq!(
            p.evaluate("hostview:doSomething"),
            Decision::Intercepted("doSomething".to_string())
        );
    }

    #[test]
    fn test_hook_takes_precedence_over_deny_and_allow() {
        let p = policy("block", "block", "block");
        assert_eq!(p.evaluate("http://x/block"), Decision::Hooked);
    }

    #[test]
    fn test_deny_without_allow() {
        let p = policy("", "ads", "");
        assert_eq!(p.evaluate("http://x/ads/a"), Decision::Denied);
        assert_eq!(p.evaluate("http://x/safe"), Decision::Allowed);
    }

    #[test]
    fn test_allow_overrides_deny() {
        let p = policy("ads/ok", "ads", "");
        assert_eq!(p.evaluate("http://x/ads/ok"), Decision::Allowed);
        assert_eq!(p.evaluate("http://x/ads/bad"), Decision::Denied);
    }

    #[test]
    fn test_allow_alone_does_not_restrict() {
        let p = policy("onlythis", "", "");
        assert_eq!(p.evaluate("http://x/other"), Decision::Allowed);
    }

    #[test]
    fn test_search_anywhere_semantics() {
        let p = policy("", "tracker", "");
        assert_eq!(
            p.evaluate("https://cdn.example.com/tracker.js?x=1"),
            Decision::Denied
        );
    }

    #[test]
    fn test_invalid_pattern_reports_and_preserves_state() {
        let mut p = policy("good", "ads", "hooked");
        let err = p.set_patterns("ok", "(unbalanced", "ok");
        assert!(err.is_err());

        // Previous matchers still in force.
        assert_eq!(p.evaluate("http://x/ads/a"), Decision::Denied);
        assert_eq!(p.evaluate("http://x/hooked"), Decision::Hooked);
    }

    #[test]
    fn test_empty_patterns_clear() {
        let mut p = policy("a", "b", "c");
        p.set_patterns("", "", "").unwrap();
        assert!(!p.has_patterns());
        assert_eq!(p.evaluate("http://x/b"), Decision::Allowed);
    }
}
