//! Property-based testing for the navigation policy engine.
//!
//! Uses proptest to generate arbitrary URLs and literal patterns and verify
//! the evaluation-order invariants: private-scheme interception, hook
//! precedence, deny-unless-allow-overrides, and failed-assignment atomicity.

use proptest::prelude::*;

use hostview::policy::{Decision, NavigationPolicy, CALL_SCHEME};

/// Strategy for pattern stems drawn from a low alphabet
fn arb_low_stem() -> impl Strategy<Value = String> {
    "[a-c]{3,8}"
}

/// Strategy for URL filler drawn from a disjoint high alphabet, so a low
/// stem can never appear in it by accident
fn arb_high_filler() -> impl Strategy<Value = String> {
    "[x-z]{0,12}"
}

/// Strategy for arbitrary text, including regex metacharacters
fn arb_text() -> impl Strategy<Value = String> {
    ".{0,60}"
}

fn policy(allow: &str, deny: &str, hook: &str) -> NavigationPolicy {
    let mut p = NavigationPolicy::new();
    p.set_patterns(allow, deny, hook).expect("patterns compile");
    p
}

proptest! {
    /// Evaluation never panics, whatever the URL, with escaped-literal
    /// patterns installed.
    #[test]
    fn evaluation_total_over_arbitrary_urls(
        url in arb_text(),
        allow in arb_text(),
        deny in arb_text(),
        hook in arb_text(),
    ) {
        let p = policy(
            &regex::escape(&allow),
            &regex::escape(&deny),
            &regex::escape(&hook),
        );
        let _ = p.evaluate(&url);
    }

    /// The private call scheme is intercepted before any pattern check and
    /// the payload is the URL with the scheme stripped, verbatim.
    #[test]
    fn private_scheme_always_intercepts(
        payload in arb_text(),
        deny in arb_low_stem(),
    ) {
        let p = policy("", &deny, &deny);
        let url = format!("{}{}", CALL_SCHEME, payload);
        prop_assert_eq!(p.evaluate(&url), Decision::Intercepted(payload));
    }

    /// A matching hook wins over matching deny and allow patterns.
    #[test]
    fn hook_precedes_deny_and_allow(stem in arb_low_stem(), filler in arb_high_filler()) {
        let p = policy(&stem, &stem, &stem);
        let url = format!("http://{}/{}", filler, stem);
        prop_assert_eq!(p.evaluate(&url), Decision::Hooked);
    }

    /// Deny without a matching allow cancels; URLs not matching the deny
    /// pattern pass.
    #[test]
    fn deny_without_allow(stem in arb_low_stem(), filler in arb_high_filler()) {
        let p = policy("", &stem, "");
        let denied = format!("http://{}/{}", filler, stem);
        let passed = format!("http://{}/", filler);
        prop_assert_eq!(p.evaluate(&denied), Decision::Denied);
        prop_assert_eq!(p.evaluate(&passed), Decision::Allowed);
    }

    /// When deny and allow both match the same URL, the allow wins.
    #[test]
    fn allow_overrides_matching_deny(stem in arb_low_stem(), filler in arb_high_filler()) {
        let allow = format!("{}/ok", stem);
        let p = policy(&allow, &stem, "");
        let overridden = format!("http://{}/{}/ok", filler, stem);
        let denied = format!("http://{}/{}/bad", filler, stem);
        prop_assert_eq!(p.evaluate(&overridden), Decision::Allowed);
        prop_assert_eq!(p.evaluate(&denied), Decision::Denied);
    }

    /// A failed pattern assignment leaves every prior decision unchanged.
    #[test]
    fn failed_assignment_changes_nothing(
        stem in arb_low_stem(),
        urls in prop::collection::vec(arb_text(), 1..8),
    ) {
        let mut p = policy("", &stem, "");
        let before: Vec<Decision> = urls.iter().map(|u| p.evaluate(u)).collect();

        prop_assert!(p.set_patterns("ok", "(unbalanced", "ok").is_err());

        let after: Vec<Decision> = urls.iter().map(|u| p.evaluate(u)).collect();
        prop_assert_eq!(before, after);
    }
}
