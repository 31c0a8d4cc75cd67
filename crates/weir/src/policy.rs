//! Route policy wiring.
//!
//! The server publishes two named policies built from configuration: the
//! API group denies with a hard 401, the UI group denies by bouncing the
//! browser to the login flow. The resolver treats the reason as opaque
//! data; the middlewares in [`crate::auth`] translate it.

use anyhow::{Context, Result};
use weir_policy::{Policy, PolicyStore, RuleSet};

use crate::config::PolicySettings;

/// Policy identifier for the API route group.
pub const API_POLICY: &str = "api";
/// Policy identifier for the UI route group.
pub const UI_POLICY: &str = "ui";

/// How a policy violation should surface at the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyReason {
    /// Refuse with 401.
    Unauthorized,
    /// Send the browser to the login flow, remembering where it was going.
    RequiresLogin,
}

/// Compile the configured rule lists and publish both policy snapshots.
pub fn build_store(settings: &PolicySettings) -> Result<PolicyStore<PolicyReason>> {
    let store = PolicyStore::new();

    let api_rules: RuleSet = settings
        .api
        .clone()
        .try_into()
        .context("Invalid [policy.api] rules")?;
    let ui_rules: RuleSet = settings
        .ui
        .clone()
        .try_into()
        .context("Invalid [policy.ui] rules")?;

    store.publish(API_POLICY, Policy::new(api_rules, PolicyReason::Unauthorized));
    store.publish(UI_POLICY, Policy::new(ui_rules, PolicyReason::RequiresLogin));

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_policy::Anonymous;

    #[test]
    fn test_default_settings_compile() {
        let store = build_store(&PolicySettings::default()).unwrap();

        let api = store.get(API_POLICY).unwrap();
        let ui = store.get(UI_POLICY).unwrap();

        assert!(!api.evaluate::<Anonymous>(Some("/flows"), None).is_permit());
        assert!(!ui.evaluate::<Anonymous>(Some("/dashboard"), None).is_permit());
    }

    #[test]
    fn test_invalid_pattern_is_a_startup_error() {
        let mut settings = PolicySettings::default();
        settings.api.protect = vec!["[oops".to_string()];
        assert!(build_store(&settings).is_err());
    }
}
