//! Worked flag scenarios.

use crate::{evaluate, is_enabled, DecisionReason, FlagDefinition, FlagSet, TenantOverrides, UserContext};

/// Zero rollout disables a flag even when its default is on.
#[test]
fn test_zero_rollout_disables_for_every_user() {
    let flag = FlagDefinition::new("beta-search", true)
        .admin_editable(false)
        .with_rollout(0.0);

    for i in 0..500 {
        let user = UserContext::new(format!("user-{i}"));
        let decision = evaluate(&flag, &TenantOverrides::new(), Some(&user));
        assert!(!decision.enabled);
        assert_eq!(decision.reason, DecisionReason::OutsideRollout);
    }
    assert!(!is_enabled(&flag, &TenantOverrides::new(), None));
}

/// An override of `false` beats a 100% rollout.
#[test]
fn test_override_beats_full_rollout() {
    let flag = FlagDefinition::new("new-billing", true)
        .admin_editable(true)
        .with_rollout(100.0);
    let mut overrides = TenantOverrides::new();
    overrides.set("new-billing", false);

    let user = UserContext::new("user-1");
    assert!(!is_enabled(&flag, &overrides, Some(&user)));
    assert!(!is_enabled(&flag, &overrides, None));
}

#[test]
fn test_tenant_document_end_to_end() {
    let set = FlagSet::from_json(
        r#"[
            { "key": "reports", "serverEnabled": true, "defaultState": true,
              "userSegment": ["reports:view", "admin"] },
            { "key": "dark-mode", "serverEnabled": true, "adminEditable": true,
              "defaultState": false },
            { "key": "legacy-export", "serverEnabled": false, "adminEditable": true,
              "defaultState": true }
        ]"#,
    )
    .unwrap();
    let overrides: TenantOverrides = [("dark-mode", true), ("legacy-export", true)]
        .into_iter()
        .collect();

    let analyst = UserContext::new("u-analyst").with_permissions(["reports:view"]);
    let guest = UserContext::new("u-guest");

    assert!(set.is_enabled("reports", &overrides, Some(&analyst)));
    assert!(!set.is_enabled("reports", &overrides, Some(&guest)));
    assert!(set.is_enabled("dark-mode", &overrides, None));
    assert!(!set.is_enabled("legacy-export", &overrides, Some(&analyst)));
}
