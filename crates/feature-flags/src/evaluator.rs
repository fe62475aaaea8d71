//! The flag evaluation function.

use crate::{rollout_bucket, FlagDefinition, TenantOverrides, UserContext};
use serde::Serialize;

/// Which rule decided a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// `server_enabled` is false.
    KillSwitch,
    /// An explicit tenant override on an editable flag.
    TenantOverride,
    /// The user matches none of the segment entries.
    SegmentMismatch,
    /// The flag is segmented and no user was supplied.
    SegmentRequiresUser,
    /// The flag has a rollout and no user was supplied.
    RolloutRequiresUser,
    /// The user's bucket is at or above the rollout percentage.
    OutsideRollout,
    /// No rule applied; the flag's default state was used.
    Default,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::KillSwitch => "kill_switch",
            DecisionReason::TenantOverride => "tenant_override",
            DecisionReason::SegmentMismatch => "segment_mismatch",
            DecisionReason::SegmentRequiresUser => "segment_requires_user",
            DecisionReason::RolloutRequiresUser => "rollout_requires_user",
            DecisionReason::OutsideRollout => "outside_rollout",
            DecisionReason::Default => "default",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagDecision {
    pub enabled: bool,
    pub reason: DecisionReason,
}

impl FlagDecision {
    fn new(enabled: bool, reason: DecisionReason) -> Self {
        Self { enabled, reason }
    }
}

/// Resolve a flag, short-circuiting on the first rule that applies.
pub fn evaluate(
    flag: &FlagDefinition,
    overrides: &TenantOverrides,
    user: Option<&UserContext>,
) -> FlagDecision {
    if !flag.server_enabled {
        return FlagDecision::new(false, DecisionReason::KillSwitch);
    }

    if flag.admin_editable {
        if let Some(enabled) = overrides.get(&flag.key) {
            return FlagDecision::new(enabled, DecisionReason::TenantOverride);
        }
    }

    if let Some(segment) = flag.segment() {
        match user {
            None => return FlagDecision::new(false, DecisionReason::SegmentRequiresUser),
            Some(user) if !user.matches_segment(segment) => {
                return FlagDecision::new(false, DecisionReason::SegmentMismatch)
            }
            Some(_) => {}
        }
    }

    if let Some(percentage) = flag.effective_rollout() {
        let Some(user) = user else {
            return FlagDecision::new(false, DecisionReason::RolloutRequiresUser);
        };
        if rollout_bucket(&user.id) as f64 >= percentage {
            return FlagDecision::new(false, DecisionReason::OutsideRollout);
        }
    }

    FlagDecision::new(flag.default_state, DecisionReason::Default)
}

/// Boolean form of [`evaluate`].
pub fn is_enabled(
    flag: &FlagDefinition,
    overrides: &TenantOverrides,
    user: Option<&UserContext>,
) -> bool {
    evaluate(flag, overrides, user).enabled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, bool)]) -> TenantOverrides {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_plain_flag_uses_default() {
        let on = FlagDefinition::new("on", true);
        let off = FlagDefinition::new("off", false);
        let empty = TenantOverrides::new();

        assert_eq!(
            evaluate(&on, &empty, None),
            FlagDecision::new(true, DecisionReason::Default)
        );
        assert!(!is_enabled(&off, &empty, None));
    }

    #[test]
    fn test_override_ignored_when_not_editable() {
        let flag = FlagDefinition::new("k", true);
        let decision = evaluate(&flag, &overrides(&[("k", false)]), None);
        assert_eq!(decision, FlagDecision::new(true, DecisionReason::Default));
    }

    #[test]
    fn test_override_for_other_key_is_ignored() {
        let flag = FlagDefinition::new("k", false).admin_editable(true);
        let decision = evaluate(&flag, &overrides(&[("other", true)]), None);
        assert_eq!(decision.reason, DecisionReason::Default);
    }

    #[test]
    fn test_segment_requires_user() {
        let flag = FlagDefinition::new("k", true).with_segment(["beta"]);
        let decision = evaluate(&flag, &TenantOverrides::new(), None);
        assert_eq!(
            decision,
            FlagDecision::new(false, DecisionReason::SegmentRequiresUser)
        );
    }

    #[test]
    fn test_segment_match_falls_through_to_default() {
        let flag = FlagDefinition::new("k", true).with_segment(["beta"]);
        let member = UserContext::new("u1").with_roles(["beta"]);
        let outsider = UserContext::new("u2").with_roles(["viewer"]);

        assert!(is_enabled(&flag, &TenantOverrides::new(), Some(&member)));
        assert_eq!(
            evaluate(&flag, &TenantOverrides::new(), Some(&outsider)).reason,
            DecisionReason::SegmentMismatch
        );
    }

    #[test]
    fn test_rollout_requires_user() {
        let flag = FlagDefinition::new("k", true).with_rollout(100.0);
        assert_eq!(
            evaluate(&flag, &TenantOverrides::new(), None).reason,
            DecisionReason::RolloutRequiresUser
        );
    }

    #[test]
    fn test_full_rollout_keeps_default() {
        let on = FlagDefinition::new("on", true).with_rollout(100.0);
        let off = FlagDefinition::new("off", false).with_rollout(100.0);
        let user = UserContext::new("anyone");

        assert!(is_enabled(&on, &TenantOverrides::new(), Some(&user)));
        assert!(!is_enabled(&off, &TenantOverrides::new(), Some(&user)));
    }

    #[test]
    fn test_rollout_boundary_uses_bucket() {
        let user = UserContext::new("user-42");
        let bucket = rollout_bucket(&user.id) as f64;

        let just_below = FlagDefinition::new("k", true).with_rollout(bucket);
        let just_above = FlagDefinition::new("k", true).with_rollout(bucket + 1.0);

        assert_eq!(
            evaluate(&just_below, &TenantOverrides::new(), Some(&user)).reason,
            DecisionReason::OutsideRollout
        );
        assert!(is_enabled(&just_above, &TenantOverrides::new(), Some(&user)));
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(DecisionReason::KillSwitch.to_string(), "kill_switch");
        assert_eq!(
            serde_json::to_value(DecisionReason::OutsideRollout).unwrap(),
            "outside_rollout"
        );
    }
}
