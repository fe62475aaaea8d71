//! Flag, override and user-context types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Server-side definition of a feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDefinition {
    pub key: String,
    /// Hard kill switch. `false` disables the flag for everyone.
    pub server_enabled: bool,
    /// Whether tenant admins may override the flag.
    #[serde(default)]
    pub admin_editable: bool,
    #[serde(default)]
    pub default_state: bool,
    /// Share of users (0-100) eligible for the flag. Values above 100 act as 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_percentage: Option<f64>,
    /// Roles or permissions a user needs at least one of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_segment: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FlagDefinition {
    /// A server-enabled flag with no targeting.
    pub fn new(key: impl Into<String>, default_state: bool) -> Self {
        Self {
            key: key.into(),
            server_enabled: true,
            admin_editable: false,
            default_state,
            rollout_percentage: None,
            user_segment: None,
            description: None,
        }
    }

    pub fn server_enabled(mut self, enabled: bool) -> Self {
        self.server_enabled = enabled;
        self
    }

    pub fn admin_editable(mut self, editable: bool) -> Self {
        self.admin_editable = editable;
        self
    }

    pub fn with_rollout(mut self, percentage: f64) -> Self {
        self.rollout_percentage = Some(percentage);
        self
    }

    pub fn with_segment<I, S>(mut self, segment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_segment = Some(segment.into_iter().map(Into::into).collect());
        self
    }

    /// Rollout percentage clamped to `0..=100`, if the flag has one.
    pub fn effective_rollout(&self) -> Option<f64> {
        self.rollout_percentage.map(|pct| {
            if pct.is_nan() {
                0.0
            } else {
                pct.clamp(0.0, 100.0)
            }
        })
    }

    /// Segment entries, or `None` when the segment is absent or empty.
    pub fn segment(&self) -> Option<&[String]> {
        self.user_segment
            .as_deref()
            .filter(|segment| !segment.is_empty())
    }
}

/// Tenant-level overrides keyed by flag key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantOverrides(HashMap<String, bool>);

impl TenantOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.0.insert(key.into(), enabled);
    }

    pub fn remove(&mut self, key: &str) -> Option<bool> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &bool)> {
        self.0.iter()
    }
}

impl From<HashMap<String, bool>> for TenantOverrides {
    fn from(map: HashMap<String, bool>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for TenantOverrides {
    fn from_iter<T: IntoIterator<Item = (K, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The user a flag is evaluated for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// True when any role or permission appears in `segment`.
    pub fn matches_segment(&self, segment: &[String]) -> bool {
        segment
            .iter()
            .any(|entry| self.has_role(entry) || self.has_permission(entry))
    }
}
