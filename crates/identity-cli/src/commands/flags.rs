//! Feature flag commands.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use feature_flags::{DecisionReason, FlagSet, TenantOverrides, UserContext};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Who the flags are evaluated for.
#[derive(Debug, Default)]
pub struct EvalSubject {
    pub user_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl EvalSubject {
    fn into_context(self) -> Result<Option<UserContext>> {
        match self.user_id {
            Some(id) => Ok(Some(
                UserContext::new(id)
                    .with_roles(self.roles)
                    .with_permissions(self.permissions),
            )),
            None if self.roles.is_empty() && self.permissions.is_empty() => Ok(None),
            None => anyhow::bail!("--role and --permission require --user-id"),
        }
    }
}

#[derive(Debug, Serialize)]
struct FlagRow {
    key: String,
    enabled: bool,
    reason: DecisionReason,
}

#[derive(Debug, Serialize)]
struct FlagReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    flags: Vec<FlagRow>,
}

impl fmt::Display for FlagReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.user_id.as_deref().unwrap_or("anonymous");
        output::heading(f, &format!("Flags for {}", subject))?;
        for row in &self.flags {
            let state = if row.enabled { "on" } else { "off" };
            writeln!(f, "  {:<28} {:<4} ({})", row.key, state, row.reason)?;
        }
        Ok(())
    }
}

/// Parse a `key=true|false` override.
pub fn parse_override(raw: &str) -> Result<(String, bool), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=true|false, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("override key must not be empty".to_string());
    }
    let enabled = value
        .trim()
        .parse::<bool>()
        .map_err(|_| format!("invalid value '{}' for override {}", value, key))?;
    Ok((key.to_string(), enabled))
}

/// Evaluate the flags in a JSON document.
pub fn flags_eval(
    file: &Path,
    subject: EvalSubject,
    overrides: Vec<(String, bool)>,
    key: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let flags = FlagSet::from_json(&content)
        .with_context(|| format!("Invalid flag document {}", file.display()))?;

    let report = evaluate(&flags, subject, overrides.into_iter().collect(), key)?;
    output::print(&report, format);
    Ok(())
}

fn evaluate(
    flags: &FlagSet,
    subject: EvalSubject,
    overrides: TenantOverrides,
    key: Option<&str>,
) -> Result<FlagReport> {
    let user_id = subject.user_id.clone();
    let user = subject.into_context()?;

    let decisions = match key {
        Some(key) => {
            let decision = flags
                .evaluate(key, &overrides, user.as_ref())
                .with_context(|| format!("Unknown flag: {}", key))?;
            vec![(key.to_string(), decision)]
        }
        None => flags.evaluate_all(&overrides, user.as_ref()),
    };

    Ok(FlagReport {
        user_id,
        flags: decisions
            .into_iter()
            .map(|(key, decision)| FlagRow {
                key,
                enabled: decision.enabled,
                reason: decision.reason,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"[
        { "key": "checkout-v2", "serverEnabled": true, "adminEditable": true, "defaultState": false },
        { "key": "reports", "serverEnabled": true, "adminEditable": false, "defaultState": true, "userSegment": ["analyst"] },
        { "key": "legacy", "serverEnabled": false, "adminEditable": true, "defaultState": true }
    ]"#;

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("checkout-v2=true"),
            Ok(("checkout-v2".to_string(), true))
        );
        assert_eq!(parse_override(" a = false "), Ok(("a".to_string(), false)));
        assert!(parse_override("checkout-v2").is_err());
        assert!(parse_override("=true").is_err());
        assert!(parse_override("a=yes").is_err());
    }

    #[test]
    fn test_evaluate_with_overrides_and_roles() {
        let flags = FlagSet::from_json(DOCUMENT).unwrap();
        let subject = EvalSubject {
            user_id: Some("user-1".to_string()),
            roles: vec!["analyst".to_string()],
            permissions: Vec::new(),
        };
        let overrides = [("checkout-v2".to_string(), true), ("legacy".to_string(), true)]
            .into_iter()
            .collect();

        let report = evaluate(&flags, subject, overrides, None).unwrap();

        let summary: Vec<(&str, bool, DecisionReason)> = report
            .flags
            .iter()
            .map(|row| (row.key.as_str(), row.enabled, row.reason))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("checkout-v2", true, DecisionReason::TenantOverride),
                ("legacy", false, DecisionReason::KillSwitch),
                ("reports", true, DecisionReason::Default),
            ]
        );
    }

    #[test]
    fn test_anonymous_segment_flag_is_off() {
        let flags = FlagSet::from_json(DOCUMENT).unwrap();
        let report = evaluate(
            &flags,
            EvalSubject::default(),
            TenantOverrides::new(),
            Some("reports"),
        )
        .unwrap();

        assert_eq!(report.flags.len(), 1);
        assert!(!report.flags[0].enabled);
        assert_eq!(report.flags[0].reason, DecisionReason::SegmentRequiresUser);
        assert!(report.to_string().contains("anonymous"));
    }

    #[test]
    fn test_roles_without_user_are_rejected() {
        let flags = FlagSet::from_json(DOCUMENT).unwrap();
        let subject = EvalSubject {
            roles: vec!["analyst".to_string()],
            ..Default::default()
        };
        assert!(evaluate(&flags, subject, TenantOverrides::new(), None).is_err());
    }

    #[test]
    fn test_unknown_key() {
        let flags = FlagSet::from_json(DOCUMENT).unwrap();
        let result = evaluate(&flags, EvalSubject::default(), TenantOverrides::new(), Some("nope"));
        assert!(result.is_err());
    }
}
