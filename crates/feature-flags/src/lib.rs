//! Feature flag evaluation for the identity runtime.
//!
//! A flag resolves to a boolean by combining, in order:
//! 1. the server kill switch
//! 2. a tenant-level override (only for admin-editable flags)
//! 3. user-segment targeting on roles and permissions
//! 4. percentage rollout using a stable per-user bucket
//! 5. the flag's default state
//!
//! Evaluation is pure: identical inputs always produce identical decisions.

mod bucket;
mod definition;
mod evaluator;
mod flag_set;

#[cfg(test)]
mod tests;

pub use bucket::{rollout_bucket, BUCKET_COUNT};
pub use definition::{FlagDefinition, TenantOverrides, UserContext};
pub use evaluator::{evaluate, is_enabled, DecisionReason, FlagDecision};
pub use flag_set::{FlagError, FlagSet};
