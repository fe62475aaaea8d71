//! Backend and environment contracts for identity state.

use async_trait::async_trait;
use feature_flags::{FlagDefinition, TenantOverrides};
use serde::{Deserialize, Serialize};
use session_runtime::{AuthUser, ConnectorError, SessionConnector};
use std::collections::HashMap;

/// A named role and the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Role {
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// A tenant and its admin-set flag overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub flag_overrides: TenantOverrides,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            flag_overrides: TenantOverrides::new(),
        }
    }
}

/// Identity backend: session operations plus user, tenant and flag data.
#[async_trait]
pub trait IdentityConnector: SessionConnector {
    async fn get_current_user(&self, access_token: &str) -> Result<AuthUser, ConnectorError>;

    async fn get_user_roles(&self, user_id: &str) -> Result<Vec<Role>, ConnectorError>;

    async fn get_tenant(&self, tenant_id: &str) -> Result<Tenant, ConnectorError>;

    async fn get_feature_flags(
        &self,
        tenant_id: &str,
    ) -> Result<HashMap<String, FlagDefinition>, ConnectorError>;

    async fn update_feature_flag_override(
        &self,
        tenant_id: &str,
        flag_key: &str,
        enabled: bool,
    ) -> Result<(), ConnectorError>;
}

/// Supplies the tenant id from the hosting environment.
pub trait TenantResolver: Send + Sync {
    fn resolve_tenant_id(&self) -> Option<String>;
}

/// Resolver returning a fixed tenant id.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantResolver {
    tenant_id: Option<String>,
}

impl StaticTenantResolver {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
        }
    }

    /// A resolver that never finds a tenant.
    pub fn none() -> Self {
        Self::default()
    }
}

impl TenantResolver for StaticTenantResolver {
    fn resolve_tenant_id(&self) -> Option<String> {
        self.tenant_id.clone()
    }
}
