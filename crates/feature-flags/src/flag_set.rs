//! A tenant's loaded flag definitions.

use crate::{evaluate, FlagDecision, FlagDefinition, TenantOverrides, UserContext};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::warn;

/// Errors building a [`FlagSet`].
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("Invalid flag JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate flag key: {0}")]
    DuplicateKey(String),

    #[error("Flag key mismatch: map key {map_key} holds definition {definition_key}")]
    KeyMismatch {
        map_key: String,
        definition_key: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagDocument {
    List(Vec<FlagDefinition>),
    Map(BTreeMap<String, FlagDefinition>),
}

/// Flag definitions keyed by flag key, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSet {
    flags: BTreeMap<String, FlagDefinition>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, rejecting repeated keys.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = FlagDefinition>,
    ) -> Result<Self, FlagError> {
        let mut flags = BTreeMap::new();
        for flag in definitions {
            if flags.contains_key(&flag.key) {
                return Err(FlagError::DuplicateKey(flag.key));
            }
            flags.insert(flag.key.clone(), flag);
        }
        Ok(Self { flags })
    }

    /// Parse either a JSON array of definitions or an object keyed by flag key.
    pub fn from_json(json: &str) -> Result<Self, FlagError> {
        match serde_json::from_str(json)? {
            FlagDocument::List(list) => Self::from_definitions(list),
            FlagDocument::Map(map) => {
                for (map_key, flag) in &map {
                    if *map_key != flag.key {
                        return Err(FlagError::KeyMismatch {
                            map_key: map_key.clone(),
                            definition_key: flag.key.clone(),
                        });
                    }
                }
                Ok(Self { flags: map })
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FlagDefinition> {
        self.flags.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlagDefinition> {
        self.flags.values()
    }

    /// Evaluate one flag; `None` when the key is unknown.
    pub fn evaluate(
        &self,
        key: &str,
        overrides: &TenantOverrides,
        user: Option<&UserContext>,
    ) -> Option<FlagDecision> {
        self.get(key).map(|flag| evaluate(flag, overrides, user))
    }

    /// Evaluate one flag. Unknown keys are off.
    pub fn is_enabled(
        &self,
        key: &str,
        overrides: &TenantOverrides,
        user: Option<&UserContext>,
    ) -> bool {
        self.evaluate(key, overrides, user)
            .map(|decision| decision.enabled)
            .unwrap_or(false)
    }

    /// Evaluate every flag in key order.
    pub fn evaluate_all(
        &self,
        overrides: &TenantOverrides,
        user: Option<&UserContext>,
    ) -> Vec<(String, FlagDecision)> {
        self.flags
            .values()
            .map(|flag| (flag.key.clone(), evaluate(flag, overrides, user)))
            .collect()
    }
}

impl From<HashMap<String, FlagDefinition>> for FlagSet {
    /// Map keys win over the embedded definition keys.
    fn from(map: HashMap<String, FlagDefinition>) -> Self {
        let flags = map
            .into_iter()
            .map(|(key, mut flag)| {
                if flag.key != key {
                    warn!(map_key = %key, definition_key = %flag.key, "Flag key mismatch, using map key");
                    flag.key = key.clone();
                }
                (key, flag)
            })
            .collect();
        Self { flags }
    }
}
