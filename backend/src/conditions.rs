use serde::Deserialize;
use shared::ConditionProfile;
use std::collections::HashMap;
use thiserror::Error;

use crate::consensus::GENERIC_LABEL;

const BUILTIN_PROFILES: &str = include_str!("../../config/conditions.yaml");

#[derive(Debug, Error)]
pub enum ConditionCatalogError {
    #[error("failed to parse condition profiles: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("condition profiles have no '{0}' entry")]
    MissingGeneric(&'static str),
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    profiles: Vec<ConditionProfile>,
}

/// Descriptions and analysis scores per condition, keyed by lowercased name.
#[derive(Debug, Clone)]
pub struct ConditionCatalog {
    profiles: HashMap<String, ConditionProfile>,
}

impl ConditionCatalog {
    pub fn builtin() -> Result<Self, ConditionCatalogError> {
        Self::from_yaml(BUILTIN_PROFILES)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConditionCatalogError> {
        let file: ProfileFile = serde_yaml::from_str(contents)?;
        let profiles: HashMap<String, ConditionProfile> = file
            .profiles
            .into_iter()
            .map(|p| (p.name.to_lowercase(), p))
            .collect();
        if !profiles.contains_key(&GENERIC_LABEL.to_lowercase()) {
            return Err(ConditionCatalogError::MissingGeneric(GENERIC_LABEL));
        }
        Ok(Self { profiles })
    }

    /// Profile for the first `", "`-separated component of `label`. Unknown
    /// labels get the generic profile.
    pub fn lookup(&self, label: &str) -> &ConditionProfile {
        let primary = label.split(", ").next().unwrap_or_default().trim().to_lowercase();
        self.profiles
            .get(&primary)
            .or_else(|| self.profiles.get(&primary.replace(['_', '-'], " ")))
            .unwrap_or_else(|| &self.profiles[&GENERIC_LABEL.to_lowercase()])
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
