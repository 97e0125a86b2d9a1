use serde::Deserialize;
use shared::PlanMode;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../../../config/treatment_catalog.yaml");

/// Name of the entry used when no keyword matches.
pub const GENERAL_ENTRY: &str = "General";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read treatment catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse treatment catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid treatment catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub daily: BTreeMap<String, String>,
    pub weekly: BTreeMap<String, String>,
}

impl CatalogEntry {
    pub fn periods(&self, mode: PlanMode) -> &BTreeMap<String, String> {
        match mode {
            PlanMode::Daily => &self.daily,
            PlanMode::Weekly => &self.weekly,
        }
    }

    fn matches(&self, category: &str) -> bool {
        self.keywords.iter().any(|k| category.contains(k.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    entries: Vec<CatalogEntry>,
}

/// Pre-authored plans keyed by condition category.
#[derive(Debug, Clone)]
pub struct TreatmentCatalog {
    entries: Vec<CatalogEntry>,
    general: usize,
}

impl TreatmentCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Reads the catalog at `path`, or the compiled-in one when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.to_string(),
                    source,
                })?;
                Self::from_yaml(&contents)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(contents)?;
        let mut entries = file.entries;

        for entry in entries.iter_mut() {
            if entry.keywords.is_empty() && entry.name != GENERAL_ENTRY {
                entry.keywords.push(entry.name.clone());
            }
            entry.keywords = entry.keywords.iter().map(|k| k.trim().to_lowercase()).collect();
            entry.keywords.retain(|k| !k.is_empty());

            for mode in PlanMode::iter() {
                let periods = entry.periods(mode);
                if let Some(missing) = mode
                    .period_keys()
                    .into_iter()
                    .find(|key| periods.get(key).is_none_or(|text| text.trim().is_empty()))
                {
                    return Err(CatalogError::Invalid(format!(
                        "entry '{}' has no {} text for {}",
                        entry.name, mode, missing
                    )));
                }
            }
        }

        let general = entries
            .iter()
            .position(|e| e.name == GENERAL_ENTRY)
            .ok_or_else(|| CatalogError::Invalid(format!("missing '{}' entry", GENERAL_ENTRY)))?;

        Ok(Self { entries, general })
    }

    /// First entry whose keyword occurs in `category`, else the general entry.
    pub fn lookup(&self, category: &str) -> &CatalogEntry {
        let category = category.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.matches(&category))
            .unwrap_or(&self.entries[self.general])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
