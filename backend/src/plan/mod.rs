//! Treatment-plan generation.
//!
//! A plan is requested from the generative model and parsed into fixed period
//! keys. Any failure along the way degrades to the static catalog, so callers
//! always receive a plan with every key populated.

pub mod catalog;
pub mod parser;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use shared::{PlanMode, TreatmentPlan};

use crate::adapters::genai::GenerativeModel;
use crate::invoker::with_deadline;
pub use catalog::{CatalogError, TreatmentCatalog};
pub use parser::parse_plan;

pub const DEFAULT_SKIN_TYPE: &str = "Normal";

pub fn build_prompt(category: &str, skin_type: &str, mode: PlanMode) -> String {
    let (length, unit) = match mode {
        PlanMode::Daily => ("6-day", "day"),
        PlanMode::Weekly => ("4-week", "week"),
    };
    let marker = mode.marker();
    let format_lines: Vec<String> = (1..=mode.period_count())
        .map(|n| format!("{marker} {n}: [treatment for {unit} {n}]"))
        .collect();

    format!(
        "Make a {length} treatment plan for someone with {category} acne and {skin_type} skin type. \
         Use only general, easily available skincare products and some homeopathic remedies. \
         Recommend simple serums (e.g., with niacinamide, salicylic acid, AHA/BHA, etc.) and avoid \
         anything with known side effects. Make sure the plan is gentle and can be safely followed \
         by anyone. Break down the plan {unit} by {unit}.\n\n\
         Format your response exactly like this, with each {unit}'s treatment on a new line:\n{}",
        format_lines.join("\n")
    )
}

/// Whole plan taken from the catalog entry matching `category`.
pub fn fallback_plan(catalog: &TreatmentCatalog, category: &str, mode: PlanMode, reason: String) -> TreatmentPlan {
    let entry = catalog.lookup(category);
    log::info!(
        "Using fallback {} plan '{}' for '{}': {}",
        mode,
        entry.name,
        category,
        reason
    );
    TreatmentPlan {
        mode,
        periods: entry.periods(mode).clone(),
        is_using_fallback: true,
        parse_error: Some(reason),
    }
}

/// Parses generated text, filling any missing later periods from the catalog.
pub fn plan_from_text(catalog: &TreatmentCatalog, text: &str, category: &str, mode: PlanMode) -> TreatmentPlan {
    let Some(parsed) = parse_plan(text, mode) else {
        return fallback_plan(
            catalog,
            category,
            mode,
            format!("Failed to parse {} treatment plan from model response", mode),
        );
    };

    let entry = catalog.lookup(category);
    let mut periods = BTreeMap::new();
    let mut filled = Vec::new();
    for (index, text) in parsed.into_iter().enumerate() {
        let key = mode.period_key(index + 1);
        let value = if text.is_empty() {
            filled.push(key.clone());
            entry.periods(mode).get(&key).cloned().unwrap_or_default()
        } else {
            text
        };
        periods.insert(key, value);
    }

    if filled.is_empty() {
        return TreatmentPlan {
            mode,
            periods,
            is_using_fallback: false,
            parse_error: None,
        };
    }

    let reason = format!(
        "Model response was missing {}; filled from the {} plan",
        filled.join(", "),
        entry.name
    );
    log::info!("{}", reason);
    TreatmentPlan {
        mode,
        periods,
        is_using_fallback: true,
        parse_error: Some(reason),
    }
}

pub struct PlanService {
    model: Arc<dyn GenerativeModel>,
    catalog: Arc<TreatmentCatalog>,
    deadline: Duration,
}

impl PlanService {
    pub fn new(model: Arc<dyn GenerativeModel>, catalog: Arc<TreatmentCatalog>, deadline: Duration) -> Self {
        Self {
            model,
            catalog,
            deadline,
        }
    }

    pub fn catalog(&self) -> &TreatmentCatalog {
        &self.catalog
    }

    /// Never fails: generation errors and unparseable text fall back to the catalog.
    pub async fn generate(&self, category: &str, skin_type: Option<&str>, mode: PlanMode) -> TreatmentPlan {
        let skin_type = skin_type
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SKIN_TYPE);
        let prompt = build_prompt(category, skin_type, mode);

        match with_deadline("treatment plan", self.deadline, self.model.generate_text(&prompt, None)).await {
            Ok(text) => {
                log::debug!("Generated {} plan for '{}' ({} chars)", mode, category, text.len());
                plan_from_text(&self.catalog, &text, category, mode)
            }
            Err(err) => {
                log::warn!("Treatment plan generation failed for '{}': {}", category, err);
                fallback_plan(
                    &self.catalog,
                    category,
                    mode,
                    format!("Treatment plan generation failed: {}", err),
                )
            }
        }
    }
}
