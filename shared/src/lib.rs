use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, EnumString};

/// Error code returned with HTTP 422 when no condition could be found in the image.
pub const NO_DETECTION_CODE: &str = "NO_ACNE";

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    #[serde(default)]
    pub image_data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdapterLabels {
    pub detector: String,
    pub direct_classifier: String,
    pub generative: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrors {
    pub detector: Option<String>,
    pub direct_classifier: Option<String>,
    pub generative: Option<String>,
    pub severity_grader: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub request_id: String,
    pub prediction: String,
    pub severity: String,
    pub severity_num: i64,
    /// Set when the grader failed and grade 0 was substituted. Grade 0 is then a
    /// conservative placeholder, not evidence of clear skin.
    pub severity_defaulted: bool,
    pub per_adapter_labels: AdapterLabels,
    pub api_errors: ApiErrors,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PlanMode {
    #[default]
    Daily,
    Weekly,
}

impl PlanMode {
    /// Label token that introduces each period in generated text.
    pub fn marker(&self) -> &'static str {
        match self {
            PlanMode::Daily => "Day",
            PlanMode::Weekly => "Week",
        }
    }

    pub fn period_count(&self) -> usize {
        match self {
            PlanMode::Daily => 6,
            PlanMode::Weekly => 4,
        }
    }

    pub fn period_key(&self, index: usize) -> String {
        format!("{}{}", self.marker().to_lowercase(), index)
    }

    /// Every key a complete plan of this mode must carry, in order.
    pub fn period_keys(&self) -> Vec<String> {
        (1..=self.period_count()).map(|i| self.period_key(i)).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub acne_type: String,
    #[serde(default)]
    pub skin_type: Option<String>,
    #[serde(default)]
    pub mode: PlanMode,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlan {
    pub mode: PlanMode,
    pub periods: BTreeMap<String, String>,
    pub is_using_fallback: bool,
    pub parse_error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisScores {
    pub severity: u8,
    pub harsh: u8,
    pub freq: u8,
    pub impact: u8,
    pub rare: u8,
    pub scary: u8,
    pub reco: u8,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConditionProfile {
    pub name: String,
    pub description: String,
    pub analysis: AnalysisScores,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn plan_mode_keys() {
        assert_eq!(
            PlanMode::Daily.period_keys(),
            vec!["day1", "day2", "day3", "day4", "day5", "day6"]
        );
        assert_eq!(
            PlanMode::Weekly.period_keys(),
            vec!["week1", "week2", "week3", "week4"]
        );
    }

    #[test]
    fn plan_mode_parses_case_insensitively() {
        assert_eq!(PlanMode::from_str("Weekly").unwrap(), PlanMode::Weekly);
        assert_eq!(PlanMode::Daily.to_string(), "daily");
    }

    #[test]
    fn plan_request_defaults_to_daily() {
        let req: PlanRequest = serde_json::from_str(r#"{"acneType":"Cystic"}"#).unwrap();
        assert_eq!(req.mode, PlanMode::Daily);
        assert!(req.skin_type.is_none());
    }

    #[test]
    fn prediction_response_uses_camel_case() {
        let resp = PredictionResponse {
            request_id: "r".into(),
            prediction: "Whitehead".into(),
            severity: "Mild".into(),
            severity_num: 1,
            severity_defaulted: false,
            per_adapter_labels: AdapterLabels {
                detector: "Whitehead".into(),
                direct_classifier: "Whitehead".into(),
                generative: "Blackhead".into(),
            },
            api_errors: ApiErrors::default(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["severityNum"], 1);
        assert_eq!(json["perAdapterLabels"]["directClassifier"], "Whitehead");
        assert!(json["apiErrors"]["severityGrader"].is_null());
    }
}
