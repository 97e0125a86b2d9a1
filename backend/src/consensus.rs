//! Reconciles the adapters' outcomes into one decision.
//!
//! Rules, applied in order:
//! 1. no-detection: the generative source replied with the no-finding sentinel,
//!    or it timed out while the direct classifier had no opinion, or all three
//!    label sources are `Unknown`;
//! 2. the first agreeing pair among (detector, direct), (detector, generative),
//!    (direct, generative);
//! 3. priority fallback: generative (unless timed out), direct, detector, then
//!    the generic label.
//!
//! Severity comes only from the grader; a failed grader yields grade 0 with
//! `severity_defaulted` set.

use shared::{AdapterLabels, ApiErrors};

use crate::adapters::generative::NO_FINDING_SENTINEL;
use crate::adapters::{AdapterError, AdapterName, FailureKind, UNKNOWN_LABEL};

pub const GENERIC_LABEL: &str = "Acne";
pub const SEVERITY_LABELS: [&str; 4] = ["Clear / Normal", "Mild", "Moderate", "Severe"];

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutcome<T> {
    Success { value: T, raw_label: String },
    Failure { kind: FailureKind, message: String },
}

impl AdapterOutcome<String> {
    pub fn from_label(result: Result<String, AdapterError>) -> Self {
        match result {
            Ok(label) => AdapterOutcome::Success {
                raw_label: label.clone(),
                value: label,
            },
            Err(err) => err.into(),
        }
    }
}

impl AdapterOutcome<i64> {
    pub fn from_grade(result: Result<i64, AdapterError>) -> Self {
        match result {
            Ok(grade) => AdapterOutcome::Success {
                value: grade,
                raw_label: grade.to_string(),
            },
            Err(err) => err.into(),
        }
    }
}

impl<T> From<AdapterError> for AdapterOutcome<T> {
    fn from(err: AdapterError) -> Self {
        AdapterOutcome::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl<T> AdapterOutcome<T> {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AdapterOutcome::Failure {
                kind: FailureKind::Timeout,
                ..
            }
        )
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            AdapterOutcome::Success { .. } => None,
            AdapterOutcome::Failure { message, .. } => Some(message.clone()),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            AdapterOutcome::Success { value, .. } => Some(value),
            AdapterOutcome::Failure { .. } => None,
        }
    }
}

/// Every adapter's settled outcome for one request.
#[derive(Debug, Clone)]
pub struct Outcomes {
    pub detector: AdapterOutcome<String>,
    pub direct_classifier: AdapterOutcome<String>,
    pub generative: AdapterOutcome<String>,
    pub severity_grader: AdapterOutcome<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDetectionReason {
    GenerativeFoundNothing,
    GenerativeTimedOutWithoutClassifier,
    AllSourcesUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusRule {
    Agreement(AdapterName, AdapterName),
    Priority(AdapterName),
    Generic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NoDetection(NoDetectionReason),
    Label { label: String, rule: ConsensusRule },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusResult {
    pub final_label: Option<String>,
    pub rule: Option<ConsensusRule>,
    pub no_detection: Option<NoDetectionReason>,
    pub severity_grade: i64,
    pub severity_label: &'static str,
    pub severity_defaulted: bool,
    pub per_adapter_labels: AdapterLabels,
    pub per_adapter_errors: ApiErrors,
}

impl ConsensusResult {
    pub fn is_no_detection(&self) -> bool {
        self.no_detection.is_some()
    }
}

/// Title-cases words split on underscores and whitespace; empty input becomes
/// the generic label.
pub fn format_label(label: &str) -> String {
    let words: Vec<String> = label
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        GENERIC_LABEL.to_string()
    } else {
        words.join(" ")
    }
}

/// Form used for comparisons: blank or `unknown` in any case is `Unknown`.
fn vote(outcome: &AdapterOutcome<String>) -> String {
    match outcome.value() {
        Some(label) if !label.trim().is_empty() && !label.trim().eq_ignore_ascii_case(UNKNOWN_LABEL) => {
            format_label(label)
        }
        _ => UNKNOWN_LABEL.to_string(),
    }
}

fn is_unknown(label: &str) -> bool {
    label == UNKNOWN_LABEL
}

pub fn severity_label(grade: i64) -> &'static str {
    usize::try_from(grade)
        .ok()
        .and_then(|i| SEVERITY_LABELS.get(i).copied())
        .unwrap_or(UNKNOWN_LABEL)
}

pub fn decide(outcomes: &Outcomes) -> Decision {
    let detector = vote(&outcomes.detector);
    let direct = vote(&outcomes.direct_classifier);
    let generative = vote(&outcomes.generative);
    let generative_timed_out = outcomes.generative.is_timeout();

    if generative.to_lowercase().contains(NO_FINDING_SENTINEL) {
        return Decision::NoDetection(NoDetectionReason::GenerativeFoundNothing);
    }
    if generative_timed_out && is_unknown(&direct) {
        return Decision::NoDetection(NoDetectionReason::GenerativeTimedOutWithoutClassifier);
    }
    if is_unknown(&detector) && is_unknown(&direct) && is_unknown(&generative) {
        return Decision::NoDetection(NoDetectionReason::AllSourcesUnknown);
    }

    let pairs = [
        (AdapterName::Detector, &detector, AdapterName::DirectClassifier, &direct),
        (AdapterName::Detector, &detector, AdapterName::Generative, &generative),
        (AdapterName::DirectClassifier, &direct, AdapterName::Generative, &generative),
    ];
    for (left_name, left, right_name, right) in pairs {
        if !is_unknown(left) && left == right {
            return Decision::Label {
                label: left.clone(),
                rule: ConsensusRule::Agreement(left_name, right_name),
            };
        }
    }

    let priority = [
        (AdapterName::Generative, &generative, !generative_timed_out),
        (AdapterName::DirectClassifier, &direct, true),
        (AdapterName::Detector, &detector, true),
    ];
    for (name, label, eligible) in priority {
        if eligible && !is_unknown(label) {
            return Decision::Label {
                label: label.clone(),
                rule: ConsensusRule::Priority(name),
            };
        }
    }

    Decision::Label {
        label: GENERIC_LABEL.to_string(),
        rule: ConsensusRule::Generic,
    }
}

fn display_label(outcome: &AdapterOutcome<String>) -> String {
    match outcome {
        AdapterOutcome::Success { raw_label, .. } => format_label(raw_label),
        AdapterOutcome::Failure { .. } => UNKNOWN_LABEL.to_string(),
    }
}

pub fn reconcile(outcomes: &Outcomes) -> ConsensusResult {
    let (final_label, rule, no_detection) = match decide(outcomes) {
        Decision::NoDetection(reason) => (None, None, Some(reason)),
        Decision::Label { label, rule } => (Some(format_label(&label)), Some(rule), None),
    };

    let (severity_grade, severity_defaulted) = match outcomes.severity_grader.value() {
        Some(grade) => (*grade, false),
        None => (0, true),
    };

    ConsensusResult {
        final_label,
        rule,
        no_detection,
        severity_grade,
        severity_label: severity_label(severity_grade),
        severity_defaulted,
        per_adapter_labels: AdapterLabels {
            detector: display_label(&outcomes.detector),
            direct_classifier: display_label(&outcomes.direct_classifier),
            generative: display_label(&outcomes.generative),
        },
        per_adapter_errors: ApiErrors {
            detector: outcomes.detector.error_message(),
            direct_classifier: outcomes.direct_classifier.error_message(),
            generative: outcomes.generative.error_message(),
            severity_grader: outcomes.severity_grader.error_message(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(label: &str) -> AdapterOutcome<String> {
        AdapterOutcome::from_label(Ok(label.to_string()))
    }

    fn timeout() -> AdapterOutcome<String> {
        AdapterError::Timeout {
            after: Some(Duration::from_secs(40)),
        }
        .into()
    }

    fn http(status: u16) -> AdapterOutcome<String> {
        AdapterError::Http { status }.into()
    }

    fn outcomes(
        detector: AdapterOutcome<String>,
        direct: AdapterOutcome<String>,
        generative: AdapterOutcome<String>,
        grade: Result<i64, AdapterError>,
    ) -> Outcomes {
        Outcomes {
            detector,
            direct_classifier: direct,
            generative,
            severity_grader: AdapterOutcome::from_grade(grade),
        }
    }

    #[test]
    fn detector_and_classifier_pair_wins() {
        let result = reconcile(&outcomes(ok("Whitehead"), ok("Whitehead"), ok("Blackhead"), Ok(1)));
        assert_eq!(result.final_label.as_deref(), Some("Whitehead"));
        assert_eq!(
            result.rule,
            Some(ConsensusRule::Agreement(AdapterName::Detector, AdapterName::DirectClassifier))
        );
        assert_eq!(result.severity_label, "Mild");
        assert_eq!(result.severity_grade, 1);
        assert!(!result.severity_defaulted);
    }

    #[test]
    fn unknowns_with_sentinel_mean_no_detection() {
        let result = reconcile(&outcomes(ok("Unknown"), ok("Unknown"), ok("no acne"), Ok(0)));
        assert!(result.is_no_detection());
        assert_eq!(result.no_detection, Some(NoDetectionReason::GenerativeFoundNothing));
        assert!(result.final_label.is_none());
    }

    #[test]
    fn sentinel_matches_case_insensitively() {
        let decision = decide(&outcomes(ok("Cystic"), ok("Cystic"), ok("No Acne."), Ok(2)));
        assert_eq!(decision, Decision::NoDetection(NoDetectionReason::GenerativeFoundNothing));
    }

    #[test]
    fn detector_timeout_does_not_block_agreement() {
        let result = reconcile(&outcomes(timeout(), ok("Cystic"), ok("Cystic"), Ok(3)));
        assert_eq!(result.final_label.as_deref(), Some("Cystic"));
        assert_eq!(
            result.rule,
            Some(ConsensusRule::Agreement(AdapterName::DirectClassifier, AdapterName::Generative))
        );
        assert_eq!(result.per_adapter_labels.detector, "Unknown");
        assert!(result.per_adapter_errors.detector.as_deref().unwrap().contains("timed out"));
    }

    #[test]
    fn total_disagreement_prefers_generative() {
        let result = reconcile(&outcomes(ok("Whitehead"), ok("Blackhead"), ok("Papular"), Ok(2)));
        assert_eq!(result.final_label.as_deref(), Some("Papular"));
        assert_eq!(result.rule, Some(ConsensusRule::Priority(AdapterName::Generative)));
    }

    #[test]
    fn all_unknown_is_no_detection() {
        let decision = decide(&outcomes(ok("Unknown"), http(500), ok(""), Ok(1)));
        assert_eq!(decision, Decision::NoDetection(NoDetectionReason::AllSourcesUnknown));
    }

    #[test]
    fn generative_timeout_without_classifier_is_no_detection() {
        let decision = decide(&outcomes(ok("Papular"), ok("Unknown"), timeout(), Ok(1)));
        assert_eq!(
            decision,
            Decision::NoDetection(NoDetectionReason::GenerativeTimedOutWithoutClassifier)
        );
    }

    #[test]
    fn generative_timeout_falls_back_to_classifier() {
        let decision = decide(&outcomes(ok("Papular"), ok("Milium"), timeout(), Ok(1)));
        assert_eq!(
            decision,
            Decision::Label {
                label: "Milium".into(),
                rule: ConsensusRule::Priority(AdapterName::DirectClassifier),
            }
        );
    }

    #[test]
    fn detector_is_last_resort() {
        let decision = decide(&outcomes(ok("keloid"), http(502), http(500), Ok(1)));
        assert_eq!(
            decision,
            Decision::Label {
                label: "Keloid".into(),
                rule: ConsensusRule::Priority(AdapterName::Detector),
            }
        );
    }

    #[test]
    fn pair_agreement_is_permutation_invariant() {
        let agree = "Whitehead";
        let other = "Blackhead";
        let layouts = [
            (agree, agree, other),
            (agree, other, agree),
            (other, agree, agree),
            (agree, agree, "Unknown"),
            (agree, "Unknown", agree),
            ("Unknown", agree, agree),
        ];
        for (d, c, g) in layouts {
            let result = reconcile(&outcomes(ok(d), ok(c), ok(g), Ok(1)));
            assert_eq!(result.final_label.as_deref(), Some(agree), "layout {:?}", (d, c, g));
        }
    }

    #[test]
    fn labels_compare_after_normalization() {
        let decision = decide(&outcomes(ok("flat_wart"), ok("Flat Wart"), ok("Keloid"), Ok(0)));
        assert_eq!(
            decision,
            Decision::Label {
                label: "Flat Wart".into(),
                rule: ConsensusRule::Agreement(AdapterName::Detector, AdapterName::DirectClassifier),
            }
        );
    }

    #[test]
    fn unknown_pairs_never_agree() {
        let decision = decide(&outcomes(ok("Unknown"), ok("Unknown"), ok("Syringoma"), Ok(0)));
        assert_eq!(
            decision,
            Decision::Label {
                label: "Syringoma".into(),
                rule: ConsensusRule::Priority(AdapterName::Generative),
            }
        );
    }

    #[test]
    fn failed_grader_defaults_to_zero() {
        let result = reconcile(&outcomes(
            ok("Cystic"),
            ok("Cystic"),
            ok("Cystic"),
            Err(AdapterError::MalformedResponse("missing predicted_grade".into())),
        ));
        assert_eq!(result.severity_grade, 0);
        assert_eq!(result.severity_label, "Clear / Normal");
        assert!(result.severity_defaulted);
        assert!(result.per_adapter_errors.severity_grader.is_some());
    }

    #[test]
    fn severity_lookup() {
        assert_eq!(severity_label(0), "Clear / Normal");
        assert_eq!(severity_label(3), "Severe");
        assert_eq!(severity_label(4), "Unknown");
        assert_eq!(severity_label(-1), "Unknown");
    }

    #[test]
    fn every_adapter_is_reported() {
        let result = reconcile(&outcomes(http(503), ok("Cystic"), timeout(), Ok(2)));
        assert_eq!(result.per_adapter_labels.detector, "Unknown");
        assert_eq!(result.per_adapter_labels.direct_classifier, "Cystic");
        assert_eq!(result.per_adapter_labels.generative, "Unknown");
        assert_eq!(result.per_adapter_errors.detector.as_deref(), Some("HTTP 503"));
        assert!(result.per_adapter_errors.direct_classifier.is_none());
        assert!(result.per_adapter_errors.generative.is_some());
        assert!(result.per_adapter_errors.severity_grader.is_none());
    }

    #[test]
    fn format_label_title_cases() {
        assert_eq!(format_label("sebo-crystan-conglo"), "Sebo-crystan-conglo");
        assert_eq!(format_label("flat_wart"), "Flat Wart");
        assert_eq!(format_label("  PAPULAR  "), "Papular");
        assert_eq!(format_label(""), GENERIC_LABEL);
    }
}
