use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use uuid::Uuid;

use crate::adapters::genai::GenAiClient;
use crate::adapters::{
    AdapterError, DetectorAdapter, DirectClassifierAdapter, GenerativeAdapter, LabelAdapter, SeverityAdapter,
    SeverityGraderAdapter,
};
use crate::config::{AdapterTimeouts, AppConfig};
use crate::consensus::{self, AdapterOutcome, ConsensusResult, Outcomes};
use crate::imaging::{self, ImageError, NormalizedImage};
use crate::invoker::with_deadline;

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ImageError),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub request_id: Uuid,
    pub image_digest: String,
    pub consensus: ConsensusResult,
}

/// The four sources consulted for every prediction.
#[derive(Clone)]
pub struct AdapterSet {
    pub detector: Arc<dyn LabelAdapter>,
    pub direct_classifier: Arc<dyn LabelAdapter>,
    pub generative: Arc<dyn LabelAdapter>,
    pub severity_grader: Arc<dyn SeverityAdapter>,
}

impl AdapterSet {
    pub fn from_config(config: &AppConfig, http_client: Client, genai: Arc<GenAiClient>) -> Self {
        Self {
            detector: Arc::new(DetectorAdapter::new(
                http_client.clone(),
                config.detector_url.clone(),
                config.detector_api_key.clone(),
            )),
            direct_classifier: Arc::new(DirectClassifierAdapter::new(
                http_client.clone(),
                config.direct_classifier_url.clone(),
            )),
            generative: Arc::new(GenerativeAdapter::new(
                genai,
                config.timeouts.generative_upload,
                config.timeouts.generative_generate,
            )),
            severity_grader: Arc::new(SeverityGraderAdapter::new(
                http_client,
                config.severity_grader_url.clone(),
            )),
        }
    }
}

/// Fans one image out to every adapter and folds the outcomes into a decision.
#[derive(Clone)]
pub struct Aggregator {
    adapters: AdapterSet,
    timeouts: AdapterTimeouts,
    max_upload_bytes: usize,
}

impl Aggregator {
    pub fn new(adapters: AdapterSet, timeouts: AdapterTimeouts, max_upload_bytes: usize) -> Self {
        Self {
            adapters,
            timeouts,
            max_upload_bytes,
        }
    }

    pub async fn predict(&self, image_payload: &str) -> Result<Prediction, PredictError> {
        let request_id = Uuid::new_v4();
        let image = imaging::normalize(image_payload, self.max_upload_bytes).map_err(|e| {
            log::warn!("[{}] Rejected image: {}", request_id, e);
            e
        })?;
        log::info!(
            "[{}] Predicting on {}x{} image (sha256 {})",
            request_id,
            image.width,
            image.height,
            image.digest
        );

        let outcomes = self.collect(&image).await;
        let consensus = consensus::reconcile(&outcomes);

        match (&consensus.final_label, consensus.no_detection) {
            (_, Some(reason)) => log::info!("[{}] No detection: {:?}", request_id, reason),
            (Some(label), None) => log::info!(
                "[{}] Final label {} via {:?}, severity {} ({})",
                request_id,
                label,
                consensus.rule,
                consensus.severity_grade,
                consensus.severity_label
            ),
            (None, None) => {
                return Err(PredictError::Internal(
                    "consensus produced neither a label nor a no-detection reason".to_string(),
                ));
            }
        }

        Ok(Prediction {
            request_id,
            image_digest: image.digest,
            consensus,
        })
    }

    /// Runs every adapter concurrently and waits for all of them to settle.
    pub async fn collect(&self, image: &NormalizedImage) -> Outcomes {
        let (detector, direct_classifier, generative, severity_grader) = futures::join!(
            self.run_label(&self.adapters.detector, self.timeouts.detector, image),
            self.run_label(&self.adapters.direct_classifier, self.timeouts.direct_classifier, image),
            self.run_label(&self.adapters.generative, self.timeouts.generative, image),
            self.run_grade(image),
        );
        Outcomes {
            detector,
            direct_classifier,
            generative,
            severity_grader,
        }
    }

    async fn run_label(
        &self,
        adapter: &Arc<dyn LabelAdapter>,
        deadline: Duration,
        image: &NormalizedImage,
    ) -> AdapterOutcome<String> {
        let name = adapter.name();
        let result = with_deadline(name.as_str(), deadline, adapter.classify(image)).await;
        log_result(name.as_str(), &result);
        AdapterOutcome::from_label(result)
    }

    async fn run_grade(&self, image: &NormalizedImage) -> AdapterOutcome<i64> {
        let adapter = &self.adapters.severity_grader;
        let name = adapter.name();
        let result = with_deadline(name.as_str(), self.timeouts.severity_grader, adapter.grade(image)).await;
        log_result(name.as_str(), &result);
        AdapterOutcome::from_grade(result)
    }
}

fn log_result<T: std::fmt::Debug>(name: &str, result: &Result<T, AdapterError>) {
    match result {
        Ok(value) => log::debug!("{} returned {:?}", name, value),
        Err(err) => log::warn!("{} failed ({:?}): {}", name, err.kind(), err),
    }
}
