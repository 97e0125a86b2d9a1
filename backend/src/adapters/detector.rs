//! Bounding-box detector.
//!
//! Posts the image data URI as a form body and reads either `predicted_classes`
//! or the highest-confidence entry of `predictions`. A non-2xx reply is not a
//! failure for this source: it downgrades to the generic label.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{AdapterError, AdapterName, LabelAdapter, UNKNOWN_LABEL};
use crate::consensus::GENERIC_LABEL;
use crate::imaging::NormalizedImage;

#[derive(Debug, Default, Deserialize)]
pub struct DetectorResponse {
    #[serde(default)]
    pub predicted_classes: Option<Vec<String>>,
    #[serde(default)]
    pub predictions: Option<Vec<DetectorPrediction>>,
}

#[derive(Debug, Deserialize)]
pub struct DetectorPrediction {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Clone)]
pub struct DetectorAdapter {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl DetectorAdapter {
    pub fn new(http_client: Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            http_client,
            endpoint,
            api_key,
        }
    }
}

pub fn label_from_response(response: &DetectorResponse) -> String {
    if let Some(first) = response.predicted_classes.as_ref().and_then(|c| c.first()) {
        return first.clone();
    }
    response
        .predictions
        .as_ref()
        .and_then(|predictions| {
            predictions
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        })
        .map(|best| best.class_name.clone())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

#[async_trait]
impl LabelAdapter for DetectorAdapter {
    fn name(&self) -> AdapterName {
        AdapterName::Detector
    }

    async fn classify(&self, image: &NormalizedImage) -> Result<String, AdapterError> {
        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(image.data_uri.clone());
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!(
                "Detector returned HTTP {}, using generic label: {}",
                status.as_u16(),
                body
            );
            return Ok(GENERIC_LABEL.to_string());
        }

        let body = response.text().await?;
        let parsed: DetectorResponse = serde_json::from_str(&body)
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
        Ok(label_from_response(&parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> String {
        label_from_response(&serde_json::from_str(json).unwrap())
    }

    #[test]
    fn predicted_classes_take_first() {
        assert_eq!(parse(r#"{"predicted_classes":["whitehead","papular"]}"#), "whitehead");
    }

    #[test]
    fn predictions_take_highest_confidence() {
        let json = r#"{"predictions":[
            {"class":"blackhead","confidence":0.41},
            {"class":"cystic","confidence":0.87},
            {"class":"papular","confidence":0.55}
        ]}"#;
        assert_eq!(parse(json), "cystic");
    }

    #[test]
    fn empty_arrays_fall_through() {
        assert_eq!(
            parse(r#"{"predicted_classes":[],"predictions":[{"class":"milium","confidence":0.3}]}"#),
            "milium"
        );
        assert_eq!(parse(r#"{"predictions":[]}"#), UNKNOWN_LABEL);
    }

    #[test]
    fn missing_fields_mean_unknown() {
        assert_eq!(parse(r#"{"time":0.12}"#), UNKNOWN_LABEL);
    }
}
