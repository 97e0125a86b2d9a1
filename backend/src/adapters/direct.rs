use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use serde::{Deserialize, Deserializer};

use super::{AdapterError, AdapterName, LabelAdapter, UNKNOWN_LABEL, image_part, read_json};
use crate::imaging::NormalizedImage;

#[derive(Debug, Deserialize)]
pub struct DirectClassifierResponse {
    pub bounding_boxes: Vec<BoundingBox>,
}

#[derive(Debug, Deserialize)]
pub struct BoundingBox {
    #[serde(deserialize_with = "class_id_text")]
    pub class_id: String,
    pub percentage_conf: f64,
}

/// Some deployments report the class as its numeric index.
fn class_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ClassId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match ClassId::deserialize(deserializer)? {
        ClassId::Text(text) => text,
        ClassId::Number(number) => number.to_string(),
    })
}

/// Single-label classifier reached with a multipart `file` upload.
#[derive(Clone)]
pub struct DirectClassifierAdapter {
    http_client: Client,
    endpoint: String,
}

impl DirectClassifierAdapter {
    pub fn new(http_client: Client, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

pub fn label_from_response(response: &DirectClassifierResponse) -> String {
    response
        .bounding_boxes
        .iter()
        .max_by(|a, b| a.percentage_conf.total_cmp(&b.percentage_conf))
        .map(|best| best.class_id.clone())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

#[async_trait]
impl LabelAdapter for DirectClassifierAdapter {
    fn name(&self) -> AdapterName {
        AdapterName::DirectClassifier
    }

    async fn classify(&self, image: &NormalizedImage) -> Result<String, AdapterError> {
        let form = Form::new().part("file", image_part(image)?);
        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        let parsed: DirectClassifierResponse = read_json(response).await?;
        Ok(label_from_response(&parsed))
    }
}
