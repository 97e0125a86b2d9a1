use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use serde::Deserialize;

use super::{AdapterError, SeverityAdapter, image_part, read_json};
use crate::imaging::NormalizedImage;

#[derive(Debug, Deserialize)]
pub struct GradeResponse {
    pub predicted_grade: i64,
}

#[derive(Clone)]
pub struct SeverityGraderAdapter {
    http_client: Client,
    endpoint: String,
}

impl SeverityGraderAdapter {
    pub fn new(http_client: Client, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

#[async_trait]
impl SeverityAdapter for SeverityGraderAdapter {
    async fn grade(&self, image: &NormalizedImage) -> Result<i64, AdapterError> {
        let form = Form::new().part("file", image_part(image)?);
        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        let parsed: GradeResponse = read_json(response).await?;
        Ok(parsed.predicted_grade)
    }
}
